//! Loading artifacts back into a live document.

use crate::assets::restore_into;
use crate::config::RefitOptions;
use crate::document::LiveDocument;
use crate::format::{FormatKind, UnrecognizedReason};
use crate::model::{AssetId, AssetSource, EmbeddedPayload};
use crate::outcome::{ImportOutcome, PortWarning};
use crate::snapshot::{DocumentSnapshot, RecordCounts, SnapshotError};
use serde_json::Value;
use std::collections::BTreeMap;
use thiserror::Error;

/// Fatal import failures. The document is unmodified when one is returned.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ImportFailed {
    #[error("Unrecognized format: {0}")]
    UnrecognizedFormat(UnrecognizedReason),
    #[error("Invalid snapshot: {0}")]
    SnapshotInvalid(#[from] SnapshotError),
}

/// Parse the container's asset map, skipping entries that are not payloads.
fn parse_assets(value: Value, warnings: &mut Vec<PortWarning>) -> BTreeMap<AssetId, EmbeddedPayload> {
    let entries = match value {
        Value::Null => return BTreeMap::new(),
        Value::Object(entries) => entries,
        other => {
            let reason = format!("expected an object, found {}", json_kind(&other));
            log::warn!("Ignoring asset map: {}", reason);
            warnings.push(PortWarning::MalformedAssetMap { reason });
            return BTreeMap::new();
        }
    };

    let mut assets = BTreeMap::new();
    for (id, entry) in entries {
        let parsed = match entry {
            Value::String(s) => EmbeddedPayload::parse(s).map_err(|e| e.to_string()),
            other => Err(format!("expected a string, found {}", json_kind(&other))),
        };
        match parsed {
            Ok(payload) => {
                assets.insert(id, payload);
            }
            Err(reason) => {
                log::warn!("Skipping payload for asset {}: {}", id, reason);
                warnings.push(PortWarning::InvalidPayload { asset_id: id, reason });
            }
        }
    }
    assets
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What an artifact holds, without applying it anywhere.
#[derive(Debug, Clone, PartialEq)]
pub struct Inspection {
    pub format: &'static str,
    pub version: Option<String>,
    pub exported_at: Option<String>,
    pub counts: RecordCounts,
    /// Payloads in the container's asset map.
    pub payloads: usize,
    /// Decoded size of those payloads.
    pub payload_bytes: usize,
    pub warnings: Vec<PortWarning>,
}

/// Decode and validate an artifact for display.
pub fn inspect(kind: FormatKind) -> Result<Inspection, ImportFailed> {
    let mut warnings = Vec::new();
    let format = kind.name();
    let (snapshot, assets, version, exported_at) = match kind {
        FormatKind::Unrecognized(reason) => return Err(ImportFailed::UnrecognizedFormat(reason)),
        FormatKind::LegacyRawSnapshot(snapshot) => (snapshot, BTreeMap::new(), None, None),
        FormatKind::VersionedContainer(raw) => {
            let assets = parse_assets(raw.assets, &mut warnings);
            (raw.snapshot, assets, raw.version, raw.exported_at)
        }
    };
    let snapshot = DocumentSnapshot::from_value(snapshot)?;

    Ok(Inspection {
        format,
        version,
        exported_at,
        counts: snapshot.counts(),
        payloads: assets.len(),
        payload_bytes: assets.values().map(EmbeddedPayload::decoded_len).sum(),
        warnings,
    })
}

/// Restore a classified artifact into `document`.
///
/// The graph is replaced in one step; payloads are then attached one asset at a
/// time and a viewport refit is requested. Only an unrecognized input or an
/// invalid snapshot fail the call.
pub fn restore<D: LiveDocument + ?Sized>(
    document: &mut D,
    kind: FormatKind,
    refit: &RefitOptions,
) -> Result<ImportOutcome, ImportFailed> {
    let mut warnings = Vec::new();

    let (snapshot, assets) = match kind {
        FormatKind::Unrecognized(reason) => return Err(ImportFailed::UnrecognizedFormat(reason)),
        FormatKind::LegacyRawSnapshot(snapshot) => (snapshot, BTreeMap::new()),
        FormatKind::VersionedContainer(raw) => {
            log::debug!(
                "Importing container version {} exported at {}",
                raw.version.as_deref().unwrap_or("?"),
                raw.exported_at.as_deref().unwrap_or("?")
            );
            let assets = parse_assets(raw.assets, &mut warnings);
            (raw.snapshot, assets)
        }
    };

    let snapshot = DocumentSnapshot::from_value(snapshot)?;
    let records = snapshot.store.len();
    // Assets that will still point outside the artifact unless a payload arrives.
    let external: Vec<(AssetId, String)> = snapshot
        .assets()
        .filter(|asset| asset.is_embeddable())
        .filter_map(|asset| match &asset.props.src {
            Some(AssetSource::External(reference)) => {
                Some((asset.id.clone(), reference.to_string()))
            }
            _ => None,
        })
        .collect();

    document.replace_graph(snapshot)?;

    let mut restored_assets = 0;
    for (id, payload) in assets {
        match restore_into(document, &id, payload) {
            Ok(()) => restored_assets += 1,
            Err(e) => {
                log::warn!("Failed to restore asset: {}", e);
                warnings.push(e.into());
            }
        }
    }

    for (asset_id, source) in external {
        let embedded = document
            .get_asset_record(&asset_id)
            .is_some_and(|record| record.is_embedded());
        if !embedded {
            log::warn!("Asset {} was not embedded; it still points at {}", asset_id, source);
            warnings.push(PortWarning::AssetNotEmbedded { asset_id, source });
        }
    }

    if let Err(e) = document.request_viewport_refit(refit) {
        log::warn!("Viewport refit failed: {}", e);
        warnings.push(PortWarning::RefitFailed { reason: e.to_string() });
    }

    log::info!(
        "Imported {} records, {} assets restored, {} warnings",
        records,
        restored_assets,
        warnings.len()
    );
    Ok(ImportOutcome {
        records,
        restored_assets,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Whiteboard;
    use crate::format::classify;
    use crate::model::{AssetKind, AssetRecord, AssetRef, ShapeRecord};
    use serde_json::json;

    const GIF: &[u8] = b"GIF89a\x01\x00\x01\x00";

    fn board_with_asset(src: AssetSource) -> Whiteboard {
        let mut board = Whiteboard::new();
        let page = board.current_page.clone();
        let asset = board.add_asset(AssetRecord::image("asset:dot", "dot.gif", src, 1.0, 1.0));
        board.add_shape(ShapeRecord::image(&page, &asset, 10.0, 10.0, 1.0, 1.0));
        board
    }

    fn container(board: &Whiteboard, assets: Value) -> Vec<u8> {
        json!({
            "version": "1.0",
            "snapshot": board.capture_graph(),
            "assets": assets,
            "exportedAt": "2026-01-01T00:00:00.000Z",
        })
        .to_string()
        .into_bytes()
    }

    #[test]
    fn test_restores_payloads() {
        let source = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let payload = EmbeddedPayload::from_bytes("image/gif", GIF);
        let bytes = container(&source, json!({ "asset:dot": payload.as_str() }));

        let mut target = Whiteboard::new();
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert!(outcome.is_clean(), "{:?}", outcome.warnings);
        assert_eq!(outcome.restored_assets, 1);
        assert_eq!(outcome.records, source.len());

        let asset = target.get_asset_record("asset:dot").unwrap();
        assert_eq!(asset.props.src, Some(AssetSource::Embedded(payload)));
        assert!(target.pending_refit().is_some());
    }

    #[test]
    fn test_unknown_asset_is_warning() {
        let source = board_with_asset(AssetSource::Embedded(EmbeddedPayload::from_bytes("image/gif", GIF)));
        let bytes = container(&source, json!({ "asset:ghost": "data:image/gif;base64,R0lG" }));

        let mut target = Whiteboard::new();
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert_eq!(
            outcome.warnings,
            vec![PortWarning::AssetNotFound { asset_id: "asset:ghost".to_string() }]
        );
        assert_eq!(outcome.restored_assets, 0);
    }

    #[test]
    fn test_missing_payload_is_warning() {
        let source = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let bytes = container(&source, json!({}));

        let mut target = Whiteboard::new();
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert_eq!(outcome.warnings.len(), 1);
        assert!(matches!(
            &outcome.warnings[0],
            PortWarning::AssetNotEmbedded { asset_id, source } if asset_id == "asset:dot" && source == "https://x/dot.gif"
        ));
    }

    #[test]
    fn test_payload_for_bookmark_is_skipped() {
        let mut source = Whiteboard::new();
        let mut bookmark = AssetRecord::image(
            "asset:link",
            "link",
            AssetSource::External(AssetRef::new("https://site.test/")),
            0.0,
            0.0,
        );
        bookmark.kind = AssetKind::Bookmark;
        source.add_asset(bookmark);
        let payload = EmbeddedPayload::from_bytes("image/gif", GIF);
        let bytes = container(&source, json!({ "asset:link": payload.as_str() }));

        let mut target = Whiteboard::new();
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert_eq!(outcome.restored_assets, 0);
        assert_eq!(
            outcome.warnings,
            vec![PortWarning::AssetNotEmbeddable {
                asset_id: "asset:link".to_string(),
                kind: "bookmark".to_string(),
            }]
        );
        let kept = target.get_asset_record("asset:link").unwrap();
        assert_eq!(kept.props.src.unwrap().as_str(), "https://site.test/");
    }

    #[test]
    fn test_bad_asset_map_entries() {
        let source = board_with_asset(AssetSource::Embedded(EmbeddedPayload::from_bytes("image/gif", GIF)));

        let bytes = container(&source, json!({ "asset:dot": 42, "asset:x": "https://x/y.png" }));
        let mut target = Whiteboard::new();
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert_eq!(outcome.warnings.len(), 2);
        assert!(outcome
            .warnings
            .iter()
            .all(|w| matches!(w, PortWarning::InvalidPayload { .. })));

        let bytes = container(&source, json!(["nope"]));
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert!(matches!(outcome.warnings[..], [PortWarning::MalformedAssetMap { .. }]));
    }

    #[test]
    fn test_unrecognized_leaves_document() {
        let mut target = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let before = target.to_json().unwrap();

        let result = restore(&mut target, classify(b"\x89PNG not json"), &RefitOptions::default());
        assert!(matches!(result, Err(ImportFailed::UnrecognizedFormat(UnrecognizedReason::Parse(_)))));
        assert_eq!(target.to_json().unwrap(), before);
    }

    #[test]
    fn test_non_object_snapshot_is_unrecognized() {
        let mut target = Whiteboard::new();
        let before = target.to_json().unwrap();

        for input in [json!({ "snapshot": 42 }), json!({ "snapshot": null, "assets": {} })] {
            let result = restore(&mut target, classify(input.to_string().as_bytes()), &RefitOptions::default());
            assert_eq!(
                result,
                Err(ImportFailed::UnrecognizedFormat(UnrecognizedReason::MissingFields))
            );
        }
        assert_eq!(target.to_json().unwrap(), before);
    }

    #[test]
    fn test_invalid_snapshot_leaves_document() {
        let mut target = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let before = target.to_json().unwrap();

        let bytes = json!({
            "version": "1.0",
            "snapshot": { "store": { "shape:1": { "typeName": "shape" } }, "schema": { "schemaVersion": 2 } },
            "assets": {},
        })
        .to_string();
        let result = restore(&mut target, classify(bytes.as_bytes()), &RefitOptions::default());
        assert!(matches!(result, Err(ImportFailed::SnapshotInvalid(SnapshotError::Decode(_)))));
        assert_eq!(target.to_json().unwrap(), before);
    }

    #[test]
    fn test_inspect() {
        let source = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let payload = EmbeddedPayload::from_bytes("image/gif", GIF);
        let bytes = container(&source, json!({ "asset:dot": payload.as_str() }));

        let inspection = inspect(classify(&bytes)).unwrap();
        assert_eq!(inspection.format, "versioned container");
        assert_eq!(inspection.version.as_deref(), Some("1.0"));
        assert_eq!(inspection.counts.shapes, 1);
        assert_eq!(inspection.counts.assets, 1);
        assert_eq!(inspection.payloads, 1);
        assert_eq!(inspection.payload_bytes, GIF.len());

        assert!(matches!(inspect(classify(b"nope")), Err(ImportFailed::UnrecognizedFormat(_))));
    }

    /// Document that refuses every graph replacement.
    struct ReadOnlyDocument(Whiteboard);

    impl LiveDocument for ReadOnlyDocument {
        fn capture_graph(&self) -> DocumentSnapshot {
            self.0.capture_graph()
        }

        fn replace_graph(&mut self, _snapshot: DocumentSnapshot) -> Result<(), SnapshotError> {
            Err(SnapshotError::Decode("document is read-only".to_string()))
        }

        fn get_asset_record(&self, id: &str) -> Option<crate::model::AssetRecord> {
            self.0.get_asset_record(id)
        }

        fn update_asset_record(&mut self, _record: crate::model::AssetRecord) -> Result<(), crate::assets::AssetError> {
            panic!("Assets must not be touched after a failed replace");
        }

        fn request_viewport_refit(&mut self, _options: &RefitOptions) -> Result<(), crate::document::RefitError> {
            panic!("Refit must not be requested after a failed replace");
        }
    }

    #[test]
    fn test_rejected_replace_stops_import() {
        let source = board_with_asset(AssetSource::External(AssetRef::new("https://x/dot.gif")));
        let payload = EmbeddedPayload::from_bytes("image/gif", GIF);
        let bytes = container(&source, json!({ "asset:dot": payload.as_str() }));

        let mut target = ReadOnlyDocument(Whiteboard::new());
        let before = target.capture_graph();
        let result = restore(&mut target, classify(&bytes), &RefitOptions::default());
        assert!(matches!(result, Err(ImportFailed::SnapshotInvalid(_))));
        assert_eq!(target.capture_graph(), before);
    }

    #[test]
    fn test_refit_failure_is_warning() {
        let source = board_with_asset(AssetSource::Embedded(EmbeddedPayload::from_bytes("image/gif", GIF)));
        let bytes = serde_json::to_vec(&source.capture_graph()).unwrap();

        let mut target = Whiteboard::new();
        target.set_viewport_size(0.0, 0.0);
        let outcome = restore(&mut target, classify(&bytes), &RefitOptions::default()).unwrap();
        assert!(matches!(outcome.warnings[..], [PortWarning::RefitFailed { .. }]));
        assert_eq!(target.capture_graph(), source.capture_graph());
    }
}
