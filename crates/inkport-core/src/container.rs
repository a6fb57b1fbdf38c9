//! Versioned export container.
//!
//! ```text
//! {
//!   "version": "1.0",
//!   "snapshot": { "store": { ... }, "schema": { ... } },
//!   "assets": { "<asset id>": "data:<mime>;base64,..." },
//!   "exportedAt": "2026-01-02T03:04:05.678Z"
//! }
//! ```

use crate::model::{AssetId, EmbeddedPayload};
use crate::snapshot::DocumentSnapshot;
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A snapshot bundled with the payloads of its resolvable assets.
///
/// Built once per export and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportContainer {
    version: String,
    snapshot: DocumentSnapshot,
    assets: BTreeMap<AssetId, EmbeddedPayload>,
    #[serde(with = "iso_millis")]
    exported_at: DateTime<Utc>,
}

impl ExportContainer {
    /// Format version the container was written with.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Get the captured snapshot.
    pub fn snapshot(&self) -> &DocumentSnapshot {
        &self.snapshot
    }

    /// Get the payloads keyed by asset id.
    pub fn assets(&self) -> &BTreeMap<AssetId, EmbeddedPayload> {
        &self.assets
    }

    /// When the container was built.
    pub fn exported_at(&self) -> DateTime<Utc> {
        self.exported_at
    }

    /// Asset ids of the snapshot that have no payload in this container.
    pub fn missing_assets(&self) -> Vec<AssetId> {
        self.snapshot
            .assets()
            .filter(|a| a.is_embeddable() && !self.assets.contains_key(&a.id))
            .map(|a| a.id.clone())
            .collect()
    }

    /// Total decoded size of the embedded payloads.
    pub fn embedded_bytes(&self) -> usize {
        self.assets.values().map(EmbeddedPayload::decoded_len).sum()
    }
}

/// Combine a snapshot with its resolved payloads.
///
/// Only payloads for asset records present in `snapshot` are kept. Assets whose
/// resolution failed are simply absent; their records stay in the snapshot.
pub fn build(
    snapshot: DocumentSnapshot,
    resolved: BTreeMap<AssetId, EmbeddedPayload>,
    timestamp: DateTime<Utc>,
    version: &str,
) -> ExportContainer {
    let assets = resolved
        .into_iter()
        .filter(|(id, _)| {
            let known = snapshot.asset(id).is_some();
            if !known {
                log::debug!("Dropping payload for unknown asset {}", id);
            }
            known
        })
        .collect();

    ExportContainer {
        version: version.to_string(),
        snapshot,
        assets,
        exported_at: timestamp,
    }
}

/// Render a container as pretty-printed UTF-8 JSON with sorted keys.
pub fn encode(container: &ExportContainer) -> Result<Vec<u8>, serde_json::Error> {
    serde_json::to_vec_pretty(container)
}

/// `<prefix>-<YYYY-MM-DD>.<ext>`
pub fn export_file_name(prefix: &str, timestamp: DateTime<Utc>, extension: &str) -> String {
    format!("{}-{}.{}", prefix, timestamp.format("%Y-%m-%d"), extension)
}

mod iso_millis {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::Millis, true))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        DateTime::parse_from_rfc3339(&raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetRecord, AssetRef, AssetSource, PageRecord, Record};
    use crate::snapshot::SchemaDescriptor;
    use chrono::TimeZone;

    fn timestamp() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 4, 5, 6, 7).unwrap()
    }

    fn snapshot() -> DocumentSnapshot {
        let records: Vec<Record> = vec![
            PageRecord::new("Page 1", "a1").into(),
            AssetRecord::image("asset:a", "a", AssetSource::External(AssetRef::new("https://x/a.png")), 1.0, 1.0).into(),
            AssetRecord::image("asset:b", "b", AssetSource::External(AssetRef::new("https://x/b.png")), 1.0, 1.0).into(),
        ];
        DocumentSnapshot::from_records(SchemaDescriptor::default(), records)
    }

    fn payload() -> EmbeddedPayload {
        EmbeddedPayload::from_bytes("image/png", &[1, 2, 3])
    }

    #[test]
    fn test_build_omits_failed_and_unknown() {
        let mut resolved = BTreeMap::new();
        resolved.insert("asset:a".to_string(), payload());
        resolved.insert("asset:stray".to_string(), payload());

        let container = build(snapshot(), resolved, timestamp(), "1.0");
        assert_eq!(container.assets().len(), 1);
        assert!(container.assets().contains_key("asset:a"));
        assert_eq!(container.missing_assets(), vec!["asset:b".to_string()]);
        assert!(container.snapshot().asset("asset:b").is_some());
        assert_eq!(container.embedded_bytes(), 3);
    }

    #[test]
    fn test_encode_shape() {
        let mut resolved = BTreeMap::new();
        resolved.insert("asset:a".to_string(), payload());
        let container = build(snapshot(), resolved, timestamp(), "1.0");

        let bytes = encode(&container).unwrap();
        let json: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(json["version"], "1.0");
        assert_eq!(json["exportedAt"], "2026-03-04T05:06:07.000Z");
        assert_eq!(json["assets"]["asset:a"], payload().as_str());
        assert!(json["snapshot"]["store"].is_object());
        assert_eq!(json["snapshot"]["schema"]["schemaVersion"], 2);

        let decoded: ExportContainer = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(decoded, container);
    }

    #[test]
    fn test_encode_is_deterministic() {
        let snap = snapshot();
        let mut resolved = BTreeMap::new();
        resolved.insert("asset:b".to_string(), payload());
        resolved.insert("asset:a".to_string(), payload());

        let first = encode(&build(snap.clone(), resolved.clone(), timestamp(), "1.0")).unwrap();
        let second = encode(&build(snap, resolved, timestamp(), "1.0")).unwrap();
        assert_eq!(first, second);
        assert!(std::str::from_utf8(&first).is_ok());
    }

    #[test]
    fn test_file_name() {
        assert_eq!(
            export_file_name("inkport-export", timestamp(), "json"),
            "inkport-export-2026-03-04.json"
        );
    }
}
