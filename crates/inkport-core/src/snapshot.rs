//! Point-in-time copies of a document graph.

use crate::document::LiveDocument;
use crate::model::{AssetId, AssetRecord, PageRecord, Record, RecordId, ShapeRecord};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Current schema version written by this crate.
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Oldest schema version still accepted.
pub const MIN_SCHEMA_VERSION: u32 = 1;

/// Reasons a snapshot cannot be applied to a document.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SnapshotError {
    #[error("Snapshot could not be decoded: {0}")]
    Decode(String),
    #[error("Unsupported schema version {found} (supported {min}..={max})")]
    UnsupportedSchema { found: u32, min: u32, max: u32 },
    #[error("Store key {key} holds record {id}")]
    KeyMismatch { key: String, id: RecordId },
    #[error("Record {id} does not carry the '{type_name}:' prefix")]
    BadIdPrefix { id: RecordId, type_name: String },
    #[error("Snapshot contains no pages")]
    NoPages,
    #[error("Shape {shape} has missing parent {parent}")]
    DanglingParent { shape: RecordId, parent: RecordId },
    #[error("Binding {binding} points at missing shape {target}")]
    DanglingBinding { binding: RecordId, target: RecordId },
    #[error("Shape {shape} displays missing asset {asset}")]
    MissingAsset { shape: RecordId, asset: AssetId },
}

/// Self-describing schema information carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDescriptor {
    pub schema_version: u32,
    /// Migration sequence per record type.
    #[serde(default)]
    pub sequences: BTreeMap<String, u32>,
}

impl Default for SchemaDescriptor {
    fn default() -> Self {
        let sequences = ["document", "page", "shape", "binding", "asset"]
            .into_iter()
            .map(|name| (format!("com.inkport.{}", name), 1))
            .collect();
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            sequences,
        }
    }
}

/// Record counts, for logging and inspection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecordCounts {
    pub pages: usize,
    pub shapes: usize,
    pub bindings: usize,
    pub assets: usize,
    pub embedded_assets: usize,
    /// Records of types this crate carries without interpreting.
    pub others: usize,
}

/// A complete, immutable copy of a document's records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSnapshot {
    pub store: BTreeMap<RecordId, Record>,
    pub schema: SchemaDescriptor,
}

impl DocumentSnapshot {
    /// Build a snapshot from records, keyed by their ids.
    pub fn from_records(schema: SchemaDescriptor, records: impl IntoIterator<Item = Record>) -> Self {
        let store = records
            .into_iter()
            .map(|record| (record.id().to_string(), record))
            .collect();
        Self { store, schema }
    }

    /// Decode and validate a snapshot from untrusted JSON.
    pub fn from_value(value: Value) -> Result<Self, SnapshotError> {
        let snapshot: Self =
            serde_json::from_value(value).map_err(|e| SnapshotError::Decode(e.to_string()))?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    /// Iterate over every record.
    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.store.values()
    }

    /// Get a record by id.
    pub fn get(&self, id: &str) -> Option<&Record> {
        self.store.get(id)
    }

    /// Iterate over the page records.
    pub fn pages(&self) -> impl Iterator<Item = &PageRecord> {
        self.records().filter_map(Record::as_page)
    }

    /// Iterate over the shape records.
    pub fn shapes(&self) -> impl Iterator<Item = &ShapeRecord> {
        self.records().filter_map(Record::as_shape)
    }

    /// Iterate over the asset records.
    pub fn assets(&self) -> impl Iterator<Item = &AssetRecord> {
        self.records().filter_map(Record::as_asset)
    }

    /// Get an asset record by id.
    pub fn asset(&self, id: &str) -> Option<&AssetRecord> {
        self.store.get(id).and_then(Record::as_asset)
    }

    /// Asset ids displayed by at least one shape.
    pub fn referenced_asset_ids(&self) -> BTreeSet<AssetId> {
        self.records().filter_map(Record::referenced_asset).collect()
    }

    /// Count records by type.
    pub fn counts(&self) -> RecordCounts {
        let mut counts = RecordCounts::default();
        for record in self.records() {
            match record {
                Record::Page(_) => counts.pages += 1,
                Record::Shape(_) => counts.shapes += 1,
                Record::Binding(_) => counts.bindings += 1,
                Record::Asset(asset) => {
                    counts.assets += 1;
                    if asset.is_embedded() {
                        counts.embedded_assets += 1;
                    }
                }
                Record::Other(_) => counts.others += 1,
                Record::Document(_) => {}
            }
        }
        counts
    }

    /// Check that the snapshot is internally consistent.
    pub fn validate(&self) -> Result<(), SnapshotError> {
        let version = self.schema.schema_version;
        if !(MIN_SCHEMA_VERSION..=CURRENT_SCHEMA_VERSION).contains(&version) {
            return Err(SnapshotError::UnsupportedSchema {
                found: version,
                min: MIN_SCHEMA_VERSION,
                max: CURRENT_SCHEMA_VERSION,
            });
        }

        for (key, record) in &self.store {
            if key != record.id() {
                return Err(SnapshotError::KeyMismatch {
                    key: key.clone(),
                    id: record.id().to_string(),
                });
            }
            if !record.has_valid_prefix() {
                return Err(SnapshotError::BadIdPrefix {
                    id: key.clone(),
                    type_name: record.type_name().to_string(),
                });
            }
        }

        if self.pages().next().is_none() {
            return Err(SnapshotError::NoPages);
        }

        for shape in self.shapes() {
            let parent_ok = matches!(
                self.store.get(&shape.parent_id),
                Some(Record::Page(_)) | Some(Record::Shape(_))
            );
            if !parent_ok {
                return Err(SnapshotError::DanglingParent {
                    shape: shape.id.clone(),
                    parent: shape.parent_id.clone(),
                });
            }
            if let Some(asset) = shape.asset_id() {
                if self.asset(asset).is_none() {
                    return Err(SnapshotError::MissingAsset {
                        shape: shape.id.clone(),
                        asset: asset.to_string(),
                    });
                }
            }
        }

        for binding in self.records().filter_map(Record::as_binding) {
            for target in [&binding.from_id, &binding.to_id] {
                if self.store.get(target).and_then(Record::as_shape).is_none() {
                    return Err(SnapshotError::DanglingBinding {
                        binding: binding.id.clone(),
                        target: target.clone(),
                    });
                }
            }
        }

        Ok(())
    }
}

/// Capture every record of a live document.
///
/// The returned snapshot owns its records; later edits to the document do not
/// reach it.
pub fn capture<D: LiveDocument + ?Sized>(document: &D) -> DocumentSnapshot {
    let snapshot = document.capture_graph();
    let counts = snapshot.counts();
    log::debug!(
        "Captured snapshot: {} pages, {} shapes, {} bindings, {} assets",
        counts.pages,
        counts.shapes,
        counts.bindings,
        counts.assets
    );
    snapshot
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssetRecord, AssetSource, AssetRef, BindingRecord};

    fn page() -> PageRecord {
        PageRecord::new("Page 1", "a1")
    }

    fn snapshot_with(records: Vec<Record>) -> DocumentSnapshot {
        DocumentSnapshot::from_records(SchemaDescriptor::default(), records)
    }

    #[test]
    fn test_valid_snapshot() {
        let page = page();
        let asset = AssetRecord::image("asset:cat", "cat.png", AssetSource::External(AssetRef::new("https://x/cat.png")), 10.0, 10.0);
        let a = ShapeRecord::image(&page.id, &asset.id, 0.0, 0.0, 10.0, 10.0);
        let b = ShapeRecord::new("arrow", &page.id, 50.0, 50.0);
        let binding = BindingRecord::new("arrow", &b.id, &a.id);
        let snapshot = snapshot_with(vec![page.into(), asset.into(), a.into(), b.into(), binding.into()]);

        assert_eq!(snapshot.validate(), Ok(()));
        let counts = snapshot.counts();
        assert_eq!(counts.pages, 1);
        assert_eq!(counts.shapes, 2);
        assert_eq!(counts.bindings, 1);
        assert_eq!(counts.assets, 1);
        assert_eq!(counts.embedded_assets, 0);
        assert!(snapshot.referenced_asset_ids().contains("asset:cat"));
    }

    #[test]
    fn test_requires_page() {
        let snapshot = snapshot_with(vec![]);
        assert_eq!(snapshot.validate(), Err(SnapshotError::NoPages));
    }

    #[test]
    fn test_rejects_dangling_parent() {
        let shape = ShapeRecord::new("geo", "page:missing", 0.0, 0.0);
        let snapshot = snapshot_with(vec![page().into(), shape.into()]);
        assert!(matches!(snapshot.validate(), Err(SnapshotError::DanglingParent { .. })));
    }

    #[test]
    fn test_rejects_missing_asset() {
        let page = page();
        let shape = ShapeRecord::image(&page.id, "asset:gone", 0.0, 0.0, 1.0, 1.0);
        let snapshot = snapshot_with(vec![page.into(), shape.into()]);
        assert!(matches!(snapshot.validate(), Err(SnapshotError::MissingAsset { .. })));
    }

    #[test]
    fn test_rejects_dangling_binding() {
        let page = page();
        let shape = ShapeRecord::new("arrow", &page.id, 0.0, 0.0);
        let binding = BindingRecord::new("arrow", &shape.id, "shape:nowhere");
        let snapshot = snapshot_with(vec![page.into(), shape.into(), binding.into()]);
        assert!(matches!(snapshot.validate(), Err(SnapshotError::DanglingBinding { .. })));
    }

    #[test]
    fn test_rejects_key_mismatch() {
        let mut snapshot = snapshot_with(vec![page().into()]);
        let record = snapshot.store.values().next().cloned().unwrap();
        snapshot.store.insert("page:other".to_string(), record);
        assert!(matches!(snapshot.validate(), Err(SnapshotError::KeyMismatch { .. })));
    }

    #[test]
    fn test_rejects_future_schema() {
        let mut snapshot = snapshot_with(vec![page().into()]);
        snapshot.schema.schema_version = CURRENT_SCHEMA_VERSION + 1;
        assert!(matches!(snapshot.validate(), Err(SnapshotError::UnsupportedSchema { .. })));
    }

    #[test]
    fn test_from_value_rejects_garbage() {
        let result = DocumentSnapshot::from_value(serde_json::json!({ "store": 5, "schema": {} }));
        assert!(matches!(result, Err(SnapshotError::Decode(_))));

        let result = DocumentSnapshot::from_value(serde_json::json!({
            "store": { "page:x": { "typeName": "page", "id": "page:x" } },
            "schema": { "schemaVersion": 2 }
        }));
        assert!(matches!(result, Err(SnapshotError::Decode(_))));
    }

    #[test]
    fn test_unmodelled_records_are_carried() {
        let page = page();
        let page_id = page.id.clone();
        let mut snapshot = DocumentSnapshot::from_value(serde_json::json!({
            "store": {
                page_id.clone(): serde_json::to_value(Record::from(page)).unwrap(),
                "camera:page:x": { "typeName": "camera", "id": "camera:page:x", "x": 0, "y": 0, "z": 1 },
                "instance:instance": { "typeName": "instance", "id": "instance:instance", "currentPageId": page_id }
            },
            "schema": { "schemaVersion": 1 }
        }))
        .unwrap();
        assert_eq!(snapshot.counts().others, 2);
        assert_eq!(snapshot.counts().pages, 1);

        // The prefix rule still applies to them.
        let camera = snapshot.store.remove("camera:page:x").unwrap();
        let Record::Other(mut camera) = camera else {
            panic!("Expected an unmodelled record");
        };
        camera.id = "page:y".to_string();
        snapshot.store.insert(camera.id.clone(), camera.into());
        assert_eq!(
            snapshot.validate(),
            Err(SnapshotError::BadIdPrefix {
                id: "page:y".to_string(),
                type_name: "camera".to_string(),
            })
        );
    }
}
