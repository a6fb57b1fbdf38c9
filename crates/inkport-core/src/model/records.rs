//! Record types stored in a document graph.

use super::asset::{AssetId, AssetRecord};
use kurbo::Rect;
use serde::de::{self, DeserializeOwned};
use serde::ser;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Identifier of any record; always prefixed with its type (`page:`, `shape:`...).
pub type RecordId = String;

/// Id of the singleton document record.
pub const DOCUMENT_RECORD_ID: &str = "document:document";

/// Generate a fresh id with the given type prefix.
pub fn new_record_id(prefix: &str) -> RecordId {
    format!("{}:{}", prefix, Uuid::new_v4())
}

/// Document-level settings record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: RecordId,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A page of the whiteboard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageRecord {
    pub id: RecordId,
    pub name: String,
    /// Fractional ordering key among pages.
    pub index: String,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl PageRecord {
    /// Create a page with a fresh id.
    pub fn new(name: &str, index: &str) -> Self {
        Self {
            id: new_record_id("page"),
            name: name.to_string(),
            index: index.to_string(),
            meta: Map::new(),
            extra: Map::new(),
        }
    }
}

fn default_opacity() -> f64 {
    1.0
}

/// A shape on a page, or nested inside another shape.
///
/// Shape-specific properties stay opaque; only `w`, `h` and `assetId` are read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    /// Page or parent shape.
    pub parent_id: RecordId,
    pub index: String,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub rotation: f64,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    #[serde(default)]
    pub is_locked: bool,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ShapeRecord {
    /// Create a shape of `kind` at a position on `parent_id`.
    pub fn new(kind: &str, parent_id: &str, x: f64, y: f64) -> Self {
        Self {
            id: new_record_id("shape"),
            kind: kind.to_string(),
            parent_id: parent_id.to_string(),
            index: "a1".to_string(),
            x,
            y,
            rotation: 0.0,
            opacity: 1.0,
            is_locked: false,
            props: Map::new(),
            meta: Map::new(),
            extra: Map::new(),
        }
    }

    /// Create an image shape displaying `asset_id`.
    pub fn image(parent_id: &str, asset_id: &str, x: f64, y: f64, w: f64, h: f64) -> Self {
        Self::new("image", parent_id, x, y)
            .with_size(w, h)
            .with_prop("assetId", Value::from(asset_id))
    }

    /// Set `props.w` and `props.h`.
    pub fn with_size(self, w: f64, h: f64) -> Self {
        self.with_prop("w", Value::from(w)).with_prop("h", Value::from(h))
    }

    /// Set one entry of `props`.
    pub fn with_prop(mut self, key: &str, value: Value) -> Self {
        self.props.insert(key.to_string(), value);
        self
    }

    /// Asset displayed by this shape, if any.
    pub fn asset_id(&self) -> Option<&str> {
        self.props.get("assetId").and_then(Value::as_str)
    }

    /// Axis-aligned bounds in parent space, when the shape declares a size.
    pub fn bounds(&self) -> Option<Rect> {
        let w = self.props.get("w").and_then(Value::as_f64)?;
        let h = self.props.get("h").and_then(Value::as_f64)?;
        Some(Rect::new(self.x, self.y, self.x + w, self.y + h))
    }
}

/// A relation between two shapes (arrow endpoints and the like).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BindingRecord {
    pub id: RecordId,
    #[serde(rename = "type")]
    pub kind: String,
    pub from_id: RecordId,
    pub to_id: RecordId,
    #[serde(default)]
    pub props: Map<String, Value>,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BindingRecord {
    /// Create a binding from one shape to another.
    pub fn new(kind: &str, from_id: &str, to_id: &str) -> Self {
        Self {
            id: new_record_id("binding"),
            kind: kind.to_string(),
            from_id: from_id.to_string(),
            to_id: to_id.to_string(),
            props: Map::new(),
            meta: Map::new(),
            extra: Map::new(),
        }
    }
}

/// A record of a type this crate does not model (`camera`, `instance`,
/// `pointer`...). Kept verbatim so it survives an import/export cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct OtherRecord {
    pub id: RecordId,
    /// Value of the `typeName` tag.
    pub type_name: String,
    /// Every other field, as found.
    pub fields: Map<String, Value>,
}

/// Any record of the document graph, tagged by `typeName` on the wire.
#[derive(Debug, Clone, PartialEq)]
pub enum Record {
    Document(DocumentRecord),
    Page(PageRecord),
    Shape(ShapeRecord),
    Binding(BindingRecord),
    Asset(AssetRecord),
    Other(OtherRecord),
}

const TYPE_TAG: &str = "typeName";

impl Serialize for Record {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let body = match self {
            Record::Document(r) => serde_json::to_value(r),
            Record::Page(r) => serde_json::to_value(r),
            Record::Shape(r) => serde_json::to_value(r),
            Record::Binding(r) => serde_json::to_value(r),
            Record::Asset(r) => serde_json::to_value(r),
            Record::Other(r) => {
                let mut fields = r.fields.clone();
                fields.insert("id".to_string(), Value::from(r.id.as_str()));
                Ok(Value::Object(fields))
            }
        };
        let mut fields = match body.map_err(<S::Error as ser::Error>::custom)? {
            Value::Object(fields) => fields,
            _ => return Err(ser::Error::custom("record did not serialize to an object")),
        };
        fields.insert(TYPE_TAG.to_string(), Value::from(self.type_name()));
        fields.serialize(serializer)
    }
}

fn from_fields<T: DeserializeOwned, E: de::Error>(fields: Map<String, Value>) -> Result<T, E> {
    serde_json::from_value(Value::Object(fields)).map_err(E::custom)
}

impl<'de> Deserialize<'de> for Record {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let mut fields = Map::<String, Value>::deserialize(deserializer)?;
        let type_name = match fields.remove(TYPE_TAG) {
            Some(Value::String(type_name)) => type_name,
            Some(_) => return Err(de::Error::custom("typeName must be a string")),
            None => return Err(de::Error::missing_field(TYPE_TAG)),
        };

        match type_name.as_str() {
            "document" => from_fields(fields).map(Record::Document),
            "page" => from_fields(fields).map(Record::Page),
            "shape" => from_fields(fields).map(Record::Shape),
            "binding" => from_fields(fields).map(Record::Binding),
            "asset" => from_fields(fields).map(Record::Asset),
            _ => {
                let id = match fields.remove("id") {
                    Some(Value::String(id)) => id,
                    _ => return Err(de::Error::missing_field("id")),
                };
                Ok(Record::Other(OtherRecord {
                    id,
                    type_name,
                    fields,
                }))
            }
        }
    }
}

impl Record {
    /// Get the record id.
    pub fn id(&self) -> &str {
        match self {
            Record::Document(r) => &r.id,
            Record::Page(r) => &r.id,
            Record::Shape(r) => &r.id,
            Record::Binding(r) => &r.id,
            Record::Asset(r) => &r.id,
            Record::Other(r) => &r.id,
        }
    }

    /// Value of the `typeName` tag.
    pub fn type_name(&self) -> &str {
        match self {
            Record::Document(_) => "document",
            Record::Page(_) => "page",
            Record::Shape(_) => "shape",
            Record::Binding(_) => "binding",
            Record::Asset(_) => "asset",
            Record::Other(r) => &r.type_name,
        }
    }

    /// Whether the id carries the prefix matching the record type.
    pub fn has_valid_prefix(&self) -> bool {
        self.id()
            .strip_prefix(self.type_name())
            .is_some_and(|rest| rest.len() > 1 && rest.starts_with(':'))
    }

    /// Get the asset, if this is one.
    pub fn as_asset(&self) -> Option<&AssetRecord> {
        match self {
            Record::Asset(asset) => Some(asset),
            _ => None,
        }
    }

    /// Get the shape, if this is one.
    pub fn as_shape(&self) -> Option<&ShapeRecord> {
        match self {
            Record::Shape(shape) => Some(shape),
            _ => None,
        }
    }

    /// Get the page, if this is one.
    pub fn as_page(&self) -> Option<&PageRecord> {
        match self {
            Record::Page(page) => Some(page),
            _ => None,
        }
    }

    /// Get the binding, if this is one.
    pub fn as_binding(&self) -> Option<&BindingRecord> {
        match self {
            Record::Binding(binding) => Some(binding),
            _ => None,
        }
    }

    /// Asset referenced by this record, for shapes that display one.
    pub fn referenced_asset(&self) -> Option<AssetId> {
        self.as_shape()
            .and_then(ShapeRecord::asset_id)
            .map(str::to_string)
    }
}

impl From<AssetRecord> for Record {
    fn from(record: AssetRecord) -> Self {
        Record::Asset(record)
    }
}

impl From<ShapeRecord> for Record {
    fn from(record: ShapeRecord) -> Self {
        Record::Shape(record)
    }
}

impl From<PageRecord> for Record {
    fn from(record: PageRecord) -> Self {
        Record::Page(record)
    }
}

impl From<BindingRecord> for Record {
    fn from(record: BindingRecord) -> Self {
        Record::Binding(record)
    }
}

impl From<OtherRecord> for Record {
    fn from(record: OtherRecord) -> Self {
        Record::Other(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AssetKind;

    #[test]
    fn test_record_tagging() {
        let shape = ShapeRecord::new("geo", "page:one", 10.0, 20.0).with_size(30.0, 40.0);
        let record = Record::from(shape.clone());
        let json = serde_json::to_value(&record).unwrap();

        assert_eq!(json["typeName"], "shape");
        assert_eq!(json["type"], "geo");
        assert_eq!(json["parentId"], "page:one");
        assert!(json.get("extra").is_none());

        let back: Record = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn test_unknown_fields_survive() {
        let json = r#"{
            "typeName": "page",
            "id": "page:abc",
            "name": "Page 1",
            "index": "a1",
            "meta": {},
            "customFlag": true
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        let page = record.as_page().unwrap();
        assert_eq!(page.extra.get("customFlag"), Some(&Value::Bool(true)));
        assert!(!page.extra.contains_key("typeName"));

        let again = serde_json::to_value(&record).unwrap();
        assert_eq!(again["customFlag"], true);
    }

    #[test]
    fn test_asset_variant() {
        let json = r#"{
            "typeName": "asset",
            "id": "asset:1",
            "type": "video",
            "props": { "src": null },
            "meta": {}
        }"#;
        let record: Record = serde_json::from_str(json).unwrap();
        assert_eq!(record.as_asset().unwrap().kind, AssetKind::Video);
        assert!(record.has_valid_prefix());
    }

    #[test]
    fn test_unmodelled_records_survive() {
        let json = serde_json::json!({
            "typeName": "camera",
            "id": "camera:page:page",
            "x": 12.5,
            "y": -4,
            "z": 1,
            "meta": {}
        });
        let record: Record = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(record.type_name(), "camera");
        assert_eq!(record.id(), "camera:page:page");
        assert!(record.has_valid_prefix());
        let Record::Other(other) = &record else {
            panic!("Expected an unmodelled record");
        };
        assert_eq!(other.fields.get("x"), Some(&Value::from(12.5)));
        assert!(!other.fields.contains_key("id"));

        assert_eq!(serde_json::to_value(&record).unwrap(), json);
    }

    #[test]
    fn test_record_needs_tag_and_id() {
        let untagged = serde_json::json!({ "id": "page:x", "name": "P", "index": "a1" });
        assert!(serde_json::from_value::<Record>(untagged).is_err());

        let anonymous = serde_json::json!({ "typeName": "pointer", "x": 0 });
        assert!(serde_json::from_value::<Record>(anonymous).is_err());
    }

    #[test]
    fn test_prefix_check() {
        let mut shape = ShapeRecord::new("geo", "page:one", 0.0, 0.0);
        assert!(Record::from(shape.clone()).has_valid_prefix());
        shape.id = "page:wrong".to_string();
        assert!(!Record::from(shape.clone()).has_valid_prefix());
        shape.id = "shape:".to_string();
        assert!(!Record::from(shape).has_valid_prefix());
    }

    #[test]
    fn test_image_shape_helpers() {
        let shape = ShapeRecord::image("page:one", "asset:cat", 5.0, 5.0, 100.0, 50.0);
        assert_eq!(shape.asset_id(), Some("asset:cat"));
        let bounds = shape.bounds().unwrap();
        assert!((bounds.x1 - 105.0).abs() < f64::EPSILON);
        assert!((bounds.y1 - 55.0).abs() < f64::EPSILON);
        assert_eq!(Record::from(shape).referenced_asset().as_deref(), Some("asset:cat"));
    }
}
