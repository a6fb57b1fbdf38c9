//! Structural classification of incoming artifacts.
//!
//! Artifacts written before the versioned envelope existed carry no version
//! field at all, so the decision is driven by which top-level fields are present
//! and never by the `version` string.

use serde_json::{Map, Value};
use std::fmt;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Envelope fields of a versioned container, before the snapshot is decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RawContainer {
    /// Recorded for logging only.
    pub version: Option<String>,
    pub snapshot: Value,
    /// `Value::Null` when the field is absent.
    pub assets: Value,
    pub exported_at: Option<String>,
}

impl RawContainer {
    fn from_object(mut object: Map<String, Value>) -> Self {
        let text = |value: Option<Value>| match value {
            Some(Value::String(s)) => Some(s),
            _ => None,
        };
        Self {
            version: text(object.remove("version")),
            snapshot: object.remove("snapshot").unwrap_or(Value::Null),
            assets: object.remove("assets").unwrap_or(Value::Null),
            exported_at: text(object.remove("exportedAt")),
        }
    }
}

/// Why an input could not be classified.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnrecognizedReason {
    /// Not JSON (or not UTF-8). Carries the parser message.
    Parse(String),
    /// Valid JSON whose top level is not an object.
    NotAnObject,
    /// An object with neither an object `snapshot` nor both `store` and `schema`.
    MissingFields,
}

impl fmt::Display for UnrecognizedReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnrecognizedReason::Parse(message) => write!(f, "not valid JSON: {}", message),
            UnrecognizedReason::NotAnObject => write!(f, "top level is not an object"),
            UnrecognizedReason::MissingFields => {
                write!(f, "neither a container nor a snapshot")
            }
        }
    }
}

/// The known artifact shapes.
#[derive(Debug, Clone, PartialEq)]
pub enum FormatKind {
    VersionedContainer(RawContainer),
    /// A bare snapshot object; assets are inlined in their records.
    LegacyRawSnapshot(Value),
    Unrecognized(UnrecognizedReason),
}

impl FormatKind {
    /// Human-readable name of the shape.
    pub fn name(&self) -> &'static str {
        match self {
            FormatKind::VersionedContainer(_) => "versioned container",
            FormatKind::LegacyRawSnapshot(_) => "legacy snapshot",
            FormatKind::Unrecognized(_) => "unrecognized",
        }
    }

    /// Whether the input can be imported.
    pub fn is_recognized(&self) -> bool {
        !matches!(self, FormatKind::Unrecognized(_))
    }
}

/// Classify raw artifact bytes.
pub fn classify(bytes: &[u8]) -> FormatKind {
    let bytes = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);

    let value: Value = match serde_json::from_slice(bytes) {
        Ok(value) => value,
        Err(e) => {
            log::debug!("Artifact is not JSON: {}", e);
            return FormatKind::Unrecognized(UnrecognizedReason::Parse(e.to_string()));
        }
    };

    let Value::Object(object) = value else {
        return FormatKind::Unrecognized(UnrecognizedReason::NotAnObject);
    };

    let kind = if matches!(object.get("snapshot"), Some(Value::Object(_))) {
        FormatKind::VersionedContainer(RawContainer::from_object(object))
    } else if object.contains_key("store") && object.contains_key("schema") {
        FormatKind::LegacyRawSnapshot(Value::Object(object))
    } else {
        FormatKind::Unrecognized(UnrecognizedReason::MissingFields)
    };
    log::debug!("Classified artifact as {}", kind.name());
    kind
}
