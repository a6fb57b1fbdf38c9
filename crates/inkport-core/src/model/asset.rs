//! Asset records and their sources.
//!
//! An asset's `src` is either an [`AssetRef`] pointing outside the document
//! (http(s), `file:` or `blob:` URL) or an [`EmbeddedPayload`], a `data:` URL
//! that carries the bytes inline. Both serialize as a plain string.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use thiserror::Error;
use url::Url;

/// Identifier of an asset record (`asset:...`).
pub type AssetId = String;

/// Errors produced when a string is not a usable asset source.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("Not a data URL: {0}")]
    NotDataUrl(String),
    #[error("Data URL has no ',' separator")]
    MissingSeparator,
    #[error("Invalid base64 body: {0}")]
    InvalidBase64(String),
    #[error("Empty asset source")]
    Empty,
}

/// Self-contained `data:` URL holding an asset's bytes.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EmbeddedPayload(String);

impl EmbeddedPayload {
    pub const PREFIX: &'static str = "data:";

    /// Validate and wrap a `data:` URL.
    pub fn parse(value: impl Into<String>) -> Result<Self, PayloadError> {
        let value = value.into();
        if !Self::looks_embedded(&value) {
            let preview: String = value.chars().take(32).collect();
            return Err(PayloadError::NotDataUrl(preview));
        }
        let (header, body) = value[Self::PREFIX.len()..]
            .split_once(',')
            .ok_or(PayloadError::MissingSeparator)?;
        if header.ends_with(";base64") {
            STANDARD
                .decode(body)
                .map_err(|e| PayloadError::InvalidBase64(e.to_string()))?;
        }
        Ok(Self(value))
    }

    /// Encode raw bytes as a base64 `data:` URL.
    pub fn from_bytes(mime_type: &str, data: &[u8]) -> Self {
        Self(format!("data:{};base64,{}", mime_type, STANDARD.encode(data)))
    }

    /// Whether a source string is already embedded.
    pub fn looks_embedded(value: &str) -> bool {
        value
            .get(..Self::PREFIX.len())
            .is_some_and(|p| p.eq_ignore_ascii_case(Self::PREFIX))
    }

    fn header(&self) -> &str {
        let rest = &self.0[Self::PREFIX.len()..];
        rest.split_once(',').map(|(h, _)| h).unwrap_or(rest)
    }

    fn body(&self) -> &str {
        self.0.split_once(',').map(|(_, b)| b).unwrap_or("")
    }

    /// MIME type declared in the header (`text/plain` when omitted).
    pub fn mime_type(&self) -> &str {
        match self.header().split(';').next() {
            Some(mime) if !mime.is_empty() => mime,
            _ => "text/plain",
        }
    }

    /// Whether the body is base64 rather than percent-encoded.
    pub fn is_base64(&self) -> bool {
        self.header().ends_with(";base64")
    }

    /// Decode the bytes of a base64 payload.
    ///
    /// Returns `None` for percent-encoded payloads.
    pub fn decode(&self) -> Option<Vec<u8>> {
        if !self.is_base64() {
            return None;
        }
        STANDARD.decode(self.body()).ok()
    }

    /// Approximate size of the decoded content in bytes.
    pub fn decoded_len(&self) -> usize {
        let body = self.body();
        if self.is_base64() {
            let padding = body.bytes().rev().take_while(|&b| b == b'=').count();
            ((body.len() / 4) * 3).saturating_sub(padding.min(2))
        } else {
            body.len()
        }
    }

    /// Get the full data URL.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EmbeddedPayload {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<EmbeddedPayload> for String {
    fn from(payload: EmbeddedPayload) -> Self {
        payload.0
    }
}

impl fmt::Display for EmbeddedPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let preview: String = self.0.chars().take(48).collect();
        write!(f, "{}... ({} bytes)", preview, self.decoded_len())
    }
}

/// Reference to asset content living outside the document.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetRef(String);

impl AssetRef {
    /// Create a reference from a URL, blob handle or relative path.
    pub fn new(reference: impl Into<String>) -> Self {
        Self(reference.into())
    }

    /// Get the reference as written.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve to an absolute URL, joining relative references onto `base`.
    pub fn to_url(&self, base: Option<&Url>) -> Result<Url, url::ParseError> {
        match Url::parse(&self.0) {
            Ok(url) => Ok(url),
            Err(url::ParseError::RelativeUrlWithoutBase) => match base {
                Some(base) => base.join(&self.0),
                None => Err(url::ParseError::RelativeUrlWithoutBase),
            },
            Err(e) => Err(e),
        }
    }
}

impl fmt::Display for AssetRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where an asset's content comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetSource {
    /// Bytes are carried inline.
    Embedded(EmbeddedPayload),
    /// Bytes must be fetched.
    External(AssetRef),
}

impl AssetSource {
    /// Whether the bytes are already inline.
    pub fn is_embedded(&self) -> bool {
        matches!(self, AssetSource::Embedded(_))
    }

    /// Get the source as it appears in `props.src`.
    pub fn as_str(&self) -> &str {
        match self {
            AssetSource::Embedded(payload) => payload.as_str(),
            AssetSource::External(reference) => reference.as_str(),
        }
    }
}

impl TryFrom<String> for AssetSource {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.is_empty() {
            Err(PayloadError::Empty)
        } else if EmbeddedPayload::looks_embedded(&value) {
            EmbeddedPayload::parse(value).map(AssetSource::Embedded)
        } else {
            Ok(AssetSource::External(AssetRef(value)))
        }
    }
}

impl From<AssetSource> for String {
    fn from(source: AssetSource) -> Self {
        match source {
            AssetSource::Embedded(payload) => payload.into(),
            AssetSource::External(reference) => reference.0,
        }
    }
}

impl From<EmbeddedPayload> for AssetSource {
    fn from(payload: EmbeddedPayload) -> Self {
        AssetSource::Embedded(payload)
    }
}

/// Empty strings and nulls both mean "no source".
fn deserialize_src<'de, D>(deserializer: D) -> Result<Option<AssetSource>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => AssetSource::try_from(s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

/// Kind of asset. Unknown kinds are carried by name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AssetKind {
    Image,
    Video,
    Bookmark,
    Other(String),
}

impl AssetKind {
    /// Wire name of the kind.
    pub fn as_str(&self) -> &str {
        match self {
            AssetKind::Image => "image",
            AssetKind::Video => "video",
            AssetKind::Bookmark => "bookmark",
            AssetKind::Other(name) => name,
        }
    }

    /// Kinds whose `src` carries binary content worth embedding.
    pub fn is_embeddable(&self) -> bool {
        matches!(self, AssetKind::Image | AssetKind::Video)
    }
}

impl From<String> for AssetKind {
    fn from(name: String) -> Self {
        match name.as_str() {
            "image" => AssetKind::Image,
            "video" => AssetKind::Video,
            "bookmark" => AssetKind::Bookmark,
            _ => AssetKind::Other(name),
        }
    }
}

impl From<AssetKind> for String {
    fn from(kind: AssetKind) -> Self {
        match kind {
            AssetKind::Other(name) => name,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Asset properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetProps {
    #[serde(default)]
    pub name: String,
    #[serde(default, deserialize_with = "deserialize_src")]
    pub src: Option<AssetSource>,
    #[serde(default)]
    pub w: f64,
    #[serde(default)]
    pub h: f64,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub is_animated: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// An asset record in the document store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    pub id: AssetId,
    #[serde(rename = "type")]
    pub kind: AssetKind,
    pub props: AssetProps,
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl AssetRecord {
    /// Create an image asset pointing at `src`.
    pub fn image(id: impl Into<AssetId>, name: &str, src: AssetSource, w: f64, h: f64) -> Self {
        let mime_type = match &src {
            AssetSource::Embedded(payload) => Some(payload.mime_type().to_string()),
            AssetSource::External(reference) => super::MediaType::from_path(reference.as_str())
                .map(|m| m.mime_type().to_string()),
        };
        Self {
            id: id.into(),
            kind: AssetKind::Image,
            props: AssetProps {
                name: name.to_string(),
                src: Some(src),
                w,
                h,
                mime_type,
                is_animated: false,
                extra: Map::new(),
            },
            meta: Map::new(),
            extra: Map::new(),
        }
    }

    /// Whether this record has content that export should embed.
    pub fn is_embeddable(&self) -> bool {
        self.kind.is_embeddable() && self.props.src.is_some()
    }

    /// Whether the content is already carried inline.
    pub fn is_embedded(&self) -> bool {
        self.props.src.as_ref().is_some_and(AssetSource::is_embedded)
    }
}
