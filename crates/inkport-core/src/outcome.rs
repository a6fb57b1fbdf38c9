//! Results of export and import runs.

use crate::assets::AssetError;
use crate::container::ExportContainer;
use crate::model::AssetId;
use std::fmt;

/// A non-fatal problem met while exporting or importing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortWarning {
    /// An asset could not be fetched or encoded; it was left out of the container.
    AssetUnavailable { asset_id: AssetId, reason: String },
    /// A payload targets an asset record the document does not have.
    AssetNotFound { asset_id: AssetId },
    /// An entry of the container's asset map is not an embedded payload.
    InvalidPayload { asset_id: AssetId, reason: String },
    /// The container's asset map is not an object.
    MalformedAssetMap { reason: String },
    /// A payload targets an asset whose kind does not take one.
    AssetNotEmbeddable { asset_id: AssetId, kind: String },
    /// An imported asset still points outside the artifact.
    AssetNotEmbedded { asset_id: AssetId, source: String },
    /// The viewport could not be refit.
    RefitFailed { reason: String },
}

impl PortWarning {
    /// Asset the warning is about, if any.
    pub fn asset_id(&self) -> Option<&str> {
        match self {
            PortWarning::AssetUnavailable { asset_id, .. }
            | PortWarning::AssetNotFound { asset_id }
            | PortWarning::InvalidPayload { asset_id, .. }
            | PortWarning::AssetNotEmbeddable { asset_id, .. }
            | PortWarning::AssetNotEmbedded { asset_id, .. } => Some(asset_id),
            PortWarning::MalformedAssetMap { .. } | PortWarning::RefitFailed { .. } => None,
        }
    }
}

impl fmt::Display for PortWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortWarning::AssetUnavailable { asset_id, reason } => {
                write!(f, "asset {} unavailable: {}", asset_id, reason)
            }
            PortWarning::AssetNotFound { asset_id } => {
                write!(f, "asset {} not found in document", asset_id)
            }
            PortWarning::InvalidPayload { asset_id, reason } => {
                write!(f, "asset {} has an invalid payload: {}", asset_id, reason)
            }
            PortWarning::MalformedAssetMap { reason } => write!(f, "asset map ignored: {}", reason),
            PortWarning::AssetNotEmbeddable { asset_id, kind } => {
                write!(f, "asset {} is a {} and cannot take a payload", asset_id, kind)
            }
            PortWarning::AssetNotEmbedded { asset_id, source } => {
                write!(f, "asset {} is not embedded and still points at {}", asset_id, source)
            }
            PortWarning::RefitFailed { reason } => write!(f, "viewport refit failed: {}", reason),
        }
    }
}

impl From<AssetError> for PortWarning {
    fn from(error: AssetError) -> Self {
        match error {
            AssetError::Unavailable { id, reason } => PortWarning::AssetUnavailable { asset_id: id, reason },
            AssetError::NotFound(id) => PortWarning::AssetNotFound { asset_id: id },
            AssetError::NotEmbeddable { id, kind } => PortWarning::AssetNotEmbeddable { asset_id: id, kind },
        }
    }
}

/// A successful import, possibly degraded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    /// Number of records now in the document.
    pub records: usize,
    /// Payloads re-attached to asset records.
    pub restored_assets: usize,
    pub warnings: Vec<PortWarning>,
}

impl ImportOutcome {
    /// Whether the import finished without warnings.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// A successful export, possibly missing some assets.
#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub file_name: String,
    pub container: ExportContainer,
    pub bytes_written: usize,
    pub warnings: Vec<PortWarning>,
}

impl ExportOutcome {
    /// Whether every asset made it into the container.
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}
