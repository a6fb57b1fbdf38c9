//! Export/import configuration.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Version string written into every container.
pub const FORMAT_VERSION: &str = "1.0";

/// Default file name prefix for exports.
pub const DEFAULT_FILE_PREFIX: &str = "inkport-export";

/// Default file extension for exports.
pub const DEFAULT_FILE_EXTENSION: &str = "json";

/// Default per-asset retrieval timeout in milliseconds.
pub const DEFAULT_ASSET_TIMEOUT_MS: u64 = 15_000;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {message}")]
    Io { path: String, message: String },
    #[error("Failed to parse config {path}: {message}")]
    Parse { path: String, message: String },
}

/// How the document should refit its viewport after an import.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefitOptions {
    /// Delay before the refit runs.
    pub delay_ms: u64,
    /// Animation length of the zoom.
    pub animation_ms: u64,
    /// Screen-space padding around content.
    pub padding: f64,
}

impl Default for RefitOptions {
    fn default() -> Self {
        Self {
            delay_ms: 200,
            animation_ms: 500,
            padding: 50.0,
        }
    }
}

/// Settings shared by the export and import pipelines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortConfig {
    pub format_version: String,
    pub file_prefix: String,
    pub file_extension: String,
    /// Resolve assets concurrently instead of one after another.
    pub concurrent_resolution: bool,
    pub asset_timeout_ms: u64,
    pub refit: RefitOptions,
}

impl Default for PortConfig {
    fn default() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            file_prefix: DEFAULT_FILE_PREFIX.to_string(),
            file_extension: DEFAULT_FILE_EXTENSION.to_string(),
            concurrent_resolution: true,
            asset_timeout_ms: DEFAULT_ASSET_TIMEOUT_MS,
            refit: RefitOptions::default(),
        }
    }
}

impl PortConfig {
    /// Per-asset retrieval timeout.
    pub fn asset_timeout(&self) -> Duration {
        Duration::from_millis(self.asset_timeout_ms)
    }

    /// Parse a config from JSON; missing fields keep their defaults.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Load a config from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::from_json(&json).map_err(|e| ConfigError::Parse {
            path: path.display().to_string(),
            message: e.to_string(),
        })
    }
}
