//! Directory-backed transport for native platforms.

use super::{BoxFuture, Transport, TransportError, TransportResult};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

/// Writes artifacts into a directory and reads them from paths.
pub struct FileTransport {
    base_path: PathBuf,
}

impl FileTransport {
    /// Create a transport rooted at `base_path`, creating the directory if needed.
    pub fn new(base_path: PathBuf) -> TransportResult<Self> {
        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(|e| {
                TransportError::Io(format!("Failed to create export directory: {}", e))
            })?;
        }
        Ok(Self { base_path })
    }

    /// Transport rooted at the default export directory.
    ///
    /// On Unix: `~/.local/share/inkport/exports/`
    /// On Windows: `%LOCALAPPDATA%\inkport\exports\`
    pub fn default_location() -> TransportResult<Self> {
        let base = dirs::data_local_dir()
            .or_else(dirs::home_dir)
            .ok_or_else(|| TransportError::Io("Could not determine home directory".to_string()))?;

        Self::new(base.join("inkport").join("exports"))
    }

    /// Path an artifact called `name` is written to.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        let safe_name: String = name
            .chars()
            .map(|c| {
                if c.is_alphanumeric() || c == '-' || c == '_' || c == '.' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let safe_name = safe_name.trim_start_matches('.');
        self.base_path.join(if safe_name.is_empty() { "_" } else { safe_name })
    }

    /// Directory artifacts are written to.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }
}

impl Transport for FileTransport {
    fn write_bytes(&self, name: &str, bytes: &[u8]) -> BoxFuture<'_, TransportResult<()>> {
        let path = self.artifact_path(name);
        let bytes = bytes.to_vec();

        Box::pin(async move {
            fs::write(&path, bytes).map_err(|e| {
                TransportError::Io(format!("Failed to write {}: {}", path.display(), e))
            })
        })
    }

    fn read_bytes(&self, source: &str) -> BoxFuture<'_, TransportResult<Vec<u8>>> {
        // Absolute sources replace the base path.
        let path = self.base_path.join(source);

        Box::pin(async move {
            fs::read(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => TransportError::NotFound(path.display().to_string()),
                _ => TransportError::Io(format!("Failed to read {}: {}", path.display(), e)),
            })
        })
    }
}
