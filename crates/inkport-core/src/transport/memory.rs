//! In-memory transport.

use super::{BoxFuture, Transport, TransportError, TransportResult};
use std::collections::HashMap;
use std::sync::RwLock;

/// In-memory transport for testing and embedding hosts.
#[derive(Default)]
pub struct MemoryTransport {
    files: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryTransport {
    /// Create an empty transport.
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file for a later `read_bytes`.
    pub fn insert(&self, name: &str, bytes: Vec<u8>) {
        let mut files = self.files.write().unwrap_or_else(|e| e.into_inner());
        files.insert(name.to_string(), bytes);
    }

    /// Get a copy of a written artifact.
    pub fn get(&self, name: &str) -> Option<Vec<u8>> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        files.get(name).cloned()
    }

    /// Names of all stored files, sorted.
    pub fn names(&self) -> Vec<String> {
        let files = self.files.read().unwrap_or_else(|e| e.into_inner());
        let mut names: Vec<_> = files.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Transport for MemoryTransport {
    fn write_bytes(&self, name: &str, bytes: &[u8]) -> BoxFuture<'_, TransportResult<()>> {
        let name = name.to_string();
        let bytes = bytes.to_vec();
        Box::pin(async move {
            let mut files = self
                .files
                .write()
                .map_err(|e| TransportError::Other(format!("Lock error: {}", e)))?;
            files.insert(name, bytes);
            Ok(())
        })
    }

    fn read_bytes(&self, source: &str) -> BoxFuture<'_, TransportResult<Vec<u8>>> {
        let source = source.to_string();
        Box::pin(async move {
            let files = self
                .files
                .read()
                .map_err(|e| TransportError::Other(format!("Lock error: {}", e)))?;
            files
                .get(&source)
                .cloned()
                .ok_or(TransportError::NotFound(source))
        })
    }
}
