//! Byte transports for exported artifacts.

mod file;
mod memory;

pub use file::FileTransport;
pub use memory::MemoryTransport;

use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Transport errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("Source not found: {0}")]
    NotFound(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Transport error: {0}")]
    Other(String),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future for async operations.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Where exported bytes go and imported bytes come from.
///
/// Implementations can target a directory, memory, a download prompt or a
/// file picker; the pipeline never sees which.
pub trait Transport {
    /// Write an artifact under `name`.
    fn write_bytes(&self, name: &str, bytes: &[u8]) -> BoxFuture<'_, TransportResult<()>>;

    /// Read an artifact from `source`.
    fn read_bytes(&self, source: &str) -> BoxFuture<'_, TransportResult<Vec<u8>>>;
}
