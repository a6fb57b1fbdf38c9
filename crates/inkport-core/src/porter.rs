//! Export and import pipelines over a shared document handle.

use crate::assets::{AssetFetcher, AssetResolver};
use crate::config::PortConfig;
use crate::container::{build, encode, export_file_name};
use crate::document::LiveDocument;
use crate::format::classify;
use crate::outcome::{ExportOutcome, ImportOutcome};
use crate::restore::{ImportFailed, restore};
use crate::snapshot::capture;
use crate::transport::{Transport, TransportError};
use chrono::{DateTime, Utc};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use thiserror::Error;
use url::Url;

/// The two pipelines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Export,
    Import,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Export => write!(f, "export"),
            Operation::Import => write!(f, "import"),
        }
    }
}

/// Errors that abort an export or import.
#[derive(Debug, Error)]
pub enum PortError {
    #[error("Cannot start {0}: another operation is in flight for this document")]
    Busy(Operation),
    #[error(transparent)]
    Import(#[from] ImportFailed),
    #[error("Transport failed: {0}")]
    Transport(#[from] TransportError),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for pipeline operations.
pub type PortResult<T> = Result<T, PortError>;

/// Shared handle to a live document.
///
/// Clones refer to the same document and the same in-flight flag.
pub struct DocumentHandle<D> {
    document: Arc<Mutex<D>>,
    busy: Arc<AtomicBool>,
}

impl<D> Clone for DocumentHandle<D> {
    fn clone(&self) -> Self {
        Self {
            document: Arc::clone(&self.document),
            busy: Arc::clone(&self.busy),
        }
    }
}

impl<D: LiveDocument> DocumentHandle<D> {
    /// Wrap a document for shared use.
    pub fn new(document: D) -> Self {
        Self {
            document: Arc::new(Mutex::new(document)),
            busy: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run `f` with shared access to the document.
    pub fn read<R>(&self, f: impl FnOnce(&D) -> R) -> R {
        let document = self.document.lock().unwrap_or_else(|e| e.into_inner());
        f(&document)
    }

    /// Run `f` with exclusive access to the document.
    pub fn write<R>(&self, f: impl FnOnce(&mut D) -> R) -> R {
        let mut document = self.document.lock().unwrap_or_else(|e| e.into_inner());
        f(&mut document)
    }

    /// Whether an export or import is running.
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }

    /// Mark `operation` as in flight until the returned guard is dropped.
    pub fn begin(&self, operation: Operation) -> PortResult<InFlight> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| {
                log::warn!("Rejected {}: document busy", operation);
                PortError::Busy(operation)
            })?;
        Ok(InFlight {
            busy: Arc::clone(&self.busy),
        })
    }
}

/// Clears the in-flight flag on drop.
#[must_use = "the operation is only in flight while the guard lives"]
pub struct InFlight {
    busy: Arc<AtomicBool>,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        self.busy.store(false, Ordering::Release);
    }
}

/// Runs exports and imports against a transport.
pub struct Porter<F: AssetFetcher, T: Transport> {
    resolver: AssetResolver<F>,
    transport: T,
    config: PortConfig,
}

impl<F: AssetFetcher, T: Transport> Porter<F, T> {
    /// Create a porter; resolution mode follows `config`.
    pub fn new(fetcher: F, transport: T, config: PortConfig) -> Self {
        let mut resolver = AssetResolver::new(fetcher);
        resolver.set_concurrent(config.concurrent_resolution);
        Self {
            resolver,
            transport,
            config,
        }
    }

    /// Resolve relative asset references against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.resolver = self.resolver.with_base_url(base_url);
        self
    }

    /// Get the asset resolver.
    pub fn resolver(&self) -> &AssetResolver<F> {
        &self.resolver
    }

    /// Get the transport.
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Get the configuration.
    pub fn config(&self) -> &PortConfig {
        &self.config
    }

    /// Export the document, stamped with the current time.
    pub async fn export<D: LiveDocument>(&self, handle: &DocumentHandle<D>) -> PortResult<ExportOutcome> {
        self.export_at(handle, Utc::now()).await
    }

    /// Capture, resolve assets, build the container and write it out.
    pub async fn export_at<D: LiveDocument>(
        &self,
        handle: &DocumentHandle<D>,
        timestamp: DateTime<Utc>,
    ) -> PortResult<ExportOutcome> {
        let _guard = handle.begin(Operation::Export)?;

        let snapshot = handle.read(|document| capture(document));
        let resolution = self.resolver.resolve_all(&snapshot).await;

        let container = build(snapshot, resolution.payloads, timestamp, &self.config.format_version);
        let bytes = encode(&container)?;
        let file_name = export_file_name(&self.config.file_prefix, timestamp, &self.config.file_extension);
        self.transport.write_bytes(&file_name, &bytes).await?;

        log::info!(
            "Exported {} ({} bytes, {} assets embedded, {} bytes of asset data, {} warnings)",
            file_name,
            bytes.len(),
            container.assets().len(),
            container.embedded_bytes(),
            resolution.warnings.len()
        );
        Ok(ExportOutcome {
            file_name,
            container,
            bytes_written: bytes.len(),
            warnings: resolution.warnings,
        })
    }

    /// Read `source` from the transport and restore it into the document.
    pub async fn import<D: LiveDocument>(
        &self,
        handle: &DocumentHandle<D>,
        source: &str,
    ) -> PortResult<ImportOutcome> {
        let _guard = handle.begin(Operation::Import)?;
        let bytes = self.transport.read_bytes(source).await?;
        log::debug!("Read {} bytes from {}", bytes.len(), source);
        self.apply(handle, &bytes)
    }

    /// Restore already-acquired artifact bytes into the document.
    pub fn import_bytes<D: LiveDocument>(
        &self,
        handle: &DocumentHandle<D>,
        bytes: &[u8],
    ) -> PortResult<ImportOutcome> {
        let _guard = handle.begin(Operation::Import)?;
        self.apply(handle, bytes)
    }

    fn apply<D: LiveDocument>(&self, handle: &DocumentHandle<D>, bytes: &[u8]) -> PortResult<ImportOutcome> {
        let kind = classify(bytes);
        let outcome = handle.write(|document| restore(document, kind, &self.config.refit));
        if let Err(e) = &outcome {
            log::error!("Import failed: {}", e);
        }
        Ok(outcome?)
    }
}
