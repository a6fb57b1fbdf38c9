//! Inkport Core Library
//!
//! Portable whiteboard snapshots: capture a live document, embed its assets into
//! a versioned container, and restore containers (or older bare snapshots) back
//! into a document.

pub mod assets;
pub mod camera;
pub mod config;
pub mod container;
pub mod document;
pub mod format;
pub mod model;
pub mod outcome;
pub mod porter;
pub mod restore;
pub mod snapshot;
pub mod transport;

pub use assets::{AssetError, AssetFetcher, AssetResolver, FileFetcher, MemoryBlobStore, SchemeRouter};
#[cfg(feature = "http")]
pub use assets::HttpFetcher;
pub use camera::Camera;
pub use config::{PortConfig, RefitOptions};
pub use container::ExportContainer;
pub use document::{ClearSummary, LiveDocument, RefitError, Whiteboard};
pub use format::{FormatKind, UnrecognizedReason, classify};
pub use model::{AssetRecord, AssetSource, EmbeddedPayload, Record};
pub use outcome::{ExportOutcome, ImportOutcome, PortWarning};
pub use porter::{DocumentHandle, Operation, PortError, PortResult, Porter};
pub use restore::{ImportFailed, Inspection, inspect, restore};
pub use snapshot::{DocumentSnapshot, SnapshotError, capture};
pub use transport::{FileTransport, MemoryTransport, Transport, TransportError};
