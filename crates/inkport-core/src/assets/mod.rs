//! Asset resolution: turning asset references into embedded payloads and back.
//!
//! Resolution failures are never fatal. [`AssetResolver::resolve_all`] reports
//! each one as a [`PortWarning`] and carries on with the remaining assets.

mod fetch;
#[cfg(feature = "http")]
mod http;

pub use fetch::{FileFetcher, MemoryBlobStore, SchemeRouter};
#[cfg(feature = "http")]
pub use http::HttpFetcher;

use crate::document::LiveDocument;
use crate::model::{AssetId, AssetRecord, AssetSource, EmbeddedPayload, choose_mime_type};
use crate::outcome::PortWarning;
use crate::snapshot::DocumentSnapshot;
use crate::transport::BoxFuture;
use futures_util::future::join_all;
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Per-asset errors. Callers turn these into warnings.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssetError {
    #[error("Asset {id} unavailable: {reason}")]
    Unavailable { id: AssetId, reason: String },
    #[error("Asset not found: {0}")]
    NotFound(AssetId),
    #[error("Asset {id} is a {kind}, which does not carry embedded content")]
    NotEmbeddable { id: AssetId, kind: String },
}

/// Errors from an [`AssetFetcher`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("Invalid reference {0}")]
    InvalidReference(String),
    #[error("No fetcher for scheme '{0}'")]
    UnsupportedScheme(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("HTTP status {0}")]
    Status(u16),
    #[error("Timed out")]
    Timeout,
    #[error("HTTP error: {0}")]
    Http(String),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Empty response")]
    Empty,
}

/// Result type for fetch operations.
pub type FetchResult<T> = Result<T, FetchError>;

/// Bytes retrieved for an asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fetched {
    pub bytes: Vec<u8>,
    /// Content type reported by the source, if any.
    pub content_type: Option<String>,
}

impl Fetched {
    pub fn new(bytes: Vec<u8>, content_type: Option<String>) -> Self {
        Self { bytes, content_type }
    }
}

/// Retrieves the bytes behind an absolute URL.
pub trait AssetFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>>;
}

impl<F: AssetFetcher + ?Sized> AssetFetcher for Box<F> {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
        (**self).fetch(url)
    }
}

/// Payloads resolved for one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resolution {
    pub payloads: BTreeMap<AssetId, EmbeddedPayload>,
    pub warnings: Vec<PortWarning>,
}

/// Turns asset sources into embedded payloads.
pub struct AssetResolver<F: AssetFetcher> {
    fetcher: F,
    /// Base for relative references.
    base_url: Option<Url>,
    concurrent: bool,
}

impl<F: AssetFetcher> AssetResolver<F> {
    /// Create a concurrent resolver.
    pub fn new(fetcher: F) -> Self {
        Self {
            fetcher,
            base_url: None,
            concurrent: true,
        }
    }

    /// Resolve relative references against `base_url`.
    pub fn with_base_url(mut self, base_url: Url) -> Self {
        self.base_url = Some(base_url);
        self
    }

    /// Resolve assets one after another instead of all at once.
    pub fn sequential(mut self) -> Self {
        self.concurrent = false;
        self
    }

    /// Switch between concurrent and sequential resolution.
    pub fn set_concurrent(&mut self, concurrent: bool) {
        self.concurrent = concurrent;
    }

    /// Get the fetcher.
    pub fn fetcher(&self) -> &F {
        &self.fetcher
    }

    /// Produce an embedded payload for `source`.
    ///
    /// Already-embedded sources are returned as-is without any I/O.
    pub async fn resolve(
        &self,
        id: &str,
        source: &AssetSource,
        mime_hint: Option<&str>,
    ) -> Result<EmbeddedPayload, AssetError> {
        let reference = match source {
            AssetSource::Embedded(payload) => return Ok(payload.clone()),
            AssetSource::External(reference) => reference,
        };

        let unavailable = |reason: String| AssetError::Unavailable {
            id: id.to_string(),
            reason,
        };

        let url = reference
            .to_url(self.base_url.as_ref())
            .map_err(|e| unavailable(format!("invalid reference {}: {}", reference, e)))?;
        log::debug!("Fetching asset {} from {}", id, url);

        let fetched = self
            .fetcher
            .fetch(&url)
            .await
            .map_err(|e| unavailable(e.to_string()))?;
        if fetched.bytes.is_empty() {
            return Err(unavailable(FetchError::Empty.to_string()));
        }

        let mime = choose_mime_type(fetched.content_type.as_deref(), mime_hint, &fetched.bytes);
        Ok(EmbeddedPayload::from_bytes(&mime, &fetched.bytes))
    }

    /// Resolve one asset record's source.
    pub async fn resolve_record(&self, record: &AssetRecord) -> Result<EmbeddedPayload, AssetError> {
        let source = record.props.src.as_ref().ok_or_else(|| AssetError::Unavailable {
            id: record.id.clone(),
            reason: "asset has no source".to_string(),
        })?;
        self.resolve(&record.id, source, record.props.mime_type.as_deref())
            .await
    }

    /// Resolve every embeddable asset of a snapshot.
    ///
    /// All resolutions complete, successfully or not, before this returns.
    pub async fn resolve_all(&self, snapshot: &DocumentSnapshot) -> Resolution {
        let candidates: Vec<&AssetRecord> = snapshot
            .assets()
            .filter(|asset| asset.is_embeddable())
            .collect();

        let results = if self.concurrent {
            join_all(candidates.iter().map(|asset| self.resolve_record(asset))).await
        } else {
            let mut results = Vec::with_capacity(candidates.len());
            for asset in &candidates {
                results.push(self.resolve_record(asset).await);
            }
            results
        };

        let mut resolution = Resolution::default();
        for (asset, result) in candidates.into_iter().zip(results) {
            match result {
                Ok(payload) => {
                    resolution.payloads.insert(asset.id.clone(), payload);
                }
                Err(e) => {
                    log::warn!("Failed to export asset: {}", e);
                    resolution.warnings.push(e.into());
                }
            }
        }
        resolution
    }
}

/// Copy of `record` whose source is `payload`; every other field unchanged.
pub fn restore(record: &AssetRecord, payload: EmbeddedPayload) -> AssetRecord {
    let mut restored = record.clone();
    restored.props.src = Some(AssetSource::Embedded(payload));
    restored
}

/// Attach `payload` to the document's asset record `id`.
///
/// Only kinds that carry binary content (images, videos) take a payload;
/// other records keep their source.
pub fn restore_into<D: LiveDocument + ?Sized>(
    document: &mut D,
    id: &str,
    payload: EmbeddedPayload,
) -> Result<(), AssetError> {
    let record = document
        .get_asset_record(id)
        .ok_or_else(|| AssetError::NotFound(id.to_string()))?;
    if !record.kind.is_embeddable() {
        return Err(AssetError::NotEmbeddable {
            id: record.id,
            kind: record.kind.to_string(),
        });
    }
    document.update_asset_record(restore(&record, payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Whiteboard;
    use crate::model::{AssetKind, AssetRef, PageRecord, Record};
    use crate::snapshot::SchemaDescriptor;
    use pollster::block_on;
    use std::cell::Cell;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];

    /// Fetcher that counts calls and serves fixed bytes for urls ending in `.png`.
    #[derive(Default)]
    struct CountingFetcher {
        calls: Cell<usize>,
    }

    impl AssetFetcher for CountingFetcher {
        fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
            self.calls.set(self.calls.get() + 1);
            let ok = url.path().ends_with(".png");
            let path = url.path().to_string();
            Box::pin(async move {
                if ok {
                    Ok(Fetched::new(PNG.to_vec(), None))
                } else {
                    Err(FetchError::NotFound(path))
                }
            })
        }
    }

    fn external(url: &str) -> AssetSource {
        AssetSource::External(AssetRef::new(url))
    }

    #[test]
    fn test_embedded_is_returned_unchanged() {
        let resolver = AssetResolver::new(CountingFetcher::default());
        let payload = EmbeddedPayload::from_bytes("image/png", &PNG);
        let resolved = block_on(resolver.resolve("asset:a", &AssetSource::Embedded(payload.clone()), None)).unwrap();
        assert_eq!(resolved, payload);
        assert_eq!(resolver.fetcher().calls.get(), 0);
    }

    #[test]
    fn test_external_is_fetched_and_sniffed() {
        let resolver = AssetResolver::new(CountingFetcher::default());
        let resolved = block_on(resolver.resolve("asset:a", &external("https://cdn.test/a.png"), None)).unwrap();
        assert_eq!(resolved.mime_type(), "image/png");
        assert_eq!(resolved.decode().unwrap(), PNG);
    }

    #[test]
    fn test_failure_is_unavailable() {
        let resolver = AssetResolver::new(CountingFetcher::default());
        let result = block_on(resolver.resolve("asset:b", &external("https://cdn.test/b.gif"), None));
        assert!(matches!(result, Err(AssetError::Unavailable { ref id, .. }) if id == "asset:b"));
    }

    #[test]
    fn test_relative_reference_needs_base() {
        let resolver = AssetResolver::new(CountingFetcher::default());
        let result = block_on(resolver.resolve("asset:c", &external("img/c.png"), None));
        assert!(matches!(result, Err(AssetError::Unavailable { .. })));

        let resolver = AssetResolver::new(CountingFetcher::default())
            .with_base_url(Url::parse("https://cdn.test/boards/").unwrap());
        assert!(block_on(resolver.resolve("asset:c", &external("img/c.png"), None)).is_ok());
    }

    fn snapshot_with_assets(assets: Vec<AssetRecord>) -> DocumentSnapshot {
        let mut records: Vec<Record> = vec![PageRecord::new("Page 1", "a1").into()];
        records.extend(assets.into_iter().map(Record::from));
        DocumentSnapshot::from_records(SchemaDescriptor::default(), records)
    }

    #[test]
    fn test_resolve_all_tolerates_failures() {
        let snapshot = snapshot_with_assets(vec![
            AssetRecord::image("asset:1", "1.png", external("https://cdn.test/1.png"), 1.0, 1.0),
            AssetRecord::image("asset:2", "2.gif", external("https://cdn.test/2.gif"), 1.0, 1.0),
            AssetRecord::image("asset:3", "3.png", external("https://cdn.test/3.png"), 1.0, 1.0),
        ]);

        for concurrent in [true, false] {
            let mut resolver = AssetResolver::new(CountingFetcher::default());
            resolver.set_concurrent(concurrent);
            let resolution = block_on(resolver.resolve_all(&snapshot));
            assert_eq!(resolution.payloads.len(), 2);
            assert!(resolution.payloads.contains_key("asset:1"));
            assert!(resolution.payloads.contains_key("asset:3"));
            assert_eq!(resolution.warnings.len(), 1);
            assert_eq!(resolution.warnings[0].asset_id(), Some("asset:2"));
            assert_eq!(resolver.fetcher().calls.get(), 3);
        }
    }

    #[test]
    fn test_resolve_all_skips_sourceless_assets() {
        let mut bare = AssetRecord::image("asset:bare", "bare", external("https://cdn.test/x.png"), 1.0, 1.0);
        bare.props.src = None;
        let snapshot = snapshot_with_assets(vec![bare]);

        let resolver = AssetResolver::new(CountingFetcher::default());
        let resolution = block_on(resolver.resolve_all(&snapshot));
        assert!(resolution.payloads.is_empty());
        assert!(resolution.warnings.is_empty());
    }

    #[test]
    fn test_restore_preserves_other_fields() {
        let mut record = AssetRecord::image("asset:1", "1.png", external("https://cdn.test/1.png"), 40.0, 30.0);
        record.meta.insert("author".to_string(), "me".into());
        let payload = EmbeddedPayload::from_bytes("image/png", &PNG);

        let restored = restore(&record, payload.clone());
        assert_eq!(restored.props.src, Some(AssetSource::Embedded(payload)));
        assert_eq!(restored.props.name, record.props.name);
        assert_eq!(restored.props.w, record.props.w);
        assert_eq!(restored.meta, record.meta);
        assert_eq!(restored.id, record.id);
    }

    #[test]
    fn test_restore_into_missing_asset() {
        let mut board = Whiteboard::new();
        let payload = EmbeddedPayload::from_bytes("image/png", &PNG);
        let result = restore_into(&mut board, "asset:nope", payload);
        assert_eq!(result, Err(AssetError::NotFound("asset:nope".to_string())));
    }

    #[test]
    fn test_restore_into_skips_bookmarks() {
        let mut board = Whiteboard::new();
        let mut bookmark = AssetRecord::image("asset:link", "link", external("https://site.test/"), 0.0, 0.0);
        bookmark.kind = AssetKind::Bookmark;
        board.add_asset(bookmark.clone());

        let payload = EmbeddedPayload::from_bytes("image/png", &PNG);
        let result = restore_into(&mut board, "asset:link", payload);
        assert_eq!(
            result,
            Err(AssetError::NotEmbeddable {
                id: "asset:link".to_string(),
                kind: "bookmark".to_string(),
            })
        );
        assert_eq!(board.get_asset_record("asset:link"), Some(bookmark));
    }
}
