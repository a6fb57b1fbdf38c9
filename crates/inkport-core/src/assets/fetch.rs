//! Local fetchers and scheme routing.

use super::{AssetFetcher, FetchError, FetchResult, Fetched};
use crate::model::MediaType;
use crate::transport::BoxFuture;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::sync::RwLock;
use url::Url;
use uuid::Uuid;

/// Reads `file:` URLs from the local filesystem.
#[derive(Debug, Default, Clone, Copy)]
pub struct FileFetcher;

impl AssetFetcher for FileFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
        Box::pin(async move {
            if url.scheme() != "file" {
                return Err(FetchError::UnsupportedScheme(url.scheme().to_string()));
            }
            let path = url
                .to_file_path()
                .map_err(|_| FetchError::InvalidReference(url.to_string()))?;
            let bytes = std::fs::read(&path).map_err(|e| match e.kind() {
                ErrorKind::NotFound => FetchError::NotFound(path.display().to_string()),
                _ => FetchError::Io(format!("{}: {}", path.display(), e)),
            })?;
            let content_type = MediaType::from_path(url.path()).map(|m| m.mime_type().to_string());
            Ok(Fetched::new(bytes, content_type))
        })
    }
}

/// In-memory blob handles (`blob:` URLs) registered by the host.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, Fetched>>,
}

impl MemoryBlobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register bytes and return a fresh `blob:` handle for them.
    pub fn create(&self, bytes: Vec<u8>, content_type: Option<&str>) -> String {
        let handle = format!("blob:inkport/{}", Uuid::new_v4());
        self.insert(&handle, bytes, content_type);
        handle
    }

    /// Register bytes under an explicit handle.
    pub fn insert(&self, handle: &str, bytes: Vec<u8>, content_type: Option<&str>) {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.insert(
            handle.to_string(),
            Fetched::new(bytes, content_type.map(str::to_string)),
        );
    }

    /// Drop a handle. Returns true if it existed.
    pub fn revoke(&self, handle: &str) -> bool {
        let mut blobs = self.blobs.write().unwrap_or_else(|e| e.into_inner());
        blobs.remove(handle).is_some()
    }

    /// Number of live handles.
    pub fn len(&self) -> usize {
        self.blobs.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetFetcher for MemoryBlobStore {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
        Box::pin(async move {
            let blobs = self
                .blobs
                .read()
                .map_err(|e| FetchError::Io(format!("Lock error: {}", e)))?;
            blobs
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| FetchError::NotFound(url.to_string()))
        })
    }
}

/// Dispatches to a fetcher by URL scheme.
#[derive(Default)]
pub struct SchemeRouter {
    routes: HashMap<String, Box<dyn AssetFetcher>>,
}

impl SchemeRouter {
    /// Create a router with no schemes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route `scheme` to `fetcher`, replacing any previous route.
    pub fn route(mut self, scheme: &str, fetcher: impl AssetFetcher + 'static) -> Self {
        self.routes
            .insert(scheme.to_ascii_lowercase(), Box::new(fetcher));
        self
    }

    /// Router for `file:` and `blob:` plus, with the `http` feature, http(s).
    pub fn standard(blobs: MemoryBlobStore, timeout: std::time::Duration) -> Self {
        let router = Self::new().route("file", FileFetcher).route("blob", blobs);
        #[cfg(feature = "http")]
        let router = match super::HttpFetcher::new(timeout) {
            Ok(http) => router.route("http", http.clone()).route("https", http),
            Err(e) => {
                log::warn!("HTTP asset fetching disabled: {}", e);
                router
            }
        };
        #[cfg(not(feature = "http"))]
        let _ = timeout;
        router
    }

    /// Whether a fetcher is registered for `scheme`.
    pub fn handles(&self, scheme: &str) -> bool {
        self.routes.contains_key(&scheme.to_ascii_lowercase())
    }
}

impl AssetFetcher for SchemeRouter {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
        match self.routes.get(url.scheme()) {
            Some(fetcher) => fetcher.fetch(url),
            None => {
                let scheme = url.scheme().to_string();
                Box::pin(async move { Err(FetchError::UnsupportedScheme(scheme)) })
            }
        }
    }
}
