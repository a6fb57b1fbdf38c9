//! HTTP(S) asset retrieval.

use super::{AssetFetcher, FetchError, FetchResult, Fetched};
use crate::transport::BoxFuture;
use reqwest::{Client, ClientBuilder};
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use url::Url;

/// Fetches remote assets with a per-request timeout.
///
/// Needs a Tokio runtime to be driving the returned futures.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

fn builder(timeout: Duration) -> ClientBuilder {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout.min(Duration::from_secs(5)))
}

impl HttpFetcher {
    /// Create a fetcher whose requests give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Self::from_builder(builder(timeout))
    }

    /// Create a fetcher from a configured client builder.
    pub fn from_builder(builder: ClientBuilder) -> Result<Self, FetchError> {
        let client = builder.build().map_err(|e| FetchError::Http(e.to_string()))?;
        Ok(Self { client })
    }
}

fn map_error(error: reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout
    } else if let Some(status) = error.status() {
        FetchError::Status(status.as_u16())
    } else {
        FetchError::Http(error.to_string())
    }
}

impl AssetFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a Url) -> BoxFuture<'a, FetchResult<Fetched>> {
        Box::pin(async move {
            let response = self
                .client
                .get(url.clone())
                .send()
                .await
                .map_err(map_error)?;

            let status = response.status();
            if !status.is_success() {
                return Err(if status.as_u16() == 404 {
                    FetchError::NotFound(url.to_string())
                } else {
                    FetchError::Status(status.as_u16())
                });
            }

            let content_type = response
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let bytes = response.bytes().await.map_err(map_error)?;
            Ok(Fetched::new(bytes.to_vec(), content_type))
        })
    }
}
