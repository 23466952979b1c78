//! Network tier adapter
//!
//! The resolver only sees the [`Fetcher`] trait. [`HttpFetcher`] is the
//! stock implementation; timeouts and any retry policy live here, never in
//! the resolver.

use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use thiserror::Error;
use tracing::debug;

use crate::key::Locator;

/// Failure reported by a fetcher
#[derive(Debug, Error)]
pub enum FetchError {
    /// Fetcher cannot handle this URL scheme
    #[error("unsupported scheme {0:?}")]
    UnsupportedScheme(String),

    /// Server answered with a non-success status
    #[error("unexpected HTTP status {0}")]
    Status(u16),

    /// Response body exceeds the configured limit
    #[error("response body exceeds {limit} bytes")]
    TooLarge {
        /// Configured limit
        limit: u64,
    },

    /// Connection, TLS, timeout or protocol failure
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Any other fetcher-specific failure
    #[error("{0}")]
    Other(String),
}

/// Retrieves the raw bytes behind a locator
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Fetch the resource; called at most once per resolution
    async fn fetch(&self, locator: &Locator) -> Result<Bytes, FetchError>;
}

/// Configuration for [`HttpFetcher`]
#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    /// Whole-request timeout
    pub timeout: Duration,
    /// TCP/TLS connect timeout
    pub connect_timeout: Duration,
    /// User-Agent header value
    pub user_agent: String,
    /// Largest accepted body, `None` for unlimited
    pub max_body_bytes: Option<u64>,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(10),
            user_agent: concat!("tiercache/", env!("CARGO_PKG_VERSION")).to_string(),
            max_body_bytes: Some(64 * 1024 * 1024),
        }
    }
}

/// HTTP(S) fetcher backed by a shared `reqwest::Client`
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    max_body_bytes: Option<u64>,
}

impl HttpFetcher {
    /// Build a fetcher from the given configuration
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent)
            .build()?;

        Ok(Self {
            client,
            max_body_bytes: config.max_body_bytes,
        })
    }

    fn check_len(&self, len: u64) -> Result<(), FetchError> {
        match self.max_body_bytes {
            Some(limit) if len > limit => Err(FetchError::TooLarge { limit }),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, locator: &Locator) -> Result<Bytes, FetchError> {
        match locator.scheme() {
            "http" | "https" => {}
            other => return Err(FetchError::UnsupportedScheme(other.to_string())),
        }

        let mut resp = self.client.get(locator.as_str()).send().await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if let Some(declared) = resp.content_length() {
            self.check_len(declared)?;
        }

        let mut body = BytesMut::new();
        while let Some(chunk) = resp.chunk().await? {
            self.check_len((body.len() + chunk.len()) as u64)?;
            body.extend_from_slice(&chunk);
        }

        debug!(url = %locator, bytes = body.len(), "fetched");
        Ok(body.freeze())
    }
}
