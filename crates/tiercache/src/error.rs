//! Error types for tiercache

use std::sync::Arc;

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::resolver::CacheStatus;

/// Result type alias for tiercache operations
pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors surfaced by the registry and by retrievals
///
/// Cloneable: one resolution's outcome is handed to every caller waiting on
/// the same key, so non-Clone sources are shared behind `Arc`.
#[derive(Debug, Clone, Error)]
pub enum CacheError {
    /// Locator is not a usable resource address; no I/O was attempted
    #[error("invalid locator {locator:?}: {reason}")]
    InvalidLocator {
        /// Input as given by the caller
        locator: String,
        /// Why it was rejected
        reason: String,
    },

    /// Cache name cannot be used as a namespace
    #[error("invalid cache name {0:?}")]
    InvalidName(String),

    /// Disk tier failure that was not absorbed
    #[error("persistent store error: {0}")]
    Store(#[source] Arc<tierstore::Error>),

    /// Network fetch failed; no tier holds the resource
    #[error("fetch failed for {locator}: {source}")]
    Fetch {
        /// Locator that was being fetched
        locator: String,
        /// Fetcher's error, verbatim
        #[source]
        source: Arc<FetchError>,
    },

    /// No tokio runtime to run resolutions on
    #[error("no tokio runtime available: {0}")]
    Runtime(String),

    /// The background resolution task died before producing a result
    #[error("resolution task failed: {0}")]
    Task(String),
}

impl CacheError {
    /// Tier status reported alongside this error
    ///
    /// An error always means no tier could supply the data.
    pub fn status(&self) -> CacheStatus {
        CacheStatus::NotCached
    }

    /// Whether the failure came from the network fetcher
    pub fn is_fetch(&self) -> bool {
        matches!(self, CacheError::Fetch { .. })
    }
}

impl From<tierstore::Error> for CacheError {
    fn from(err: tierstore::Error) -> Self {
        CacheError::Store(Arc::new(err))
    }
}
