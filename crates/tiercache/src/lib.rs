//! # tiercache
//!
//! Content cache that resolves a locator (URL) to bytes through three tiers.
//!
//! ## Architecture
//! - **Memory**: AHash map per namespace, checked inline (O(1))
//! - **Disk**: `tierstore::BlobStore`, one directory per namespace
//! - **Network**: pluggable [`Fetcher`], [`HttpFetcher`] by default
//!
//! Disk hits are promoted to memory; fetched payloads are written to both
//! tiers. Concurrent retrievals of the same key share one resolution.
//!
//! ```no_run
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! use std::sync::Arc;
//! use tiercache::{CacheRegistry, HttpFetcher, HttpFetcherConfig};
//! use tierstore::BlobStore;
//!
//! let store = Arc::new(BlobStore::open("./cache")?);
//! let fetcher = Arc::new(HttpFetcher::new(HttpFetcherConfig::default())?);
//! let registry = CacheRegistry::builder(store, fetcher).build()?;
//!
//! let images = registry.cache_with_name("images")?;
//! let hit = images.retrieve("https://example.com/logo.png").await?;
//! println!("{} bytes from {}", hit.data.len(), hit.status);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
mod fetcher;
mod key;
mod memory;
mod registry;
mod resolver;
mod stats;
mod store;

#[cfg(test)]
mod testing;

pub use error::{CacheError, Result};
pub use fetcher::{FetchError, Fetcher, HttpFetcher, HttpFetcherConfig};
pub use key::{CacheKey, Locator};
pub use memory::MemoryStore;
pub use registry::{CacheRegistry, RegistryBuilder};
pub use resolver::{CacheStatus, DiskErrorPolicy, Resolver, ResolverConfig, Retrieval};
pub use stats::ResolverStats;
pub use store::PersistentStore;
