//! Disk tier adapter

use bytes::Bytes;
use tierstore::BlobStore;

use crate::key::CacheKey;

/// Namespaced durable key -> bytes storage
///
/// Methods are blocking; the resolver only calls them from
/// `tokio::task::spawn_blocking`.
pub trait PersistentStore: Send + Sync + 'static {
    /// Check whether a blob exists for the key
    fn exists(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<bool>;

    /// Read the blob for the key; fails if absent or unreadable
    fn read(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<Bytes>;

    /// Store the blob for the key
    fn write(&self, namespace: &str, key: &CacheKey, data: &[u8]) -> tierstore::Result<()>;
}

impl PersistentStore for BlobStore {
    fn exists(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<bool> {
        BlobStore::exists(self, namespace, key.as_str())
    }

    fn read(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<Bytes> {
        BlobStore::read(self, namespace, key.as_str()).map(Bytes::from)
    }

    fn write(&self, namespace: &str, key: &CacheKey, data: &[u8]) -> tierstore::Result<()> {
        BlobStore::write(self, namespace, key.as_str(), data)
    }
}
