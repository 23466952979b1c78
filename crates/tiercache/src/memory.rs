//! In-process memory tier
//!
//! Unbounded map from cache key to payload. Entries stay until the owning
//! resolver is dropped or `clear` is called.

use std::collections::HashMap;

use ahash::RandomState;
use bytes::Bytes;
use parking_lot::RwLock;

use crate::key::CacheKey;

/// Thread-safe key -> bytes map
#[derive(Debug, Default)]
pub struct MemoryStore {
    map: RwLock<HashMap<CacheKey, Bytes, RandomState>>,
}

impl MemoryStore {
    /// Create an empty memory store
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the payload for a key
    ///
    /// `Bytes` clones share the underlying buffer, so this does not copy.
    pub fn get(&self, key: &CacheKey) -> Option<Bytes> {
        self.map.read().get(key).cloned()
    }

    /// Insert a payload, replacing any previous value for the key
    pub fn put(&self, key: CacheKey, value: Bytes) {
        self.map.write().insert(key, value);
    }

    /// Check if a key is present
    pub fn contains(&self, key: &CacheKey) -> bool {
        self.map.read().contains_key(key)
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    /// Check if the store is empty
    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Total payload bytes held
    pub fn total_bytes(&self) -> usize {
        self.map.read().values().map(Bytes::len).sum()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.map.write().clear();
    }
}
