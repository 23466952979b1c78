//! Resolver: memory -> disk -> network lookup for one cache namespace

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use futures::future::{self, BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::error::{CacheError, Result};
use crate::fetcher::Fetcher;
use crate::key::{CacheKey, Locator};
use crate::memory::MemoryStore;
use crate::stats::ResolverStats;
use crate::store::PersistentStore;

/// Which tier satisfied a retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheStatus {
    /// Served from the memory tier
    InMemoryCache,
    /// Served from the disk tier and promoted to memory
    InFileCache,
    /// Not cached in either tier; fetched from the network
    NotCached,
}

impl fmt::Display for CacheStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CacheStatus::InMemoryCache => "memory",
            CacheStatus::InFileCache => "disk",
            CacheStatus::NotCached => "network",
        };
        f.write_str(label)
    }
}

/// Successful retrieval: the payload and the tier it came from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Retrieval {
    /// Tier that satisfied the request
    pub status: CacheStatus,
    /// Payload bytes
    pub data: Bytes,
}

impl Retrieval {
    fn new(status: CacheStatus, data: Bytes) -> Self {
        Self { status, data }
    }
}

/// What to do when the disk tier fails (failed existence check, unreadable
/// or corrupt blob)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiskErrorPolicy {
    /// Log it and continue as if the entry were absent
    #[default]
    FallThrough,
    /// Fail the retrieval with `CacheError::Store`
    Surface,
}

/// Resolver tuning
#[derive(Debug, Clone, Default)]
pub struct ResolverConfig {
    /// Handling of disk read failures
    pub disk_errors: DiskErrorPolicy,
}

type InFlight = Shared<BoxFuture<'static, Result<Retrieval>>>;

struct Inner {
    namespace: String,
    memory: MemoryStore,
    store: Arc<dyn PersistentStore>,
    fetcher: Arc<dyn Fetcher>,
    in_flight: Mutex<HashMap<CacheKey, InFlight>>,
    stats: ResolverStats,
    runtime: Handle,
    config: ResolverConfig,
}

/// Cache resolver for a single namespace
///
/// Cheap to clone; clones share tiers, statistics and in-flight state.
/// Resolutions that leave memory run as tasks on the runtime captured at
/// construction, so callers never perform disk or network I/O themselves.
#[derive(Clone)]
pub struct Resolver {
    inner: Arc<Inner>,
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("namespace", &self.inner.namespace)
            .field("memory_len", &self.inner.memory.len())
            .field("in_flight", &self.inner.in_flight.lock().len())
            .finish()
    }
}

impl Resolver {
    /// Create a resolver for `namespace`
    ///
    /// The namespace must already be validated; `CacheRegistry` is the usual
    /// way to get one.
    pub(crate) fn new(
        namespace: String,
        store: Arc<dyn PersistentStore>,
        fetcher: Arc<dyn Fetcher>,
        runtime: Handle,
        config: ResolverConfig,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                namespace,
                memory: MemoryStore::new(),
                store,
                fetcher,
                in_flight: Mutex::new(HashMap::new()),
                stats: ResolverStats::new(),
                runtime,
                config,
            }),
        }
    }

    /// Namespace this resolver reads and writes
    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    /// Resolver statistics
    pub fn stats(&self) -> &ResolverStats {
        &self.inner.stats
    }

    /// Number of entries in the memory tier
    pub fn memory_len(&self) -> usize {
        self.inner.memory.len()
    }

    /// Drop the memory tier; disk is unchanged
    pub fn clear_memory(&self) {
        self.inner.memory.clear();
    }

    /// Number of keys currently being resolved
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.lock().len()
    }

    /// Retrieve the payload for a locator
    ///
    /// A memory hit resolves on the first poll. Otherwise the caller joins
    /// the in-flight resolution for the key, starting one if there is none;
    /// every caller joined to a resolution gets the same result.
    pub async fn retrieve(&self, locator: &str) -> Result<Retrieval> {
        let locator = Locator::parse(locator)?;
        self.retrieve_locator(locator).await
    }

    /// Retrieve an already parsed locator
    pub async fn retrieve_locator(&self, locator: Locator) -> Result<Retrieval> {
        let key = locator.key();

        if let Some(data) = self.inner.memory.get(&key) {
            self.inner.stats.record_memory_hit();
            debug!(namespace = %self.inner.namespace, %key, "memory hit");
            return Ok(Retrieval::new(CacheStatus::InMemoryCache, data));
        }

        self.claim(key, locator).await
    }

    /// Retrieve with a completion callback
    ///
    /// Callable from any thread, including ones outside the runtime.
    /// `on_complete` runs exactly once, on a runtime worker thread, even for
    /// an invalid locator or a memory hit. If the runtime has shut down it
    /// runs on the calling thread with `CacheError::Runtime`.
    pub fn retrieve_with<F>(&self, locator: &str, on_complete: F)
    where
        F: FnOnce(Result<Retrieval>) + Send + 'static,
    {
        let resolver = self.clone();
        let locator = locator.to_string();
        let completion = Completion {
            on_complete: Some(on_complete),
        };
        self.inner.runtime.spawn(async move {
            let result = resolver.retrieve(&locator).await;
            completion.complete(result);
        });
    }

    /// Join or start the resolution for `key`
    fn claim(&self, key: CacheKey, locator: Locator) -> InFlight {
        let mut in_flight = self.inner.in_flight.lock();

        if let Some(pending) = in_flight.get(&key) {
            self.inner.stats.record_coalesced();
            debug!(namespace = %self.inner.namespace, %key, "joined in-flight resolution");
            return pending.clone();
        }

        // A resolution that just finished promoted its result before
        // releasing the claim, so memory is authoritative here.
        if let Some(data) = self.inner.memory.get(&key) {
            self.inner.stats.record_memory_hit();
            return future::ready(Ok(Retrieval::new(CacheStatus::InMemoryCache, data)))
                .boxed()
                .shared();
        }

        let (tx, rx) = oneshot::channel();
        let pending = async move {
            rx.await.unwrap_or_else(|_| {
                Err(CacheError::Task(
                    "resolution task ended without a result".to_string(),
                ))
            })
        }
        .boxed()
        .shared();

        in_flight.insert(key.clone(), pending.clone());
        drop(in_flight);

        // The guard is owned by the task future, so the claim is released
        // however that future ends, including being dropped unpolled by a
        // runtime that has shut down.
        let claim = ClaimGuard {
            inner: Arc::clone(&self.inner),
            key,
        };
        self.inner.runtime.spawn(async move {
            let result = claim.inner.resolve(&claim.key, &locator).await;
            drop(claim);
            let _ = tx.send(result);
        });

        pending
    }
}

/// Releases a key's in-flight record when its resolution task ends
struct ClaimGuard {
    inner: Arc<Inner>,
    key: CacheKey,
}

impl Drop for ClaimGuard {
    fn drop(&mut self) {
        self.inner.in_flight.lock().remove(&self.key);
    }
}

/// Callback that fires exactly once: with the result, or with
/// `CacheError::Runtime` if its task is dropped before completing
struct Completion<F: FnOnce(Result<Retrieval>)> {
    on_complete: Option<F>,
}

impl<F: FnOnce(Result<Retrieval>)> Completion<F> {
    fn complete(mut self, result: Result<Retrieval>) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(result);
        }
    }
}

impl<F: FnOnce(Result<Retrieval>)> Drop for Completion<F> {
    fn drop(&mut self) {
        if let Some(on_complete) = self.on_complete.take() {
            on_complete(Err(CacheError::Runtime(
                "runtime shut down before the retrieval completed".to_string(),
            )));
        }
    }
}

impl Inner {
    /// Disk, then network. Runs inside the resolution task.
    async fn resolve(&self, key: &CacheKey, locator: &Locator) -> Result<Retrieval> {
        match self.load_from_disk(key).await {
            Ok(Some(data)) => {
                self.memory.put(key.clone(), data.clone());
                self.stats.record_disk_hit();
                debug!(namespace = %self.namespace, %key, "disk hit, promoted to memory");
                return Ok(Retrieval::new(CacheStatus::InFileCache, data));
            }
            Ok(None) => {}
            Err(err) => {
                self.stats.record_disk_failure();
                match self.config.disk_errors {
                    DiskErrorPolicy::Surface => return Err(err),
                    DiskErrorPolicy::FallThrough => {
                        warn!(namespace = %self.namespace, %key, error = %err, "disk read failed, fetching instead");
                    }
                }
            }
        }

        self.stats.record_fetch();
        debug!(namespace = %self.namespace, %key, url = %locator, "not cached, fetching");

        let data = match self.fetcher.fetch(locator).await {
            Ok(data) => data,
            Err(e) => {
                self.stats.record_fetch_failure();
                return Err(CacheError::Fetch {
                    locator: locator.to_string(),
                    source: Arc::new(e),
                });
            }
        };

        if let Err(err) = self.save_to_disk(key, data.clone()).await {
            self.stats.record_disk_failure();
            warn!(namespace = %self.namespace, %key, error = %err, "disk write failed, entry kept in memory only");
        }
        self.memory.put(key.clone(), data.clone());

        Ok(Retrieval::new(CacheStatus::NotCached, data))
    }

    async fn load_from_disk(&self, key: &CacheKey) -> Result<Option<Bytes>> {
        let store = Arc::clone(&self.store);
        let namespace = self.namespace.clone();
        let key = key.clone();

        let loaded = tokio::task::spawn_blocking(move || -> tierstore::Result<Option<Bytes>> {
            if !store.exists(&namespace, &key)? {
                return Ok(None);
            }
            store.read(&namespace, &key).map(Some)
        })
        .await
        .map_err(|e| CacheError::Task(e.to_string()))?;

        Ok(loaded?)
    }

    async fn save_to_disk(&self, key: &CacheKey, data: Bytes) -> Result<()> {
        let store = Arc::clone(&self.store);
        let namespace = self.namespace.clone();
        let key = key.clone();

        tokio::task::spawn_blocking(move || store.write(&namespace, &key, &data))
            .await
            .map_err(|e| CacheError::Task(e.to_string()))??;

        Ok(())
    }
}
