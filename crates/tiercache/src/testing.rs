//! Counting fakes for resolver and registry tests

use std::collections::HashMap;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};

use crate::fetcher::{FetchError, Fetcher};
use crate::key::{CacheKey, Locator};
use crate::store::PersistentStore;

#[derive(Default)]
struct StoreState {
    blobs: Mutex<HashMap<(String, CacheKey), Bytes>>,
    exists_calls: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay_ms: AtomicU64,
}

/// In-memory `PersistentStore` with call counters
#[derive(Clone, Default)]
pub struct FakeStore {
    state: Arc<StoreState>,
}

impl FakeStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a blob without counting it as a write
    pub fn insert(&self, namespace: &str, key: &CacheKey, data: &[u8]) {
        self.state.blobs.lock().insert(
            (namespace.to_string(), key.clone()),
            Bytes::copy_from_slice(data),
        );
    }

    pub fn get(&self, namespace: &str, key: &CacheKey) -> Option<Bytes> {
        self.state
            .blobs
            .lock()
            .get(&(namespace.to_string(), key.clone()))
            .cloned()
    }

    pub fn fail_reads(&self) {
        self.state.fail_reads.store(true, Ordering::SeqCst);
    }

    pub fn fail_writes(&self) {
        self.state.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Block each read for `delay`, to keep disk hits in flight
    pub fn delay_reads(&self, delay: Duration) {
        self.state
            .read_delay_ms
            .store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    pub fn exists_calls(&self) -> usize {
        self.state.exists_calls.load(Ordering::SeqCst)
    }

    pub fn reads(&self) -> usize {
        self.state.reads.load(Ordering::SeqCst)
    }

    pub fn writes(&self) -> usize {
        self.state.writes.load(Ordering::SeqCst)
    }
}

impl PersistentStore for FakeStore {
    fn exists(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<bool> {
        self.state.exists_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.get(namespace, key).is_some())
    }

    fn read(&self, namespace: &str, key: &CacheKey) -> tierstore::Result<Bytes> {
        self.state.reads.fetch_add(1, Ordering::SeqCst);
        let delay = self.state.read_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            std::thread::sleep(Duration::from_millis(delay));
        }
        if self.state.fail_reads.load(Ordering::SeqCst) {
            return Err(tierstore::Error::Corrupt("injected read failure".to_string()));
        }
        self.get(namespace, key).ok_or(tierstore::Error::NotFound)
    }

    fn write(&self, namespace: &str, key: &CacheKey, data: &[u8]) -> tierstore::Result<()> {
        self.state.writes.fetch_add(1, Ordering::SeqCst);
        if self.state.fail_writes.load(Ordering::SeqCst) {
            return Err(io::Error::new(io::ErrorKind::Other, "injected write failure").into());
        }
        self.insert(namespace, key, data);
        Ok(())
    }
}

#[derive(Clone)]
enum Behavior {
    Succeed(Bytes),
    Fail(u16),
    Panic,
}

/// `Fetcher` returning a canned response, with call and concurrency counters
#[derive(Clone)]
pub struct FakeFetcher {
    behavior: Arc<RwLock<Behavior>>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    peak: Arc<AtomicUsize>,
}

impl FakeFetcher {
    fn with_behavior(behavior: Behavior) -> Self {
        Self {
            behavior: Arc::new(RwLock::new(behavior)),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            peak: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn new(data: &[u8]) -> Self {
        Self::with_behavior(Behavior::Succeed(Bytes::copy_from_slice(data)))
    }

    /// Fetcher that answers every request with the given HTTP status error
    pub fn failing(status: u16) -> Self {
        Self::with_behavior(Behavior::Fail(status))
    }

    pub fn panicking() -> Self {
        Self::with_behavior(Behavior::Panic)
    }

    /// Sleep before answering, to keep resolutions in flight
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn succeed_with(&self, data: &[u8]) {
        *self.behavior.write() = Behavior::Succeed(Bytes::copy_from_slice(data));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Most fetches ever running at the same time
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for FakeFetcher {
    async fn fetch(&self, _locator: &Locator) -> Result<Bytes, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let running = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(running, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);

        let behavior = self.behavior.read().clone();
        match behavior {
            Behavior::Succeed(data) => Ok(data),
            Behavior::Fail(status) => Err(FetchError::Status(status)),
            Behavior::Panic => panic!("fetcher exploded"),
        }
    }
}
