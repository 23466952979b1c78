//! Registry of resolvers keyed by cache name

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::runtime::Handle;
use tracing::info;

use crate::error::{CacheError, Result};
use crate::fetcher::Fetcher;
use crate::resolver::{DiskErrorPolicy, Resolver, ResolverConfig};
use crate::store::PersistentStore;

/// Owns one [`Resolver`] per cache name
///
/// All resolvers share the registry's persistent store and fetcher; each
/// has its own memory tier and its own directory on disk.
pub struct CacheRegistry {
    store: Arc<dyn PersistentStore>,
    fetcher: Arc<dyn Fetcher>,
    runtime: Handle,
    config: ResolverConfig,
    resolvers: Mutex<HashMap<String, Resolver>>,
}

impl fmt::Debug for CacheRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheRegistry")
            .field("names", &self.names())
            .field("config", &self.config)
            .finish()
    }
}

impl CacheRegistry {
    /// Start building a registry over the given collaborators
    pub fn builder(
        store: Arc<dyn PersistentStore>,
        fetcher: Arc<dyn Fetcher>,
    ) -> RegistryBuilder {
        RegistryBuilder {
            store,
            fetcher,
            runtime: None,
            config: ResolverConfig::default(),
        }
    }

    /// Get the resolver for `name`, creating it on first request
    ///
    /// Later calls with the same name return a handle to the same resolver,
    /// sharing its memory tier and in-flight state.
    pub fn cache_with_name(&self, name: &str) -> Result<Resolver> {
        let mut resolvers = self.resolvers.lock();
        if let Some(resolver) = resolvers.get(name) {
            return Ok(resolver.clone());
        }

        tierstore::validate_name(name).map_err(|_| CacheError::InvalidName(name.to_string()))?;

        let resolver = Resolver::new(
            name.to_string(),
            Arc::clone(&self.store),
            Arc::clone(&self.fetcher),
            self.runtime.clone(),
            self.config.clone(),
        );
        resolvers.insert(name.to_string(), resolver.clone());
        info!(name, "cache created");

        Ok(resolver)
    }

    /// Names of the caches created so far, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.resolvers.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Number of caches created so far
    pub fn len(&self) -> usize {
        self.resolvers.lock().len()
    }

    /// Check if no cache has been created yet
    pub fn is_empty(&self) -> bool {
        self.resolvers.lock().is_empty()
    }
}

/// Builder for [`CacheRegistry`]
pub struct RegistryBuilder {
    store: Arc<dyn PersistentStore>,
    fetcher: Arc<dyn Fetcher>,
    runtime: Option<Handle>,
    config: ResolverConfig,
}

impl RegistryBuilder {
    /// Run resolutions on this runtime instead of the current one
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Set the disk failure policy for every resolver
    pub fn disk_errors(mut self, policy: DiskErrorPolicy) -> Self {
        self.config.disk_errors = policy;
        self
    }

    /// Build the registry
    ///
    /// Without an explicit runtime this must be called from within a tokio
    /// runtime, whose handle is captured.
    pub fn build(self) -> Result<CacheRegistry> {
        let runtime = match self.runtime {
            Some(runtime) => runtime,
            None => Handle::try_current().map_err(|e| CacheError::Runtime(e.to_string()))?,
        };

        Ok(CacheRegistry {
            store: self.store,
            fetcher: self.fetcher,
            runtime,
            config: self.config,
            resolvers: Mutex::new(HashMap::new()),
        })
    }
}
