//! Cache Manager Module
//!
//! Owns the process-wide cache: created once at startup, handed to
//! collaborators by cloning the handle, and shut down on graceful exit.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::cache::backend::{KvBackend, MemoryBackend, RedisBackend};
use crate::cache::memoize::{CacheOptions, Memoized};
use crate::cache::policy::DEFAULT_POLICY;
use crate::cache::{CachePolicy, HybridCache, L1Store, L2Store, PolicyRegistry};
use crate::config::Config;
use crate::error::Result;
use crate::tasks::spawn_cleanup_task;

struct ManagerInner {
    cache: Arc<HybridCache>,
    registry: Arc<PolicyRegistry>,
    cleanup: Mutex<Option<JoinHandle<()>>>,
    config: Config,
}

/// Handle to the process-wide two-tier cache.
#[derive(Clone)]
pub struct CacheManager {
    inner: Arc<ManagerInner>,
}

impl CacheManager {
    /// Builds the cache from configuration without starting background work.
    ///
    /// The `default` policy is (re)registered from the L1 settings in
    /// `config` and sizes the shared L1 tier. The L2 tier is Redis when
    /// enabled, otherwise an in-process backend.
    pub fn new(config: Config, registry: PolicyRegistry) -> Result<Self> {
        let backend: Arc<dyn KvBackend> = if config.redis_enabled {
            Arc::new(RedisBackend::new(
                &config.redis_url,
                config.redis_pool_size,
                Duration::from_millis(config.redis_timeout_ms),
            )?)
        } else {
            info!("Redis disabled, L2 uses the in-process backend");
            Arc::new(MemoryBackend::new())
        };
        Self::with_backend(config, registry, backend)
    }

    /// Builds the cache on top of an explicit L2 backend.
    pub fn with_backend(config: Config, registry: PolicyRegistry, backend: Arc<dyn KvBackend>) -> Result<Self> {
        let l1_policy = CachePolicy::new(DEFAULT_POLICY, config.l1_ttl_ceiling, config.l1_max_entries)
            .with_eviction(config.l1_eviction);
        registry.register(l1_policy.clone())?;

        let l1 = Arc::new(L1Store::from_policy(&l1_policy));
        let l2 = L2Store::new(backend, Duration::from_millis(config.redis_timeout_ms));
        let cache = Arc::new(HybridCache::new(l1, l2, config.l1_ttl_ceiling));

        info!(
            l1_max_entries = l1_policy.max_size,
            l1_eviction = %l1_policy.eviction,
            l1_ttl_ceiling = config.l1_ttl_ceiling,
            policies = registry.len(),
            "Cache manager created"
        );

        Ok(Self {
            inner: Arc::new(ManagerInner {
                cache,
                registry: Arc::new(registry),
                cleanup: Mutex::new(None),
                config,
            }),
        })
    }

    /// Builds the cache, probes L2 once, and starts the L1 cleanup task.
    ///
    /// Must be called inside a Tokio runtime. An unreachable L2 is logged
    /// and the cache runs L1-only.
    pub async fn start(config: Config, registry: PolicyRegistry) -> Result<Self> {
        let manager = Self::new(config, registry)?;
        if manager.cache().l2().connect().await.is_err() {
            warn!("Starting with L2 unavailable");
        }
        manager.spawn_cleanup();
        Ok(manager)
    }

    fn spawn_cleanup(&self) {
        let interval = self.inner.config.cleanup_interval;
        if interval == 0 {
            return;
        }
        let handle = spawn_cleanup_task(Arc::clone(self.inner.cache.l1()), interval);
        if let Some(previous) = self.inner.cleanup.lock().replace(handle) {
            previous.abort();
        }
    }

    /// Stops background work and releases L2 connections.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.inner.cleanup.lock().take() {
            handle.abort();
        }
        self.inner.cache.l2().close().await;
        info!("Cache manager shut down");
    }

    pub fn cache(&self) -> &Arc<HybridCache> {
        &self.inner.cache
    }

    pub fn registry(&self) -> &Arc<PolicyRegistry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Looks up a policy; unknown names are a configuration error.
    pub fn policy(&self, name: &str) -> Result<Arc<CachePolicy>> {
        self.inner.registry.require(name)
    }

    /// Wraps `op` with explicit cache options.
    pub fn cached<F>(&self, options: CacheOptions, op: F) -> Memoized<F> {
        Memoized::new(Arc::clone(&self.inner.cache), options, op)
    }

    /// Wraps `op` using a registered policy. Fails fast for unknown names.
    pub fn cached_with_policy<F>(&self, policy: &str, op: F) -> Result<Memoized<F>> {
        let policy = self.policy(policy)?;
        Ok(self.cached(CacheOptions::from(policy.as_ref()), op))
    }
}
