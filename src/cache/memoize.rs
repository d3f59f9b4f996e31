//! Memoization Module
//!
//! Cache-aside wrapper around an async value-producing operation.
//!
//! Concurrent misses for the same arguments are not coalesced: each caller
//! runs the operation and the last write wins.

use std::future::Future;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::cache::key::{build_key, CallArgs};
use crate::cache::{CachePolicy, HybridCache, SetOptions};

// == Cache Options ==
/// How a memoized operation stores its results.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheOptions {
    /// Key namespace
    pub prefix: String,
    /// TTL in seconds
    pub ttl: u64,
    /// Compress large values in L2
    pub compress: bool,
    /// Read from and mirror into L1
    pub use_l1: bool,
}

impl CacheOptions {
    pub fn new(prefix: impl Into<String>, ttl: u64) -> Self {
        Self {
            prefix: prefix.into(),
            ttl,
            compress: false,
            use_l1: true,
        }
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_l1(mut self, use_l1: bool) -> Self {
        self.use_l1 = use_l1;
        self
    }

    fn set_options(&self) -> SetOptions {
        SetOptions::new(self.ttl)
            .with_l1(self.use_l1)
            .with_compression(self.compress)
    }
}

impl From<&CachePolicy> for CacheOptions {
    fn from(policy: &CachePolicy) -> Self {
        Self {
            prefix: policy.prefix.clone(),
            ttl: policy.ttl,
            compress: policy.compress,
            use_l1: policy.use_l1,
        }
    }
}

// == Memoized ==
/// An operation whose results are cached by argument.
pub struct Memoized<F> {
    cache: Arc<HybridCache>,
    options: CacheOptions,
    op: F,
}

impl<F> Memoized<F> {
    pub fn new(cache: Arc<HybridCache>, options: CacheOptions, op: F) -> Self {
        Self { cache, options, op }
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    /// Key under which results for `args` are stored.
    pub fn key_for(&self, args: &CallArgs) -> String {
        build_key(&self.options.prefix, args)
    }

    /// Drops the cached result for `args`. Returns whether one existed.
    pub async fn invalidate(&self, args: &CallArgs) -> bool {
        let key = self.key_for(args);
        let removed = self.cache.delete(&key).await;
        debug!(key = %key, removed, "memoized entry invalidated");
        removed
    }

    /// Returns the cached result for `args`, or runs the operation and
    /// caches its output. Errors from the operation are returned as-is and
    /// nothing is cached.
    pub async fn call<Fut, T, E>(&self, args: CallArgs) -> Result<T, E>
    where
        F: Fn(CallArgs) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize + DeserializeOwned,
    {
        let key = self.key_for(&args);
        if let Some(value) = self.cache.get_with::<T>(&key, self.options.use_l1).await {
            return Ok(value);
        }

        debug!(key = %key, "memoized miss, invoking operation");
        let value = (self.op)(args).await?;
        self.cache.set(&key, &value, self.options.set_options()).await;
        Ok(value)
    }
}
