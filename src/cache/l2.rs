//! L2 Store Module
//!
//! Wraps a [`KvBackend`] with the codec, per-operation deadlines, lazy
//! connection and the rule that a cache failure never fails the caller:
//! transport, timeout and decode errors are logged and reported as a miss.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::cache::backend::{BackendInfo, KvBackend};
use crate::cache::codec;
use crate::cache::stats::hit_rate;
use crate::cache::{CacheStats, TierCounters};
use crate::error::{CacheError, Result};

// == L2 Info ==
/// Result of introspecting the distributed tier.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct L2Info {
    /// Whether the store answered
    pub connected: bool,
    /// Backend identifier
    pub backend: &'static str,
    /// Human-readable memory usage
    pub memory: String,
    /// Keys held by the store
    pub keys: u64,
    /// Keyspace hits reported by the store
    pub hits: u64,
    /// Keyspace misses reported by the store
    pub misses: u64,
    /// Hit percentage, rounded to 2 decimals
    pub hit_rate: f64,
}

impl L2Info {
    fn from_backend(backend: &'static str, info: BackendInfo) -> Self {
        Self {
            connected: true,
            backend,
            memory: info.used_memory,
            keys: info.keys,
            hits: info.hits,
            misses: info.misses,
            hit_rate: hit_rate(info.hits, info.misses),
        }
    }

    fn unavailable(backend: &'static str) -> Self {
        Self {
            connected: false,
            backend,
            memory: "0B".to_string(),
            keys: 0,
            hits: 0,
            misses: 0,
            hit_rate: 0.0,
        }
    }
}

// == L2 Store ==
/// Client for the distributed tier.
pub struct L2Store {
    backend: Arc<dyn KvBackend>,
    timeout: Duration,
    connect_attempted: AtomicBool,
    available: AtomicBool,
    connect_lock: Mutex<()>,
    counters: TierCounters,
}

impl L2Store {
    /// Creates the store; nothing is contacted until first use.
    pub fn new(backend: Arc<dyn KvBackend>, timeout: Duration) -> Self {
        Self {
            backend,
            timeout,
            connect_attempted: AtomicBool::new(false),
            available: AtomicBool::new(false),
            connect_lock: Mutex::new(()),
            counters: TierCounters::new(),
        }
    }

    // == Connect ==
    /// Verifies the store is reachable. Idempotent once it has succeeded.
    pub async fn connect(&self) -> Result<()> {
        if self.available.load(Ordering::Acquire) {
            return Ok(());
        }
        let _guard = self.connect_lock.lock().await;
        if self.available.load(Ordering::Acquire) {
            return Ok(());
        }
        self.connect_attempted.store(true, Ordering::Release);

        match tokio::time::timeout(self.timeout, self.backend.ping()).await {
            Ok(Ok(())) => {
                self.available.store(true, Ordering::Release);
                info!(backend = self.backend.name(), "L2 connected");
                Ok(())
            }
            Ok(Err(e)) => {
                warn!(backend = self.backend.name(), error = %e, "L2 unavailable, running L1-only");
                Err(e)
            }
            Err(_) => {
                let err = CacheError::Timeout(self.timeout_ms());
                warn!(backend = self.backend.name(), error = %err, "L2 unavailable, running L1-only");
                Err(err)
            }
        }
    }

    /// Whether the last operation reached the store.
    pub fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    fn timeout_ms(&self) -> u64 {
        self.timeout.as_millis() as u64
    }

    /// Runs one backend call under the deadline and tracks availability.
    ///
    /// Dropping the backend future on timeout abandons the call; pooled
    /// connections are recycled by the pool, never reused half-written.
    async fn run<T>(&self, op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
        if !self.connect_attempted.load(Ordering::Acquire) {
            // Failure is logged inside connect; the operation still tries.
            let _ = self.connect().await;
        }

        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => {
                self.available.store(true, Ordering::Release);
                Ok(value)
            }
            Ok(Err(e)) => {
                if matches!(e, CacheError::Transport(_)) {
                    self.available.store(false, Ordering::Release);
                }
                warn!(op, error = %e, "L2 operation failed");
                Err(e)
            }
            Err(_) => {
                self.available.store(false, Ordering::Release);
                let err = CacheError::Timeout(self.timeout_ms());
                warn!(op, error = %err, "L2 operation timed out");
                Err(err)
            }
        }
    }

    // == Get ==
    /// Returns the serialized (decompressed) bytes for `key`.
    pub async fn get_serialized(&self, key: &str) -> Option<Vec<u8>> {
        let raw = match self.run("get", self.backend.get(key)).await {
            Ok(raw) => raw,
            Err(_) => {
                self.counters.record_miss();
                return None;
            }
        };

        let Some(raw) = raw else {
            debug!(key = %key, "L2 miss");
            self.counters.record_miss();
            return None;
        };

        match codec::decode_bytes(&raw) {
            Ok(bytes) => {
                debug!(key = %key, "L2 hit");
                self.counters.record_hit();
                Some(bytes)
            }
            Err(e) => {
                self.counters.record_miss();
                self.discard_corrupt(key, &e).await;
                None
            }
        }
    }

    /// Fetches and deserializes a value. Any failure is a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get_serialized(key).await?;
        match codec::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                self.discard_corrupt(key, &e).await;
                None
            }
        }
    }

    async fn discard_corrupt(&self, key: &str, error: &CacheError) {
        warn!(key = %key, error = %error, "Discarding undecodable L2 entry");
        let _ = self.run("delete", self.backend.delete(key)).await;
    }

    // == Set ==
    /// Writes already-serialized bytes, compressing if requested.
    ///
    /// `ttl` is in seconds; 0 stores without expiry.
    pub async fn set_serialized(&self, key: &str, serialized: Vec<u8>, ttl: u64, compress: bool) -> bool {
        let encoded = match codec::encode_bytes(serialized, compress) {
            Ok(encoded) => encoded,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to encode L2 value");
                return false;
            }
        };
        self.run("set", self.backend.set(key, encoded, ttl))
            .await
            .is_ok()
    }

    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, ttl: u64, compress: bool) -> bool {
        match codec::serialize(value) {
            Ok(bytes) => self.set_serialized(key, bytes, ttl, compress).await,
            Err(e) => {
                warn!(key = %key, error = %e, "Failed to serialize L2 value");
                false
            }
        }
    }

    // == Delete ==
    /// Returns whether the store held the key.
    pub async fn delete(&self, key: &str) -> bool {
        self.run("delete", self.backend.delete(key))
            .await
            .unwrap_or(false)
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.run("exists", self.backend.exists(key))
            .await
            .unwrap_or(false)
    }

    /// Resets a key's TTL in seconds (0 removes the expiry).
    pub async fn expire(&self, key: &str, ttl: u64) -> bool {
        self.run("expire", self.backend.expire(key, ttl))
            .await
            .unwrap_or(false)
    }

    /// Atomically adds `delta`; `None` when the store is unavailable or the
    /// value is not an integer.
    pub async fn incr(&self, key: &str, delta: i64) -> Option<i64> {
        self.run("incr", self.backend.incr(key, delta)).await.ok()
    }

    // == Batched Get ==
    /// Fetches several keys; a corrupt or missing entry only affects itself.
    pub async fn get_many_serialized(&self, keys: &[String]) -> HashMap<String, Option<Vec<u8>>> {
        let raw = match self.run("mget", self.backend.mget(keys)).await {
            Ok(raw) => raw,
            Err(_) => {
                for _ in keys {
                    self.counters.record_miss();
                }
                return keys.iter().map(|k| (k.clone(), None)).collect();
            }
        };

        let mut result = HashMap::with_capacity(keys.len());
        let mut corrupt = Vec::new();
        for (key, value) in keys.iter().zip(raw.into_iter().chain(std::iter::repeat(None))) {
            let decoded = match value.map(|bytes| codec::decode_bytes(&bytes)) {
                Some(Ok(bytes)) => {
                    self.counters.record_hit();
                    Some(bytes)
                }
                Some(Err(e)) => {
                    self.counters.record_miss();
                    corrupt.push((key.clone(), e));
                    None
                }
                None => {
                    self.counters.record_miss();
                    None
                }
            };
            result.insert(key.clone(), decoded);
        }

        for (key, error) in corrupt {
            self.discard_corrupt(&key, &error).await;
        }
        result
    }

    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[String]) -> HashMap<String, Option<T>> {
        let serialized = self.get_many_serialized(keys).await;
        let mut result = HashMap::with_capacity(serialized.len());
        for (key, bytes) in serialized {
            let value = match bytes.map(|b| codec::deserialize::<T>(&b)) {
                Some(Ok(value)) => Some(value),
                Some(Err(e)) => {
                    self.discard_corrupt(&key, &e).await;
                    None
                }
                None => None,
            };
            result.insert(key, value);
        }
        result
    }

    // == Batched Set ==
    /// Writes several serialized values in one pipelined round trip.
    ///
    /// A value that fails to encode is skipped; the rest are still written.
    pub async fn set_many_serialized(&self, items: Vec<(String, Vec<u8>)>, ttl: u64, compress: bool) -> bool {
        let mut encoded = Vec::with_capacity(items.len());
        for (key, serialized) in items {
            match codec::encode_bytes(serialized, compress) {
                Ok(bytes) => encoded.push((key, bytes)),
                Err(e) => warn!(key = %key, error = %e, "Skipping unencodable value in batch"),
            }
        }
        self.run("mset", self.backend.mset(encoded, ttl))
            .await
            .is_ok()
    }

    pub async fn set_many<T: Serialize>(&self, items: &[(String, T)], ttl: u64, compress: bool) -> bool {
        let mut serialized = Vec::with_capacity(items.len());
        for (key, value) in items {
            match codec::serialize(value) {
                Ok(bytes) => serialized.push((key.clone(), bytes)),
                Err(e) => warn!(key = %key, error = %e, "Skipping unserializable value in batch"),
            }
        }
        self.set_many_serialized(serialized, ttl, compress).await
    }

    // == Clear Pattern ==
    /// Deletes every key matching `pattern` using an incremental scan.
    pub async fn clear_pattern(&self, pattern: &str) -> u64 {
        match self.run("scan_delete", self.backend.scan_delete(pattern)).await {
            Ok(count) => {
                info!(pattern = %pattern, removed = count, "L2 pattern cleared");
                count
            }
            Err(_) => 0,
        }
    }

    // == Info ==
    /// Liveness, memory, key count and keyspace hit rate of the store.
    pub async fn info(&self) -> L2Info {
        match self.run("info", self.backend.info()).await {
            Ok(info) => L2Info::from_backend(self.backend.name(), info),
            Err(_) => L2Info::unavailable(self.backend.name()),
        }
    }

    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }

    pub async fn close(&self) {
        self.backend.close().await;
        self.available.store(false, Ordering::Release);
    }
}
