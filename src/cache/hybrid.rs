//! Hybrid Cache Module
//!
//! Composes the in-process L1 and the distributed L2 into one logical cache.
//!
//! Reads check L1 first and fall through to L2, promoting L2 hits into L1
//! with the L1 TTL ceiling. Writes always go to L2 and are mirrored into L1
//! only for short-lived entries. When L2 is unreachable the cache keeps
//! working from L1 alone.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::cache::l2::{L2Info, L2Store};
use crate::cache::{codec, CacheStats, L1Store};

// == Set Options ==
/// Per-write settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SetOptions {
    /// TTL in seconds (0 = no expiry, L2 only)
    pub ttl: u64,
    /// Allow mirroring into L1
    pub use_l1: bool,
    /// Compress large values in L2
    pub compress: bool,
}

impl SetOptions {
    pub fn new(ttl: u64) -> Self {
        Self {
            ttl,
            use_l1: true,
            compress: false,
        }
    }

    pub fn with_l1(mut self, use_l1: bool) -> Self {
        self.use_l1 = use_l1;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }
}

// == Cache Info ==
/// Combined introspection of both tiers.
#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    /// "healthy" when L2 answers, "degraded" when running L1-only
    pub status: &'static str,
    #[serde(flatten)]
    pub l2: L2Info,
    pub l1_entries: usize,
    pub l1_capacity: usize,
    pub l1_ttl_ceiling: u64,
    pub l1_stats: CacheStats,
    pub l2_stats: CacheStats,
}

/// Per-tier counters as seen by this process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierStats {
    pub l1: CacheStats,
    pub l2: CacheStats,
}

// == Hybrid Cache ==
pub struct HybridCache {
    l1: Arc<L1Store>,
    l2: L2Store,
    l1_ttl_ceiling: u64,
}

impl HybridCache {
    /// # Arguments
    /// * `l1` - Shared in-process tier
    /// * `l2` - Distributed tier client
    /// * `l1_ttl_ceiling` - Longest TTL mirrored into L1; also the TTL of
    ///   values promoted from L2
    pub fn new(l1: Arc<L1Store>, l2: L2Store, l1_ttl_ceiling: u64) -> Self {
        Self {
            l1,
            l2,
            l1_ttl_ceiling,
        }
    }

    pub fn l1(&self) -> &Arc<L1Store> {
        &self.l1
    }

    pub fn l2(&self) -> &L2Store {
        &self.l2
    }

    pub fn l1_ttl_ceiling(&self) -> u64 {
        self.l1_ttl_ceiling
    }

    /// Whether a write with this TTL may be mirrored into L1.
    pub fn is_l1_eligible(&self, ttl: u64) -> bool {
        ttl > 0 && ttl <= self.l1_ttl_ceiling
    }

    // == Get ==
    /// Looks up `key` in L1 then L2.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.get_with(key, true).await
    }

    /// Looks up `key`, optionally skipping L1 entirely.
    pub async fn get_with<T: DeserializeOwned>(&self, key: &str, use_l1: bool) -> Option<T> {
        if use_l1 {
            if let Some(value) = self.l1_lookup(key) {
                debug!(key = %key, "cache hit (L1)");
                return Some(value);
            }
        }

        let bytes = self.l2.get_serialized(key).await?;
        let value = match codec::deserialize::<T>(&bytes) {
            Ok(value) => value,
            Err(e) => {
                warn!(key = %key, error = %e, "L2 value has unexpected shape, treating as miss");
                return None;
            }
        };

        if use_l1 {
            self.promote(key, bytes);
        }
        debug!(key = %key, "cache hit (L2)");
        Some(value)
    }

    /// Copies an L2 hit into L1 for at most the ceiling. A zero ceiling
    /// would mean "no expiry" in L1, so nothing is promoted then.
    fn promote(&self, key: &str, bytes: Vec<u8>) {
        if self.l1_ttl_ceiling > 0 {
            self.l1.set(key, bytes, self.l1_ttl_ceiling);
        }
    }

    fn l1_lookup<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.l1.get(key)?;
        match codec::deserialize(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(key = %key, error = %e, "L1 value has unexpected shape, dropping");
                self.l1.delete(key);
                None
            }
        }
    }

    // == Set ==
    /// Writes to L2 and, when eligible, to L1.
    ///
    /// Returns `true` if at least one tier stored the value.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T, options: SetOptions) -> bool {
        let serialized = match codec::serialize(value) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(key = %key, error = %e, "Refusing to cache unserializable value");
                return false;
            }
        };

        let in_l1 = options.use_l1 && self.is_l1_eligible(options.ttl);
        if in_l1 {
            self.l1.set(key, serialized.clone(), options.ttl);
        } else {
            // An older short-lived copy would shadow the new value.
            self.l1.delete(key);
        }
        let in_l2 = self
            .l2
            .set_serialized(key, serialized, options.ttl, options.compress)
            .await;

        if !in_l2 && !in_l1 {
            warn!(key = %key, ttl = options.ttl, "Value not cached: L2 unavailable and not L1-eligible");
        }
        in_l1 || in_l2
    }

    // == Delete ==
    /// Removes `key` from both tiers. Returns whether either held it.
    pub async fn delete(&self, key: &str) -> bool {
        let in_l1 = self.l1.delete(key);
        let in_l2 = self.l2.delete(key).await;
        in_l1 || in_l2
    }

    pub async fn exists(&self, key: &str) -> bool {
        self.l1.contains(key) || self.l2.exists(key).await
    }

    // == Batched Get ==
    /// Looks up several keys; each key resolves independently.
    pub async fn get_many<T: DeserializeOwned>(&self, keys: &[String], use_l1: bool) -> HashMap<String, Option<T>> {
        let mut result = HashMap::with_capacity(keys.len());
        let mut missing = Vec::new();

        for key in keys {
            match use_l1.then(|| self.l1_lookup::<T>(key)).flatten() {
                Some(value) => {
                    result.insert(key.clone(), Some(value));
                }
                None => missing.push(key.clone()),
            }
        }

        if missing.is_empty() {
            return result;
        }

        for (key, bytes) in self.l2.get_many_serialized(&missing).await {
            let value = bytes.and_then(|bytes| match codec::deserialize::<T>(&bytes) {
                Ok(value) => {
                    if use_l1 {
                        self.promote(&key, bytes);
                    }
                    Some(value)
                }
                Err(e) => {
                    warn!(key = %key, error = %e, "L2 value has unexpected shape, treating as miss");
                    None
                }
            });
            result.insert(key, value);
        }
        result
    }

    // == Batched Set ==
    /// Writes several values with one pipelined L2 round trip.
    pub async fn set_many<T: Serialize>(&self, items: &[(String, T)], options: SetOptions) -> bool {
        let in_l1 = options.use_l1 && self.is_l1_eligible(options.ttl);
        let mut serialized = Vec::with_capacity(items.len());
        for (key, value) in items {
            match codec::serialize(value) {
                Ok(bytes) => {
                    if in_l1 {
                        self.l1.set(key, bytes.clone(), options.ttl);
                    } else {
                        self.l1.delete(key);
                    }
                    serialized.push((key.clone(), bytes));
                }
                Err(e) => warn!(key = %key, error = %e, "Skipping unserializable value in batch"),
            }
        }
        let in_l2 = self
            .l2
            .set_many_serialized(serialized, options.ttl, options.compress)
            .await;
        in_l1 || in_l2
    }

    // == Invalidate ==
    /// Removes every key matching a glob pattern.
    ///
    /// L1 keeps no pattern index, so all of L1 is cleared; L2 is scanned and
    /// only matching keys are deleted. Returns the number of L2 keys removed.
    pub async fn invalidate_pattern(&self, pattern: &str) -> u64 {
        let cleared = self.l1.clear();
        let removed = self.l2.clear_pattern(pattern).await;
        info!(pattern = %pattern, l1_cleared = cleared, l2_removed = removed, "Pattern invalidated");
        removed
    }

    // == Info ==
    pub async fn info(&self) -> CacheInfo {
        let l2 = self.l2.info().await;
        CacheInfo {
            status: if l2.connected { "healthy" } else { "degraded" },
            l2,
            l1_entries: self.l1.len(),
            l1_capacity: self.l1.capacity(),
            l1_ttl_ceiling: self.l1_ttl_ceiling,
            l1_stats: self.l1.stats(),
            l2_stats: self.l2.stats(),
        }
    }

    pub fn stats(&self) -> TierStats {
        TierStats {
            l1: self.l1.stats(),
            l2: self.l2.stats(),
        }
    }

    pub fn reset_stats(&self) {
        self.l1.reset_stats();
        self.l2.reset_stats();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::backend::KvBackend;
    use crate::cache::{EvictionStrategy, MemoryBackend};
    use serde_json::{json, Value};
    use std::time::Duration;

    fn hybrid(max: usize) -> (Arc<MemoryBackend>, HybridCache) {
        let backend = Arc::new(MemoryBackend::new());
        let l2 = L2Store::new(backend.clone(), Duration::from_millis(200));
        let l1 = Arc::new(L1Store::new(max, EvictionStrategy::Lfu));
        (backend, HybridCache::new(l1, l2, 300))
    }

    #[tokio::test]
    async fn test_roundtrip_through_both_tiers() {
        let (backend, cache) = hybrid(10);
        assert!(cache.set("k", &json!({"title": "hi"}), SetOptions::new(60)).await);

        assert!(cache.l1().contains("k"));
        assert!(backend.exists("k").await.unwrap());
        assert_eq!(cache.get::<Value>("k").await, Some(json!({"title": "hi"})));
        assert_eq!(cache.stats().l1.hits, 1);
        assert_eq!(cache.stats().l2.hits, 0);
    }

    #[tokio::test]
    async fn test_long_ttl_is_not_mirrored_into_l1() {
        let (_, cache) = hybrid(10);
        cache.set("long", &1, SetOptions::new(3600)).await;
        cache.set("forever", &2, SetOptions::new(0)).await;
        cache.set("opt-out", &3, SetOptions::new(60).with_l1(false)).await;

        assert!(cache.l1().is_empty());
        assert_eq!(cache.get::<i32>("long").await, Some(1));
    }

    #[tokio::test]
    async fn test_l2_hit_is_promoted_with_capped_ttl() {
        let (_, cache) = hybrid(10);
        cache.set("long", &"v", SetOptions::new(86_400)).await;
        assert!(!cache.l1().contains("long"));

        assert_eq!(cache.get::<String>("long").await, Some("v".to_string()));
        assert!(cache.l1().contains("long"));

        // Second read is served by L1.
        assert_eq!(cache.get::<String>("long").await, Some("v".to_string()));
        let stats = cache.stats();
        assert_eq!(stats.l2.hits, 1);
        assert_eq!(stats.l1.hits, 1);
    }

    #[tokio::test]
    async fn test_get_without_l1_skips_promotion() {
        let (_, cache) = hybrid(10);
        cache.set("k", &5, SetOptions::new(3600)).await;

        assert_eq!(cache.get_with::<i32>("k", false).await, Some(5));
        assert!(!cache.l1().contains("k"));
        assert_eq!(cache.stats().l1, CacheStats::default());
    }

    #[tokio::test]
    async fn test_l2_outage_falls_back_to_l1() {
        let (backend, cache) = hybrid(10);
        backend.set_available(false);

        assert!(cache.set("k", &"still works", SetOptions::new(60)).await);
        assert_eq!(cache.get::<String>("k").await, Some("still works".to_string()));

        // Not L1-eligible and L2 is down: nothing stored, still no error.
        assert!(!cache.set("long", &"x", SetOptions::new(3600)).await);
        assert_eq!(cache.get::<String>("long").await, None);

        let info = cache.info().await;
        assert_eq!(info.status, "degraded");
        assert!(!info.l2.connected);
        assert_eq!(info.l1_entries, 1);
    }

    #[tokio::test]
    async fn test_delete_reports_presence_in_either_tier() {
        let (_, cache) = hybrid(10);
        cache.set("both", &1, SetOptions::new(60)).await;
        cache.set("l2-only", &1, SetOptions::new(3600)).await;

        assert!(cache.delete("both").await);
        assert!(cache.delete("l2-only").await);
        assert!(!cache.delete("both").await);
        assert_eq!(cache.get::<i32>("both").await, None);
    }

    #[tokio::test]
    async fn test_expiry_in_both_tiers() {
        let (_, cache) = hybrid(10);
        cache.set("short", &1, SetOptions::new(1)).await;
        assert!(cache.exists("short").await);

        tokio::time::sleep(Duration::from_millis(1100)).await;

        assert_eq!(cache.get::<i32>("short").await, None);
        assert!(!cache.exists("short").await);
    }

    #[tokio::test]
    async fn test_invalidate_pattern() {
        let (_, cache) = hybrid(10);
        cache.set("ns:1", &1, SetOptions::new(60)).await;
        cache.set("ns:2", &2, SetOptions::new(3600)).await;
        cache.set("other:1", &3, SetOptions::new(60)).await;

        assert_eq!(cache.invalidate_pattern("ns:*").await, 2);

        assert_eq!(cache.get::<i32>("ns:1").await, None);
        assert_eq!(cache.get::<i32>("ns:2").await, None);
        // L1 was cleared, but the L2 copy survives and is re-promoted.
        assert_eq!(cache.get::<i32>("other:1").await, Some(3));
    }

    #[tokio::test]
    async fn test_get_many_mixes_tiers() {
        let (_, cache) = hybrid(10);
        cache.set("a", &1, SetOptions::new(60)).await;
        cache.set("b", &2, SetOptions::new(3600)).await;

        let keys: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let values = cache.get_many::<i32>(&keys, true).await;

        assert_eq!(values["a"], Some(1));
        assert_eq!(values["b"], Some(2));
        assert_eq!(values["c"], None);
        assert!(cache.l1().contains("b"));
    }

    #[tokio::test]
    async fn test_set_many() {
        let (_, cache) = hybrid(10);
        let items = vec![("x".to_string(), "1"), ("y".to_string(), "2")];
        assert!(cache.set_many(&items, SetOptions::new(60)).await);

        assert_eq!(cache.l1().len(), 2);
        assert_eq!(cache.get_with::<String>("y", false).await, Some("2".to_string()));
    }

    #[tokio::test]
    async fn test_wrong_type_is_a_miss() {
        let (_, cache) = hybrid(10);
        cache.set("k", &"text", SetOptions::new(60)).await;
        assert_eq!(cache.get::<u32>("k").await, None);
    }

    #[tokio::test]
    async fn test_reset_stats() {
        let (_, cache) = hybrid(10);
        cache.get::<i32>("nothing").await;
        assert_eq!(cache.stats().l1.misses, 1);

        cache.reset_stats();
        assert_eq!(cache.stats().l1, CacheStats::default());
        assert_eq!(cache.stats().l2, CacheStats::default());
    }

    #[tokio::test]
    async fn test_overwrite_with_long_ttl_replaces_l1_copy() {
        let (_, cache) = hybrid(10);
        cache.set("k", &"v1", SetOptions::new(60)).await;
        assert!(cache.l1().contains("k"));

        cache.set("k", &"v2", SetOptions::new(3600)).await;
        assert!(!cache.l1().contains("k"));
        assert_eq!(cache.get::<String>("k").await, Some("v2".to_string()));

        cache.set("k", &"v3", SetOptions::new(0)).await;
        assert_eq!(cache.get::<String>("k").await, Some("v3".to_string()));
    }

    #[tokio::test]
    async fn test_overwrite_with_l1_opt_out_replaces_l1_copy() {
        let (_, cache) = hybrid(10);
        cache.set("k", &"v1", SetOptions::new(60)).await;
        cache.set("k", &"v2", SetOptions::new(60).with_l1(false)).await;

        assert_eq!(cache.get::<String>("k").await, Some("v2".to_string()));
    }

    #[tokio::test]
    async fn test_batched_overwrite_replaces_l1_copies() {
        let (_, cache) = hybrid(10);
        let first = vec![("a".to_string(), 1), ("b".to_string(), 2)];
        cache.set_many(&first, SetOptions::new(60)).await;

        let second = vec![("a".to_string(), 10), ("b".to_string(), 20)];
        cache.set_many(&second, SetOptions::new(3600)).await;

        let keys = vec!["a".to_string(), "b".to_string()];
        let values = cache.get_many::<i32>(&keys, true).await;
        assert_eq!(values["a"], Some(10));
        assert_eq!(values["b"], Some(20));
    }

    #[tokio::test]
    async fn test_zero_ceiling_disables_promotion() {
        let backend = Arc::new(MemoryBackend::new());
        let l2 = L2Store::new(backend, Duration::from_millis(200));
        let l1 = Arc::new(L1Store::new(10, EvictionStrategy::Lfu));
        let cache = HybridCache::new(l1, l2, 0);

        cache.set("k", &1, SetOptions::new(60)).await;
        assert_eq!(cache.get::<i32>("k").await, Some(1));
        assert!(cache.l1().is_empty());

        let keys = vec!["k".to_string()];
        assert_eq!(cache.get_many::<i32>(&keys, true).await["k"], Some(1));
        assert!(cache.l1().is_empty());
    }

    #[tokio::test]
    async fn test_huge_ttl_does_not_overflow() {
        let (_, cache) = hybrid(10);
        assert!(cache.set("k", &"v", SetOptions::new(u64::MAX / 100)).await);
        assert!(cache.set("max", &"v", SetOptions::new(u64::MAX)).await);
        assert_eq!(cache.get::<String>("k").await, Some("v".to_string()));
        assert_eq!(cache.get::<String>("max").await, Some("v".to_string()));
    }
}
