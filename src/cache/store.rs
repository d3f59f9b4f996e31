//! L1 Store Module
//!
//! Bounded, TTL-aware in-process map. One mutex guards the map together with
//! its access bookkeeping; it is held only for the in-memory mutation.

use std::collections::HashMap;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{CacheEntry, CachePolicy, CacheStats, EvictionStrategy, TierCounters};

/// Map plus the monotonic access clock used to order evictions.
#[derive(Debug, Default)]
struct Inner {
    entries: HashMap<String, CacheEntry>,
    sequence: u64,
}

impl Inner {
    fn next_sequence(&mut self) -> u64 {
        self.sequence += 1;
        self.sequence
    }

    /// Removes every expired entry. Returns how many were dropped.
    fn purge_expired(&mut self) -> usize {
        let now = crate::cache::entry::current_timestamp_ms();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired_at(now));
        before - self.entries.len()
    }

    /// Picks the entry the strategy considers least valuable.
    fn victim(&self, strategy: EvictionStrategy) -> Option<String> {
        let candidates = self.entries.iter();
        let victim = match strategy {
            EvictionStrategy::Lfu => {
                candidates.min_by_key(|(_, e)| (e.access_count, e.last_access))
            }
            EvictionStrategy::Lru => candidates.min_by_key(|(_, e)| e.last_access),
        };
        victim.map(|(key, _)| key.clone())
    }
}

// == L1 Store ==
/// In-process cache tier.
#[derive(Debug)]
pub struct L1Store {
    inner: Mutex<Inner>,
    max_entries: usize,
    strategy: EvictionStrategy,
    counters: TierCounters,
}

impl L1Store {
    // == Constructor ==
    /// Creates a new store.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the store can hold
    /// * `strategy` - Victim selection once the store is full
    pub fn new(max_entries: usize, strategy: EvictionStrategy) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            max_entries: max_entries.max(1),
            strategy,
            counters: TierCounters::new(),
        }
    }

    /// Creates a store sized and configured by a policy.
    pub fn from_policy(policy: &CachePolicy) -> Self {
        Self::new(policy.max_size, policy.eviction)
    }

    // == Get ==
    /// Returns a copy of the stored bytes if present and unexpired.
    ///
    /// An expired entry is purged and counted as a miss.
    pub fn get(&self, key: &str) -> Option<Vec<u8>> {
        let value = {
            let mut inner = self.inner.lock();
            let sequence = inner.next_sequence();
            match inner.entries.get(key).map(|entry| entry.is_expired()) {
                Some(false) => inner.entries.get_mut(key).map(|entry| {
                    entry.touch(sequence);
                    entry.value.clone()
                }),
                Some(true) => {
                    inner.entries.remove(key);
                    None
                }
                None => None,
            }
        };

        match &value {
            Some(_) => self.counters.record_hit(),
            None => self.counters.record_miss(),
        }
        value
    }

    // == Set ==
    /// Stores a value, evicting first if the store is full.
    ///
    /// Overwrites reset the TTL and the access count.
    ///
    /// # Arguments
    /// * `key` - The key to store
    /// * `value` - Serialized value bytes
    /// * `ttl` - TTL in seconds, 0 means no expiry
    pub fn set(&self, key: &str, value: Vec<u8>, ttl: u64) {
        let evicted = {
            let mut inner = self.inner.lock();
            let mut evicted = None;
            if !inner.entries.contains_key(key) && inner.entries.len() >= self.max_entries {
                evicted = self.evict_locked(&mut inner);
            }
            let sequence = inner.next_sequence();
            inner
                .entries
                .insert(key.to_string(), CacheEntry::new(value, ttl, sequence));
            evicted
        };

        if let Some(victim) = evicted {
            self.counters.record_eviction();
            debug!(key = %victim, "L1 eviction");
        }
    }

    /// Two-phase eviction under the caller's lock: drop expired entries,
    /// then the single least valuable one if still at capacity.
    fn evict_locked(&self, inner: &mut Inner) -> Option<String> {
        inner.purge_expired();
        if inner.entries.len() < self.max_entries {
            return None;
        }
        let victim = inner.victim(self.strategy)?;
        inner.entries.remove(&victim);
        Some(victim)
    }

    // == Delete ==
    /// Removes an entry. Returns whether a live entry was present.
    pub fn delete(&self, key: &str) -> bool {
        let mut inner = self.inner.lock();
        match inner.entries.remove(key) {
            Some(entry) => !entry.is_expired(),
            None => false,
        }
    }

    /// Checks for a live entry without counting an access.
    pub fn contains(&self, key: &str) -> bool {
        let inner = self.inner.lock();
        inner
            .entries
            .get(key)
            .map(|entry| !entry.is_expired())
            .unwrap_or(false)
    }

    // == Cleanup Expired ==
    /// Removes all expired entries from the store.
    ///
    /// Returns the number of entries removed.
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge_expired()
    }

    /// Drops every entry.
    pub fn clear(&self) -> usize {
        let mut inner = self.inner.lock();
        let count = inner.entries.len();
        inner.entries.clear();
        count
    }

    // == Length ==
    /// Returns the current number of entries, expired-but-unpurged included.
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.max_entries
    }

    pub fn strategy(&self) -> EvictionStrategy {
        self.strategy
    }

    // == Stats ==
    pub fn stats(&self) -> CacheStats {
        self.counters.snapshot()
    }

    pub fn reset_stats(&self) {
        self.counters.reset();
    }
}
