//! Policy Registry Module
//!
//! Named, immutable cache policies per logical domain, held behind an atomic
//! pointer so a reload never exposes a half-updated set to readers.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::Serialize;
use tracing::info;

use crate::error::{CacheError, Result};

// == Eviction Strategy ==
/// How the L1 tier picks a victim when it is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EvictionStrategy {
    /// Least recently used
    Lru,
    /// Least frequently used, ties broken by recency
    #[default]
    Lfu,
}

impl FromStr for EvictionStrategy {
    type Err = CacheError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lru" => Ok(EvictionStrategy::Lru),
            "lfu" => Ok(EvictionStrategy::Lfu),
            other => Err(CacheError::Configuration(format!(
                "unknown eviction strategy '{}'",
                other
            ))),
        }
    }
}

impl fmt::Display for EvictionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EvictionStrategy::Lru => write!(f, "lru"),
            EvictionStrategy::Lfu => write!(f, "lfu"),
        }
    }
}

// == Cache Policy ==
/// Configuration for one logical cache domain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CachePolicy {
    /// Domain name used for lookup
    pub name: String,
    /// Key namespace for entries produced under this policy
    pub prefix: String,
    /// TTL in seconds (0 = no expiry)
    pub ttl: u64,
    /// Maximum entries for an L1 store built from this policy.
    ///
    /// Only read by [`L1Store::from_policy`](crate::cache::L1Store::from_policy).
    /// The process-wide L1 is sized from the `default` policy, so this is
    /// informational for every other domain.
    pub max_size: usize,
    /// Eviction strategy for an L1 store built from this policy; same scope
    /// as `max_size`.
    pub eviction: EvictionStrategy,
    /// Compress large values before writing to L2
    pub compress: bool,
    /// Mirror entries into L1
    pub use_l1: bool,
}

impl CachePolicy {
    /// Creates a policy whose key prefix equals its name.
    pub fn new(name: impl Into<String>, ttl: u64, max_size: usize) -> Self {
        let name = name.into();
        Self {
            prefix: name.clone(),
            name,
            ttl,
            max_size,
            eviction: EvictionStrategy::default(),
            compress: false,
            use_l1: true,
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn with_eviction(mut self, eviction: EvictionStrategy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn with_compression(mut self, compress: bool) -> Self {
        self.compress = compress;
        self
    }

    pub fn with_l1(mut self, use_l1: bool) -> Self {
        self.use_l1 = use_l1;
        self
    }

    fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            return Err(CacheError::Configuration(
                "policy name cannot be empty".to_string(),
            ));
        }
        if self.max_size == 0 {
            return Err(CacheError::Configuration(format!(
                "policy '{}' must allow at least one entry",
                self.name
            )));
        }
        Ok(())
    }
}

/// Name of the policy that sizes the shared L1 tier.
pub const DEFAULT_POLICY: &str = "default";

// == Policy Registry ==
/// Process-wide lookup of cache policies by name.
///
/// Reads are lock-free. `register` and `replace_all` publish a fresh map with
/// a single atomic store.
pub struct PolicyRegistry {
    policies: ArcSwap<HashMap<String, Arc<CachePolicy>>>,
}

impl PolicyRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            policies: ArcSwap::from_pointee(HashMap::new()),
        }
    }

    /// Creates a registry pre-populated with the built-in domains.
    pub fn with_defaults() -> Self {
        let registry = Self::new();
        let defaults = [
            CachePolicy::new(DEFAULT_POLICY, 300, 1000),
            CachePolicy::new("keyword-analysis", 3600, 500)
                .with_prefix("kw")
                .with_compression(true),
            CachePolicy::new("title-generation", 1800, 500).with_prefix("title"),
            CachePolicy::new("api-response", 300, 1000)
                .with_prefix("api")
                .with_eviction(EvictionStrategy::Lru),
            CachePolicy::new("trending", 86400, 100)
                .with_prefix("trend")
                .with_compression(true)
                .with_l1(false),
        ];
        for policy in defaults {
            // Built-in policies are always valid.
            let _ = registry.register(policy);
        }
        registry
    }

    /// Adds or replaces a single policy.
    pub fn register(&self, policy: CachePolicy) -> Result<()> {
        policy.validate()?;
        let policy = Arc::new(policy);
        self.policies.rcu(|current| {
            let mut next = HashMap::clone(current);
            next.insert(policy.name.clone(), Arc::clone(&policy));
            next
        });
        Ok(())
    }

    /// Swaps in a complete new policy set.
    pub fn replace_all(&self, policies: Vec<CachePolicy>) -> Result<()> {
        let mut next = HashMap::with_capacity(policies.len());
        for policy in policies {
            policy.validate()?;
            next.insert(policy.name.clone(), Arc::new(policy));
        }
        let count = next.len();
        self.policies.store(Arc::new(next));
        info!("Policy registry reloaded with {} policies", count);
        Ok(())
    }

    /// Looks up a policy by name.
    pub fn get(&self, name: &str) -> Option<Arc<CachePolicy>> {
        self.policies.load().get(name).cloned()
    }

    /// Like `get`, but unknown names are a configuration error.
    pub fn require(&self, name: &str) -> Result<Arc<CachePolicy>> {
        self.get(name)
            .ok_or_else(|| CacheError::Configuration(format!("unknown cache policy '{}'", name)))
    }

    /// Returns all policies sorted by name.
    pub fn all(&self) -> Vec<Arc<CachePolicy>> {
        let mut policies: Vec<_> = self.policies.load().values().cloned().collect();
        policies.sort_by(|a, b| a.name.cmp(&b.name));
        policies
    }

    /// Registered policy names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<_> = self.policies.load().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.policies.load().len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.load().is_empty()
    }
}

impl Default for PolicyRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("policies", &self.policies.load().keys().collect::<Vec<_>>())
            .finish()
    }
}
