//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment variables.

use std::env;
use std::str::FromStr;

use crate::cache::EvictionStrategy;

/// Cache and admin server configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Maximum number of entries the in-process L1 tier can hold
    pub l1_max_entries: usize,
    /// Longest TTL (seconds) an entry may have and still be mirrored into L1.
    /// Also the TTL given to values promoted from L2.
    pub l1_ttl_ceiling: u64,
    /// Victim selection when L1 is full
    pub l1_eviction: EvictionStrategy,
    /// Use Redis as the L2 tier (otherwise an in-process backend is used)
    pub redis_enabled: bool,
    /// Redis connection URL
    pub redis_url: String,
    /// Maximum pooled Redis connections
    pub redis_pool_size: usize,
    /// Deadline for every L2 operation, in milliseconds
    pub redis_timeout_ms: u64,
    /// HTTP admin server port
    pub server_port: u16,
    /// Background L1 cleanup interval in seconds
    pub cleanup_interval: u64,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `L1_MAX_ENTRIES` - L1 capacity (default: 1000)
    /// - `L1_TTL_CEILING` - L1 eligibility ceiling in seconds (default: 300)
    /// - `L1_EVICTION` - `lfu` or `lru` (default: lfu)
    /// - `REDIS_ENABLED` - `true`/`1` to use Redis for L2 (default: false)
    /// - `REDIS_URL` - Redis URL (default: redis://127.0.0.1:6379)
    /// - `REDIS_POOL_SIZE` - Pool size (default: 16)
    /// - `REDIS_TIMEOUT_MS` - Per-operation timeout (default: 1000)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `CLEANUP_INTERVAL` - Cleanup frequency in seconds (default: 30)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            l1_max_entries: parse_var("L1_MAX_ENTRIES").unwrap_or(defaults.l1_max_entries),
            l1_ttl_ceiling: parse_var("L1_TTL_CEILING").unwrap_or(defaults.l1_ttl_ceiling),
            l1_eviction: parse_var("L1_EVICTION").unwrap_or(defaults.l1_eviction),
            redis_enabled: env::var("REDIS_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
                .unwrap_or(defaults.redis_enabled),
            redis_url: env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            redis_pool_size: parse_var("REDIS_POOL_SIZE").unwrap_or(defaults.redis_pool_size),
            redis_timeout_ms: parse_var("REDIS_TIMEOUT_MS").unwrap_or(defaults.redis_timeout_ms),
            server_port: parse_var("SERVER_PORT").unwrap_or(defaults.server_port),
            cleanup_interval: parse_var("CLEANUP_INTERVAL").unwrap_or(defaults.cleanup_interval),
        }
    }
}

fn parse_var<T: FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        Self {
            l1_max_entries: 1000,
            l1_ttl_ceiling: 300,
            l1_eviction: EvictionStrategy::Lfu,
            redis_enabled: false,
            redis_url: "redis://127.0.0.1:6379".to_string(),
            redis_pool_size: 16,
            redis_timeout_ms: 1000,
            server_port: 3000,
            cleanup_interval: 30,
        }
    }
}
