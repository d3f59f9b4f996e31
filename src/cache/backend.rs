//! Distributed Tier Backends
//!
//! The L2 tier talks to any key-value store exposing get/set/delete/exists/
//! expire/incr/mget/pipelined-mset/scan/info semantics. [`RedisBackend`] is
//! the production implementation; [`MemoryBackend`] keeps the same contract
//! in-process for single-instance deployments and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Pool, PoolConfig, Runtime};
use parking_lot::Mutex;
use redis::AsyncCommands;
use regex::Regex;
use tracing::info;

use crate::cache::entry::current_timestamp_ms;
use crate::error::{CacheError, Result};

/// Keys requested per SCAN round trip.
const SCAN_BATCH: usize = 100;

// == Backend Info ==
/// Server-side view of the distributed store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BackendInfo {
    /// Human-readable memory usage
    pub used_memory: String,
    /// Number of keys in the keyspace
    pub keys: u64,
    /// Keyspace lookups that found a key
    pub hits: u64,
    /// Keyspace lookups that found nothing
    pub misses: u64,
}

// == Backend Trait ==
/// Raw byte-level operations against the distributed store.
///
/// TTLs are in seconds; 0 means "no expiry".
#[async_trait]
pub trait KvBackend: Send + Sync {
    /// Round-trips to the store to verify it is reachable.
    async fn ping(&self) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<()>;

    /// Returns whether the key existed.
    async fn delete(&self, key: &str) -> Result<bool>;

    async fn exists(&self, key: &str) -> Result<bool>;

    /// Resets a key's TTL. Returns whether the key exists.
    async fn expire(&self, key: &str, ttl: u64) -> Result<bool>;

    /// Adds `delta` to an integer value, creating it at 0 first.
    async fn incr(&self, key: &str, delta: i64) -> Result<i64>;

    /// Fetches several keys at once; the result is aligned with `keys`.
    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Writes several keys in one pipelined round trip.
    async fn mset(&self, items: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<()>;

    /// Incrementally scans for keys matching a glob and deletes them.
    async fn scan_delete(&self, pattern: &str) -> Result<u64>;

    async fn info(&self) -> Result<BackendInfo>;

    /// Releases pooled resources.
    async fn close(&self) {}

    fn name(&self) -> &'static str;
}

// == Redis Backend ==
/// Pooled Redis client.
pub struct RedisBackend {
    pool: Pool,
    url: String,
}

impl RedisBackend {
    /// Creates the pool. No connection is opened until first use.
    ///
    /// # Arguments
    /// * `url` - Redis connection URL
    /// * `pool_size` - Maximum concurrent connections
    /// * `timeout` - Wait/create/recycle deadline for pooled connections
    pub fn new(url: &str, pool_size: usize, timeout: Duration) -> Result<Self> {
        let mut config = deadpool_redis::Config::from_url(url);
        let mut pool_config = PoolConfig::new(pool_size.max(1));
        pool_config.timeouts.wait = Some(timeout);
        pool_config.timeouts.create = Some(timeout);
        pool_config.timeouts.recycle = Some(timeout);
        config.pool = Some(pool_config);

        let pool = config
            .create_pool(Some(Runtime::Tokio1))
            .map_err(|e| CacheError::Transport(format!("failed to create Redis pool: {}", e)))?;

        info!(url = %url, pool_size, "Redis pool created");
        Ok(Self {
            pool,
            url: url.to_string(),
        })
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection> {
        Ok(self.pool.get().await?)
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl KvBackend for RedisBackend {
    async fn ping(&self) -> Result<()> {
        let mut conn = self.conn().await?;
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        Ok(conn.get::<_, Option<Vec<u8>>>(key).await?)
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<()> {
        let mut conn = self.conn().await?;
        if ttl > 0 {
            conn.set_ex::<_, _, ()>(key, value, ttl).await?;
        } else {
            conn.set::<_, _, ()>(key, value).await?;
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        let deleted: i64 = conn.del(key).await?;
        Ok(deleted > 0)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        Ok(conn.exists(key).await?)
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool> {
        let mut conn = self.conn().await?;
        if ttl > 0 {
            Ok(conn.expire(key, ttl as i64).await?)
        } else {
            let _: bool = conn.persist(key).await?;
            Ok(conn.exists(key).await?)
        }
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        let mut conn = self.conn().await?;
        Ok(conn.incr(key, delta).await?)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let mut conn = self.conn().await?;
        let values: Vec<Option<Vec<u8>>> = redis::cmd("MGET")
            .arg(keys)
            .query_async(&mut conn)
            .await?;
        Ok(values)
    }

    async fn mset(&self, items: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<()> {
        if items.is_empty() {
            return Ok(());
        }
        let mut conn = self.conn().await?;
        let mut pipe = redis::pipe();
        for (key, value) in &items {
            if ttl > 0 {
                pipe.set_ex(key, value, ttl).ignore();
            } else {
                pipe.set(key, value).ignore();
            }
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let mut cursor: u64 = 0;
        let mut total_deleted = 0;

        loop {
            let (next_cursor, keys): (u64, Vec<String>) = redis::cmd("SCAN")
                .arg(cursor)
                .arg("MATCH")
                .arg(pattern)
                .arg("COUNT")
                .arg(SCAN_BATCH)
                .query_async(&mut conn)
                .await?;

            if !keys.is_empty() {
                let deleted: i64 = conn.del(&keys).await?;
                total_deleted += deleted as u64;
            }

            cursor = next_cursor;
            if cursor == 0 {
                break;
            }
        }

        Ok(total_deleted)
    }

    async fn info(&self) -> Result<BackendInfo> {
        let mut conn = self.conn().await?;
        let raw: String = redis::cmd("INFO").query_async(&mut conn).await?;
        let keys: u64 = redis::cmd("DBSIZE").query_async(&mut conn).await?;
        Ok(parse_info(&raw, keys))
    }

    async fn close(&self) {
        self.pool.close();
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

/// Pulls memory and keyspace counters out of an `INFO` reply.
fn parse_info(raw: &str, keys: u64) -> BackendInfo {
    let mut info = BackendInfo {
        used_memory: "0B".to_string(),
        keys,
        ..Default::default()
    };
    for line in raw.lines() {
        let Some((field, value)) = line.trim().split_once(':') else {
            continue;
        };
        match field {
            "used_memory_human" => info.used_memory = value.to_string(),
            "keyspace_hits" => info.hits = value.parse().unwrap_or(0),
            "keyspace_misses" => info.misses = value.parse().unwrap_or(0),
            _ => {}
        }
    }
    info
}

// == Memory Backend ==
#[derive(Debug, Clone)]
struct StoredValue {
    bytes: Vec<u8>,
    expires_at: Option<u64>,
}

impl StoredValue {
    fn new(bytes: Vec<u8>, ttl: u64) -> Self {
        Self {
            bytes,
            expires_at: expiry(ttl),
        }
    }

    fn is_live(&self, now: u64) -> bool {
        self.expires_at.map(|at| now < at).unwrap_or(true)
    }
}

fn expiry(ttl: u64) -> Option<u64> {
    (ttl > 0).then(|| current_timestamp_ms().saturating_add(ttl.saturating_mul(1000)))
}

/// In-process store with Redis-like semantics.
///
/// Can be marked unavailable or given artificial latency to exercise the
/// cache's degraded paths.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    data: Mutex<HashMap<String, StoredValue>>,
    hits: AtomicU64,
    misses: AtomicU64,
    unavailable: AtomicBool,
    latency: Mutex<Option<Duration>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates the store going down or coming back.
    pub fn set_available(&self, available: bool) {
        self.unavailable.store(!available, Ordering::SeqCst);
    }

    /// Delays every subsequent operation.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// Writes bytes verbatim, bypassing any encoding.
    pub fn insert_raw(&self, key: &str, bytes: Vec<u8>) {
        self.data
            .lock()
            .insert(key.to_string(), StoredValue::new(bytes, 0));
    }

    async fn check(&self) -> Result<()> {
        let latency = *self.latency.lock();
        if let Some(delay) = latency {
            tokio::time::sleep(delay).await;
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(CacheError::Transport("connection refused".to_string()));
        }
        Ok(())
    }

    fn live_value(&self, key: &str) -> Option<Vec<u8>> {
        let now = current_timestamp_ms();
        let mut data = self.data.lock();
        match data.get(key) {
            Some(stored) if stored.is_live(now) => Some(stored.bytes.clone()),
            Some(_) => {
                data.remove(key);
                None
            }
            None => None,
        }
    }

    fn lookup(&self, key: &str) -> Option<Vec<u8>> {
        let value = self.live_value(key);
        match value {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };
        value
    }
}

#[async_trait]
impl KvBackend for MemoryBackend {
    async fn ping(&self) -> Result<()> {
        self.check().await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check().await?;
        Ok(self.lookup(key))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: u64) -> Result<()> {
        self.check().await?;
        self.data
            .lock()
            .insert(key.to_string(), StoredValue::new(value, ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        self.check().await?;
        let now = current_timestamp_ms();
        Ok(self
            .data
            .lock()
            .remove(key)
            .map(|stored| stored.is_live(now))
            .unwrap_or(false))
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        self.check().await?;
        Ok(self.live_value(key).is_some())
    }

    async fn expire(&self, key: &str, ttl: u64) -> Result<bool> {
        self.check().await?;
        let now = current_timestamp_ms();
        let mut data = self.data.lock();
        match data.get_mut(key) {
            Some(stored) if stored.is_live(now) => {
                stored.expires_at = expiry(ttl);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn incr(&self, key: &str, delta: i64) -> Result<i64> {
        self.check().await?;
        let now = current_timestamp_ms();
        let mut data = self.data.lock();
        let (current, expires_at) = match data.get(key) {
            Some(stored) if stored.is_live(now) => {
                let text = std::str::from_utf8(&stored.bytes).map_err(|_| {
                    CacheError::InvalidRequest("value is not an integer".to_string())
                })?;
                let current: i64 = text.parse().map_err(|_| {
                    CacheError::InvalidRequest("value is not an integer".to_string())
                })?;
                (current, stored.expires_at)
            }
            _ => (0, None),
        };
        let next = current
            .checked_add(delta)
            .ok_or_else(|| CacheError::InvalidRequest("increment would overflow".to_string()))?;
        data.insert(
            key.to_string(),
            StoredValue {
                bytes: next.to_string().into_bytes(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Option<Vec<u8>>>> {
        self.check().await?;
        Ok(keys.iter().map(|key| self.lookup(key)).collect())
    }

    async fn mset(&self, items: Vec<(String, Vec<u8>)>, ttl: u64) -> Result<()> {
        self.check().await?;
        let mut data = self.data.lock();
        for (key, value) in items {
            data.insert(key, StoredValue::new(value, ttl));
        }
        Ok(())
    }

    async fn scan_delete(&self, pattern: &str) -> Result<u64> {
        self.check().await?;
        let matcher = glob_to_regex(pattern)?;
        let now = current_timestamp_ms();
        let mut data = self.data.lock();
        let before = data.len();
        let mut expired = 0;
        data.retain(|key, stored| {
            if !matcher.is_match(key) {
                return true;
            }
            if !stored.is_live(now) {
                expired += 1;
            }
            false
        });
        Ok((before - data.len() - expired) as u64)
    }

    async fn info(&self) -> Result<BackendInfo> {
        self.check().await?;
        let now = current_timestamp_ms();
        let data = self.data.lock();
        let live: Vec<&StoredValue> = data.values().filter(|v| v.is_live(now)).collect();
        let bytes: usize = live.iter().map(|v| v.bytes.len()).sum();
        Ok(BackendInfo {
            used_memory: format!("{}B", bytes),
            keys: live.len() as u64,
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
        })
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

/// Translates a Redis-style glob (`*`, `?`, `[...]`, `\x`) into an anchored regex.
pub fn glob_to_regex(pattern: &str) -> Result<Regex> {
    let mut out = String::with_capacity(pattern.len() * 2 + 2);
    out.push('^');
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                out.push('[');
                let mut first = true;
                for inner in chars.by_ref() {
                    match inner {
                        ']' => break,
                        '!' | '^' if first => out.push('^'),
                        '\\' => out.push_str("\\\\"),
                        other => out.push(other),
                    }
                    first = false;
                }
                out.push(']');
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push_str(&regex::escape(&escaped.to_string()));
                }
            }
            other => out.push_str(&regex::escape(&other.to_string())),
        }
    }
    out.push('$');
    Regex::new(&out).map_err(|e| CacheError::InvalidRequest(format!("invalid pattern: {}", e)))
}
