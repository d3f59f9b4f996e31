//! Cache Module
//!
//! Two-tier cache: a bounded in-process L1 with TTL and LFU/LRU eviction in
//! front of a shared L2 key-value store.

pub mod backend;
pub mod codec;
pub mod entry;
mod hybrid;
pub mod key;
pub mod l2;
mod manager;
mod memoize;
pub mod policy;
pub mod stats;
mod store;


// Re-export public types
pub use backend::{BackendInfo, KvBackend, MemoryBackend, RedisBackend};
pub use entry::CacheEntry;
pub use hybrid::{CacheInfo, HybridCache, SetOptions, TierStats};
pub use key::{build_key, CallArgs, KeyBuilder};
pub use l2::{L2Info, L2Store};
pub use manager::CacheManager;
pub use memoize::{CacheOptions, Memoized};
pub use policy::{CachePolicy, EvictionStrategy, PolicyRegistry, DEFAULT_POLICY};
pub use stats::{CacheStats, TierCounters};
pub use store::L1Store;

// == Public Constants ==
/// Maximum allowed key length in bytes
pub const MAX_KEY_LENGTH: usize = 256;
