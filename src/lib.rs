//! Hybrid Cache - two-tier application cache
//!
//! A bounded in-process L1 with TTLs and LFU/LRU eviction in front of a
//! shared Redis L2, with named policies, memoization of async operations,
//! and a small admin HTTP API.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;

pub use api::AppState;
pub use cache::{CacheManager, CacheOptions, HybridCache, PolicyRegistry, SetOptions};
pub use config::Config;
pub use error::{CacheError, Result};
pub use tasks::spawn_cleanup_task;
