//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the cache is live.
//!
//! # Tasks
//! - L1 Cleanup: Removes expired L1 entries at configured intervals

mod cleanup;

pub use cleanup::spawn_cleanup_task;
