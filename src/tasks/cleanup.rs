//! L1 Cleanup Task
//!
//! Background task that periodically reclaims expired L1 entries that are
//! never read again. Reads still expire entries lazily on their own.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::cache::L1Store;

/// Spawns a background task that purges expired L1 entries every
/// `cleanup_interval_secs` seconds.
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let l1 = Arc::new(L1Store::new(1000, EvictionStrategy::Lfu));
/// let cleanup_handle = spawn_cleanup_task(l1.clone(), 30);
/// // Later, during shutdown:
/// cleanup_handle.abort();
/// ```
pub fn spawn_cleanup_task(l1: Arc<L1Store>, cleanup_interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(cleanup_interval_secs);

    tokio::spawn(async move {
        info!(
            "Starting L1 cleanup task with interval of {} seconds",
            cleanup_interval_secs
        );

        loop {
            tokio::time::sleep(interval).await;

            let removed = l1.purge_expired();
            if removed > 0 {
                info!(removed, remaining = l1.len(), "L1 cleanup removed expired entries");
            } else {
                debug!("L1 cleanup: no expired entries found");
            }
        }
    })
}
