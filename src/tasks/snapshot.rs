//! Periodic Snapshot Task
//!
//! Background task that writes the cache to its snapshot path at a fixed
//! interval, so a crash loses at most one interval of writes.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::cache::StringCache;

/// Spawns a background task that periodically persists the cache.
///
/// The store lock is taken on a blocking thread, so a large snapshot never
/// stalls the runtime. A failed write is logged and retried on the next tick.
///
/// # Arguments
/// * `cache` - Shared store with a snapshot path configured
/// * `interval_secs` - Seconds between snapshots, must be non-zero
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
pub fn spawn_snapshot_task(cache: Arc<StringCache>, interval_secs: u64) -> JoinHandle<()> {
    let period = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting snapshot task with interval of {} seconds",
            period.as_secs()
        );

        let mut ticker = tokio::time::interval(period);
        // The first tick completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let store = Arc::clone(&cache);
            match tokio::task::spawn_blocking(move || store.shutdown()).await {
                Ok(Ok(())) => debug!("Periodic snapshot written ({} entries)", cache.size()),
                Ok(Err(e)) => error!("Periodic snapshot failed: {}", e),
                Err(e) => error!("Periodic snapshot task panicked: {}", e),
            }
        }
    })
}
