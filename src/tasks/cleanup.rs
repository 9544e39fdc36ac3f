//! TTL Cleanup Task
//!
//! Background task that periodically removes expired cache entries.

use std::sync::Weak;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::cache::CacheStore;

/// Spawns a background task that periodically sweeps expired entries.
///
/// The task holds only a weak reference and exits once the store has been
/// dropped. `CacheStore::destroy` aborts it explicitly.
///
/// # Example
/// ```ignore
/// let store = Arc::new(CacheStore::new(StoreConfig::new("search", ttl, 1000)));
/// let handle = spawn_cleanup_task(Arc::downgrade(&store), Duration::from_secs(300));
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_cleanup_task(store: Weak<CacheStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        if let Some(store) = store.upgrade() {
            info!(
                "Starting TTL cleanup for store '{}' every {:?}",
                store.name(),
                interval
            );
        }

        loop {
            tokio::time::sleep(interval).await;

            let Some(store) = store.upgrade() else {
                debug!("TTL cleanup: store dropped, stopping");
                break;
            };

            match store.cleanup() {
                Ok(0) => debug!("TTL cleanup '{}': no expired entries found", store.name()),
                Ok(removed) => info!(
                    "TTL cleanup '{}': removed {} expired entries",
                    store.name(),
                    removed
                ),
                Err(e) => warn!("TTL cleanup '{}' failed: {}", store.name(), e),
            }
        }
    })
}
