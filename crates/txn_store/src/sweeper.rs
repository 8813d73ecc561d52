//! Background purge of expired records.
//!
//! Expiry is already enforced on every read, so the sweeper only reclaims
//! space. Transaction semantics never depend on it running.

use crate::TtlStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Spawn a task that calls [`TtlStore::purge_expired`] every `interval`.
///
/// The task runs until the returned handle is aborted or the runtime shuts down.
pub fn spawn_sweeper(store: Arc<dyn TtlStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match store.purge_expired().await {
                Ok(0) => debug!("Sweeper found no expired records"),
                Ok(n) => info!("Purged {} expired records from {}", n, store.backend_name()),
                Err(e) => warn!("Expired record purge failed: {}", e),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryTtlStore;
    use serde_json::json;

    #[tokio::test(start_paused = true)]
    async fn test_sweeper_purges_on_interval() {
        let store = Arc::new(MemoryTtlStore::new());
        store.set_with_ttl("short", &json!(1), 1).await.unwrap();
        store.set_with_ttl("long", &json!(2), 3600).await.unwrap();

        let handle = spawn_sweeper(store.clone(), Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(store.entry_count().await, 1);
        handle.abort();
    }
}
