//! Expiry sweeper: removes items whose `expiresAt` has passed

use copypasta_types::BulkOutcome;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use super::store::ItemStore;
use crate::error::StoreError;

/// Remove every item that expired before the store clock's current time.
/// Individual failures are counted and the sweep carries on.
pub fn sweep_expired(store: &ItemStore) -> Result<BulkOutcome, StoreError> {
    let now = store.clock().now();
    let expired = store.expired(&now)?;
    let mut outcome = BulkOutcome::default();

    for item in expired.into_iter().filter(|item| item.is_expired_at(now)) {
        match store.remove(&item.id) {
            Ok(_) => outcome.removed += 1,
            // Already removed by a user or a concurrent sweep
            Err(StoreError::NotFound(_)) => {}
            Err(e) => {
                log::warn!("[SWEEPER] Failed to remove expired item {}: {}", item.id, e);
                outcome.failed += 1;
            }
        }
    }

    if outcome.removed > 0 || outcome.failed > 0 {
        log::info!("[SWEEPER] Removed {} expired items ({} failed)", outcome.removed, outcome.failed);
    }
    Ok(outcome)
}

/// Run `sweep_expired` now and then every `interval` until the handle is aborted
pub fn spawn_expiry_sweeper(store: Arc<ItemStore>, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        log::info!("[SWEEPER] Started (interval: {}s)", interval.as_secs());
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let store = store.clone();
            match tokio::task::spawn_blocking(move || sweep_expired(&store)).await {
                Ok(Ok(_)) => {}
                Ok(Err(e)) => log::error!("[SWEEPER] Sweep failed: {}", e),
                Err(e) => log::error!("[SWEEPER] Sweep task panicked: {}", e),
            }
        }
    })
}
