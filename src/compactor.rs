use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::store::{DurableStore, StoreError};

const CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Compact the store's WAL once it has grown by `threshold` appends since the last compaction.
/// Returns whether a compaction ran.
pub async fn compact_if_needed(store: &DurableStore, threshold: u64) -> Result<bool, StoreError> {
    let appends = store.appends_since_compact().await;
    if appends < threshold {
        debug!("compactor: {appends} appends since last compaction, below {threshold}");
        return Ok(false);
    }
    store.compact().await?;
    Ok(true)
}

/// Background task that keeps the durable store's WAL from growing without bound.
pub async fn run_compactor(store: Arc<DurableStore>, threshold: u64) {
    let mut interval = tokio::time::interval(CHECK_INTERVAL);
    loop {
        interval.tick().await;
        if let Err(e) = compact_if_needed(&store, threshold).await {
            warn!("compaction failed: {e}");
        }
    }
}
