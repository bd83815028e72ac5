//! TTL caching with stale-on-failure fallback.
//!
//! The cache layer has three pieces:
//!
//! - [`Storage`]: the injected persistent key-value capability.
//! - [`CacheStore`]: TTL bookkeeping, strict vs stale reads, write-through
//!   persistence, and grace-period sweeping.
//! - [`run_sweeper`]: a background loop that sweeps on the configured
//!   interval until cancelled.

mod storage;
mod store;

pub use storage::{MemoryStorage, Storage};
pub use store::{CacheStats, CacheStore};

use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Runs the periodic cache sweep until `cancel` fires.
///
/// Spawn this as a background task alongside the scheduler:
///
/// ```ignore
/// tokio::spawn(run_sweeper(Arc::clone(&cache), shutdown.clone()));
/// ```
pub async fn run_sweeper<S>(cache: Arc<CacheStore<S>>, cancel: CancellationToken)
where
    S: Storage + Send + Sync + 'static,
{
    let interval = cache.config().sweep_interval();
    info!(interval = ?interval, "Cache sweeper started");

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Cache sweeper stopped");
                break;
            }
            _ = tokio::time::sleep(interval) => {
                let evicted = cache.sweep().await;
                if evicted > 0 {
                    debug!(evicted, "Cache sweep evicted entries");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use bytes::Bytes;
    use std::time::Duration;

    #[tokio::test]
    async fn test_sweeper_evicts_past_grace() {
        let config = CacheConfig::new()
            .with_default_ttl(Duration::from_millis(10))
            .with_stale_grace_multiplier(1)
            .with_sweep_interval(Duration::from_millis(30));
        let cache = Arc::new(CacheStore::load(MemoryStorage::new(), config).await);
        cache.set("k", Bytes::from_static(b"v"), None).await;

        let cancel = CancellationToken::new();
        let sweeper = tokio::spawn(run_sweeper(Arc::clone(&cache), cancel.clone()));

        tokio::time::sleep(Duration::from_millis(100)).await;
        cancel.cancel();
        sweeper.await.unwrap();

        assert!(!cache.contains("k"));
        assert!(cache.stats().evictions >= 1);
    }
}
