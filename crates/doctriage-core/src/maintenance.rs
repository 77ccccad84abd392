//! Recurring cache maintenance.
//!
//! A background task that runs [`ResultCache::cleanup`] on a fixed
//! interval until its cancellation token fires. The first sweep happens
//! one full interval after start, not immediately; opening the cache
//! already begins from a consistent state.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cache::ResultCache;

/// Periodic cleanup driver for one [`ResultCache`].
pub struct CacheMaintenance {
    cache: Arc<ResultCache>,
    interval: Duration,
}

impl CacheMaintenance {
    /// Create a driver sweeping `cache` every `interval`.
    pub fn new(cache: Arc<ResultCache>, interval: Duration) -> Self {
        Self { cache, interval }
    }

    /// Spawn the maintenance loop. It runs until `cancel` fires; the
    /// returned handle resolves once the loop has observed cancellation.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move { self.run(cancel).await })
    }

    async fn run(self, cancel: CancellationToken) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The interval fires immediately once; consume that so sweeps
        // start one full period in.
        ticker.tick().await;

        info!(interval_secs = self.interval.as_secs(), "cache maintenance started");
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("cache maintenance stopped");
                    return;
                }
                _ = ticker.tick() => {
                    match self.cache.cleanup().await {
                        Ok(stats) => {
                            debug!(
                                expired_deleted = stats.expired_deleted,
                                evicted = stats.evicted,
                                "maintenance sweep finished"
                            );
                        }
                        Err(err) => warn!(error = %err, "maintenance sweep failed"),
                    }
                }
            }
        }
    }
}
