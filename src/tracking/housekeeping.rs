//! Periodic purge of idle sources and expired blocks.
//!
//! Lazy eviction keeps the maps correct; this task only bounds their size
//! for sources that stop sending requests.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::broadcast;
use tokio::time;

use crate::inspection::RequestInspector;

pub struct Housekeeper {
    inspector: Arc<RequestInspector>,
    interval: Duration,
}

impl Housekeeper {
    pub fn new(inspector: Arc<RequestInspector>, interval: Duration) -> Self {
        Self {
            inspector,
            interval,
        }
    }

    /// Purge once. Returns (idle sources removed, expired blocks removed).
    pub fn sweep(&self, now: Instant) -> (usize, usize) {
        let window = self.inspector.policy().window;
        let idle = self.inspector.activity().purge_idle(now, window);
        let expired = self.inspector.blocks().purge_expired(now);
        (idle, expired)
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Housekeeping starting");

        let mut ticker = time::interval(self.interval);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let (idle, expired) = self.sweep(Instant::now());
                    if idle > 0 || expired > 0 {
                        tracing::debug!(idle, expired, "Purged inactive sources");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Housekeeping received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
