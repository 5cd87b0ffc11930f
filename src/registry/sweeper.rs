//! Periodic expiry sweep.
//!
//! Lookups and registrations already sweep on access. The sweeper bounds
//! staleness during quiet periods with no traffic at all.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::registry::store::ServiceRegistry;

pub struct Sweeper {
    registry: Arc<ServiceRegistry>,
    interval: Duration,
}

impl Sweeper {
    pub fn new(registry: Arc<ServiceRegistry>, interval: Duration) -> Self {
        Self { registry, interval }
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(interval_secs = self.interval.as_secs(), "Registry sweeper starting");

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = self.registry.cleanup();
                    if removed > 0 {
                        tracing::info!(removed, "Swept expired services");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::info!("Registry sweeper received shutdown signal, exiting loop");
                    break;
                }
            }
        }
    }
}
