//! Heartbeat registration for a running service.
//!
//! # Responsibilities
//! - Register the instance immediately and then on every tick
//! - Unregister on shutdown so callers stop resolving it at once
//!
//! # Design Decisions
//! - The interval must stay below the registry's entry timeout
//! - A failed beat is logged; the next tick retries

use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time;

use crate::client::discovery::RegistryClient;

/// Shortest accepted beat interval; zero is clamped up to this.
pub const MIN_INTERVAL: Duration = Duration::from_millis(10);

pub struct Heartbeat {
    client: RegistryClient,
    name: String,
    version: String,
    port: u16,
    interval: Duration,
}

impl Heartbeat {
    pub fn new(
        client: RegistryClient,
        name: impl Into<String>,
        version: impl Into<String>,
        port: u16,
        interval: Duration,
    ) -> Self {
        Self {
            client,
            name: name.into(),
            version: version.into(),
            port,
            interval: interval.max(MIN_INTERVAL),
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        tracing::info!(
            service = %self.name,
            version = %self.version,
            port = self.port,
            interval_ms = self.interval.as_millis() as u64,
            "Heartbeat starting"
        );

        let mut ticker = time::interval(self.interval);
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.beat().await;
                }
                _ = shutdown.recv() => {
                    tracing::info!(service = %self.name, "Heartbeat received shutdown signal, unregistering");
                    self.unregister().await;
                    break;
                }
            }
        }
    }

    async fn beat(&self) {
        match self.client.register(&self.name, &self.version, self.port).await {
            Ok(key) => tracing::debug!(key = %key, "Heartbeat sent"),
            Err(e) => tracing::warn!(service = %self.name, error = %e, "Heartbeat failed"),
        }
    }

    async fn unregister(&self) {
        match self.client.unregister(&self.name, &self.version, self.port).await {
            Ok(key) => tracing::info!(key = %key, "Unregistered"),
            Err(e) => tracing::warn!(service = %self.name, error = %e, "Unregister failed"),
        }
    }
}
