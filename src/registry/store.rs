//! In-memory directory of live service instances.
//!
//! # Responsibilities
//! - Upsert instances on register (heartbeat refreshes `last_seen`)
//! - Remove instances on unregister
//! - Filter by name and version range, pick one candidate
//! - Expire instances not seen within the entry timeout
//!
//! # Design Decisions
//! - Sharded `DashMap`: mutations lock one shard, never the whole table
//! - Readers get clones, so a lookup never sees a half-updated instance
//! - Expiry runs on every register/get; a periodic sweeper is optional

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::RegistryConfig;
use crate::observability::metrics;
use crate::registry::instance::{epoch_seconds, RegistrationKey, ServiceInstance};
use crate::registry::selector::{RandomSelector, Selector};
use crate::registry::version::VersionRange;
use crate::resilience::clock::{elapsed_since, system_clock, Clock};

/// Default time after which an instance that stopped heartbeating expires.
pub const DEFAULT_ENTRY_TIMEOUT: Duration = Duration::from_secs(30);

/// The service registry.
#[derive(Debug)]
pub struct ServiceRegistry {
    instances: DashMap<RegistrationKey, ServiceInstance>,
    timeout: Duration,
    clock: Arc<dyn Clock>,
    selector: Box<dyn Selector>,
}

impl ServiceRegistry {
    /// Create a registry on the system clock with uniform random selection.
    pub fn new(timeout: Duration) -> Self {
        Self::with_clock(timeout, system_clock())
    }

    pub fn with_clock(timeout: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            instances: DashMap::new(),
            timeout,
            clock,
            selector: Box::new(RandomSelector::new()),
        }
    }

    pub fn from_config(config: &RegistryConfig) -> Self {
        Self::new(Duration::from_secs(config.entry_timeout_secs))
    }

    /// Replace the selection policy.
    pub fn with_selector(mut self, selector: Box<dyn Selector>) -> Self {
        self.selector = selector;
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Register an instance, or refresh it if already known.
    pub fn register(&self, name: &str, version: &str, host: &str, port: u16) -> RegistrationKey {
        self.cleanup();
        let key = RegistrationKey::new(name, version, host, port);
        let now = self.clock.now();

        match self.instances.entry(key.clone()) {
            Entry::Occupied(mut entry) => {
                entry.get_mut().last_seen = now;
                tracing::debug!(%key, last_seen = epoch_seconds(now), "Updated service");
            }
            Entry::Vacant(entry) => {
                entry.insert(ServiceInstance::new(&key, now));
                tracing::debug!(%key, "Added service");
            }
        }

        metrics::record_registry_operation("register");
        metrics::record_registry_size(self.instances.len());
        key
    }

    /// Remove an instance. Unknown instances are ignored.
    pub fn unregister(&self, name: &str, version: &str, host: &str, port: u16) -> RegistrationKey {
        let key = RegistrationKey::new(name, version, host, port);
        if self.instances.remove(&key).is_some() {
            tracing::debug!(%key, "Unregistered service");
        } else {
            tracing::debug!(%key, "Unregister for unknown service ignored");
        }

        metrics::record_registry_operation("unregister");
        metrics::record_registry_size(self.instances.len());
        key
    }

    /// Find one live instance of `name` whose version satisfies `constraint`.
    ///
    /// `None` means the service is currently unavailable; a malformed
    /// constraint matches nothing.
    pub fn get(&self, name: &str, constraint: &str) -> Option<ServiceInstance> {
        self.cleanup();
        metrics::record_registry_operation("get");

        let range = match VersionRange::parse(constraint) {
            Ok(range) => range,
            Err(e) => {
                tracing::debug!(service = %name, error = %e, "Lookup with unusable version range");
                return None;
            }
        };

        let candidates: Vec<ServiceInstance> = self
            .instances
            .iter()
            .filter(|entry| entry.name == name && range.matches(&entry.version))
            .map(|entry| entry.value().clone())
            .collect();

        let picked = self.selector.select(&candidates).cloned();
        if picked.is_none() {
            tracing::debug!(service = %name, constraint = %constraint, "No matching instance");
        }
        picked
    }

    /// Drop every instance not seen within the timeout. Returns how many were removed.
    pub fn cleanup(&self) -> usize {
        let now = self.clock.now();
        let before = self.instances.len();

        self.instances.retain(|key, instance| {
            let alive = elapsed_since(now, instance.last_seen) <= self.timeout;
            if !alive {
                tracing::debug!(%key, "Removed expired service");
            }
            alive
        });

        let removed = before.saturating_sub(self.instances.len());
        if removed > 0 {
            metrics::record_registry_size(self.instances.len());
        }
        removed
    }

    /// Snapshot of every live instance.
    pub fn instances(&self) -> Vec<ServiceInstance> {
        self.cleanup();
        self.instances.iter().map(|entry| entry.value().clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_ENTRY_TIMEOUT)
    }
}
