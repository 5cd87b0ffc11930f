//! Breaker-gated calls with cache fallback.
//!
//! # Data Flow
//! ```text
//! call(path, kind)
//!     → Discovery::find(service, range)     none → ServiceUnavailable
//!     → RequestSpec (instance address + path)
//!     → CircuitBreaker::call_service
//!         Success  → write memory/disk slot → payload
//!         Denied   ┐
//!         Failed   ┴→ read memory/disk slot → stale payload or Unavailable
//! ```

use axum::body::Bytes;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use url::Url;

use crate::cache::{CacheKey, DiskCache, MemoryCache};
use crate::client::discovery::Discovery;
use crate::config::DiscoveryConfig;
use crate::observability::metrics;
use crate::registry::ServiceInstance;
use crate::resilience::circuit_breaker::{
    CallOutcome, CircuitBreaker, Payload, RequestSpec, ResponseKind,
};

/// The operation could not be completed, with or without stale data.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("no instance of {service} matching '{constraint}' is available")]
    ServiceUnavailable { service: String, constraint: String },

    #[error("{path} is unavailable and no cached response exists")]
    Unavailable { path: String },
}

/// Resilient facade over one downstream service.
#[derive(Debug)]
pub struct ResilientClient<D> {
    discovery: D,
    breaker: Arc<CircuitBreaker>,
    memory: MemoryCache,
    disk: DiskCache,
    service_name: String,
    version_constraint: String,
}

impl<D: Discovery> ResilientClient<D> {
    pub fn new(
        discovery: D,
        breaker: Arc<CircuitBreaker>,
        disk: DiskCache,
        service_name: impl Into<String>,
        version_constraint: impl Into<String>,
    ) -> Self {
        Self {
            discovery,
            breaker,
            memory: MemoryCache::new(),
            disk,
            service_name: service_name.into(),
            version_constraint: version_constraint.into(),
        }
    }

    pub fn from_config(discovery: D, config: &DiscoveryConfig) -> Self {
        let breaker = Arc::new(CircuitBreaker::new(&config.breaker));
        let disk = DiskCache::new(
            &config.client.cache_dir,
            Duration::from_millis(config.client.cache_io_timeout_ms),
        );
        Self::new(
            discovery,
            breaker,
            disk,
            &config.client.service_name,
            &config.client.version_constraint,
        )
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// Resolve one instance of the downstream service.
    pub async fn resolve(&self) -> Result<ServiceInstance, ClientError> {
        self.discovery
            .find(&self.service_name, &self.version_constraint)
            .await
            .ok_or_else(|| ClientError::ServiceUnavailable {
                service: self.service_name.clone(),
                constraint: self.version_constraint.clone(),
            })
    }

    /// GET a JSON document.
    pub async fn get_json(&self, path: &str) -> Result<Value, ClientError> {
        match self.call(path, ResponseKind::Json).await? {
            Payload::Json(value) => Ok(value),
            Payload::Stream(_) => Err(unavailable(path)),
        }
    }

    /// GET a raw byte stream.
    pub async fn get_stream(&self, path: &str) -> Result<Bytes, ClientError> {
        match self.call(path, ResponseKind::Stream).await? {
            Payload::Stream(bytes) => Ok(bytes),
            Payload::Json(_) => Err(unavailable(path)),
        }
    }

    /// Resolve, call through the breaker, cache or fall back.
    pub async fn call(&self, path: &str, kind: ResponseKind) -> Result<Payload, ClientError> {
        let instance = self.resolve().await?;

        let url = Url::parse(&format!("{}{}", instance.base_url(), path)).map_err(|e| {
            tracing::warn!(instance = %instance.authority(), path = %path, error = %e, "Invalid target URL");
            unavailable(path)
        })?;
        let request = RequestSpec::get(url, kind);
        let key = CacheKey::new(&request.method, &request.path());

        match self.breaker.call_service(&request).await {
            CallOutcome::Success(payload) => {
                self.store(&key, &payload).await;
                Ok(payload)
            }
            CallOutcome::Denied | CallOutcome::Failed(_) => self.fallback(&key, kind, path).await,
        }
    }

    async fn store(&self, key: &CacheKey, payload: &Payload) {
        match payload {
            Payload::Json(value) => self.memory.put(key.clone(), value.clone()),
            Payload::Stream(bytes) => {
                if let Err(e) = self.disk.put(key, bytes).await {
                    tracing::warn!(key = %key, error = %e, "Failed to cache stream response");
                }
            }
        }
    }

    async fn fallback(&self, key: &CacheKey, kind: ResponseKind, path: &str) -> Result<Payload, ClientError> {
        let cached = match kind {
            ResponseKind::Json => {
                let hit = self.memory.get(key).map(Payload::Json);
                metrics::record_cache_fallback("memory", hit.is_some());
                hit
            }
            ResponseKind::Stream => {
                let hit = match self.disk.get(key).await {
                    Ok(bytes) => bytes.map(Payload::Stream),
                    Err(e) => {
                        tracing::warn!(key = %key, error = %e, "Failed to read cached stream");
                        None
                    }
                };
                metrics::record_cache_fallback("disk", hit.is_some());
                hit
            }
        };

        match cached {
            Some(payload) => {
                tracing::info!(service = %self.service_name, path = %path, "Serving cached response");
                Ok(payload)
            }
            None => Err(unavailable(path)),
        }
    }
}

fn unavailable(path: &str) -> ClientError {
    ClientError::Unavailable {
        path: path.to_string(),
    }
}
