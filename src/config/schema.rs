//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure shared by the
//! registry server, the gateway and the CLI. All types derive Serde traits
//! for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Registry listener configuration.
    pub listener: ListenerConfig,

    /// Registry entry expiry.
    pub registry: RegistryConfig,

    /// Circuit breaker thresholds and call deadline.
    pub breaker: BreakerConfig,

    /// Resilient client settings.
    pub client: ClientConfig,

    /// Gateway listener configuration.
    pub gateway: GatewayConfig,

    /// Heartbeat (re-registration) settings.
    pub heartbeat: HeartbeatConfig,

    /// Timeout configuration for inbound HTTP requests.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Registry listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3080".to_string(),
        }
    }
}

/// Registry expiry configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    /// Seconds after the last heartbeat before an instance expires.
    pub entry_timeout_secs: u64,

    /// Interval of the background sweep in seconds; 0 sweeps on access only.
    pub sweep_interval_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            entry_timeout_secs: 30,
            sweep_interval_secs: 0,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// The circuit opens once failures exceed this count.
    pub failure_threshold: u32,

    /// Seconds an open circuit waits before allowing calls again.
    pub cool_down_secs: u64,

    /// Deadline for a single outbound call in milliseconds.
    pub request_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            cool_down_secs: 10,
            request_timeout_ms: 2000,
        }
    }
}

/// Resilient client configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the registry service.
    pub registry_url: String,

    /// Name the downstream service registers under.
    pub service_name: String,

    /// Version range accepted for the downstream service.
    pub version_constraint: String,

    /// Directory for cached stream responses.
    pub cache_dir: String,

    /// Deadline for cache file reads and writes in milliseconds.
    pub cache_io_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            registry_url: "http://localhost:3080".to_string(),
            service_name: "speakers-service".to_string(),
            version_constraint: "^1.0.0".to_string(),
            cache_dir: "_imagecache".to_string(),
            cache_io_timeout_ms: 1000,
        }
    }
}

/// Gateway listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Bind address of the conference gateway.
    pub bind_address: String,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Heartbeat configuration for self-registering services.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HeartbeatConfig {
    /// Seconds between re-registrations; keep well under the entry timeout.
    pub interval_secs: u64,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self { interval_secs: 15 }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Request timeout (total time for request/response) in seconds.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 30 }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DiscoveryConfig::default();
        assert_eq!(config.registry.entry_timeout_secs, 30);
        assert_eq!(config.breaker.failure_threshold, 5);
        assert_eq!(config.breaker.cool_down_secs, 10);
        assert_eq!(config.breaker.request_timeout_ms, 2000);
    }

    #[test]
    fn test_partial_toml() {
        let config: DiscoveryConfig = toml::from_str(
            r#"
            [breaker]
            failure_threshold = 2

            [client]
            registry_url = "http://10.0.0.5:3080"
            "#,
        )
        .unwrap();

        assert_eq!(config.breaker.failure_threshold, 2);
        assert_eq!(config.breaker.cool_down_secs, 10);
        assert_eq!(config.client.registry_url, "http://10.0.0.5:3080");
        assert_eq!(config.client.service_name, "speakers-service");
        assert_eq!(config.listener.bind_address, "0.0.0.0:3080");
    }
}
