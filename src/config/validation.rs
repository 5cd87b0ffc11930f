//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, addresses parse)
//! - Check the client's registry URL and version range
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: DiscoveryConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::DiscoveryConfig;
use crate::registry::VersionRange;

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &DiscoveryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    check_address(&mut errors, "listener.bind_address", &config.listener.bind_address);
    check_address(&mut errors, "gateway.bind_address", &config.gateway.bind_address);
    if config.observability.metrics_enabled {
        check_address(&mut errors, "observability.metrics_address", &config.observability.metrics_address);
    }

    if config.registry.entry_timeout_secs == 0 {
        errors.push(ValidationError::new("registry.entry_timeout_secs", "must be greater than 0"));
    }
    if config.breaker.cool_down_secs == 0 {
        errors.push(ValidationError::new("breaker.cool_down_secs", "must be greater than 0"));
    }
    if config.breaker.request_timeout_ms == 0 {
        errors.push(ValidationError::new("breaker.request_timeout_ms", "must be greater than 0"));
    }
    if config.client.cache_io_timeout_ms == 0 {
        errors.push(ValidationError::new("client.cache_io_timeout_ms", "must be greater than 0"));
    }
    if config.timeouts.request_secs == 0 {
        errors.push(ValidationError::new("timeouts.request_secs", "must be greater than 0"));
    }
    if config.heartbeat.interval_secs == 0 {
        errors.push(ValidationError::new("heartbeat.interval_secs", "must be greater than 0"));
    } else if config.heartbeat.interval_secs >= config.registry.entry_timeout_secs {
        errors.push(ValidationError::new(
            "heartbeat.interval_secs",
            "must be shorter than registry.entry_timeout_secs",
        ));
    }

    match url::Url::parse(&config.client.registry_url) {
        Ok(url) if url.scheme() == "http" || url.scheme() == "https" => {}
        Ok(url) => errors.push(ValidationError::new(
            "client.registry_url",
            format!("unsupported scheme '{}'", url.scheme()),
        )),
        Err(e) => errors.push(ValidationError::new("client.registry_url", e.to_string())),
    }

    if config.client.service_name.is_empty() {
        errors.push(ValidationError::new("client.service_name", "must not be empty"));
    }
    if let Err(e) = VersionRange::parse(&config.client.version_constraint) {
        errors.push(ValidationError::new("client.version_constraint", e.to_string()));
    }
    if config.client.cache_dir.is_empty() {
        errors.push(ValidationError::new("client.cache_dir", "must not be empty"));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_address(errors: &mut Vec<ValidationError>, field: &'static str, value: &str) {
    if value.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(field, format!("invalid socket address '{}'", value)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert_eq!(validate_config(&DiscoveryConfig::default()), Ok(()));
    }

    #[test]
    fn test_collects_all_errors() {
        let mut config = DiscoveryConfig::default();
        config.listener.bind_address = "nowhere".into();
        config.breaker.request_timeout_ms = 0;
        config.client.registry_url = "ftp://registry".into();
        config.client.version_constraint = "^^1".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "listener.bind_address",
                "breaker.request_timeout_ms",
                "client.registry_url",
                "client.version_constraint",
            ]
        );
    }

    #[test]
    fn test_heartbeat_must_beat_expiry() {
        let mut config = DiscoveryConfig::default();
        config.heartbeat.interval_secs = 30;
        let errors = validate_config(&config).unwrap_err();
        assert_eq!(errors[0].field, "heartbeat.interval_secs");
    }
}
