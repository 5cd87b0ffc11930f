//! Startup orchestration.
//!
//! # Responsibilities
//! - Load and validate configuration
//! - Initialize logging, then metrics when enabled
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners are bound by the caller, after bootstrap

use std::net::SocketAddr;
use std::path::Path;

use crate::config::{load_or_default, ConfigError, DiscoveryConfig};
use crate::observability::{logging, metrics};

/// Load configuration and bring up observability.
pub fn bootstrap(config_path: Option<&Path>) -> Result<DiscoveryConfig, ConfigError> {
    let config = load_or_default(config_path)?;
    logging::init_logging(&config.observability);

    match config_path {
        Some(path) => tracing::info!(path = %path.display(), "Configuration loaded"),
        None => tracing::info!("Using default configuration"),
    }

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    Ok(config)
}
