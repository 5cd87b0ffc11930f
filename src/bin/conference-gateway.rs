//! Conference gateway.
//!
//! Serves the public speakers API by resolving the speakers service through
//! the registry and calling it behind the circuit breaker with cache fallback.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;

use service_discovery::client::{RegistryClient, ResilientClient, SpeakersService};
use service_discovery::http::GatewayServer;
use service_discovery::lifecycle::{bootstrap, shutdown_signal, Shutdown};

#[derive(Parser)]
#[command(name = "conference-gateway")]
#[command(about = "Public gateway for the conference speakers service", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the registry base URL
    #[arg(short, long)]
    registry: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = bootstrap(cli.config.as_deref())?;
    if let Some(registry) = cli.registry {
        config.client.registry_url = registry;
    }

    tracing::info!(
        registry_url = %config.client.registry_url,
        service = %config.client.service_name,
        constraint = %config.client.version_constraint,
        "conference-gateway v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let registry = RegistryClient::new(
        &config.client.registry_url,
        Duration::from_millis(config.breaker.request_timeout_ms),
    )?;
    let speakers = Arc::new(SpeakersService::new(ResilientClient::from_config(registry, &config)));

    let listener = TcpListener::bind(&config.gateway.bind_address).await?;
    let shutdown = Shutdown::new();
    let server = GatewayServer::new(speakers, &config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
