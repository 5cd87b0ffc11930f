//! Service registry.
//!
//! # Architecture Overview
//!
//! ```text
//!     Service instances                 ┌────────────────────────────────┐
//!     ──── PUT /register/... ──────────▶│  http::server (axum)           │
//!     ──── DELETE /register/... ───────▶│    request id → trace → timeout│
//!                                       │           │                    │
//!     Resilient clients                 │           ▼                    │
//!     ──── GET /find/{name}/{range} ───▶│  registry::ServiceRegistry     │
//!     ◀─── instance JSON / 404 ─────────│    DashMap<key, instance>      │
//!                                       │    expiry on access + sweeper  │
//!                                       └────────────────────────────────┘
//! ```

use clap::Parser;
use std::path::PathBuf;
use tokio::net::TcpListener;

use service_discovery::http::HttpServer;
use service_discovery::lifecycle::{bootstrap, shutdown_signal, Shutdown};

#[derive(Parser)]
#[command(name = "service-registry")]
#[command(about = "Version-aware service registry", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override the listener bind address
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let mut config = bootstrap(cli.config.as_deref())?;
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    tracing::info!("service-registry v{} starting", env!("CARGO_PKG_VERSION"));

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let shutdown = Shutdown::new();
    let server = HttpServer::new(config);
    let server_task = tokio::spawn(server.run(listener, shutdown.subscribe()));

    shutdown_signal().await;
    shutdown.trigger();
    server_task.await??;

    tracing::info!("Shutdown complete");
    Ok(())
}
