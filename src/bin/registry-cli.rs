//! Command line client for the service registry.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use service_discovery::client::{Heartbeat, RegistryClient};
use service_discovery::config::load_or_default;
use service_discovery::lifecycle::{shutdown_signal, Shutdown};
use service_discovery::observability::logging;

#[derive(Parser)]
#[command(name = "registry-cli")]
#[command(about = "Command line client for the service registry", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:3080")]
    url: String,

    /// Request timeout in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Configuration file supplying heartbeat and logging settings
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register an instance on this host
    Register { name: String, version: String, port: u16 },
    /// Remove an instance registered from this host
    Unregister { name: String, version: String, port: u16 },
    /// Resolve one instance matching a version range
    Find { name: String, constraint: String },
    /// List every live instance
    List,
    /// Keep an instance registered until Ctrl+C
    Heartbeat {
        name: String,
        version: String,
        port: u16,
        /// Seconds between beats; defaults to `heartbeat.interval_secs`
        #[arg(short, long, value_parser = clap::value_parser!(u64).range(1..))]
        interval_secs: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = RegistryClient::new(&cli.url, Duration::from_millis(cli.timeout_ms))?;

    match cli.command {
        Commands::Register { name, version, port } => {
            let key = client.register(&name, &version, port).await?;
            print_json(&serde_json::json!({ "result": key }))?;
        }
        Commands::Unregister { name, version, port } => {
            let key = client.unregister(&name, &version, port).await?;
            print_json(&serde_json::json!({ "result": key }))?;
        }
        Commands::Find { name, constraint } => match client.lookup(&name, &constraint).await? {
            Some(instance) => print_json(&instance)?,
            None => {
                eprintln!("Error: no instance of {} matches '{}'", name, constraint);
                std::process::exit(1);
            }
        },
        Commands::List => {
            let instances = client.services().await?;
            print_json(&instances)?;
        }
        Commands::Heartbeat { name, version, port, interval_secs } => {
            let config = load_or_default(cli.config.as_deref())?;
            logging::init_logging(&config.observability);
            let interval_secs = interval_secs.unwrap_or(config.heartbeat.interval_secs);

            let shutdown = Shutdown::new();
            let heartbeat = Heartbeat::new(client, name, version, port, Duration::from_secs(interval_secs));
            let task = tokio::spawn(heartbeat.run(shutdown.subscribe()));

            shutdown_signal().await;
            shutdown.trigger();
            task.await?;
        }
    }

    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
