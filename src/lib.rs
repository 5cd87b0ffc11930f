//! Service discovery with version-aware lookup and resilient clients.

pub mod cache;
pub mod client;
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod registry;
pub mod resilience;

pub use client::{ResilientClient, SpeakersService};
pub use config::schema::DiscoveryConfig;
pub use http::{GatewayServer, HttpServer};
pub use lifecycle::Shutdown;
pub use registry::ServiceRegistry;
