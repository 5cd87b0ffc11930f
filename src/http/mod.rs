//! HTTP surfaces.
//!
//! # Data Flow
//! ```text
//! Registry (server.rs):
//!     PUT/DELETE /register/{name}/{version}/{port}
//!     GET /find/{name}/{range}, GET /services, GET /health
//!     → registry::ServiceRegistry
//!
//! Gateway (gateway.rs):
//!     GET /speakers/..., GET /images/{*path}
//!     → client::SpeakersService → resilient client
//!
//! Both routers get request.rs layers (request ID, trace, timeout).
//! ```

pub mod gateway;
pub mod request;
pub mod server;

pub use gateway::GatewayServer;
pub use request::{MakeRequestUuid, X_REQUEST_ID};
pub use server::HttpServer;
