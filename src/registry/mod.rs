//! Service registry subsystem.
//!
//! # Data Flow
//! ```text
//! PUT /register (heartbeat)
//!     → store.rs (sweep, upsert instance, refresh last_seen)
//!
//! GET /find/{name}/{range}
//!     → store.rs (sweep expired)
//!     → version.rs (filter by range)
//!     → selector.rs (uniform random pick)
//!     → instance or not-found
//!
//! sweeper.rs (optional)
//!     Periodic timer → store.rs cleanup
//! ```
//!
//! # Design Decisions
//! - State lives in memory only; restarts start empty
//! - Liveness is heartbeat driven, no coordinator
//! - Malformed ranges match nothing instead of failing the lookup

pub mod instance;
pub mod selector;
pub mod store;
pub mod sweeper;
pub mod version;

pub use instance::{RegistrationKey, ServiceInstance};
pub use store::ServiceRegistry;
pub use version::{satisfies, VersionRange};
