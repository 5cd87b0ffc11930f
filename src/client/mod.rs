//! Client side of discovery.
//!
//! # Data Flow
//! ```text
//! Gateway handler
//!     → speakers.rs (one method per downstream endpoint)
//!     → resilient.rs (resolve, breaker-gated call, cache fallback)
//!     → discovery.rs (in-process registry or remote RegistryClient)
//!
//! Service process
//!     → heartbeat.rs (periodic register, unregister on shutdown)
//! ```

pub mod discovery;
pub mod heartbeat;
pub mod resilient;
pub mod speakers;

pub use discovery::{Discovery, RegistryClient, RegistryClientError};
pub use heartbeat::Heartbeat;
pub use resilient::{ClientError, ResilientClient};
pub use speakers::SpeakersService;
