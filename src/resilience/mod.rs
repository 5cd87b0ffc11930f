//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to an upstream endpoint ("METHOD path"):
//!     → circuit_breaker.rs can_request (open circuits deny without I/O)
//!     → bounded send (request_timeout covers connect, headers and body)
//!     → on_success resets / on_failure counts and opens past threshold
//!     → CallOutcome { Denied | Failed | Success }
//! ```
//!
//! # Design Decisions
//! - Every external call has a deadline
//! - One breaker state per endpoint, created lazily
//! - Time comes from clock.rs so cool-downs are testable without sleeping

pub mod circuit_breaker;
pub mod clock;

pub use circuit_breaker::{CallError, CallOutcome, CircuitBreaker, CircuitStatus, Payload, RequestSpec, ResponseKind};
pub use clock::{Clock, ManualClock, SystemClock};
