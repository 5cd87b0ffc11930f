//! Response cache for degraded-mode fallback.
//!
//! # Data Flow
//! ```text
//! Successful upstream call
//!     → key.rs (hash of method + path)
//!     → memory.rs (JSON payloads) or disk.rs (stream payloads)
//!
//! Denied or failed upstream call
//!     → same key → read slot → stale response or miss
//! ```
//!
//! # Design Decisions
//! - Holds the most recent success per key, never history
//! - No expiry: stale data beats no data
//! - Keys exclude host and port

pub mod disk;
pub mod key;
pub mod memory;

pub use disk::{CacheError, DiskCache};
pub use key::CacheKey;
pub use memory::MemoryCache;
