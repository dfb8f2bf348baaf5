//! Store subsystem.
//!
//! # Data Flow
//! ```text
//! Write:
//!     access.rs → circuit breaker → primary store (trait seam)
//!              → mirror.rs (record shadowed either way, flagged by outcome)
//!
//! Read:
//!     access.rs → circuit breaker → primary store
//!              → on success: refresh mirror, return
//!              → on error / not-found: serve the mirrored record, if any
//! ```
//!
//! # Design Decisions
//! - The breaker knows nothing about mirroring; access.rs owns that policy
//! - Write-through-or-shadow, not a write-ahead log: mirrored fallback
//!   records are never replayed into the primary once it recovers
//! - Everything here is process-local and dies with the process; scaling
//!   out needs sticky sessions or an external shared store

pub mod access;
pub mod mirror;
pub mod primary;
pub mod records;

pub use access::DataAccess;
pub use mirror::{FallbackMirror, Mirrored};
pub use primary::{PrimaryStore, StoreError};
pub use records::{EvaluationRecord, MessageRecord, SessionRecord, SessionStatus};
