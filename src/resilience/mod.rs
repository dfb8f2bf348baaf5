//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to the primary store:
//!     → circuit_breaker.rs (gate on circuit state, enforce deadline)
//!     → On failure: count against the circuit, open if thresholds exceeded
//!     → While open: fail fast or substitute the caller's fallback
//! ```
//!
//! # Design Decisions
//! - Deadlines are non-negotiable; every protected call has one
//! - Failures during the startup grace period surface but never count
//! - Fail fast in Open state; a single probe tests recovery
//! - No retries here; callers degrade to the fallback mirror instead

pub mod circuit_breaker;

pub use circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
