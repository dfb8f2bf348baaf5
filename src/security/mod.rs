//! Admission control subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming request:
//!     → rate_limit.rs (derive caller key, check fixed window)
//!     → Allowed: pass through with quota headers attached
//!     → Exhausted: 429 with retry-after guidance
//! ```
//!
//! # Design Decisions
//! - Fixed windows, not sliding; cheap and predictable under load
//! - One limiter instance per operation class (auth, API, evaluation),
//!   each with its own window, quota, and key strategy
//! - Quota headers attached to every evaluated response, not just rejections

pub mod rate_limit;

pub use rate_limit::{rate_limit_middleware, KeyExtractor, RateLimiter};
