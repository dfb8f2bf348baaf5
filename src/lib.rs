//! Resilience core for the clinical-simulation backend.
//!
//! Keeps the service answering while its hosted dependencies are slow,
//! flapping, or down: a circuit breaker around the primary store, fixed-window
//! admission control per caller identity, a TTL-bounded conversation cache for
//! simulation continuity, and an in-memory mirror that shadows durable records
//! so session reads survive write failures.

pub mod config;
pub mod lifecycle;
pub mod memory;
pub mod observability;
pub mod resilience;
pub mod security;
pub mod store;

pub use config::schema::ServiceConfig;
pub use lifecycle::{Shutdown, Sweeper};
pub use memory::conversation::ConversationCache;
pub use resilience::circuit_breaker::{BreakerError, CircuitBreaker, CircuitState};
pub use security::rate_limit::{KeyExtractor, RateLimiter};
pub use store::access::DataAccess;
pub use store::mirror::FallbackMirror;
