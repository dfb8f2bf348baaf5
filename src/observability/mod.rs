//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Limiter / breaker / cache / mirror produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → Log aggregation (stdout)
//!     → Metrics endpoint (Prometheus scrape)
//! ```
//!
//! # Design Decisions
//! - Structured logging with key-value fields for machine parsing
//! - Metrics are cheap (atomic increments); recorded at every admission
//!   decision, breaker outcome, sweep, and mirror access
//! - Latency percentiles come from Prometheus histograms, not in-process math

pub mod logging;
pub mod metrics;
