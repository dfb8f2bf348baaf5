//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the simulation backend core.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServiceConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Circuit breaker guarding the primary store.
    pub breaker: BreakerConfig,

    /// Rate limit classes for the different operation groups.
    pub rate_limits: RateLimitsConfig,

    /// Conversation cache settings.
    pub cache: CacheConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request deadline in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Circuit breaker tuning. One breaker instance is created per protected
/// dependency; each instance takes its own copy of these knobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BreakerConfig {
    /// Consecutive failures before the circuit opens.
    pub failure_threshold: u32,

    /// How long the circuit stays open before a recovery probe.
    pub recovery_ms: u64,

    /// Window for rate-based opening: if no success has been seen for this
    /// long, the failure-rate condition is evaluated.
    pub monitoring_period_ms: u64,

    /// Failure ratio (failures / requests) tolerated before rate-based
    /// opening kicks in. Must be in (0, 1].
    pub expected_failure_rate: f64,

    /// Grace period after breaker creation during which failures are
    /// surfaced but never counted (dependencies may still be warming up).
    pub startup_grace_ms: u64,

    /// Deadline for a single protected operation. A timeout counts as a
    /// failure.
    pub operation_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 10,
            recovery_ms: 60_000,
            monitoring_period_ms: 300_000,
            expected_failure_rate: 0.5,
            startup_grace_ms: 60_000,
            operation_timeout_ms: 10_000,
        }
    }
}

/// One fixed-window rate limit class.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitClassConfig {
    /// Window length in milliseconds.
    pub window_ms: u64,

    /// Maximum requests per key per window.
    pub max_requests: u32,

    /// Body of the 429 response for this class.
    pub message: String,
}

/// Independent limiter instances for the different operation classes.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RateLimitsConfig {
    /// Authentication attempts (keyed by peer IP).
    pub auth: RateLimitClassConfig,

    /// General API traffic (keyed by student email, falling back to IP).
    pub api: RateLimitClassConfig,

    /// Evaluation submissions (keyed by email + session).
    pub evaluation: RateLimitClassConfig,

    /// How often expired window entries are swept out.
    pub sweep_interval_ms: u64,
}

impl Default for RateLimitsConfig {
    fn default() -> Self {
        Self {
            auth: RateLimitClassConfig {
                window_ms: 900_000,
                max_requests: 5,
                message: "Too many authentication attempts, please try again later.".to_string(),
            },
            api: RateLimitClassConfig {
                window_ms: 60_000,
                max_requests: 100,
                message: "Too many requests, please slow down.".to_string(),
            },
            evaluation: RateLimitClassConfig {
                window_ms: 3_600_000,
                max_requests: 20,
                message: "Evaluation limit reached, please try again later.".to_string(),
            },
            sweep_interval_ms: 60_000,
        }
    }
}

/// Conversation cache settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Idle time before a session's memory is evicted.
    pub ttl_ms: u64,

    /// Upper bound on per-session history length (oldest dropped first).
    pub max_history_messages: usize,

    /// Sweep interval; must be shorter than the TTL.
    pub sweep_interval_ms: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_ms: 1_800_000,
            max_history_messages: 50,
            sweep_interval_ms: 300_000,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
