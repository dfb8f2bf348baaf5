//! Semantic validation of configuration.
//!
//! Serde guarantees the types line up; these checks catch values that parse
//! fine but would misbehave at runtime (zero windows, sweep slower than TTL).

use crate::config::schema::{RateLimitClassConfig, ServiceConfig};
use thiserror::Error;

/// A single semantic problem found in the configuration.
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("listener.bind_address '{0}' is not a valid socket address")]
    BadBindAddress(String),

    #[error("listener.request_timeout_secs must be greater than zero")]
    ZeroRequestTimeout,

    #[error("breaker.failure_threshold must be at least 1")]
    ZeroFailureThreshold,

    #[error("breaker.{0} must be greater than zero")]
    ZeroBreakerDuration(&'static str),

    #[error("breaker.expected_failure_rate must be in (0, 1], got {0}")]
    BadFailureRate(f64),

    #[error("rate_limits.{class}.{field} must be greater than zero")]
    ZeroLimitField { class: &'static str, field: &'static str },

    #[error("cache.{0} must be greater than zero")]
    ZeroCacheField(&'static str),

    #[error("cache.sweep_interval_ms ({sweep}) must be shorter than cache.ttl_ms ({ttl})")]
    SweepSlowerThanTtl { sweep: u64, ttl: u64 },

    #[error("observability.metrics_address '{0}' is not a valid socket address")]
    BadMetricsAddress(String),
}

/// Check a parsed configuration for semantic problems.
///
/// Collects every problem rather than stopping at the first, so an operator
/// can fix a config file in one pass.
pub fn validate_config(config: &ServiceConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<std::net::SocketAddr>().is_err() {
        errors.push(ValidationError::BadBindAddress(config.listener.bind_address.clone()));
    }
    if config.listener.request_timeout_secs == 0 {
        errors.push(ValidationError::ZeroRequestTimeout);
    }

    let breaker = &config.breaker;
    if breaker.failure_threshold == 0 {
        errors.push(ValidationError::ZeroFailureThreshold);
    }
    if breaker.recovery_ms == 0 {
        errors.push(ValidationError::ZeroBreakerDuration("recovery_ms"));
    }
    if breaker.monitoring_period_ms == 0 {
        errors.push(ValidationError::ZeroBreakerDuration("monitoring_period_ms"));
    }
    if breaker.operation_timeout_ms == 0 {
        errors.push(ValidationError::ZeroBreakerDuration("operation_timeout_ms"));
    }
    if breaker.expected_failure_rate <= 0.0 || breaker.expected_failure_rate > 1.0 {
        errors.push(ValidationError::BadFailureRate(breaker.expected_failure_rate));
    }

    check_limit_class("auth", &config.rate_limits.auth, &mut errors);
    check_limit_class("api", &config.rate_limits.api, &mut errors);
    check_limit_class("evaluation", &config.rate_limits.evaluation, &mut errors);
    if config.rate_limits.sweep_interval_ms == 0 {
        errors.push(ValidationError::ZeroLimitField {
            class: "sweep",
            field: "sweep_interval_ms",
        });
    }

    let cache = &config.cache;
    if cache.ttl_ms == 0 {
        errors.push(ValidationError::ZeroCacheField("ttl_ms"));
    }
    if cache.max_history_messages == 0 {
        errors.push(ValidationError::ZeroCacheField("max_history_messages"));
    }
    if cache.sweep_interval_ms == 0 {
        errors.push(ValidationError::ZeroCacheField("sweep_interval_ms"));
    } else if cache.sweep_interval_ms >= cache.ttl_ms {
        errors.push(ValidationError::SweepSlowerThanTtl {
            sweep: cache.sweep_interval_ms,
            ttl: cache.ttl_ms,
        });
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<std::net::SocketAddr>().is_err()
    {
        errors.push(ValidationError::BadMetricsAddress(
            config.observability.metrics_address.clone(),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn check_limit_class(
    class: &'static str,
    limit: &RateLimitClassConfig,
    errors: &mut Vec<ValidationError>,
) {
    if limit.window_ms == 0 {
        errors.push(ValidationError::ZeroLimitField { class, field: "window_ms" });
    }
    if limit.max_requests == 0 {
        errors.push(ValidationError::ZeroLimitField { class, field: "max_requests" });
    }
}
