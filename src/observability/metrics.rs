//! Metrics collection and exposition.
//!
//! # Metrics
//! - `clinsim_admission_total` (counter): limiter decisions by class, outcome
//! - `clinsim_breaker_calls_total` (counter): protected calls by breaker, outcome
//! - `clinsim_breaker_call_duration_seconds` (histogram): protected call latency
//! - `clinsim_breaker_state` (gauge): 0=closed, 1=open, 2=half-open
//! - `clinsim_cache_sessions` (gauge): live conversation entries
//! - `clinsim_cache_evictions_total` (counter): TTL sweep evictions
//! - `clinsim_mirror_writes_total` (counter): mirrored writes by kind, origin
//! - `clinsim_mirror_serves_total` (counter): reads answered from the mirror

use std::net::SocketAddr;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::CircuitState;

/// Install the Prometheus exporter and register metric descriptions.
///
/// Failure to bind is logged, not fatal; the service degrades to running
/// without a scrape endpoint.
pub fn init_metrics(addr: SocketAddr) {
    let builder = PrometheusBuilder::new().with_http_listener(addr);
    match builder.install() {
        Ok(()) => {
            tracing::info!(address = %addr, "Metrics exporter listening");
            describe();
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to install metrics exporter");
        }
    }
}

fn describe() {
    describe_counter!("clinsim_admission_total", "Rate limiter decisions by class and outcome");
    describe_counter!("clinsim_breaker_calls_total", "Protected store calls by breaker and outcome");
    describe_histogram!(
        "clinsim_breaker_call_duration_seconds",
        "Latency of calls executed through a circuit breaker"
    );
    describe_gauge!("clinsim_breaker_state", "Circuit state: 0 closed, 1 open, 2 half-open");
    describe_gauge!("clinsim_cache_sessions", "Live conversation cache entries");
    describe_counter!("clinsim_cache_evictions_total", "Conversation entries evicted by TTL sweeps");
    describe_counter!("clinsim_mirror_writes_total", "Mirror writes by entity kind and origin");
    describe_counter!("clinsim_mirror_serves_total", "Reads served from the fallback mirror");
}

/// Record a rate limiter decision.
pub fn record_admission(class: &str, allowed: bool) {
    let outcome = if allowed { "allowed" } else { "throttled" };
    counter!("clinsim_admission_total", "class" => class.to_string(), "outcome" => outcome)
        .increment(1);
}

/// Record the outcome and latency of a breaker-protected call.
///
/// `outcome` is one of: success, failure, timeout, rejected.
pub fn record_breaker_call(breaker: &str, outcome: &'static str, elapsed: Duration) {
    counter!("clinsim_breaker_calls_total", "breaker" => breaker.to_string(), "outcome" => outcome)
        .increment(1);
    histogram!("clinsim_breaker_call_duration_seconds", "breaker" => breaker.to_string())
        .record(elapsed.as_secs_f64());
}

/// Record a circuit state transition.
pub fn record_breaker_state(breaker: &str, state: CircuitState) {
    let value = match state {
        CircuitState::Closed => 0.0,
        CircuitState::Open => 1.0,
        CircuitState::HalfOpen => 2.0,
    };
    gauge!("clinsim_breaker_state", "breaker" => breaker.to_string()).set(value);
}

/// Record the current conversation cache size.
pub fn record_cache_size(sessions: usize) {
    gauge!("clinsim_cache_sessions").set(sessions as f64);
}

/// Record evictions from a cache sweep.
pub fn record_cache_evictions(evicted: usize) {
    counter!("clinsim_cache_evictions_total").increment(evicted as u64);
}

/// Record a mirrored write and whether it stands in for a failed primary write.
pub fn record_mirror_write(kind: &'static str, is_fallback: bool) {
    let origin = if is_fallback { "fallback" } else { "shadow" };
    counter!("clinsim_mirror_writes_total", "kind" => kind, "origin" => origin).increment(1);
}

/// Record a read answered from the mirror instead of the primary store.
pub fn record_mirror_serve(kind: &'static str) {
    counter!("clinsim_mirror_serves_total", "kind" => kind).increment(1);
}
