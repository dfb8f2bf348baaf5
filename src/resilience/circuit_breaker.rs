//! Circuit breaker for primary-store protection.
//!
//! # States
//! - Closed: normal operation, calls pass through under a deadline
//! - Open: store assumed down, calls fail fast
//! - Half-Open: testing if the store recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: consecutive failures >= threshold, or failure rate
//!                exceeded after a success-free monitoring period
//! Open → Half-Open: after recovery timeout
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails
//! ```
//!
//! # Design Decisions
//! - Per-dependency breaker instances (not global), injected by the bootstrap
//! - Single probe in Half-Open (prevents hammering a recovering store)
//! - A timed-out call is a failure like any other
//! - Failures inside the startup grace window surface to the caller but are
//!   never counted, so a warming dependency cannot false-open the circuit

use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tokio::time::{timeout, Instant};

use crate::config::schema::BreakerConfig;
use crate::observability::metrics;

/// Circuit state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CircuitState {
    /// Normal operation, calls are allowed through.
    Closed,
    /// Failing fast, calls are rejected without executing.
    Open,
    /// Recovery probe in progress.
    HalfOpen,
}

impl CircuitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CircuitState::Closed => "closed",
            CircuitState::Open => "open",
            CircuitState::HalfOpen => "half-open",
        }
    }
}

impl std::fmt::Display for CircuitState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors produced by a breaker-protected call.
#[derive(Debug, Error)]
pub enum BreakerError<E> {
    /// The circuit rejected the call without executing it.
    #[error("circuit '{breaker}' is {state}, retry in {retry_after_ms}ms ({failure_count}/{failure_threshold} failures)")]
    Open {
        breaker: String,
        state: CircuitState,
        retry_after_ms: u64,
        failure_count: u32,
        failure_threshold: u32,
    },

    /// The operation exceeded the configured deadline.
    #[error("operation timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    /// The operation itself failed; the inner error is passed through.
    #[error("operation failed: {0}")]
    Failed(E),
}

impl<E> BreakerError<E> {
    /// Remaining wait before the circuit will probe recovery, if this error
    /// is a rejection.
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            BreakerError::Open { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }
}

/// Point-in-time view of a breaker, for status endpoints and logs.
#[derive(Debug, Clone, Serialize)]
pub struct BreakerSnapshot {
    pub state: CircuitState,
    pub failure_count: u32,
    pub request_count: u64,
}

struct Inner {
    state: CircuitState,
    /// Consecutive failures since the last success.
    failure_count: u32,
    /// Total calls since creation, for rate-based opening.
    request_count: u64,
    last_failure_at: Option<Instant>,
    last_success_at: Instant,
    /// A Half-Open probe is currently executing.
    trial_in_flight: bool,
}

/// Circuit breaker wrapping calls to a flaky dependency.
pub struct CircuitBreaker {
    name: String,
    config: BreakerConfig,
    started_at: Instant,
    inner: Mutex<Inner>,
}

enum Gate {
    Proceed,
    Reject { retry_after: Duration },
}

enum Attempt<T, E> {
    Success(T),
    Failed {
        error: BreakerError<E>,
        /// False when the failure happened inside the startup grace window;
        /// such failures must surface unconditionally, never substitute.
        counted: bool,
    },
}

impl CircuitBreaker {
    /// Create a new breaker with the given name and tuning.
    pub fn new(name: impl Into<String>, config: BreakerConfig) -> Self {
        let name = name.into();
        tracing::info!(
            breaker = %name,
            failure_threshold = config.failure_threshold,
            recovery_ms = config.recovery_ms,
            operation_timeout_ms = config.operation_timeout_ms,
            "Circuit breaker initialized"
        );
        let now = Instant::now();
        Self {
            name,
            config,
            started_at: now,
            inner: Mutex::new(Inner {
                state: CircuitState::Closed,
                failure_count: 0,
                request_count: 0,
                last_failure_at: None,
                last_success_at: now,
                trial_in_flight: false,
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Current circuit state. Open circuits transition lazily: the state
    /// reported here reflects the last evaluation, not the wall clock.
    pub fn state(&self) -> CircuitState {
        self.inner.lock().expect("circuit state mutex poisoned").state
    }

    pub fn snapshot(&self) -> BreakerSnapshot {
        let inner = self.inner.lock().expect("circuit state mutex poisoned");
        BreakerSnapshot {
            state: inner.state,
            failure_count: inner.failure_count,
            request_count: inner.request_count,
        }
    }

    /// Execute `operation` under the circuit's protection.
    ///
    /// Rejected calls return [`BreakerError::Open`] with the remaining wait;
    /// the operation is not invoked. Timeouts and operation errors count
    /// against the circuit (outside the startup grace window) and are
    /// returned to the caller unchanged.
    pub async fn execute<F, Fut, T, E>(&self, operation: F) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match self.gate() {
            Gate::Reject { retry_after } => {
                metrics::record_breaker_call(&self.name, "rejected", Duration::ZERO);
                Err(self.open_error(retry_after))
            }
            Gate::Proceed => match self.attempt(operation).await {
                Attempt::Success(value) => Ok(value),
                Attempt::Failed { error, .. } => Err(error),
            },
        }
    }

    /// Execute `operation`, substituting `fallback` when the circuit rejects
    /// the call or the operation fails outside the startup grace window.
    ///
    /// Fallback use is logged as a degraded-mode event. The fallback's own
    /// error propagates; there is no fallback-of-fallback.
    pub async fn execute_with_fallback<F, Fut, T, E, FB>(
        &self,
        operation: F,
        fallback: FB,
    ) -> Result<T, BreakerError<E>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        FB: FnOnce() -> Result<T, E>,
        E: std::fmt::Display,
    {
        match self.gate() {
            Gate::Reject { retry_after } => {
                metrics::record_breaker_call(&self.name, "rejected", Duration::ZERO);
                tracing::warn!(
                    breaker = %self.name,
                    retry_after_ms = retry_after.as_millis() as u64,
                    "Circuit open, serving fallback"
                );
                fallback().map_err(BreakerError::Failed)
            }
            Gate::Proceed => match self.attempt(operation).await {
                Attempt::Success(value) => Ok(value),
                Attempt::Failed { error, counted } => {
                    if counted {
                        tracing::warn!(
                            breaker = %self.name,
                            error = %error,
                            "Operation failed, serving fallback"
                        );
                        fallback().map_err(BreakerError::Failed)
                    } else {
                        Err(error)
                    }
                }
            },
        }
    }

    /// Run the operation under the deadline and settle the circuit.
    async fn attempt<F, Fut, T, E>(&self, operation: F) -> Attempt<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let limit = Duration::from_millis(self.config.operation_timeout_ms);
        let start = Instant::now();
        match timeout(limit, operation()).await {
            Ok(Ok(value)) => {
                metrics::record_breaker_call(&self.name, "success", start.elapsed());
                self.on_success();
                Attempt::Success(value)
            }
            Ok(Err(e)) => {
                metrics::record_breaker_call(&self.name, "failure", start.elapsed());
                let counted = self.on_failure();
                Attempt::Failed {
                    error: BreakerError::Failed(e),
                    counted,
                }
            }
            Err(_elapsed) => {
                metrics::record_breaker_call(&self.name, "timeout", start.elapsed());
                let counted = self.on_failure();
                Attempt::Failed {
                    error: BreakerError::Timeout {
                        timeout_ms: self.config.operation_timeout_ms,
                    },
                    counted,
                }
            }
        }
    }

    /// Decide whether a call may proceed, transitioning Open → Half-Open
    /// once the recovery timeout has elapsed.
    fn gate(&self) -> Gate {
        let mut inner = self.inner.lock().expect("circuit state mutex poisoned");
        inner.request_count += 1;
        match inner.state {
            CircuitState::Closed => Gate::Proceed,
            CircuitState::Open => {
                let recovery = Duration::from_millis(self.config.recovery_ms);
                // A missing failure timestamp means the circuit was forced
                // open without one; treat recovery as due.
                let since_failure = inner
                    .last_failure_at
                    .map(|t| t.elapsed())
                    .unwrap_or(recovery);
                if since_failure >= recovery {
                    inner.state = CircuitState::HalfOpen;
                    inner.trial_in_flight = true;
                    tracing::info!(breaker = %self.name, "Circuit half-open, probing recovery");
                    metrics::record_breaker_state(&self.name, CircuitState::HalfOpen);
                    Gate::Proceed
                } else {
                    Gate::Reject {
                        retry_after: recovery - since_failure,
                    }
                }
            }
            CircuitState::HalfOpen => {
                if inner.trial_in_flight {
                    // Only one probe at a time.
                    Gate::Reject {
                        retry_after: Duration::from_millis(self.config.recovery_ms),
                    }
                } else {
                    inner.trial_in_flight = true;
                    Gate::Proceed
                }
            }
        }
    }

    fn on_success(&self) {
        let mut inner = self.inner.lock().expect("circuit state mutex poisoned");
        inner.last_success_at = Instant::now();
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Closed;
                inner.failure_count = 0;
                inner.trial_in_flight = false;
                tracing::info!(
                    breaker = %self.name,
                    request_count = inner.request_count,
                    "Circuit closed (recovered)"
                );
                metrics::record_breaker_state(&self.name, CircuitState::Closed);
            }
            CircuitState::Closed => {
                inner.failure_count = 0;
            }
            CircuitState::Open => {
                // A call that started before the circuit opened; nothing to do.
            }
        }
    }

    /// Returns false when the failure fell inside the startup grace window
    /// and therefore did not count.
    fn on_failure(&self) -> bool {
        let now = Instant::now();
        let grace = Duration::from_millis(self.config.startup_grace_ms);
        let mut inner = self.inner.lock().expect("circuit state mutex poisoned");

        if now.duration_since(self.started_at) < grace {
            inner.trial_in_flight = false;
            tracing::debug!(breaker = %self.name, "Failure within startup grace, not counted");
            return false;
        }

        inner.last_failure_at = Some(now);
        match inner.state {
            CircuitState::HalfOpen => {
                inner.state = CircuitState::Open;
                inner.trial_in_flight = false;
                tracing::warn!(breaker = %self.name, "Circuit reopened (probe failed)");
                metrics::record_breaker_state(&self.name, CircuitState::Open);
            }
            CircuitState::Closed => {
                inner.failure_count += 1;
                let hit_threshold = inner.failure_count >= self.config.failure_threshold;
                let monitoring = Duration::from_millis(self.config.monitoring_period_ms);
                let rate_tripped = now.duration_since(inner.last_success_at) > monitoring
                    && inner.request_count > 10
                    && inner.failure_count as f64 / inner.request_count as f64
                        > self.config.expected_failure_rate;
                if hit_threshold || rate_tripped {
                    inner.state = CircuitState::Open;
                    tracing::warn!(
                        breaker = %self.name,
                        failure_count = inner.failure_count,
                        request_count = inner.request_count,
                        failure_threshold = self.config.failure_threshold,
                        "Circuit opened (failing fast)"
                    );
                    metrics::record_breaker_state(&self.name, CircuitState::Open);
                }
            }
            CircuitState::Open => {
                inner.failure_count += 1;
            }
        }
        true
    }

    fn open_error<E>(&self, retry_after: Duration) -> BreakerError<E> {
        let inner = self.inner.lock().expect("circuit state mutex poisoned");
        BreakerError::Open {
            breaker: self.name.clone(),
            state: inner.state,
            retry_after_ms: retry_after.as_millis() as u64,
            failure_count: inner.failure_count,
            failure_threshold: self.config.failure_threshold,
        }
    }
}
