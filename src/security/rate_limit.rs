//! Fixed-window rate limiting middleware.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::{HeaderMap, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dashmap::DashMap;
use tokio::time::Instant;

use crate::config::schema::RateLimitClassConfig;
use crate::observability::metrics;

/// How a limiter instance derives its key from a request.
///
/// Keys combine the limiter's class name with the caller identity, so two
/// instances never share windows even for the same caller.
#[derive(Clone)]
pub enum KeyExtractor {
    /// Peer IP address (default).
    PeerIp,
    /// `x-student-email` header, set by the auth layer; falls back to IP.
    StudentEmail,
    /// Email plus `x-session-id`, for per-session quotas.
    EmailAndSession,
    /// Caller-supplied strategy.
    Custom(Arc<dyn Fn(&Request<Body>) -> String + Send + Sync>),
}

impl KeyExtractor {
    fn extract(&self, addr: SocketAddr, request: &Request<Body>) -> String {
        match self {
            KeyExtractor::PeerIp => addr.ip().to_string(),
            KeyExtractor::StudentEmail => {
                header(request, "x-student-email").unwrap_or_else(|| addr.ip().to_string())
            }
            KeyExtractor::EmailAndSession => {
                let email =
                    header(request, "x-student-email").unwrap_or_else(|| addr.ip().to_string());
                match header(request, "x-session-id") {
                    Some(session) => format!("{}:{}", email, session),
                    None => email,
                }
            }
            KeyExtractor::Custom(f) => f(request),
        }
    }
}

fn header(request: &Request<Body>, name: &str) -> Option<String> {
    request
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.to_string())
}

/// One caller's current window.
struct WindowEntry {
    count: u32,
    reset_at: Instant,
    first_request: Instant,
}

/// Outcome of a single admission check.
#[derive(Debug, Clone)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub limit: u32,
    pub remaining: u32,
    /// Time until the current window ends.
    pub reset_after: Duration,
    /// Set on rejection: how long the caller should wait.
    pub retry_after: Option<Duration>,
}

impl RateLimitDecision {
    /// Attach quota headers. Applied to every evaluated response; rejections
    /// additionally carry `retry-after`.
    pub fn apply_headers(&self, headers: &mut HeaderMap) {
        headers.insert("x-ratelimit-limit", self.limit.into());
        headers.insert("x-ratelimit-remaining", self.remaining.into());
        headers.insert("x-ratelimit-reset", ceil_secs(self.reset_after).into());
        if let Some(retry_after) = self.retry_after {
            headers.insert("retry-after", ceil_secs(retry_after).into());
        }
    }
}

fn ceil_secs(d: Duration) -> u64 {
    d.as_secs_f64().ceil() as u64
}

/// A fixed-window rate limiter for one operation class.
///
/// Cheap to clone; all clones share the same window map.
#[derive(Clone)]
pub struct RateLimiter {
    name: &'static str,
    window: Duration,
    max_requests: u32,
    message: String,
    key: KeyExtractor,
    entries: Arc<DashMap<String, WindowEntry>>,
}

impl RateLimiter {
    pub fn new(name: &'static str, config: &RateLimitClassConfig, key: KeyExtractor) -> Self {
        tracing::info!(
            class = name,
            window_ms = config.window_ms,
            max_requests = config.max_requests,
            "Rate limiter initialized"
        );
        Self {
            name,
            window: Duration::from_millis(config.window_ms),
            max_requests: config.max_requests,
            message: config.message.clone(),
            key,
            entries: Arc::new(DashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Number of live window entries (expired ones linger until the sweep).
    pub fn tracked_keys(&self) -> usize {
        self.entries.len()
    }

    /// Derive the window key for a request.
    pub fn key_for(&self, addr: SocketAddr, request: &Request<Body>) -> String {
        format!("{}:{}", self.name, self.key.extract(addr, request))
    }

    /// Count a hit against `key`'s current window and decide admission.
    ///
    /// The first hit for a key opens a window; a hit at or past the window's
    /// end starts a fresh one with the count reset to 1.
    pub fn check(&self, key: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert_with(|| WindowEntry {
                count: 0,
                reset_at: now + self.window,
                first_request: now,
            });

        if now >= entry.reset_at {
            entry.count = 0;
            entry.reset_at = now + self.window;
            entry.first_request = now;
        }
        entry.count += 1;

        let allowed = entry.count <= self.max_requests;
        let remaining = self.max_requests.saturating_sub(entry.count);
        let reset_after = entry.reset_at.duration_since(now);
        if !allowed {
            tracing::debug!(
                class = self.name,
                count = entry.count,
                window_age_ms = now.duration_since(entry.first_request).as_millis() as u64,
                "Window quota exhausted"
            );
        }
        drop(entry);

        RateLimitDecision {
            allowed,
            limit: self.max_requests,
            remaining,
            reset_after,
            retry_after: if allowed { None } else { Some(reset_after) },
        }
    }

    /// Drop entries whose window has fully elapsed, bounding memory.
    /// Returns the number of entries removed.
    pub fn sweep(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| now < entry.reset_at);
        let removed = before - self.entries.len();
        if removed > 0 {
            tracing::debug!(
                class = self.name,
                removed,
                remaining = self.entries.len(),
                "Swept expired rate limit windows"
            );
        }
        removed
    }
}

/// Middleware enforcing one limiter instance on a route tree.
pub async fn rate_limit_middleware(
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(limiter): State<RateLimiter>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let key = limiter.key_for(addr, &request);
    let decision = limiter.check(&key);
    metrics::record_admission(limiter.name(), decision.allowed);

    if decision.allowed {
        let mut response = next.run(request).await;
        decision.apply_headers(response.headers_mut());
        response
    } else {
        tracing::warn!(
            class = limiter.name(),
            client = %key,
            retry_after_ms = decision.reset_after.as_millis() as u64,
            "Request throttled"
        );
        let mut response =
            (StatusCode::TOO_MANY_REQUESTS, limiter.message().to_string()).into_response();
        decision.apply_headers(response.headers_mut());
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::advance;

    fn limiter(max_requests: u32, window_ms: u64) -> RateLimiter {
        RateLimiter::new(
            "test",
            &RateLimitClassConfig {
                window_ms,
                max_requests,
                message: "slow down".to_string(),
            },
            KeyExtractor::PeerIp,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn allows_up_to_quota_then_rejects() {
        let limiter = limiter(5, 60_000);

        for i in 0..5 {
            let decision = limiter.check("test:1.2.3.4");
            assert!(decision.allowed, "request {} should pass", i + 1);
            assert_eq!(decision.remaining, 4 - i);
        }

        let decision = limiter.check("test:1.2.3.4");
        assert!(!decision.allowed);
        assert_eq!(decision.remaining, 0);
        let retry_after = decision.retry_after.unwrap();
        assert!(retry_after <= Duration::from_millis(60_000));
    }

    #[tokio::test(start_paused = true)]
    async fn window_lapse_starts_fresh() {
        let limiter = limiter(2, 60_000);

        assert!(limiter.check("test:k").allowed);
        assert!(limiter.check("test:k").allowed);
        assert!(!limiter.check("test:k").allowed);

        advance(Duration::from_millis(60_000)).await;
        let decision = limiter.check("test:k");
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn keys_are_independent() {
        let limiter = limiter(1, 60_000);

        assert!(limiter.check("test:a").allowed);
        assert!(limiter.check("test:b").allowed);
        assert!(!limiter.check("test:a").allowed);
        assert!(!limiter.check("test:b").allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn instances_are_independent() {
        let auth = limiter(1, 60_000);
        let api = limiter(1, 60_000);

        assert!(auth.check("auth:x").allowed);
        assert!(api.check("api:x").allowed);
        assert!(!auth.check("auth:x").allowed);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_drops_only_elapsed_windows() {
        let limiter = limiter(5, 60_000);
        limiter.check("test:old");

        advance(Duration::from_millis(30_000)).await;
        limiter.check("test:young");

        advance(Duration::from_millis(30_000)).await;
        // "old" lapsed exactly now; "young" has 30s left.
        assert_eq!(limiter.sweep(), 1);
        assert_eq!(limiter.tracked_keys(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn email_key_falls_back_to_ip() {
        let limiter = RateLimiter::new(
            "api",
            &RateLimitClassConfig {
                window_ms: 60_000,
                max_requests: 10,
                message: String::new(),
            },
            KeyExtractor::StudentEmail,
        );
        let addr: SocketAddr = "10.0.0.7:4242".parse().unwrap();

        let with_email = Request::builder()
            .header("x-student-email", "student@uni.edu")
            .body(Body::empty())
            .unwrap();
        assert_eq!(limiter.key_for(addr, &with_email), "api:student@uni.edu");

        let anonymous = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(limiter.key_for(addr, &anonymous), "api:10.0.0.7");
    }

    #[tokio::test(start_paused = true)]
    async fn session_key_combines_email_and_session() {
        let limiter = RateLimiter::new(
            "evaluation",
            &RateLimitClassConfig {
                window_ms: 60_000,
                max_requests: 10,
                message: String::new(),
            },
            KeyExtractor::EmailAndSession,
        );
        let addr: SocketAddr = "10.0.0.7:4242".parse().unwrap();

        let request = Request::builder()
            .header("x-student-email", "student@uni.edu")
            .header("x-session-id", "sess-9")
            .body(Body::empty())
            .unwrap();
        assert_eq!(
            limiter.key_for(addr, &request),
            "evaluation:student@uni.edu:sess-9"
        );
    }
}
