//! clinsim-core service bootstrap.
//!
//! Wires the resilience layer together and owns its lifecycle. The CRUD
//! surface of the simulation backend (scenario routes, auth, the AI patient)
//! mounts on top of these services; what runs here is everything the service
//! needs to degrade gracefully when the hosted store misbehaves.
//!
//! ```text
//!  Request ──▶ rate limiter ──▶ handler ──▶ DataAccess
//!                                              │
//!                                   circuit breaker ──▶ primary store
//!                                              │
//!                                      fallback mirror (shadow reads/writes)
//!
//!  Background: conversation-cache TTL sweep, rate-limit window sweep,
//!              signal handling, graceful shutdown drain.
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use axum::{extract::State, middleware, routing::get, Json, Router};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use clinsim_core::config::loader::load_config;
use clinsim_core::config::ServiceConfig;
use clinsim_core::lifecycle::{signals, Shutdown, Sweeper};
use clinsim_core::memory::ConversationCache;
use clinsim_core::observability::{logging, metrics};
use clinsim_core::resilience::circuit_breaker::CircuitBreaker;
use clinsim_core::security::rate_limit::{rate_limit_middleware, KeyExtractor, RateLimiter};
use clinsim_core::store::FallbackMirror;

#[derive(Parser)]
#[command(
    name = "clinsim-core",
    about = "Resilience core for the clinical-simulation backend"
)]
struct Args {
    /// Path to a TOML configuration file (defaults apply when omitted).
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Service objects injected into handlers.
#[derive(Clone)]
struct AppState {
    breaker: Arc<CircuitBreaker>,
    cache: ConversationCache,
    mirror: FallbackMirror,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };

    logging::init(&format!(
        "clinsim_core={},tower_http=info",
        config.observability.log_level
    ));

    tracing::info!("clinsim-core v0.1.0 starting");
    tracing::info!(
        bind_address = %config.listener.bind_address,
        breaker_failure_threshold = config.breaker.failure_threshold,
        breaker_recovery_ms = config.breaker.recovery_ms,
        cache_ttl_ms = config.cache.ttl_ms,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => {
                tracing::error!(
                    metrics_address = %config.observability.metrics_address,
                    "Failed to parse metrics address"
                );
            }
        }
    }

    let shutdown = Shutdown::new();

    // Service construction: one breaker per protected dependency, one limiter
    // per operation class. Handlers receive these by reference; nothing is a
    // global.
    let breaker = Arc::new(CircuitBreaker::new("primary-store", config.breaker.clone()));
    let cache = ConversationCache::new(config.cache.clone());
    let mirror = FallbackMirror::new();

    let auth_limiter = RateLimiter::new("auth", &config.rate_limits.auth, KeyExtractor::PeerIp);
    let api_limiter = RateLimiter::new("api", &config.rate_limits.api, KeyExtractor::StudentEmail);
    let evaluation_limiter = RateLimiter::new(
        "evaluation",
        &config.rate_limits.evaluation,
        KeyExtractor::EmailAndSession,
    );

    // Background sweeps, drained on shutdown.
    let mut sweeps = Vec::new();
    sweeps.push(
        Sweeper::new(
            "conversation-cache",
            Duration::from_millis(config.cache.sweep_interval_ms),
        )
        .spawn(shutdown.subscribe(), {
            let cache = cache.clone();
            move || {
                cache.sweep();
            }
        }),
    );
    sweeps.push(
        Sweeper::new(
            "rate-limit-windows",
            Duration::from_millis(config.rate_limits.sweep_interval_ms),
        )
        .spawn(shutdown.subscribe(), {
            let limiters = [
                auth_limiter,
                api_limiter.clone(),
                evaluation_limiter,
            ];
            move || {
                for limiter in &limiters {
                    limiter.sweep();
                }
            }
        }),
    );

    {
        let shutdown = shutdown.clone();
        tokio::spawn(async move {
            signals::shutdown_on_signal(&shutdown).await;
        });
    }

    let state = AppState {
        breaker,
        cache,
        mirror,
    };

    // The embedding backend nests its scenario/session/evaluation routes
    // under the same limiter layers; this binary exposes the operational
    // surface.
    let app = Router::new()
        .route("/status", get(status))
        .layer(middleware::from_fn_with_state(
            api_limiter,
            rate_limit_middleware,
        ))
        .route("/healthz", get(healthz))
        .with_state(state)
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.listener.request_timeout_secs,
        )))
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(&config.listener.bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    let mut server_shutdown = shutdown.subscribe();
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(async move {
        let _ = server_shutdown.recv().await;
        tracing::info!("Shutdown signal received, draining");
    })
    .await?;

    // Covers non-signal exits as well; triggering twice is harmless.
    shutdown.trigger();
    for handle in sweeps {
        let _ = handle.await;
    }

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Liveness probe; deliberately outside the rate limiter.
async fn healthz() -> &'static str {
    "ok"
}

/// Degradation posture: circuit state, cache occupancy, mirror contents.
async fn status(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "breaker": state.breaker.snapshot(),
        "cache": { "sessions": state.cache.len() },
        "mirror": state.mirror.summary(),
    }))
}
