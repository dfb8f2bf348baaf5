//! End-to-end degradation scenarios: store outage, circuit opening, mirror
//! fallback, recovery.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::advance;

use clinsim_core::config::schema::BreakerConfig;
use clinsim_core::resilience::circuit_breaker::{CircuitBreaker, CircuitState};
use clinsim_core::store::{DataAccess, FallbackMirror, MessageRecord, SessionRecord};

mod common;
use common::FlakyStore;

fn breaker_config() -> BreakerConfig {
    BreakerConfig {
        failure_threshold: 3,
        recovery_ms: 60_000,
        startup_grace_ms: 0,
        ..BreakerConfig::default()
    }
}

#[tokio::test(start_paused = true)]
async fn outage_opens_circuit_and_mirror_keeps_session_readable() {
    let store = Arc::new(FlakyStore::default());
    let breaker = Arc::new(CircuitBreaker::new("primary-store", breaker_config()));
    let data = DataAccess::new(store.clone(), breaker.clone(), FallbackMirror::new());

    store.set_down(true);

    // Three failing writes trip the circuit; each is served from the mirror,
    // explicitly flagged.
    let session = data
        .put_session(SessionRecord::new("s1", "student@uni.edu", "chest-pain-01"))
        .await;
    assert!(session.is_fallback);
    data.append_message(MessageRecord::new("s1", "student", "Hello, I'm the nurse"))
        .await;
    data.append_message(MessageRecord::new("s1", "patient", "My chest hurts"))
        .await;

    assert_eq!(breaker.state(), CircuitState::Open);
    assert_eq!(store.calls(), 3);

    // While open, reads are rejected before reaching the store but still
    // answer from the mirror.
    let served = data.get_session("s1").await.expect("mirror should answer");
    assert!(served.is_fallback);
    assert_eq!(store.calls(), 3, "open circuit must not touch the store");

    let transcript = data.list_messages("s1").await;
    assert_eq!(transcript.len(), 2);
    assert_eq!(store.calls(), 3);

    // After the recovery window the next call probes the store and closes
    // the circuit.
    advance(Duration::from_millis(60_000)).await;
    store.set_down(false);

    let served = data.get_session("s1").await.expect("mirror should answer");
    assert!(served.is_fallback, "primary never saw the write");
    assert_eq!(breaker.state(), CircuitState::Closed);
    assert_eq!(store.calls(), 4);

    // New writes go to the primary again; no replay of mirrored fallbacks.
    let session = data
        .put_session(SessionRecord::new("s2", "student@uni.edu", "chest-pain-01"))
        .await;
    assert!(!session.is_fallback);
    assert_eq!(store.calls(), 5);
}

#[tokio::test(start_paused = true)]
async fn open_circuit_serves_configured_fallback_then_recovers() {
    let breaker = CircuitBreaker::new("primary-store", breaker_config());

    for _ in 0..3 {
        let result = breaker
            .execute(|| async { Err::<&str, _>("connection refused") })
            .await;
        assert!(result.is_err());
    }
    assert_eq!(breaker.state(), CircuitState::Open);

    // Fourth call: fallback value, real operation untouched.
    let calls = Arc::new(AtomicU32::new(0));
    let c = calls.clone();
    let result = breaker
        .execute_with_fallback(
            move || async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok::<_, &str>("live")
            },
            || Ok("cached"),
        )
        .await;
    assert_eq!(result.unwrap(), "cached");
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    // Fifth call after the recovery window succeeds and closes the circuit.
    advance(Duration::from_millis(60_000)).await;
    let result = breaker.execute(|| async { Ok::<_, &str>("live") }).await;
    assert_eq!(result.unwrap(), "live");
    assert_eq!(breaker.state(), CircuitState::Closed);
}

#[tokio::test(start_paused = true)]
async fn session_teardown_clears_mirrored_state() {
    let store = Arc::new(FlakyStore::default());
    let breaker = Arc::new(CircuitBreaker::new("primary-store", breaker_config()));
    let data = DataAccess::new(store.clone(), breaker, FallbackMirror::new());

    data.put_session(SessionRecord::new("s1", "student@uni.edu", "chest-pain-01"))
        .await;
    data.append_message(MessageRecord::new("s1", "student", "Hello"))
        .await;

    assert!(data.delete_session("s1").await);
    assert!(data.get_session("s1").await.is_none());
    assert!(data.list_messages("s1").await.is_empty());
}
