//! Degradation-aware access to the primary store.
//!
//! Every durable call goes through the circuit breaker; the mirror shadows
//! writes regardless of outcome and answers reads the primary cannot.
//! Callers see fresh data, mirrored data explicitly marked as such, or a
//! normal not-found. Raw connection errors stop here.

use std::sync::Arc;

use crate::observability::metrics;
use crate::resilience::circuit_breaker::CircuitBreaker;
use crate::store::mirror::{FallbackMirror, Mirrored};
use crate::store::primary::PrimaryStore;
use crate::store::records::{EvaluationRecord, MessageRecord, SessionRecord};

/// The database-access layer handed to request handlers.
///
/// Cheap to clone; clones share the breaker and the mirror.
#[derive(Clone)]
pub struct DataAccess {
    primary: Arc<dyn PrimaryStore>,
    breaker: Arc<CircuitBreaker>,
    mirror: FallbackMirror,
}

impl DataAccess {
    pub fn new(
        primary: Arc<dyn PrimaryStore>,
        breaker: Arc<CircuitBreaker>,
        mirror: FallbackMirror,
    ) -> Self {
        Self {
            primary,
            breaker,
            mirror,
        }
    }

    pub fn mirror(&self) -> &FallbackMirror {
        &self.mirror
    }

    /// Write a session record. The mirror keeps a copy either way; a failed
    /// primary write degrades to the mirrored copy, flagged `is_fallback`.
    pub async fn put_session(&self, record: SessionRecord) -> Mirrored<SessionRecord> {
        let primary = self.primary.clone();
        let payload = record.clone();
        let result = self
            .breaker
            .execute(move || async move { primary.put_session(&payload).await })
            .await;

        let is_fallback = match result {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(session = %record.id, error = %err, "Session write degraded to mirror");
                true
            }
        };
        metrics::record_mirror_write("session", is_fallback);
        self.mirror.record_session(record, is_fallback)
    }

    /// Read a session, serving the mirrored copy when the primary errors or
    /// has lost visibility of the row.
    pub async fn get_session(&self, id: &str) -> Option<Mirrored<SessionRecord>> {
        let primary = self.primary.clone();
        let key = id.to_string();
        match self
            .breaker
            .execute(move || async move { primary.get_session(&key).await })
            .await
        {
            Ok(Some(record)) => Some(self.mirror.record_session(record, false)),
            Ok(None) => self.mirrored_session(id),
            Err(err) => {
                tracing::warn!(session = %id, error = %err, "Session read degraded to mirror");
                self.mirrored_session(id)
            }
        }
    }

    pub async fn append_message(&self, record: MessageRecord) -> Mirrored<MessageRecord> {
        let primary = self.primary.clone();
        let payload = record.clone();
        let result = self
            .breaker
            .execute(move || async move { primary.append_message(&payload).await })
            .await;

        let is_fallback = match result {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(
                    session = %record.session_id,
                    error = %err,
                    "Message write degraded to mirror"
                );
                true
            }
        };
        metrics::record_mirror_write("message", is_fallback);
        self.mirror.record_message(record, is_fallback)
    }

    /// Read a session's transcript. A healthy primary refreshes the mirrored
    /// copy; an empty or failed read falls back to whatever the mirror holds.
    pub async fn list_messages(&self, session_id: &str) -> Vec<Mirrored<MessageRecord>> {
        let primary = self.primary.clone();
        let key = session_id.to_string();
        match self
            .breaker
            .execute(move || async move { primary.list_messages(&key).await })
            .await
        {
            Ok(records) if !records.is_empty() => {
                self.mirror.replace_messages(session_id, records);
                self.mirror.messages(session_id)
            }
            Ok(_) => {
                let mirrored = self.mirror.messages(session_id);
                if !mirrored.is_empty() {
                    metrics::record_mirror_serve("message");
                    tracing::info!(session = %session_id, "Serving transcript from fallback mirror");
                }
                mirrored
            }
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "Transcript read degraded to mirror");
                let mirrored = self.mirror.messages(session_id);
                if !mirrored.is_empty() {
                    metrics::record_mirror_serve("message");
                }
                mirrored
            }
        }
    }

    pub async fn put_evaluation(&self, record: EvaluationRecord) -> Mirrored<EvaluationRecord> {
        let primary = self.primary.clone();
        let payload = record.clone();
        let result = self
            .breaker
            .execute(move || async move { primary.put_evaluation(&payload).await })
            .await;

        let is_fallback = match result {
            Ok(()) => false,
            Err(err) => {
                tracing::warn!(
                    session = %record.session_id,
                    error = %err,
                    "Evaluation write degraded to mirror"
                );
                true
            }
        };
        metrics::record_mirror_write("evaluation", is_fallback);
        self.mirror.record_evaluation(record, is_fallback)
    }

    pub async fn get_evaluation(&self, session_id: &str) -> Option<Mirrored<EvaluationRecord>> {
        let primary = self.primary.clone();
        let key = session_id.to_string();
        match self
            .breaker
            .execute(move || async move { primary.get_evaluation(&key).await })
            .await
        {
            Ok(Some(record)) => Some(self.mirror.record_evaluation(record, false)),
            Ok(None) => self.mirrored_evaluation(session_id),
            Err(err) => {
                tracing::warn!(session = %session_id, error = %err, "Evaluation read degraded to mirror");
                self.mirrored_evaluation(session_id)
            }
        }
    }

    /// Delete a session from the primary (best effort) and drop its mirrored
    /// state. Returns true if the mirror held anything for the session.
    pub async fn delete_session(&self, id: &str) -> bool {
        let primary = self.primary.clone();
        let key = id.to_string();
        if let Err(err) = self
            .breaker
            .execute(move || async move { primary.delete_session(&key).await })
            .await
        {
            tracing::warn!(session = %id, error = %err, "Primary delete failed; clearing mirror anyway");
        }
        self.mirror.clear_session(id)
    }

    fn mirrored_session(&self, id: &str) -> Option<Mirrored<SessionRecord>> {
        let hit = self.mirror.session(id);
        if hit.is_some() {
            metrics::record_mirror_serve("session");
            tracing::info!(session = %id, "Serving session from fallback mirror");
        }
        hit
    }

    fn mirrored_evaluation(&self, session_id: &str) -> Option<Mirrored<EvaluationRecord>> {
        let hit = self.mirror.evaluation(session_id);
        if hit.is_some() {
            metrics::record_mirror_serve("evaluation");
            tracing::info!(session = %session_id, "Serving evaluation from fallback mirror");
        }
        hit
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::BreakerConfig;
    use crate::store::primary::StoreError;
    use crate::store::records::SessionStatus;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// Primary store double: fails every call while `down` is set.
    #[derive(Default)]
    struct ScriptedStore {
        down: AtomicBool,
        sessions: Mutex<HashMap<String, SessionRecord>>,
        messages: Mutex<HashMap<String, Vec<MessageRecord>>>,
        evaluations: Mutex<HashMap<String, EvaluationRecord>>,
    }

    impl ScriptedStore {
        fn set_down(&self, down: bool) {
            self.down.store(down, Ordering::SeqCst);
        }

        fn check(&self) -> Result<(), StoreError> {
            if self.down.load(Ordering::SeqCst) {
                Err(StoreError::Unavailable("injected outage".to_string()))
            } else {
                Ok(())
            }
        }
    }

    #[async_trait]
    impl PrimaryStore for ScriptedStore {
        async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
            self.check()?;
            Ok(self.sessions.lock().unwrap().get(id).cloned())
        }

        async fn put_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
            self.check()?;
            self.sessions
                .lock()
                .unwrap()
                .insert(record.id.clone(), record.clone());
            Ok(())
        }

        async fn append_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
            self.check()?;
            self.messages
                .lock()
                .unwrap()
                .entry(record.session_id.clone())
                .or_default()
                .push(record.clone());
            Ok(())
        }

        async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
            self.check()?;
            Ok(self
                .messages
                .lock()
                .unwrap()
                .get(session_id)
                .cloned()
                .unwrap_or_default())
        }

        async fn put_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
            self.check()?;
            self.evaluations
                .lock()
                .unwrap()
                .insert(record.session_id.clone(), record.clone());
            Ok(())
        }

        async fn get_evaluation(
            &self,
            session_id: &str,
        ) -> Result<Option<EvaluationRecord>, StoreError> {
            self.check()?;
            Ok(self.evaluations.lock().unwrap().get(session_id).cloned())
        }

        async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
            self.check()?;
            self.sessions.lock().unwrap().remove(id);
            self.messages.lock().unwrap().remove(id);
            self.evaluations.lock().unwrap().remove(id);
            Ok(())
        }
    }

    fn access() -> (Arc<ScriptedStore>, DataAccess) {
        let store = Arc::new(ScriptedStore::default());
        let breaker = Arc::new(CircuitBreaker::new(
            "primary-store",
            BreakerConfig {
                failure_threshold: 100,
                startup_grace_ms: 0,
                ..BreakerConfig::default()
            },
        ));
        let data = DataAccess::new(store.clone(), breaker, FallbackMirror::new());
        (store, data)
    }

    #[tokio::test(start_paused = true)]
    async fn healthy_write_shadows_without_fallback_flag() {
        let (_, data) = access();
        let mirrored = data
            .put_session(SessionRecord::new("s1", "a@uni.edu", "scenario"))
            .await;
        assert!(!mirrored.is_fallback);
        assert!(!data.mirror().session("s1").unwrap().is_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn failed_write_returns_flagged_mirror_copy() {
        let (store, data) = access();
        store.set_down(true);

        let mirrored = data
            .put_session(SessionRecord::new("s1", "a@uni.edu", "scenario"))
            .await;
        assert!(mirrored.is_fallback);

        // The session stays readable even though the primary never saw it.
        let served = data.get_session("s1").await.unwrap();
        assert!(served.is_fallback);
        assert_eq!(served.record.id, "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn missing_primary_row_served_from_mirror() {
        let (store, data) = access();
        store.set_down(true);
        data.put_session(SessionRecord::new("s1", "a@uni.edu", "scenario"))
            .await;
        store.set_down(false);

        // Primary is healthy again but never stored the row.
        let served = data.get_session("s1").await.unwrap();
        assert!(served.is_fallback);
    }

    #[tokio::test(start_paused = true)]
    async fn absent_everywhere_is_not_found() {
        let (_, data) = access();
        assert!(data.get_session("ghost").await.is_none());
        assert!(data.get_evaluation("ghost").await.is_none());
        assert!(data.list_messages("ghost").await.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn transcript_outage_serves_mirrored_messages() {
        let (store, data) = access();
        data.append_message(MessageRecord::new("s1", "student", "hello"))
            .await;
        data.append_message(MessageRecord::new("s1", "patient", "hi there"))
            .await;

        store.set_down(true);
        let transcript = data.list_messages("s1").await;
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].record.content, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn successful_read_refreshes_mirror() {
        let (store, data) = access();
        data.put_session(SessionRecord::new("s1", "a@uni.edu", "scenario"))
            .await;

        // The primary moves on (another instance completed the session).
        let mut updated = SessionRecord::new("s1", "a@uni.edu", "scenario");
        updated.status = SessionStatus::Completed;
        store
            .sessions
            .lock()
            .unwrap()
            .insert("s1".to_string(), updated);

        let served = data.get_session("s1").await.unwrap();
        assert_eq!(served.record.status, SessionStatus::Completed);
        assert_eq!(
            data.mirror().session("s1").unwrap().record.status,
            SessionStatus::Completed
        );
    }

    #[tokio::test(start_paused = true)]
    async fn delete_clears_mirror_even_when_primary_down() {
        let (store, data) = access();
        data.put_session(SessionRecord::new("s1", "a@uni.edu", "scenario"))
            .await;
        store.set_down(true);

        assert!(data.delete_session("s1").await);
        assert!(data.get_session("s1").await.is_none());
    }
}
