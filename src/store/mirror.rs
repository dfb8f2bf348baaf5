//! In-memory shadow of durable records.

use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;

use crate::store::records::{epoch_millis, EvaluationRecord, MessageRecord, SessionRecord};

/// A mirrored record plus its provenance.
#[derive(Debug, Clone, Serialize)]
pub struct Mirrored<T> {
    pub record: T,
    /// True when the record stands in for a failed primary write; false for
    /// shadows of successful primary operations.
    pub is_fallback: bool,
    /// Milliseconds since the Unix epoch.
    pub stored_at: u64,
}

impl<T> Mirrored<T> {
    fn new(record: T, is_fallback: bool) -> Self {
        Self {
            record,
            is_fallback,
            stored_at: epoch_millis(),
        }
    }
}

/// Counts reported on the status surface.
#[derive(Debug, Clone, Serialize)]
pub struct MirrorSummary {
    pub sessions: usize,
    pub fallback_sessions: usize,
    pub message_transcripts: usize,
    pub evaluations: usize,
}

/// Per-entity-kind shadow maps, keyed by session identifier.
///
/// Entries live as long as their session; there is no independent eviction.
/// Cheap to clone; all clones share the same maps.
#[derive(Clone, Default)]
pub struct FallbackMirror {
    sessions: Arc<DashMap<String, Mirrored<SessionRecord>>>,
    messages: Arc<DashMap<String, Vec<Mirrored<MessageRecord>>>>,
    evaluations: Arc<DashMap<String, Mirrored<EvaluationRecord>>>,
}

impl FallbackMirror {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_session(&self, record: SessionRecord, is_fallback: bool) -> Mirrored<SessionRecord> {
        let mirrored = Mirrored::new(record, is_fallback);
        self.sessions.insert(mirrored.record.id.clone(), mirrored.clone());
        mirrored
    }

    pub fn session(&self, id: &str) -> Option<Mirrored<SessionRecord>> {
        self.sessions.get(id).map(|r| r.value().clone())
    }

    pub fn record_message(&self, record: MessageRecord, is_fallback: bool) -> Mirrored<MessageRecord> {
        let mirrored = Mirrored::new(record, is_fallback);
        self.messages
            .entry(mirrored.record.session_id.clone())
            .or_default()
            .push(mirrored.clone());
        mirrored
    }

    /// Replace a session's mirrored transcript with a fresh primary snapshot.
    pub fn replace_messages(&self, session_id: &str, records: Vec<MessageRecord>) {
        let mirrored = records
            .into_iter()
            .map(|record| Mirrored::new(record, false))
            .collect();
        self.messages.insert(session_id.to_string(), mirrored);
    }

    pub fn messages(&self, session_id: &str) -> Vec<Mirrored<MessageRecord>> {
        self.messages
            .get(session_id)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn record_evaluation(
        &self,
        record: EvaluationRecord,
        is_fallback: bool,
    ) -> Mirrored<EvaluationRecord> {
        let mirrored = Mirrored::new(record, is_fallback);
        self.evaluations
            .insert(mirrored.record.session_id.clone(), mirrored.clone());
        mirrored
    }

    pub fn evaluation(&self, session_id: &str) -> Option<Mirrored<EvaluationRecord>> {
        self.evaluations.get(session_id).map(|r| r.value().clone())
    }

    /// Drop everything mirrored for a session. Returns true if any entry
    /// existed.
    pub fn clear_session(&self, session_id: &str) -> bool {
        let had_session = self.sessions.remove(session_id).is_some();
        let had_messages = self.messages.remove(session_id).is_some();
        let had_evaluation = self.evaluations.remove(session_id).is_some();
        had_session || had_messages || had_evaluation
    }

    pub fn summary(&self) -> MirrorSummary {
        let fallback_sessions = self
            .sessions
            .iter()
            .filter(|entry| entry.value().is_fallback)
            .count();
        MirrorSummary {
            sessions: self.sessions.len(),
            fallback_sessions,
            message_transcripts: self.messages.len(),
            evaluations: self.evaluations.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shadow_and_fallback_are_flagged() {
        let mirror = FallbackMirror::new();
        mirror.record_session(SessionRecord::new("s1", "a@uni.edu", "scenario"), false);
        mirror.record_session(SessionRecord::new("s2", "b@uni.edu", "scenario"), true);

        assert!(!mirror.session("s1").unwrap().is_fallback);
        assert!(mirror.session("s2").unwrap().is_fallback);

        let summary = mirror.summary();
        assert_eq!(summary.sessions, 2);
        assert_eq!(summary.fallback_sessions, 1);
    }

    #[test]
    fn rewrite_overwrites_under_same_key() {
        let mirror = FallbackMirror::new();
        let mut record = SessionRecord::new("s1", "a@uni.edu", "scenario");
        mirror.record_session(record.clone(), true);

        record.status = crate::store::records::SessionStatus::Completed;
        mirror.record_session(record, false);

        let mirrored = mirror.session("s1").unwrap();
        assert!(!mirrored.is_fallback);
        assert_eq!(
            mirrored.record.status,
            crate::store::records::SessionStatus::Completed
        );
    }

    #[test]
    fn messages_accumulate_per_session() {
        let mirror = FallbackMirror::new();
        mirror.record_message(MessageRecord::new("s1", "student", "hello"), false);
        mirror.record_message(MessageRecord::new("s1", "patient", "hi"), true);
        mirror.record_message(MessageRecord::new("s2", "student", "other"), false);

        let transcript = mirror.messages("s1");
        assert_eq!(transcript.len(), 2);
        assert!(transcript[1].is_fallback);
        assert_eq!(mirror.messages("missing").len(), 0);
    }

    #[test]
    fn clear_session_drops_all_kinds() {
        let mirror = FallbackMirror::new();
        mirror.record_session(SessionRecord::new("s1", "a@uni.edu", "scenario"), false);
        mirror.record_message(MessageRecord::new("s1", "student", "hello"), false);
        mirror.record_evaluation(EvaluationRecord::new("s1", "a@uni.edu", 0.8, "solid"), false);

        assert!(mirror.clear_session("s1"));
        assert!(mirror.session("s1").is_none());
        assert!(mirror.messages("s1").is_empty());
        assert!(mirror.evaluation("s1").is_none());
        assert!(!mirror.clear_session("s1"));
    }
}
