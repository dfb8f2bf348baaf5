//! Shared test doubles for the integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use clinsim_core::store::{
    EvaluationRecord, MessageRecord, PrimaryStore, SessionRecord, StoreError,
};

/// Primary store double with a switchable outage and a call counter.
#[derive(Default)]
pub struct FlakyStore {
    down: AtomicBool,
    calls: AtomicU32,
    sessions: Mutex<HashMap<String, SessionRecord>>,
    messages: Mutex<HashMap<String, Vec<MessageRecord>>>,
    evaluations: Mutex<HashMap<String, EvaluationRecord>>,
}

impl FlakyStore {
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    /// Operations that actually reached the store (rejected calls don't).
    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn attempt(&self) -> Result<(), StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("injected outage".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl PrimaryStore for FlakyStore {
    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, StoreError> {
        self.attempt()?;
        Ok(self.sessions.lock().unwrap().get(id).cloned())
    }

    async fn put_session(&self, record: &SessionRecord) -> Result<(), StoreError> {
        self.attempt()?;
        self.sessions
            .lock()
            .unwrap()
            .insert(record.id.clone(), record.clone());
        Ok(())
    }

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StoreError> {
        self.attempt()?;
        self.messages
            .lock()
            .unwrap()
            .entry(record.session_id.clone())
            .or_default()
            .push(record.clone());
        Ok(())
    }

    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, StoreError> {
        self.attempt()?;
        Ok(self
            .messages
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn put_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError> {
        self.attempt()?;
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
        self.attempt()?;
        Ok(self.evaluations.lock().unwrap().get(session_id).cloned())
    }

    async fn delete_session(&self, id: &str) -> Result<(), StoreError> {
        self.attempt()?;
        self.sessions.lock().unwrap().remove(id);
        self.messages.lock().unwrap().remove(id);
        self.evaluations.lock().unwrap().remove(id);
        Ok(())
    }
}
