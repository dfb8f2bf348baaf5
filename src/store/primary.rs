//! Primary store seam.
//!
//! The hosted relational store lives behind this trait; the concrete client
//! (connection pool, SQL, HTTP API) is an external collaborator. Everything
//! in this crate talks to it through [`crate::store::access::DataAccess`],
//! never directly.

use async_trait::async_trait;
use thiserror::Error;

use crate::store::records::{EvaluationRecord, MessageRecord, SessionRecord};

/// Errors surfaced by a primary store implementation.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    /// Could not reach the store at all.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The store answered but the operation failed.
    #[error("query failed: {0}")]
    Query(String),
}

/// Durable operations the resilience layer wraps.
///
/// Reads return `Ok(None)` for missing rows; transient visibility gaps look
/// identical to genuinely absent records, which is exactly why reads fall
/// back to the mirror.
#[async_trait]
pub trait PrimaryStore: Send + Sync {
    async fn get_session(&self, id: &str) -> Result<Option<SessionRecord>, StoreError>;
    async fn put_session(&self, record: &SessionRecord) -> Result<(), StoreError>;

    async fn append_message(&self, record: &MessageRecord) -> Result<(), StoreError>;
    async fn list_messages(&self, session_id: &str) -> Result<Vec<MessageRecord>, StoreError>;

    async fn put_evaluation(&self, record: &EvaluationRecord) -> Result<(), StoreError>;
    async fn get_evaluation(&self, session_id: &str)
        -> Result<Option<EvaluationRecord>, StoreError>;

    async fn delete_session(&self, id: &str) -> Result<(), StoreError>;
}
