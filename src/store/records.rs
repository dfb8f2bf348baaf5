//! Durable record types mirrored by the fallback layer.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle of a student session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Completed,
    Abandoned,
}

/// A student's run through one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Session identifier; the natural key for mirroring.
    pub id: String,
    pub student_email: String,
    pub scenario_id: String,
    pub status: SessionStatus,
    /// Milliseconds since the Unix epoch.
    pub started_at: u64,
    pub completed_at: Option<u64>,
}

impl SessionRecord {
    pub fn new(id: impl Into<String>, student_email: impl Into<String>, scenario_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            student_email: student_email.into(),
            scenario_id: scenario_id.into(),
            status: SessionStatus::Active,
            started_at: epoch_millis(),
            completed_at: None,
        }
    }
}

/// One exchange in a session's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageRecord {
    pub id: String,
    pub session_id: String,
    /// "student" or "patient".
    pub role: String,
    pub content: String,
    pub created_at: u64,
}

impl MessageRecord {
    pub fn new(session_id: impl Into<String>, role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            role: role.into(),
            content: content.into(),
            created_at: epoch_millis(),
        }
    }
}

/// AI-generated evaluation of a completed session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationRecord {
    pub id: String,
    /// One evaluation per session; the natural key for mirroring.
    pub session_id: String,
    pub student_email: String,
    pub overall_score: f64,
    pub feedback: String,
    pub created_at: u64,
}

impl EvaluationRecord {
    pub fn new(
        session_id: impl Into<String>,
        student_email: impl Into<String>,
        overall_score: f64,
        feedback: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            session_id: session_id.into(),
            student_email: student_email.into(),
            overall_score,
            feedback: feedback.into(),
            created_at: epoch_millis(),
        }
    }
}

pub(crate) fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
