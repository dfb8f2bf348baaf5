//! In-memory conversation state, TTL-evicted.

use std::collections::{BTreeSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::Serialize;
use tokio::time::Instant;

use crate::config::schema::CacheConfig;
use crate::memory::heuristics;
use crate::observability::metrics;

/// Role inference only looks at the first few exchanges.
const EARLY_WINDOW: usize = 6;

/// Upper bound on tracked symptoms/questions per session.
const MAX_TRACKED: usize = 32;

/// Which clinical role the student is addressed as. Best-effort annotation;
/// unrelated to any authentication role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StudentRole {
    Unknown,
    Nurse,
    Doctor,
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeakerRole {
    Student,
    Patient,
}

impl SpeakerRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SpeakerRole::Student => "student",
            SpeakerRole::Patient => "patient",
        }
    }
}

/// One message in a session's bounded history.
#[derive(Debug, Clone, Serialize)]
pub struct CachedMessage {
    pub content: String,
    pub role: SpeakerRole,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Heuristic annotations accumulated over a session.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MedicalContext {
    pub symptoms_discussed: BTreeSet<String>,
    pub questions_asked: BTreeSet<String>,
}

/// Per-session simulation state.
#[derive(Debug, Clone)]
pub struct ConversationMemory {
    pub student_email: String,
    pub scenario_id: String,
    pub student_role: StudentRole,
    pub patient_persona: String,
    pub history: VecDeque<CachedMessage>,
    pub medical: MedicalContext,
    last_activity: Instant,
}

impl ConversationMemory {
    pub fn last_activity(&self) -> Instant {
        self.last_activity
    }
}

/// History plus annotations, shaped for prompt assembly.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationContext {
    pub student_role: StudentRole,
    pub patient_persona: String,
    pub history: Vec<PromptMessage>,
    pub symptoms_discussed: Vec<String>,
    pub questions_asked: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: &'static str,
    pub content: String,
}

/// Time-bounded cache of per-session conversation state.
///
/// Cheap to clone; all clones share the same session map. Entries die with
/// the process; durable records are the store layer's concern.
#[derive(Clone)]
pub struct ConversationCache {
    config: CacheConfig,
    sessions: Arc<DashMap<String, ConversationMemory>>,
}

impl ConversationCache {
    pub fn new(config: CacheConfig) -> Self {
        tracing::info!(
            ttl_ms = config.ttl_ms,
            max_history_messages = config.max_history_messages,
            "Conversation cache initialized"
        );
        Self {
            config,
            sessions: Arc::new(DashMap::new()),
        }
    }

    /// Create the session's memory, or refresh its activity stamp if it
    /// already exists. Returns a snapshot of the entry either way.
    pub fn initialize(
        &self,
        session_id: &str,
        student_email: &str,
        scenario_id: &str,
        patient_persona: &str,
    ) -> ConversationMemory {
        let mut entry = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(
                    session = session_id,
                    scenario = scenario_id,
                    "Conversation memory created"
                );
                ConversationMemory {
                    student_email: student_email.to_string(),
                    scenario_id: scenario_id.to_string(),
                    student_role: StudentRole::Unknown,
                    patient_persona: patient_persona.to_string(),
                    history: VecDeque::new(),
                    medical: MedicalContext::default(),
                    last_activity: Instant::now(),
                }
            });
        entry.last_activity = Instant::now();
        let memory = entry.clone();
        drop(entry);

        metrics::record_cache_size(self.sessions.len());
        memory
    }

    /// Append a message to the session's history, truncating oldest-first,
    /// and update the heuristic annotations.
    ///
    /// Returns false for sessions the cache has never seen (or already
    /// evicted); callers re-initialize in that case.
    pub fn add_message(
        &self,
        session_id: &str,
        content: &str,
        role: SpeakerRole,
        metadata: Option<serde_json::Value>,
    ) -> bool {
        let Some(mut entry) = self.sessions.get_mut(session_id) else {
            tracing::debug!(session = session_id, "Message for unknown session ignored");
            return false;
        };
        entry.last_activity = Instant::now();

        if entry.student_role == StudentRole::Unknown && entry.history.len() < EARLY_WINDOW {
            if let Some(role_guess) = heuristics::infer_addressed_role(content) {
                tracing::debug!(session = session_id, role = ?role_guess, "Student role inferred");
                entry.student_role = role_guess;
            }
        }
        for symptom in heuristics::match_symptoms(content) {
            if entry.medical.symptoms_discussed.len() >= MAX_TRACKED {
                break;
            }
            entry.medical.symptoms_discussed.insert(symptom.to_string());
        }
        if role == SpeakerRole::Student {
            if let Some(question) = heuristics::normalize_question(content) {
                if entry.medical.questions_asked.len() < MAX_TRACKED {
                    entry.medical.questions_asked.insert(question);
                }
            }
        }

        entry.history.push_back(CachedMessage {
            content: content.to_string(),
            role,
            timestamp: epoch_millis(),
            metadata,
        });
        while entry.history.len() > self.config.max_history_messages {
            entry.history.pop_front();
        }
        true
    }

    /// Snapshot a session's state for prompt assembly. Read-only: does not
    /// refresh the activity stamp.
    pub fn context(&self, session_id: &str) -> Option<ConversationContext> {
        let entry = self.sessions.get(session_id)?;
        Some(ConversationContext {
            student_role: entry.student_role,
            patient_persona: entry.patient_persona.clone(),
            history: entry
                .history
                .iter()
                .map(|m| PromptMessage {
                    role: m.role.as_str(),
                    content: m.content.clone(),
                })
                .collect(),
            symptoms_discussed: entry.medical.symptoms_discussed.iter().cloned().collect(),
            questions_asked: entry.medical.questions_asked.iter().cloned().collect(),
        })
    }

    /// Drop a session's memory (session ended or was abandoned).
    pub fn clear(&self, session_id: &str) -> bool {
        let removed = self.sessions.remove(session_id).is_some();
        if removed {
            tracing::debug!(session = session_id, "Conversation memory cleared");
            metrics::record_cache_size(self.sessions.len());
        }
        removed
    }

    /// Evict sessions idle longer than the TTL. Returns the eviction count.
    pub fn sweep(&self) -> usize {
        let ttl = Duration::from_millis(self.config.ttl_ms);
        let before = self.sessions.len();
        self.sessions
            .retain(|_, memory| memory.last_activity.elapsed() <= ttl);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            tracing::info!(evicted, live = self.sessions.len(), "Evicted idle conversations");
            metrics::record_cache_evictions(evicted);
        }
        metrics::record_cache_size(self.sessions.len());
        evicted
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
