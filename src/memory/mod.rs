//! Conversation memory subsystem.
//!
//! # Data Flow
//! ```text
//! Session starts:
//!     → conversation.rs initialize (idempotent per session)
//! Each exchange:
//!     → add_message (bounded FIFO history)
//!     → heuristics.rs (addressed role, symptoms, questions; best effort)
//! Prompt assembly:
//!     → context (formatted history + annotations)
//! Idle sessions:
//!     → sweep (TTL eviction, driven by a lifecycle Sweeper)
//! ```
//!
//! # Design Decisions
//! - Simulation continuity only; durable records live in the store layer
//! - History is truncated synchronously on every append, never unbounded
//! - Heuristic annotations are hints for the simulation prompt, not ground
//!   truth; nothing authorizes or persists based on them

pub mod conversation;
pub mod heuristics;

pub use conversation::{ConversationCache, ConversationContext, SpeakerRole, StudentRole};
