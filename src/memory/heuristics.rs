//! Best-effort conversation annotations.
//!
//! Light keyword matching over message text: which clinical role the student
//! addresses, which symptoms have come up, which questions were asked. Lossy
//! on purpose. The annotations enrich the simulation prompt and nothing
//! else; they are never treated as authoritative.

use crate::memory::conversation::StudentRole;

/// Symptom vocabulary matched as lowercase substrings.
const SYMPTOM_KEYWORDS: &[&str] = &[
    "pain",
    "ache",
    "headache",
    "fever",
    "chills",
    "cough",
    "wheezing",
    "breath",
    "palpitations",
    "chest",
    "nausea",
    "vomiting",
    "diarrhea",
    "constipation",
    "appetite",
    "dizzy",
    "dizziness",
    "fatigue",
    "tired",
    "weakness",
    "numbness",
    "tingling",
    "swelling",
    "rash",
    "bleeding",
    "sweating",
    "insomnia",
];

const QUESTION_OPENERS: &[&str] = &[
    "who", "what", "when", "where", "why", "how", "do you", "does ", "did you", "have you",
    "has ", "are you", "is ", "can you", "could you", "would you", "tell me", "describe",
];

/// Guess which role the student is being addressed as (or claims).
pub fn infer_addressed_role(content: &str) -> Option<StudentRole> {
    let lower = content.to_lowercase();
    if lower.contains("nurse") {
        Some(StudentRole::Nurse)
    } else if lower.contains("doctor") || lower.contains("dr.") || lower.contains("physician") {
        Some(StudentRole::Doctor)
    } else {
        None
    }
}

/// Symptom keywords mentioned in the message.
pub fn match_symptoms(content: &str) -> Vec<&'static str> {
    let lower = content.to_lowercase();
    SYMPTOM_KEYWORDS
        .iter()
        .copied()
        .filter(|keyword| lower.contains(keyword))
        .collect()
}

/// If the message reads as a question, a normalized form of it.
pub fn normalize_question(content: &str) -> Option<String> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return None;
    }
    let lower = trimmed.to_lowercase();
    let interrogative = QUESTION_OPENERS.iter().any(|opener| lower.starts_with(opener));
    if trimmed.ends_with('?') || interrogative {
        Some(lower.trim_end_matches('?').trim().to_string())
    } else {
        None
    }
}
