use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Answer recorded when a question is skipped.
pub const SKIPPED_ANSWER: &str = "No response provided";

/// Identity of one interview run. Speech events carry it so that late
/// callbacks from a torn-down session can be told apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// What the candidate is interviewing for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterviewTarget {
    pub role_title: String,
    /// Free-form level, e.g. "junior", "mid", "senior".
    pub difficulty: String,
}

/// One completed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub question: String,
    pub answer: String,
    pub duration_ms: u64,
}

impl ResponseRecord {
    pub fn was_skipped(&self) -> bool {
        self.answer == SKIPPED_ANSWER
    }
}

/// How the user closes the current turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    Answered,
    Skipped,
}

/// Result of an `advance` request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AdvanceResult {
    /// Not valid in the current phase, or answered with nothing to record.
    Rejected,
    /// The next question (zero-based index) is being spoken.
    NextQuestion { index: usize },
    Completed,
}

/// Structured evaluation of a finished interview.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PerformanceReport {
    /// 0 – 100
    pub overall_score: u8,
    pub confidence: String,
    pub tone: String,
    pub answer_quality: String,
    pub strengths: Vec<String>,
    pub improvements: Vec<String>,
    pub feedback: String,
}

/// Where a piece of session content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentSource {
    Generated,
    Fallback,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_turn_outcome_serde_is_snake_case() {
        let outcome: TurnOutcome = serde_json::from_str(r#""skipped""#).unwrap();
        assert_eq!(outcome, TurnOutcome::Skipped);
        assert_eq!(
            serde_json::to_string(&TurnOutcome::Answered).unwrap(),
            r#""answered""#
        );
    }

    #[test]
    fn test_advance_result_is_tagged() {
        let json = serde_json::to_value(AdvanceResult::NextQuestion { index: 2 }).unwrap();
        assert_eq!(json["status"], "next_question");
        assert_eq!(json["index"], 2);
    }

    #[test]
    fn test_skipped_record_detection() {
        let record = ResponseRecord {
            question: "Why us?".to_string(),
            answer: SKIPPED_ANSWER.to_string(),
            duration_ms: 0,
        };
        assert!(record.was_skipped());
    }
}
