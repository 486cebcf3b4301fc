//! The mutable aggregate of one interview run.
//!
//! Phase-specific data lives inside the `Phase` variants, so an in-progress
//! answer only exists while a turn is open and a report only exists once the
//! interview is over.

use serde::Serialize;
use tokio::time::Instant;

use crate::interview::models::{ContentSource, PerformanceReport, ResponseRecord};

#[derive(Debug, Clone, PartialEq)]
pub enum Phase {
    /// Questions not generated yet.
    NotStarted,
    AwaitingSpeak(SpeakState),
    Listening { turn: Turn, capture: CaptureStatus },
    /// Capture is over; waiting for the user to advance or skip.
    AwaitingAdvance { turn: Turn },
    Completed(Completion),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpeakState {
    /// Questions are ready and the interview has not begun.
    Ready,
    /// A prompt is playing.
    Speaking,
    /// Playback ended; capture starts at `listen_at`.
    Settling { listen_at: Instant },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    Active,
    PermissionDenied,
}

/// An open answer window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Turn {
    pub started_at: Instant,
    /// Finalized transcript so far.
    pub answer: String,
    /// Unstable recognizer output, shown to the user but never recorded.
    pub interim: String,
}

impl Turn {
    pub fn new(started_at: Instant) -> Self {
        Self {
            started_at,
            answer: String::new(),
            interim: String::new(),
        }
    }

    pub fn elapsed_ms(&self, now: Instant) -> u64 {
        let millis = now.saturating_duration_since(self.started_at).as_millis();
        u64::try_from(millis).unwrap_or(u64::MAX)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Completion {
    Evaluating,
    Reported {
        report: PerformanceReport,
        source: ContentSource,
    },
}

/// Coarse phase label for clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    NotStarted,
    AwaitingSpeak,
    Listening,
    AwaitingAdvance,
    Completed,
}

impl Phase {
    pub fn kind(&self) -> PhaseKind {
        match self {
            Phase::NotStarted => PhaseKind::NotStarted,
            Phase::AwaitingSpeak(_) => PhaseKind::AwaitingSpeak,
            Phase::Listening { .. } => PhaseKind::Listening,
            Phase::AwaitingAdvance { .. } => PhaseKind::AwaitingAdvance,
            Phase::Completed(_) => PhaseKind::Completed,
        }
    }

    pub fn turn(&self) -> Option<&Turn> {
        match self {
            Phase::Listening { turn, .. } | Phase::AwaitingAdvance { turn } => Some(turn),
            _ => None,
        }
    }

    pub fn turn_mut(&mut self) -> Option<&mut Turn> {
        match self {
            Phase::Listening { turn, .. } | Phase::AwaitingAdvance { turn } => Some(turn),
            _ => None,
        }
    }

    pub fn is_capturing(&self) -> bool {
        matches!(
            self,
            Phase::Listening {
                capture: CaptureStatus::Active,
                ..
            }
        )
    }
}

#[derive(Debug, Clone)]
pub struct Session {
    questions: Vec<String>,
    question_source: Option<ContentSource>,
    current_index: usize,
    responses: Vec<ResponseRecord>,
    pub phase: Phase,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        Self {
            questions: Vec::new(),
            question_source: None,
            current_index: 0,
            responses: Vec::new(),
            phase: Phase::NotStarted,
        }
    }

    pub fn questions(&self) -> &[String] {
        &self.questions
    }

    pub fn question_source(&self) -> Option<ContentSource> {
        self.question_source
    }

    pub fn current_index(&self) -> usize {
        self.current_index
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn current_question(&self) -> Option<&str> {
        self.questions.get(self.current_index).map(String::as_str)
    }

    pub fn has_questions(&self) -> bool {
        self.question_source.is_some()
    }

    /// Installs the question list. Only the first call has any effect.
    pub fn set_questions(&mut self, questions: Vec<String>, source: ContentSource) -> bool {
        if self.has_questions() || questions.is_empty() {
            return false;
        }
        self.questions = questions;
        self.question_source = Some(source);
        self.phase = Phase::AwaitingSpeak(SpeakState::Ready);
        true
    }

    /// Appends the record for the current question and moves past it.
    /// Returns the next index, or `None` when that was the last question.
    pub fn record_and_advance(&mut self, answer: String, duration_ms: u64) -> Option<usize> {
        let question = self.questions[self.current_index].clone();
        self.responses.push(ResponseRecord {
            question,
            answer,
            duration_ms,
        });

        if self.current_index + 1 < self.questions.len() {
            self.current_index += 1;
            Some(self.current_index)
        } else {
            None
        }
    }

    pub fn report(&self) -> Option<(&PerformanceReport, ContentSource)> {
        match &self.phase {
            Phase::Completed(Completion::Reported { report, source }) => Some((report, *source)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn questions(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("Question {i}?")).collect()
    }

    #[test]
    fn test_new_session_is_not_started() {
        let session = Session::new();
        assert_eq!(session.phase.kind(), PhaseKind::NotStarted);
        assert!(session.current_question().is_none());
        assert!(session.report().is_none());
    }

    #[test]
    fn test_set_questions_only_once() {
        let mut session = Session::new();
        assert!(session.set_questions(questions(2), ContentSource::Generated));
        assert!(!session.set_questions(questions(5), ContentSource::Fallback));
        assert_eq!(session.questions().len(), 2);
        assert_eq!(session.question_source(), Some(ContentSource::Generated));
        assert_eq!(session.phase, Phase::AwaitingSpeak(SpeakState::Ready));
    }

    #[test]
    fn test_set_questions_rejects_empty_list() {
        let mut session = Session::new();
        assert!(!session.set_questions(Vec::new(), ContentSource::Generated));
        assert_eq!(session.phase.kind(), PhaseKind::NotStarted);
    }

    #[test]
    fn test_record_and_advance_keeps_index_and_responses_in_step() {
        let mut session = Session::new();
        session.set_questions(questions(2), ContentSource::Generated);

        assert_eq!(session.record_and_advance("first".to_string(), 10), Some(1));
        assert_eq!(session.responses().len(), session.current_index());

        assert_eq!(session.record_and_advance("second".to_string(), 20), None);
        assert_eq!(session.responses().len(), 2);
        assert_eq!(session.responses()[1].question, "Question 2?");
        assert_eq!(session.current_index(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_turn_elapsed_ms() {
        let turn = Turn::new(Instant::now());
        tokio::time::advance(std::time::Duration::from_millis(1250)).await;
        assert_eq!(turn.elapsed_ms(Instant::now()), 1250);
    }
}
