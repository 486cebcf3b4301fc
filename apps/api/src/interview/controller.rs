//! Interview controller: the turn-taking state machine.
//!
//! Flow per turn: speak prompt → (speech finished) → settle for the listen
//! debounce → capture → user advances or skips → record → next prompt.
//! After the last turn: closing remark → evaluation → report.
//!
//! The controller is driven from one place only (the session runner), so no
//! method here is ever called concurrently with another.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::interview::collaborators::{PerformanceEvaluator, QuestionGenerator};
use crate::interview::fallback::{fallback_questions, fallback_report};
use crate::interview::models::{
    AdvanceResult, ContentSource, InterviewTarget, PerformanceReport, ResponseRecord, SessionId,
    TurnOutcome, SKIPPED_ANSWER,
};
use crate::interview::prompts::{CLOSING_SCRIPT, OPENING_SCRIPT, TRANSITION_SCRIPT};
use crate::interview::session::{
    CaptureStatus, Completion, Phase, PhaseKind, Session, SpeakState, Turn,
};
use crate::interview::speech::{
    CaptureError, SessionSignal, SpeechEvent, SpeechInput, SpeechOutput, TranscriptBatch,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterviewSettings {
    pub question_count: usize,
    /// Pause after a prompt finishes so capture does not pick up its tail.
    pub listen_debounce: Duration,
}

impl Default for InterviewSettings {
    fn default() -> Self {
        Self {
            question_count: 8,
            listen_debounce: Duration::from_millis(500),
        }
    }
}

/// The remote services a session depends on.
#[derive(Clone)]
pub struct Collaborators {
    pub generator: Arc<dyn QuestionGenerator>,
    pub evaluator: Arc<dyn PerformanceEvaluator>,
}

/// The speech engines a session drives.
pub struct SpeechDevices {
    pub input: Box<dyn SpeechInput>,
    pub output: Box<dyn SpeechOutput>,
}

/// Client-facing view of a session.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub role_title: String,
    pub difficulty: String,
    pub phase: PhaseKind,
    pub speaking: bool,
    pub question_index: usize,
    pub question_count: usize,
    pub question_source: Option<ContentSource>,
    pub current_question: Option<String>,
    pub live_answer: Option<String>,
    pub interim_answer: Option<String>,
    pub permission_required: bool,
    pub responses: Vec<ResponseRecord>,
    pub report: Option<PerformanceReport>,
    pub report_source: Option<ContentSource>,
    pub closed: bool,
}

pub struct InterviewController {
    id: SessionId,
    target: InterviewTarget,
    settings: InterviewSettings,
    session: Session,
    input: Box<dyn SpeechInput>,
    output: Box<dyn SpeechOutput>,
    collaborators: Collaborators,
    disposed: bool,
}

impl InterviewController {
    pub fn new(
        id: SessionId,
        target: InterviewTarget,
        settings: InterviewSettings,
        collaborators: Collaborators,
        devices: SpeechDevices,
    ) -> Self {
        Self {
            id,
            target,
            settings,
            session: Session::new(),
            input: devices.input,
            output: devices.output,
            collaborators,
            disposed: false,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    #[cfg(test)]
    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn permission_required(&self) -> bool {
        matches!(
            self.session.phase,
            Phase::Listening {
                capture: CaptureStatus::PermissionDenied,
                ..
            }
        )
    }

    // ── Setup ──────────────────────────────────────────────────────────────

    /// Generates the question list. Runs once; later calls do nothing.
    /// Any generator failure falls back to the built-in list.
    pub async fn prepare(&mut self) {
        if self.disposed || self.session.has_questions() {
            return;
        }

        let count = self.settings.question_count.max(1);
        let generated = self
            .collaborators
            .generator
            .generate_questions(&self.target, count)
            .await;

        let (questions, source) = match generated {
            Ok(mut questions) => {
                questions.retain(|q| !q.trim().is_empty());
                questions.truncate(count);
                if questions.is_empty() {
                    warn!(session = %self.id, "question generator returned no questions, using fallback list");
                    (fallback_questions(&self.target.role_title), ContentSource::Fallback)
                } else {
                    (questions, ContentSource::Generated)
                }
            }
            Err(e) => {
                warn!(session = %self.id, "question generation failed, using fallback list: {e}");
                (fallback_questions(&self.target.role_title), ContentSource::Fallback)
            }
        };

        let total = questions.len();
        if self.session.set_questions(questions, source) {
            info!(
                session = %self.id,
                "Prepared {} questions ({:?}) for {} ({})",
                total, source, self.target.role_title, self.target.difficulty
            );
        }
    }

    /// Speaks the opening script and the first question.
    /// Only valid once, from the ready state.
    pub fn start(&mut self) -> bool {
        if self.disposed || self.session.phase != Phase::AwaitingSpeak(SpeakState::Ready) {
            debug!(session = %self.id, phase = ?self.session.phase.kind(), "start ignored");
            return false;
        }
        let Some(first) = self.session.current_question() else {
            return false;
        };

        let script = format!(
            "{}{}",
            OPENING_SCRIPT.replace("{role_title}", &self.target.role_title),
            first
        );
        info!(session = %self.id, "Interview started");
        self.speak_prompt(&script);
        true
    }

    // ── Engine events ──────────────────────────────────────────────────────

    /// Applies an engine event. Returns whether it changed anything.
    pub fn handle_signal(&mut self, signal: SessionSignal) -> bool {
        if self.disposed {
            debug!(session = %self.id, "event after disposal ignored");
            return false;
        }
        if signal.session != self.id {
            debug!(session = %self.id, other = %signal.session, "event for another session ignored");
            return false;
        }

        match signal.event {
            SpeechEvent::SpeechFinished => self.on_speech_finished(),
            SpeechEvent::Transcript(batch) => self.on_transcript(batch),
            SpeechEvent::CaptureEnded => self.on_capture_ended(),
            SpeechEvent::CaptureFailed { error } => self.on_capture_failed(error),
        }
    }

    fn on_speech_finished(&mut self) -> bool {
        if self.session.phase != Phase::AwaitingSpeak(SpeakState::Speaking) {
            return false;
        }
        self.session.phase = Phase::AwaitingSpeak(SpeakState::Settling {
            listen_at: Instant::now() + self.settings.listen_debounce,
        });
        true
    }

    fn on_transcript(&mut self, batch: TranscriptBatch) -> bool {
        let Phase::Listening {
            turn,
            capture: CaptureStatus::Active,
        } = &mut self.session.phase
        else {
            return false;
        };

        // Batches are cumulative, so the latest final text replaces the old one.
        if let Some(text) = batch.final_text() {
            turn.answer = text;
        }
        turn.interim = batch.interim_text();
        true
    }

    fn on_capture_ended(&mut self) -> bool {
        if !self.session.phase.is_capturing() {
            return false;
        }
        self.close_capture()
    }

    fn on_capture_failed(&mut self, error: CaptureError) -> bool {
        match error {
            CaptureError::PermissionDenied => {
                let Phase::Listening { capture, .. } = &mut self.session.phase else {
                    return false;
                };
                warn!(session = %self.id, "microphone permission denied");
                *capture = CaptureStatus::PermissionDenied;
                true
            }
            CaptureError::Unavailable(reason) => {
                warn!(session = %self.id, "speech capture failed: {reason}");
                self.close_capture()
            }
        }
    }

    // ── Timer ──────────────────────────────────────────────────────────────

    /// When the pending listen debounce expires, if one is pending.
    pub fn next_deadline(&self) -> Option<Instant> {
        match self.session.phase {
            Phase::AwaitingSpeak(SpeakState::Settling { listen_at }) if !self.disposed => {
                Some(listen_at)
            }
            _ => None,
        }
    }

    /// Starts capture once the listen debounce has expired.
    pub fn on_tick(&mut self, now: Instant) -> bool {
        match self.next_deadline() {
            Some(listen_at) if now >= listen_at => {
                self.begin_listening(now);
                true
            }
            _ => false,
        }
    }

    fn begin_listening(&mut self, now: Instant) {
        let turn = Turn::new(now);
        self.session.phase = match self.input.start() {
            Ok(()) => Phase::Listening {
                turn,
                capture: CaptureStatus::Active,
            },
            Err(CaptureError::PermissionDenied) => {
                warn!(session = %self.id, "microphone permission denied");
                Phase::Listening {
                    turn,
                    capture: CaptureStatus::PermissionDenied,
                }
            }
            Err(CaptureError::Unavailable(reason)) => {
                warn!(session = %self.id, "could not start speech capture: {reason}");
                Phase::AwaitingAdvance { turn }
            }
        };
    }

    // ── User actions ───────────────────────────────────────────────────────

    /// Retries capture after the user granted microphone access.
    pub fn retry_capture(&mut self) -> bool {
        if self.disposed || !self.permission_required() {
            return false;
        }
        match self.input.start() {
            Ok(()) => {
                if let Phase::Listening { capture, .. } = &mut self.session.phase {
                    *capture = CaptureStatus::Active;
                }
                info!(session = %self.id, "speech capture resumed");
                true
            }
            Err(CaptureError::PermissionDenied) => false,
            Err(CaptureError::Unavailable(reason)) => {
                warn!(session = %self.id, "could not start speech capture: {reason}");
                self.close_capture()
            }
        }
    }

    /// Ends capture early without completing the turn.
    pub fn stop_listening(&mut self) -> bool {
        if self.disposed {
            return false;
        }
        if self.session.phase.is_capturing() {
            self.input.stop();
        }
        self.close_capture()
    }

    /// Replaces the answer with typed text, for users who cannot speak it.
    pub fn type_answer(&mut self, text: &str) -> bool {
        if self.disposed {
            return false;
        }
        match self.session.phase.turn_mut() {
            Some(turn) => {
                turn.answer = text.trim().to_string();
                true
            }
            None => false,
        }
    }

    /// Completes the current turn. This is the only way a turn ends.
    pub async fn advance(&mut self, outcome: TurnOutcome) -> AdvanceResult {
        if self.disposed {
            return AdvanceResult::Rejected;
        }
        let now = Instant::now();
        let Some(turn) = self.session.phase.turn() else {
            debug!(session = %self.id, phase = ?self.session.phase.kind(), "advance ignored");
            return AdvanceResult::Rejected;
        };

        let answer = match outcome {
            TurnOutcome::Answered => {
                let answer = turn.answer.trim();
                if answer.is_empty() {
                    debug!(session = %self.id, "advance with empty answer ignored");
                    return AdvanceResult::Rejected;
                }
                answer.to_string()
            }
            TurnOutcome::Skipped => SKIPPED_ANSWER.to_string(),
        };
        let duration_ms = turn.elapsed_ms(now);

        if self.session.phase.is_capturing() {
            self.input.stop();
        }

        match self.session.record_and_advance(answer, duration_ms) {
            Some(index) => {
                let next = self.session.questions()[index].clone();
                info!(session = %self.id, "Turn {} recorded ({:?})", index, outcome);
                self.speak_prompt(&format!("{TRANSITION_SCRIPT}{next}"));
                AdvanceResult::NextQuestion { index }
            }
            None => {
                info!(session = %self.id, "Final turn recorded ({:?})", outcome);
                self.session.phase = Phase::Completed(Completion::Evaluating);
                self.finalize().await;
                AdvanceResult::Completed
            }
        }
    }

    async fn finalize(&mut self) {
        if let Err(e) = self.output.speak(CLOSING_SCRIPT) {
            warn!(session = %self.id, "closing remark not spoken: {e}");
        }

        let evaluated = self
            .collaborators
            .evaluator
            .analyze_performance(&self.target, self.session.responses())
            .await;

        let (mut report, source) = match evaluated {
            Ok(report) => (report, ContentSource::Generated),
            Err(e) => {
                warn!(session = %self.id, "performance evaluation failed, using fallback report: {e}");
                (fallback_report(), ContentSource::Fallback)
            }
        };
        report.overall_score = report.overall_score.min(100);

        let skipped = self
            .session
            .responses()
            .iter()
            .filter(|r| r.was_skipped())
            .count();
        info!(
            session = %self.id,
            "Interview evaluated: {}/100 ({:?}), {} of {} questions skipped",
            report.overall_score,
            source,
            skipped,
            self.session.responses().len()
        );
        self.session.phase = Phase::Completed(Completion::Reported { report, source });
    }

    // ── Teardown ───────────────────────────────────────────────────────────

    /// Releases the speech engines. Every later event or action is a no-op.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.output.cancel();
        if self.session.phase.is_capturing() {
            self.input.stop();
        }
        self.disposed = true;
        info!(session = %self.id, "Interview session disposed");
    }

    // ── Helpers ────────────────────────────────────────────────────────────

    fn speak_prompt(&mut self, text: &str) {
        self.session.phase = match self.output.speak(text) {
            Ok(()) => Phase::AwaitingSpeak(SpeakState::Speaking),
            Err(e) => {
                // Without playback there is no finish signal; go straight to settling.
                warn!(session = %self.id, "prompt not spoken: {e}");
                Phase::AwaitingSpeak(SpeakState::Settling {
                    listen_at: Instant::now() + self.settings.listen_debounce,
                })
            }
        };
    }

    /// Moves an open listening window to `AwaitingAdvance`.
    fn close_capture(&mut self) -> bool {
        match std::mem::replace(&mut self.session.phase, Phase::NotStarted) {
            Phase::Listening { mut turn, .. } => {
                turn.interim.clear();
                self.session.phase = Phase::AwaitingAdvance { turn };
                true
            }
            other => {
                self.session.phase = other;
                false
            }
        }
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let phase = &self.session.phase;
        let turn = phase.turn();
        let (report, report_source) = match self.session.report() {
            Some((report, source)) => (Some(report.clone()), Some(source)),
            None => (None, None),
        };
        let current_question = match phase {
            Phase::NotStarted | Phase::Completed(_) => None,
            _ => self.session.current_question().map(str::to_string),
        };

        SessionSnapshot {
            session_id: self.id,
            role_title: self.target.role_title.clone(),
            difficulty: self.target.difficulty.clone(),
            phase: phase.kind(),
            speaking: *phase == Phase::AwaitingSpeak(SpeakState::Speaking),
            question_index: self.session.current_index(),
            question_count: self.session.questions().len(),
            question_source: self.session.question_source(),
            current_question,
            live_answer: turn.map(|t| t.answer.clone()),
            interim_answer: turn.map(|t| t.interim.clone()).filter(|t| !t.is_empty()),
            permission_required: self.permission_required(),
            responses: self.session.responses().to_vec(),
            report,
            report_source,
            closed: self.disposed,
        }
    }
}

impl Drop for InterviewController {
    fn drop(&mut self) {
        self.dispose();
    }
}
