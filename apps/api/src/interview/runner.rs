//! One task per interview session.
//!
//! The task owns the controller and is the only thing that touches it:
//! user commands, engine events, and the listen debounce timer are all
//! funnelled through a single `select!` loop.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, info};

use crate::errors::AppError;
use crate::interview::controller::{InterviewController, SessionSnapshot};
use crate::interview::models::{AdvanceResult, SessionId, TurnOutcome};
use crate::interview::relay::{drain, Directive, DirectiveReceiver};
use crate::interview::speech::{EventSink, SignalReceiver, SpeechEvent};

const COMMAND_BUFFER: usize = 32;

/// User-initiated actions that do not end a turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Start,
    StopListening,
    RetryCapture,
    TypeAnswer(String),
}

#[derive(Debug, Clone, Serialize)]
pub struct ActionReply {
    pub applied: bool,
    pub session: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdvanceReply {
    pub result: AdvanceResult,
    pub session: SessionSnapshot,
}

enum SessionCommand {
    Act {
        action: Action,
        reply: oneshot::Sender<ActionReply>,
    },
    Advance {
        outcome: TurnOutcome,
        reply: oneshot::Sender<AdvanceReply>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
    Dispose {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Cloneable handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    created_at: DateTime<Utc>,
    commands: mpsc::Sender<SessionCommand>,
    events: EventSink,
    directives: Arc<Mutex<DirectiveReceiver>>,
}

impl SessionHandle {
    /// Spawns the session task. `events` must be the sink paired with `signals`.
    pub fn spawn(
        controller: InterviewController,
        events: EventSink,
        signals: SignalReceiver,
        directives: DirectiveReceiver,
    ) -> Self {
        let id = controller.id();
        let (commands, command_rx) = mpsc::channel(COMMAND_BUFFER);
        tokio::spawn(run(controller, command_rx, signals));

        Self {
            id,
            created_at: Utc::now(),
            commands,
            events,
            directives: Arc::new(Mutex::new(directives)),
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, AppError> {
        self.request(|reply| SessionCommand::Snapshot { reply }).await
    }

    pub async fn act(&self, action: Action) -> Result<ActionReply, AppError> {
        self.request(|reply| SessionCommand::Act { action, reply })
            .await
    }

    pub async fn advance(&self, outcome: TurnOutcome) -> Result<AdvanceReply, AppError> {
        self.request(|reply| SessionCommand::Advance { outcome, reply })
            .await
    }

    /// Tears the session down and returns its final state.
    pub async fn dispose(&self) -> Result<SessionSnapshot, AppError> {
        self.request(|reply| SessionCommand::Dispose { reply }).await
    }

    /// Forwards an engine event reported by the client.
    pub fn emit(&self, event: SpeechEvent) {
        self.events.emit(event);
    }

    /// Speech directives queued for the client since the last drain.
    pub async fn drain_directives(&self) -> Vec<Directive> {
        let mut rx = self.directives.lock().await;
        drain(&mut rx)
    }

    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, AppError> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| self.closed())?;
        rx.await.map_err(|_| self.closed())
    }

    fn closed(&self) -> AppError {
        AppError::NotFound(format!("Interview session {} has ended", self.id))
    }
}

async fn run(
    mut controller: InterviewController,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut signals: SignalReceiver,
) {
    controller.prepare().await;

    loop {
        let deadline = controller.next_deadline();

        tokio::select! {
            biased;

            // Engine events first: a transcript that arrived before an
            // advance request must be applied before the turn is recorded.
            Some(signal) = signals.recv() => {
                controller.handle_signal(signal);
            }

            command = commands.recv() => match command {
                Some(SessionCommand::Dispose { reply }) => {
                    controller.dispose();
                    let _ = reply.send(controller.snapshot());
                    break;
                }
                Some(command) => handle_command(&mut controller, command).await,
                None => {
                    debug!(session = %controller.id(), "all handles dropped");
                    break;
                }
            },

            _ = wait_for(deadline) => {
                controller.on_tick(Instant::now());
            }
        }
    }

    controller.dispose();
    info!(session = %controller.id(), "Interview session task finished");
}

async fn handle_command(controller: &mut InterviewController, command: SessionCommand) {
    match command {
        SessionCommand::Act { action, reply } => {
            let applied = match action {
                Action::Start => controller.start(),
                Action::StopListening => controller.stop_listening(),
                Action::RetryCapture => controller.retry_capture(),
                Action::TypeAnswer(text) => controller.type_answer(&text),
            };
            let _ = reply.send(ActionReply {
                applied,
                session: controller.snapshot(),
            });
        }
        SessionCommand::Advance { outcome, reply } => {
            let result = controller.advance(outcome).await;
            let _ = reply.send(AdvanceReply {
                result,
                session: controller.snapshot(),
            });
        }
        SessionCommand::Snapshot { reply } => {
            let _ = reply.send(controller.snapshot());
        }
        SessionCommand::Dispose { reply } => {
            // Handled in the loop; kept total for the match.
            controller.dispose();
            let _ = reply.send(controller.snapshot());
        }
    }
}

async fn wait_for(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::interview::controller::tests::{
        target, Call, CallLog, FakeEvaluator, FakeGenerator,
    };
    use crate::interview::controller::{Collaborators, InterviewSettings, SpeechDevices};
    use crate::interview::session::PhaseKind;
    use crate::interview::speech::{
        event_channel, CaptureError, SpeechInput, SpeechOutput, SynthesisError, TranscriptBatch,
        TranscriptSegment,
    };

    /// Output engine that reports completion the moment it is asked to speak.
    struct InstantVoice {
        log: CallLog,
        sink: EventSink,
    }

    impl SpeechOutput for InstantVoice {
        fn speak(&mut self, text: &str) -> Result<(), SynthesisError> {
            self.log.push(Call::Speak(text.to_string()));
            self.sink.emit(SpeechEvent::SpeechFinished);
            Ok(())
        }

        fn cancel(&mut self) {
            self.log.push(Call::CancelSpeech);
        }
    }

    struct Microphone {
        log: CallLog,
    }

    impl SpeechInput for Microphone {
        fn start(&mut self) -> Result<(), CaptureError> {
            self.log.push(Call::StartCapture);
            Ok(())
        }

        fn stop(&mut self) {
            self.log.push(Call::StopCapture);
        }
    }

    fn spawn_session(
        generator: Arc<FakeGenerator>,
        evaluator: Arc<FakeEvaluator>,
    ) -> (SessionHandle, CallLog) {
        let id = SessionId::new();
        let (sink, signals) = event_channel(id);
        let log = CallLog::default();
        let devices = SpeechDevices {
            input: Box::new(Microphone { log: log.clone() }),
            output: Box::new(InstantVoice {
                log: log.clone(),
                sink: sink.clone(),
            }),
        };
        let controller = InterviewController::new(
            id,
            target(),
            InterviewSettings {
                question_count: 8,
                listen_debounce: Duration::from_millis(400),
            },
            Collaborators {
                generator,
                evaluator,
            },
            devices,
        );
        let (_unused_tx, directives) = mpsc::unbounded_channel();
        (SessionHandle::spawn(controller, sink, signals, directives), log)
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_secs(1)).await;
    }

    fn say(handle: &SessionHandle, text: &str) {
        handle.emit(SpeechEvent::Transcript(TranscriptBatch {
            segments: vec![TranscriptSegment::final_text(text)],
        }));
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_drives_speak_listen_cycle() {
        let (handle, log) = spawn_session(
            FakeGenerator::returning(&["Q1?", "Q2?"]),
            FakeEvaluator::scoring(),
        );

        let ready = handle.snapshot().await.unwrap();
        assert_eq!(ready.phase, PhaseKind::AwaitingSpeak);
        assert_eq!(ready.question_count, 2);

        assert!(handle.act(Action::Start).await.unwrap().applied);
        settle().await;

        let listening = handle.snapshot().await.unwrap();
        assert_eq!(listening.phase, PhaseKind::Listening);
        assert_eq!(log.count(&Call::StartCapture), 1);

        say(&handle, "I have 4 years...");
        let reply = handle.advance(TurnOutcome::Answered).await.unwrap();
        assert_eq!(reply.result, AdvanceResult::NextQuestion { index: 1 });
        assert_eq!(reply.session.responses[0].answer, "I have 4 years...");

        settle().await;
        let reply = handle.advance(TurnOutcome::Skipped).await.unwrap();
        assert_eq!(reply.result, AdvanceResult::Completed);
        assert_eq!(reply.session.phase, PhaseKind::Completed);
        assert_eq!(reply.session.report.unwrap().overall_score, 91);
        assert_eq!(log.count(&Call::StartCapture), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_runner_falls_back_when_generation_fails() {
        let (handle, _log) = spawn_session(FakeGenerator::failing(), FakeEvaluator::scoring());
        let snapshot = handle.snapshot().await.unwrap();
        assert_eq!(snapshot.question_count, 7);
        assert_eq!(snapshot.phase, PhaseKind::AwaitingSpeak);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dispose_stops_engines_and_closes_handle() {
        let (handle, log) = spawn_session(
            FakeGenerator::returning(&["Q1?"]),
            FakeEvaluator::scoring(),
        );
        handle.act(Action::Start).await.unwrap();
        settle().await;

        let last = handle.dispose().await.unwrap();
        assert!(last.closed);
        assert_eq!(log.count(&Call::CancelSpeech), 1);
        assert_eq!(log.count(&Call::StopCapture), 1);

        // Late engine callback after teardown goes nowhere.
        say(&handle, "too late");
        assert!(handle.snapshot().await.is_err());
        assert!(last.responses.is_empty());
    }
}
