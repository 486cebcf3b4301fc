//! Speech capability boundary.
//!
//! `SpeechInput` and `SpeechOutput` are commands only. Whatever the engines
//! report back (a prompt finished playing, a transcript batch, capture
//! stopping or failing) comes in as a `SpeechEvent` through an `EventSink`
//! bound to one session.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tracing::debug;

use crate::interview::models::SessionId;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum CaptureError {
    /// Microphone access was refused. The user has to grant it before retrying.
    #[error("microphone permission denied")]
    PermissionDenied,

    #[error("speech capture unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("speech synthesis failed: {0}")]
pub struct SynthesisError(pub String);

/// Speech-to-text engine. While active it keeps delivering `Transcript` events.
pub trait SpeechInput: Send {
    fn start(&mut self) -> Result<(), CaptureError>;
    fn stop(&mut self);
}

/// Text-to-speech engine. Signals `SpeechFinished` when playback ends.
pub trait SpeechOutput: Send {
    fn speak(&mut self, text: &str) -> Result<(), SynthesisError>;
    fn cancel(&mut self);
}

/// One recognized segment. Interim segments may still change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    pub text: String,
    #[serde(default)]
    pub is_final: bool,
}

#[cfg(test)]
impl TranscriptSegment {
    pub fn final_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: true,
        }
    }

    pub fn interim(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            is_final: false,
        }
    }
}

/// Everything the recognizer currently knows for this capture. Each batch
/// supersedes the previous one; it is not a delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptBatch {
    pub segments: Vec<TranscriptSegment>,
}

impl TranscriptBatch {
    /// Joined final segments, or `None` when the batch has none.
    pub fn final_text(&self) -> Option<String> {
        join_segments(self.segments.iter().filter(|s| s.is_final))
    }

    pub fn interim_text(&self) -> String {
        join_segments(self.segments.iter().filter(|s| !s.is_final)).unwrap_or_default()
    }
}

fn join_segments<'a>(segments: impl Iterator<Item = &'a TranscriptSegment>) -> Option<String> {
    let parts: Vec<&str> = segments
        .map(|s| s.text.trim())
        .filter(|t| !t.is_empty())
        .collect();
    (!parts.is_empty()).then(|| parts.join(" "))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SpeechEvent {
    SpeechFinished,
    Transcript(TranscriptBatch),
    CaptureEnded,
    CaptureFailed { error: CaptureError },
}

/// A speech event stamped with the session it belongs to.
#[derive(Debug, Clone)]
pub struct SessionSignal {
    pub session: SessionId,
    pub event: SpeechEvent,
}

pub type SignalReceiver = mpsc::UnboundedReceiver<SessionSignal>;

/// Where speech engines report back to. Cheap to clone; every clone stamps
/// events with the same session id.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionSignal>,
}

impl EventSink {
    /// Delivers an event. Dropped silently once the session is gone.
    pub fn emit(&self, event: SpeechEvent) {
        if self
            .tx
            .send(SessionSignal {
                session: self.session,
                event,
            })
            .is_err()
        {
            debug!(session = %self.session, "speech event after session closed, dropped");
        }
    }
}

pub fn event_channel(session: SessionId) -> (EventSink, SignalReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (EventSink { session, tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_final_text_ignores_interim_segments() {
        let batch = TranscriptBatch {
            segments: vec![
                TranscriptSegment::final_text("I have four years"),
                TranscriptSegment::interim("of backe"),
                TranscriptSegment::final_text(" building APIs "),
            ],
        };
        assert_eq!(
            batch.final_text().as_deref(),
            Some("I have four years building APIs")
        );
        assert_eq!(batch.interim_text(), "of backe");
    }

    #[test]
    fn test_final_text_none_for_interim_only_batch() {
        let batch = TranscriptBatch {
            segments: vec![TranscriptSegment::interim("hello")],
        };
        assert_eq!(batch.final_text(), None);
    }

    #[test]
    fn test_speech_event_wire_format() {
        let event: SpeechEvent = serde_json::from_str(
            r#"{"type": "transcript", "segments": [{"text": "hi", "is_final": true}]}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            SpeechEvent::Transcript(TranscriptBatch {
                segments: vec![TranscriptSegment::final_text("hi")]
            })
        );

        let denied: SpeechEvent = serde_json::from_str(
            r#"{"type": "capture_failed", "error": {"reason": "permission_denied"}}"#,
        )
        .unwrap();
        assert_eq!(
            denied,
            SpeechEvent::CaptureFailed {
                error: CaptureError::PermissionDenied
            }
        );
    }

    #[tokio::test]
    async fn test_sink_stamps_session_and_survives_closed_receiver() {
        let id = SessionId::new();
        let (sink, mut rx) = event_channel(id);
        sink.emit(SpeechEvent::SpeechFinished);

        let signal = rx.recv().await.unwrap();
        assert_eq!(signal.session, id);
        assert_eq!(signal.event, SpeechEvent::SpeechFinished);

        drop(rx);
        sink.emit(SpeechEvent::CaptureEnded);
    }
}
