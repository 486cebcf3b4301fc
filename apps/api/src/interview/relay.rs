//! Speech engines for a browser client.
//!
//! The microphone and the speakers live in the browser, so the server-side
//! engines only queue `Directive`s. The client drains them, runs them with
//! the platform speech APIs, and posts the resulting `SpeechEvent`s back.

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::debug;

use crate::interview::speech::{CaptureError, SpeechInput, SpeechOutput, SynthesisError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Directive {
    Speak { text: String },
    CancelSpeech,
    StartCapture,
    StopCapture,
}

pub type DirectiveReceiver = mpsc::UnboundedReceiver<Directive>;

/// Both halves share one queue so the client sees commands in issue order.
pub fn relay_pair() -> (RelayInput, RelayOutput, DirectiveReceiver) {
    let (tx, rx) = mpsc::unbounded_channel();
    (RelayInput { tx: tx.clone() }, RelayOutput { tx }, rx)
}

pub struct RelayInput {
    tx: mpsc::UnboundedSender<Directive>,
}

pub struct RelayOutput {
    tx: mpsc::UnboundedSender<Directive>,
}

fn queue(tx: &mpsc::UnboundedSender<Directive>, directive: Directive) -> bool {
    match tx.send(directive) {
        Ok(()) => true,
        Err(e) => {
            debug!("directive dropped, client queue closed: {:?}", e.0);
            false
        }
    }
}

impl SpeechInput for RelayInput {
    fn start(&mut self) -> Result<(), CaptureError> {
        // Permission problems surface later as a CaptureFailed event from the client.
        if queue(&self.tx, Directive::StartCapture) {
            Ok(())
        } else {
            Err(CaptureError::Unavailable("client disconnected".to_string()))
        }
    }

    fn stop(&mut self) {
        queue(&self.tx, Directive::StopCapture);
    }
}

impl SpeechOutput for RelayOutput {
    fn speak(&mut self, text: &str) -> Result<(), SynthesisError> {
        if queue(
            &self.tx,
            Directive::Speak {
                text: text.to_string(),
            },
        ) {
            Ok(())
        } else {
            Err(SynthesisError("client disconnected".to_string()))
        }
    }

    fn cancel(&mut self) {
        queue(&self.tx, Directive::CancelSpeech);
    }
}

/// Takes every directive queued so far without waiting.
pub fn drain(rx: &mut DirectiveReceiver) -> Vec<Directive> {
    let mut directives = Vec::new();
    while let Ok(directive) = rx.try_recv() {
        directives.push(directive);
    }
    directives
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_directives_keep_issue_order_across_halves() {
        let (mut input, mut output, mut rx) = relay_pair();
        output.speak("Question one?").unwrap();
        input.start().unwrap();
        input.stop();
        output.cancel();

        assert_eq!(
            drain(&mut rx),
            vec![
                Directive::Speak {
                    text: "Question one?".to_string()
                },
                Directive::StartCapture,
                Directive::StopCapture,
                Directive::CancelSpeech,
            ]
        );
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn test_closed_queue_reports_unavailable() {
        let (mut input, mut output, rx) = relay_pair();
        drop(rx);
        assert!(matches!(input.start(), Err(CaptureError::Unavailable(_))));
        assert!(output.speak("hello").is_err());
    }

    #[test]
    fn test_directive_wire_format() {
        let json = serde_json::to_value(Directive::Speak {
            text: "Hi".to_string(),
        })
        .unwrap();
        assert_eq!(json, serde_json::json!({"type": "speak", "text": "Hi"}));
    }
}
