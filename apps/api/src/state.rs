use crate::interview::{Collaborators, InterviewSettings, SessionRegistry};

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Question generator and performance evaluator. LLM-backed by default.
    pub collaborators: Collaborators,
    /// Question count and listen debounce applied to every new session.
    pub settings: InterviewSettings,
    pub sessions: SessionRegistry,
}
