use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;
use crate::interview::controller::SessionSnapshot;
use crate::interview::models::{InterviewTarget, SessionId, TurnOutcome};
use crate::interview::relay::Directive;
use crate::interview::runner::{Action, ActionReply, AdvanceReply};
use crate::interview::speech::SpeechEvent;
use crate::state::AppState;

const MAX_ROLE_TITLE_LEN: usize = 120;
const MAX_TYPED_ANSWER_LEN: usize = 10_000;

#[derive(Debug, Deserialize)]
pub struct CreateInterviewRequest {
    pub role_title: String,
    pub difficulty: String,
}

#[derive(Debug, Serialize)]
pub struct CreateInterviewResponse {
    pub session_id: SessionId,
    pub created_at: DateTime<Utc>,
    pub session: SessionSnapshot,
}

#[derive(Debug, Deserialize)]
pub struct AdvanceRequest {
    pub outcome: TurnOutcome,
}

#[derive(Debug, Deserialize)]
pub struct TypedAnswerRequest {
    pub text: String,
}

impl CreateInterviewRequest {
    fn into_target(self) -> Result<InterviewTarget, AppError> {
        let role_title = self.role_title.trim().to_string();
        let difficulty = self.difficulty.trim().to_lowercase();

        if role_title.is_empty() {
            return Err(AppError::Validation("role_title is required".to_string()));
        }
        if role_title.chars().count() > MAX_ROLE_TITLE_LEN {
            return Err(AppError::Validation(format!(
                "role_title must be at most {MAX_ROLE_TITLE_LEN} characters"
            )));
        }
        if difficulty.is_empty() {
            return Err(AppError::Validation("difficulty is required".to_string()));
        }

        Ok(InterviewTarget {
            role_title,
            difficulty,
        })
    }
}

/// POST /api/v1/interviews
pub async fn handle_create_interview(
    State(state): State<AppState>,
    Json(req): Json<CreateInterviewRequest>,
) -> Result<(StatusCode, Json<CreateInterviewResponse>), AppError> {
    let target = req.into_target()?;
    let handle = state
        .sessions
        .open(target, state.settings, state.collaborators.clone())
        .await;
    let session = handle.snapshot().await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateInterviewResponse {
            session_id: handle.id(),
            created_at: handle.created_at(),
            session,
        }),
    ))
}

/// GET /api/v1/interviews/:id
pub async fn handle_get_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<SessionSnapshot>, AppError> {
    let handle = state.sessions.get(SessionId(id)).await?;
    Ok(Json(handle.snapshot().await?))
}

/// DELETE /api/v1/interviews/:id
///
/// Responds with the teardown directives (`cancel_speech`, `stop_capture`)
/// because the directive queue is unreachable once the session is removed.
pub async fn handle_close_interview(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Directive>>, AppError> {
    let handle = state.sessions.remove(SessionId(id)).await?;
    // The task may already be gone; teardown is still complete from the client's view.
    let _ = handle.dispose().await;
    Ok(Json(handle.drain_directives().await))
}

/// POST /api/v1/interviews/:id/start
pub async fn handle_start(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionReply>, AppError> {
    act(&state, id, Action::Start).await
}

/// POST /api/v1/interviews/:id/stop-listening
pub async fn handle_stop_listening(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionReply>, AppError> {
    act(&state, id, Action::StopListening).await
}

/// POST /api/v1/interviews/:id/retry-capture
pub async fn handle_retry_capture(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<ActionReply>, AppError> {
    act(&state, id, Action::RetryCapture).await
}

/// PUT /api/v1/interviews/:id/answer
pub async fn handle_type_answer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<TypedAnswerRequest>,
) -> Result<Json<ActionReply>, AppError> {
    if req.text.chars().count() > MAX_TYPED_ANSWER_LEN {
        return Err(AppError::Validation(format!(
            "answer must be at most {MAX_TYPED_ANSWER_LEN} characters"
        )));
    }
    act(&state, id, Action::TypeAnswer(req.text)).await
}

/// POST /api/v1/interviews/:id/advance
pub async fn handle_advance(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(req): Json<AdvanceRequest>,
) -> Result<Json<AdvanceReply>, AppError> {
    let handle = state.sessions.get(SessionId(id)).await?;
    Ok(Json(handle.advance(req.outcome).await?))
}

/// POST /api/v1/interviews/:id/events
pub async fn handle_speech_event(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(event): Json<SpeechEvent>,
) -> Result<StatusCode, AppError> {
    let handle = state.sessions.get(SessionId(id)).await?;
    handle.emit(event);
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/v1/interviews/:id/directives
pub async fn handle_drain_directives(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Directive>>, AppError> {
    let handle = state.sessions.get(SessionId(id)).await?;
    Ok(Json(handle.drain_directives().await))
}

async fn act(state: &AppState, id: Uuid, action: Action) -> Result<Json<ActionReply>, AppError> {
    let handle = state.sessions.get(SessionId(id)).await?;
    Ok(Json(handle.act(action).await?))
}
