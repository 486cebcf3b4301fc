pub mod health;

use axum::{
    routing::{get, post, put},
    Router,
};

use crate::interview::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Interview sessions
        .route("/api/v1/interviews", post(handlers::handle_create_interview))
        .route(
            "/api/v1/interviews/:id",
            get(handlers::handle_get_interview).delete(handlers::handle_close_interview),
        )
        .route("/api/v1/interviews/:id/start", post(handlers::handle_start))
        .route(
            "/api/v1/interviews/:id/stop-listening",
            post(handlers::handle_stop_listening),
        )
        .route(
            "/api/v1/interviews/:id/retry-capture",
            post(handlers::handle_retry_capture),
        )
        .route(
            "/api/v1/interviews/:id/answer",
            put(handlers::handle_type_answer),
        )
        .route(
            "/api/v1/interviews/:id/advance",
            post(handlers::handle_advance),
        )
        // Speech bridge for the browser client
        .route(
            "/api/v1/interviews/:id/events",
            post(handlers::handle_speech_event),
        )
        .route(
            "/api/v1/interviews/:id/directives",
            get(handlers::handle_drain_directives),
        )
        .with_state(state)
}
