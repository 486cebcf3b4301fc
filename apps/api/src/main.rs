mod config;
mod errors;
mod interview;
mod llm_client;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Result;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::interview::collaborators::{LlmPerformanceEvaluator, LlmQuestionGenerator};
use crate::interview::{Collaborators, SessionRegistry};
use crate::llm_client::LlmClient;
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Configuration first: fail fast on missing required env vars
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_CRATE_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interview API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize LLM client
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let collaborators = Collaborators {
        generator: Arc::new(LlmQuestionGenerator(llm.clone())),
        evaluator: Arc::new(LlmPerformanceEvaluator(llm)),
    };

    let settings = config.interview_settings();
    info!(
        "Interview settings: {} questions, {}ms listen debounce",
        settings.question_count,
        settings.listen_debounce.as_millis()
    );

    let sessions = SessionRegistry::default();
    sessions.spawn_idle_sweeper(config.session_idle_timeout());
    info!(
        "Idle sessions evicted after {}s",
        config.session_idle_timeout_secs
    );

    let state = AppState {
        collaborators,
        settings,
        sessions,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins to the web client's domain

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
