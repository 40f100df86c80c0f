//! Reasoning chat - multiple-choice question answering session
//!
//! A Rust backend that drives one question/answer session against an
//! external reasoning engine, with a local candidate-response fallback.

mod api;
mod candidates;
mod config;
mod correlation;
mod engine;
mod runtime;
mod state_machine;
mod transcript;
mod validation;

use api::{create_router, AppState};
use candidates::CandidatePool;
use config::Config;
use engine::{HttpEngine, LoggingEngine, ReasoningEngine, RetryingEngine};
use runtime::SessionHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "reasoning_chat=info,tower_http=debug".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    let config = Config::from_env();
    tracing::info!(
        engine_url = %config.engine_url,
        timeout_secs = config.engine_timeout.as_secs(),
        max_attempts = config.engine_max_attempts,
        candidate_delay_ms = %config.candidate_delay.as_millis(),
        "Configuration loaded"
    );

    // Engine stack: HTTP transport, optional retry, logging on the outside
    let http = HttpEngine::new(&config.engine_url, config.engine_timeout)?;
    let retrying = RetryingEngine::new(http, config.engine_max_attempts)
        .with_base_delay(config.engine_retry_base_delay);
    let engine = Arc::new(LoggingEngine::new(retrying));

    match engine.health().await {
        Ok(()) => tracing::info!(engine = %engine.name(), "Reasoning engine reachable"),
        Err(e) => tracing::warn!(
            engine = %engine.name(),
            error = %e.message,
            "Reasoning engine not reachable yet; requests will fail until it is up"
        ),
    }

    let pool = CandidatePool::new(Vec::new(), config.candidate_batch_size);
    let session = SessionHandle::spawn(Arc::clone(&engine), pool, config.candidate_delay);

    let engine: Arc<dyn ReasoningEngine> = engine;
    let state = AppState::new(session, engine);

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = create_router(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Reasoning chat server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
