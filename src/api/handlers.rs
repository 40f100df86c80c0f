//! HTTP request handlers

use super::sse::sse_stream;
use super::types::{
    AnswerResponse, EngineHealth, ErrorResponse, GenerateRequest, HealthResponse, SelectRequest,
    SubmitRequest, SuccessResponse,
};
use super::AppState;
use crate::runtime::{SessionError, SessionEvent, SessionSnapshot};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Session
        .route("/api/session", get(get_session))
        .route("/api/session/submit", post(submit_question))
        .route("/api/session/cancel", post(cancel_session))
        .route("/api/session/reset", post(reset_session))
        .route("/api/session/stream", get(stream_session))
        // Candidates
        .route("/api/candidates/generate", post(generate_candidates))
        .route("/api/candidates/regenerate", post(regenerate_candidates))
        .route("/api/candidates/select", post(select_candidate))
        // Service
        .route("/health", get(health))
        .route("/version", get(get_version))
        .with_state(state)
}

// ============================================================
// Session
// ============================================================

async fn get_session(State(state): State<AppState>) -> Result<Json<SessionSnapshot>, AppError> {
    Ok(Json(state.session.snapshot().await?))
}

/// Waits for the engine; the transcript is updated whether or not the client stays
async fn submit_question(
    State(state): State<AppState>,
    Json(req): Json<SubmitRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let answer = state.session.submit(&req.question, &req.options).await?;
    Ok(Json(AnswerResponse { answer }))
}

async fn cancel_session(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.session.cancel().await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn reset_session(State(state): State<AppState>) -> Result<Json<SuccessResponse>, AppError> {
    state.session.reset().await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn stream_session(State(state): State<AppState>) -> Result<impl IntoResponse, AppError> {
    // Subscribe first so nothing between the snapshot and the stream is lost
    let broadcast_rx = state.session.subscribe();
    let snapshot = state.session.snapshot().await?;
    Ok(sse_stream(SessionEvent::Snapshot(snapshot), broadcast_rx))
}

// ============================================================
// Candidates
// ============================================================

async fn generate_candidates(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<SuccessResponse>, AppError> {
    // The body is optional; when present it must be a valid request
    let req = if body.iter().all(u8::is_ascii_whitespace) {
        GenerateRequest::default()
    } else {
        let Json(req) = Json::<GenerateRequest>::from_bytes(&body)
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        req
    };
    state.session.generate(req.seed).await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn regenerate_candidates(
    State(state): State<AppState>,
) -> Result<Json<SuccessResponse>, AppError> {
    state.session.regenerate().await?;
    Ok(Json(SuccessResponse { success: true }))
}

async fn select_candidate(
    State(state): State<AppState>,
    Json(req): Json<SelectRequest>,
) -> Result<Json<AnswerResponse>, AppError> {
    let answer = state.session.select(req.candidate_id).await?;
    Ok(Json(AnswerResponse { answer }))
}

// ============================================================
// Service
// ============================================================

async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let engine = match state.engine.health().await {
        Ok(()) => EngineHealth {
            reachable: true,
            error: None,
        },
        Err(e) => EngineHealth {
            reachable: false,
            error: Some(e.message),
        },
    };
    Json(HealthResponse {
        status: "healthy",
        engine,
    })
}

async fn get_version() -> &'static str {
    concat!("reasoning-chat ", env!("CARGO_PKG_VERSION"))
}

// ============================================================
// Error Handling
// ============================================================

#[derive(Debug)]
enum AppError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    BadGateway(String),
    Unavailable(String),
}

impl From<SessionError> for AppError {
    fn from(err: SessionError) -> Self {
        let message = err.to_string();
        match err {
            SessionError::Validation(_) => AppError::BadRequest(message),
            SessionError::UnknownCandidate(_) => AppError::NotFound(message),
            SessionError::AlreadyInFlight | SessionError::NoOpenOffer | SessionError::Cancelled => {
                AppError::Conflict(message)
            }
            SessionError::Request(_) => AppError::BadGateway(message),
            SessionError::RuntimeGone => AppError::Unavailable(message),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };

        let body = Json(ErrorResponse::new(message));
        (status, body).into_response()
    }
}
