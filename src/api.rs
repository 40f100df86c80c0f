//! HTTP API for the reasoning chat session

mod handlers;
mod sse;
mod types;

pub use handlers::create_router;

use crate::engine::ReasoningEngine;
use crate::runtime::SessionHandle;
use std::sync::Arc;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub session: SessionHandle,
    /// Probed by `/health`; the session holds its own reference for evaluations
    pub engine: Arc<dyn ReasoningEngine>,
}

impl AppState {
    pub fn new(session: SessionHandle, engine: Arc<dyn ReasoningEngine>) -> Self {
        Self { session, engine }
    }
}
