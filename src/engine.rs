//! Reasoning engine boundary
//!
//! The engine is opaque: one request/response exchange per question. Retry
//! policy lives here at the transport layer, never in the session state
//! machine.

mod error;
mod http;
mod types;

pub use error::{EngineError, EngineErrorKind};
pub use http::HttpEngine;
pub use types::{EvaluationPayload, EvaluationRequest};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Common interface for reasoning engines
#[async_trait]
pub trait ReasoningEngine: Send + Sync {
    /// Evaluate one question against its options
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationPayload, EngineError>;

    /// Cheap reachability probe
    async fn health(&self) -> Result<(), EngineError> {
        Ok(())
    }

    /// Name used in logs
    fn name(&self) -> &str;
}

#[async_trait]
impl<T: ReasoningEngine + ?Sized> ReasoningEngine for Arc<T> {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationPayload, EngineError> {
        (**self).evaluate(request).await
    }

    async fn health(&self) -> Result<(), EngineError> {
        (**self).health().await
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// Logging wrapper for engines
pub struct LoggingEngine<E> {
    inner: E,
}

impl<E: ReasoningEngine> LoggingEngine<E> {
    pub fn new(inner: E) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl<E: ReasoningEngine> ReasoningEngine for LoggingEngine<E> {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationPayload, EngineError> {
        let start = Instant::now();
        let result = self.inner.evaluate(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(payload) => {
                tracing::info!(
                    engine = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    predicted_answer = payload.predicted_answer,
                    confidence = payload.confidence,
                    category = %payload.category,
                    "Evaluation completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    engine = %self.inner.name(),
                    duration_ms = %duration.as_millis(),
                    error = %e.message,
                    kind = e.kind.as_str(),
                    retryable = e.kind.is_retryable(),
                    "Evaluation failed"
                );
            }
        }

        result
    }

    async fn health(&self) -> Result<(), EngineError> {
        self.inner.health().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}

/// Retries retryable failures with exponential backoff.
///
/// `max_attempts` counts the first try; 1 disables retrying.
pub struct RetryingEngine<E> {
    inner: E,
    max_attempts: u32,
    base_delay: Duration,
}

impl<E: ReasoningEngine> RetryingEngine<E> {
    pub fn new(inner: E, max_attempts: u32) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            base_delay: Duration::from_millis(500),
        }
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    fn delay_for(&self, attempt: u32, error: &EngineError) -> Duration {
        error
            .retry_after
            .unwrap_or_else(|| {
                self.base_delay
                    .saturating_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
            })
    }
}

#[async_trait]
impl<E: ReasoningEngine> ReasoningEngine for RetryingEngine<E> {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationPayload, EngineError> {
        let mut attempt = 1;
        loop {
            match self.inner.evaluate(request).await {
                Ok(payload) => return Ok(payload),
                Err(e) if e.kind.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for(attempt, &e);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = %delay.as_millis(),
                        error = %e.message,
                        "Retrying evaluation"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) if e.kind.is_retryable() && attempt > 1 => {
                    return Err(EngineError::new(
                        e.kind,
                        format!("Failed after {attempt} attempts: {}", e.message),
                    ));
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn health(&self) -> Result<(), EngineError> {
        self.inner.health().await
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
