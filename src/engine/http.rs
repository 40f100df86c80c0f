//! HTTP reasoning engine client

use super::{EngineError, EvaluationPayload, EvaluationRequest, ReasoningEngine};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;

/// Client for an engine exposing `POST /solve` and `GET /health`
pub struct HttpEngine {
    client: Client,
    solve_url: String,
    health_url: String,
}

impl HttpEngine {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, EngineError> {
        let base = base_url.trim_end_matches('/');
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EngineError::unknown(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            solve_url: format!("{base}/solve"),
            health_url: format!("{base}/health"),
        })
    }

    fn classify_error(status: reqwest::StatusCode, body: &str) -> EngineError {
        let message = extract_detail(body);
        match status.as_u16() {
            429 => {
                let mut err = EngineError::rate_limit(format!("Rate limited: {message}"));
                if let Some(retry_after) = serde_json::from_str::<serde_json::Value>(body)
                    .ok()
                    .and_then(|v| v.get("retry_after").and_then(serde_json::Value::as_f64))
                {
                    // Hints that do not fit a Duration are dropped
                    if let Ok(delay) = Duration::try_from_secs_f64(retry_after.max(0.0)) {
                        err = err.with_retry_after(delay);
                    }
                }
                err
            }
            400..=499 => EngineError::invalid_request(format!("Invalid request: {message}")),
            500..=599 => EngineError::server_error(format!("Server error: {message}")),
            _ => EngineError::unknown(format!("HTTP {status}: {message}")),
        }
    }
}

/// Pull the `detail` field out of an error body, falling back to the raw text
fn extract_detail(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| match v.get("detail") {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(other) => Some(other.to_string()),
            None => None,
        })
        .unwrap_or_else(|| body.trim().to_string())
}

fn transport_error(e: &reqwest::Error) -> EngineError {
    if e.is_timeout() {
        EngineError::network(format!("Request timeout: {e}"))
    } else if e.is_connect() {
        EngineError::network(format!("Connection failed: {e}"))
    } else {
        EngineError::unknown(format!("Request failed: {e}"))
    }
}

#[async_trait]
impl ReasoningEngine for HttpEngine {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<EvaluationPayload, EngineError> {
        let response = self
            .client
            .post(&self.solve_url)
            .json(request)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| EngineError::network(format!("Failed to read response: {e}")))?;

        if !status.is_success() {
            return Err(Self::classify_error(status, &body));
        }

        let payload: EvaluationPayload = serde_json::from_str(&body).map_err(|e| {
            EngineError::malformed(format!("Failed to parse response: {e} - body: {body}"))
        })?;

        payload.checked(request)
    }

    async fn health(&self) -> Result<(), EngineError> {
        let response = self
            .client
            .get(&self.health_url)
            .send()
            .await
            .map_err(|e| transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Self::classify_error(status, &body));
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.solve_url
    }
}
