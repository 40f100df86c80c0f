//! API request and response types

use crate::candidates::CandidateId;
use crate::transcript::AnswerTurn;
use serde::{Deserialize, Serialize};

/// Request to submit a question for evaluation
#[derive(Debug, Deserialize)]
pub struct SubmitRequest {
    pub question: String,
    #[serde(default)]
    pub options: Vec<String>,
}

/// Request to open a candidate offer
#[derive(Debug, Default, Deserialize)]
pub struct GenerateRequest {
    #[serde(default)]
    pub seed: Option<String>,
}

/// Request to pick a candidate from the open offer
#[derive(Debug, Deserialize)]
pub struct SelectRequest {
    pub candidate_id: CandidateId,
}

/// Response carrying the answer turn that was appended
#[derive(Debug, Serialize)]
pub struct AnswerResponse {
    pub answer: AnswerTurn,
}

/// Generic success response
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub engine: EngineHealth,
}

#[derive(Debug, Serialize)]
pub struct EngineHealth {
    pub reachable: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Error response
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
