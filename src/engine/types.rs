//! Wire types for the reasoning engine

use super::EngineError;
use crate::transcript::OPTION_COUNT;
use serde::{Deserialize, Serialize};

/// Question sent to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationRequest {
    pub question: String,
    pub options: Vec<String>,
}

/// Engine verdict for one question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationPayload {
    /// 1-based index into the options
    pub predicted_answer: u8,
    #[serde(default)]
    pub answer_text: String,
    pub confidence: f64,
    pub category: String,
    pub reasoning: String,
    #[serde(default)]
    pub category_confidence: Option<f64>,
    /// Engine-side processing timestamp, passed through untouched
    #[serde(default)]
    pub timestamp: Option<String>,
}

impl EvaluationPayload {
    /// Check the payload against the request it answers.
    ///
    /// Fills `answer_text` from the options when the engine left it blank.
    pub fn checked(mut self, request: &EvaluationRequest) -> Result<Self, EngineError> {
        let index = usize::from(self.predicted_answer);
        if !(1..=OPTION_COUNT).contains(&index) {
            return Err(EngineError::malformed(format!(
                "predicted_answer {} is outside 1..={OPTION_COUNT}",
                self.predicted_answer
            )));
        }
        if !(0.0..=1.0).contains(&self.confidence) {
            return Err(EngineError::malformed(format!(
                "confidence {} is outside 0..=1",
                self.confidence
            )));
        }
        if let Some(cc) = self.category_confidence {
            if !(0.0..=1.0).contains(&cc) {
                self.category_confidence = None;
            }
        }
        if self.answer_text.trim().is_empty() {
            if let Some(text) = request.options.get(index - 1) {
                self.answer_text.clone_from(text);
            }
        }
        Ok(self)
    }
}
