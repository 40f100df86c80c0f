//! Submission acceptance rules
//!
//! Checked in order; the first failing rule is reported.

use crate::transcript::OPTION_COUNT;
use serde::Serialize;
use thiserror::Error;

/// Minimum question length in characters, after trimming
pub const MIN_QUESTION_CHARS: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ValidationError {
    #[error("Question is required")]
    EmptyQuestion,
    #[error("Question must be at least 10 characters")]
    QuestionTooShort,
    #[error("All 5 options are required")]
    IncompleteOptions,
}

/// Check a candidate submission. Pure; never touches the transcript.
pub fn validate(question_text: &str, options: &[String]) -> Result<(), ValidationError> {
    let question = question_text.trim();
    if question.is_empty() {
        return Err(ValidationError::EmptyQuestion);
    }
    if question.chars().count() < MIN_QUESTION_CHARS {
        return Err(ValidationError::QuestionTooShort);
    }
    if options.len() != OPTION_COUNT || options.iter().any(|o| o.trim().is_empty()) {
        return Err(ValidationError::IncompleteOptions);
    }
    Ok(())
}
