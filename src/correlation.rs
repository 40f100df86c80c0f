//! Answer-to-option correlation for display highlighting

use crate::transcript::{QuestionTurn, Turn, TurnId};
use std::collections::HashMap;

/// Which option of `question` was selected by a later answer, if any.
///
/// Scans answers strictly after the question and returns the first predicted
/// index belonging to it. An answer linked to a different question is
/// skipped; unlinked answers fall back to positional pairing.
pub fn highlighted_option(question: &QuestionTurn, transcript: &[Turn]) -> Option<u8> {
    let position = transcript.iter().position(|t| t.id() == &question.id)?;
    transcript
        .iter()
        .skip(position + 1)
        .filter_map(Turn::as_answer)
        .filter(|a| a.answers.as_ref().map_or(true, |id| id == &question.id))
        .find_map(|a| a.predicted_index)
}

/// Highlighted option for every question turn in the transcript
pub fn highlights(transcript: &[Turn]) -> HashMap<TurnId, Option<u8>> {
    transcript
        .iter()
        .filter_map(Turn::as_question)
        .map(|q| (q.id.clone(), highlighted_option(q, transcript)))
        .collect()
}
