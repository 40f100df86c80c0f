//! Session transcript
//!
//! Ordered, append-only log of question and answer turns. Turns are never
//! edited or removed once appended; `reset` discards the whole log when a new
//! session starts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;

/// Number of options every question carries
pub const OPTION_COUNT: usize = 5;

/// Unique identifier of a turn within a session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TurnId(String);

impl TurnId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Mint a fresh id for a question turn
    pub fn question() -> Self {
        Self(format!("q-{}", uuid::Uuid::new_v4()))
    }

    /// Mint a fresh id for an answer turn
    pub fn answer() -> Self {
        Self(format!("a-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TurnId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A submitted question with its five options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionTurn {
    pub id: TurnId,
    pub text: String,
    pub options: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl QuestionTurn {
    /// Option text for a 1-based index
    #[cfg(test)]
    pub fn option(&self, index: u8) -> Option<&str> {
        usize::from(index)
            .checked_sub(1)
            .and_then(|i| self.options.get(i))
            .map(String::as_str)
    }
}

/// Where an answer came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerSource {
    /// Scored by the reasoning engine
    Engine,
    /// Picked by the user from a candidate offer
    Candidate,
}

/// A completed evaluation or a chosen candidate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerTurn {
    pub id: TurnId,
    /// Question this answer belongs to; absent for candidate answers
    pub answers: Option<TurnId>,
    pub source: AnswerSource,
    /// 1-based index into the question's options
    pub predicted_index: Option<u8>,
    pub answer_text: String,
    pub confidence: Option<f64>,
    pub category: Option<String>,
    pub category_confidence: Option<f64>,
    /// Markdown prose
    pub reasoning: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl AnswerTurn {
    /// Answer produced by a user's choice among candidates
    pub fn from_candidate(
        id: TurnId,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            answers: None,
            source: AnswerSource::Candidate,
            predicted_index: None,
            answer_text: content.into(),
            confidence: None,
            category: None,
            category_confidence: None,
            reasoning: None,
            created_at,
        }
    }
}

/// One immutable entry in the transcript
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Turn {
    Question(QuestionTurn),
    Answer(AnswerTurn),
}

impl Turn {
    pub fn id(&self) -> &TurnId {
        match self {
            Turn::Question(q) => &q.id,
            Turn::Answer(a) => &a.id,
        }
    }

    pub fn as_question(&self) -> Option<&QuestionTurn> {
        match self {
            Turn::Question(q) => Some(q),
            Turn::Answer(_) => None,
        }
    }

    pub fn as_answer(&self) -> Option<&AnswerTurn> {
        match self {
            Turn::Answer(a) => Some(a),
            Turn::Question(_) => None,
        }
    }
}

impl From<QuestionTurn> for Turn {
    fn from(turn: QuestionTurn) -> Self {
        Turn::Question(turn)
    }
}

impl From<AnswerTurn> for Turn {
    fn from(turn: AnswerTurn) -> Self {
        Turn::Answer(turn)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TranscriptError {
    #[error("Turn id already used in this session: {0}")]
    DuplicateTurnId(TurnId),
    #[error("Answer refers to a question that is not in the transcript: {0}")]
    UnknownQuestion(TurnId),
}

/// Append-only turn log for the active session
#[derive(Debug, Default)]
pub struct TranscriptStore {
    turns: Vec<Turn>,
    ids: HashSet<TurnId>,
}

impl TranscriptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a question with a freshly minted id.
    ///
    /// Input is assumed to be validated already. The runtime mints ids inside
    /// events and appends through [`TranscriptStore::push`].
    #[cfg(test)]
    pub fn append_question(&mut self, text: &str, options: &[String]) -> QuestionTurn {
        let turn = QuestionTurn {
            id: TurnId::question(),
            text: text.trim().to_string(),
            options: options.iter().map(|o| o.trim().to_string()).collect(),
            created_at: Utc::now(),
        };
        self.insert(Turn::Question(turn.clone()));
        turn
    }

    /// Append an answer, replacing whatever id it carried with a fresh one
    #[cfg(test)]
    pub fn append_answer(&mut self, mut answer: AnswerTurn) -> AnswerTurn {
        answer.id = TurnId::answer();
        self.insert(Turn::Answer(answer.clone()));
        answer
    }

    /// Append a turn whose id was minted by the caller.
    ///
    /// This is the append path used by the session runtime. Answers linked to
    /// a question must come after that question.
    pub fn push(&mut self, turn: Turn) -> Result<(), TranscriptError> {
        if self.ids.contains(turn.id()) {
            return Err(TranscriptError::DuplicateTurnId(turn.id().clone()));
        }
        if let Turn::Answer(AnswerTurn {
            answers: Some(question_id),
            ..
        }) = &turn
        {
            if self.question(question_id).is_none() {
                return Err(TranscriptError::UnknownQuestion(question_id.clone()));
            }
        }
        self.insert(turn);
        Ok(())
    }

    fn insert(&mut self, turn: Turn) {
        self.ids.insert(turn.id().clone());
        self.turns.push(turn);
    }

    /// Snapshot of all turns in chronological order
    pub fn all_turns(&self) -> Vec<Turn> {
        self.turns.clone()
    }

    /// Borrowed view for read-only computations inside the runtime
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn question(&self, id: &TurnId) -> Option<&QuestionTurn> {
        self.turns
            .iter()
            .filter_map(Turn::as_question)
            .find(|q| &q.id == id)
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// Discard the transcript when a new session starts
    pub fn reset(&mut self) {
        self.turns.clear();
        self.ids.clear();
    }
}
