//! Events that drive state transitions
//!
//! Ids, timestamps and generation numbers are minted by whoever raises the
//! event, so `transition` never has to.

use crate::candidates::{Candidate, CandidateId};
use crate::engine::EvaluationPayload;
use crate::transcript::TurnId;
use chrono::{DateTime, Utc};

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    // User events
    Submit {
        question: String,
        options: Vec<String>,
        question_turn_id: TurnId,
        submitted_at: DateTime<Utc>,
    },
    Cancel,
    Reset,
    Generate {
        seed: Option<String>,
        generation: u64,
    },
    Regenerate {
        generation: u64,
    },
    Select {
        candidate_id: CandidateId,
        answer_turn_id: TurnId,
        selected_at: DateTime<Utc>,
    },

    // Engine events
    EvaluationComplete {
        question_turn_id: TurnId,
        answer_turn_id: TurnId,
        payload: EvaluationPayload,
        completed_at: DateTime<Utc>,
    },
    EvaluationFailed {
        question_turn_id: TurnId,
        message: String,
    },

    // Candidate events
    OfferReady {
        generation: u64,
        candidates: Vec<Candidate>,
    },
}

impl Event {
    /// Events raised by background tasks rather than a caller
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Event::EvaluationComplete { .. }
                | Event::EvaluationFailed { .. }
                | Event::OfferReady { .. }
        )
    }
}
