//! Session state types

use crate::candidates::CandidateOffer;
use crate::transcript::TurnId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// The one outstanding engine call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingSubmission {
    pub question_turn_id: TurnId,
    pub question: String,
    pub options: Vec<String>,
    pub started_at: DateTime<Utc>,
}

/// Session state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionState {
    /// Ready for a question or a candidate request
    #[default]
    Idle,

    /// Waiting on the reasoning engine
    Evaluating { pending: PendingSubmission },

    /// Candidates scheduled, not yet visible
    Generating {
        generation: u64,
        #[serde(default)]
        seed: Option<String>,
    },

    /// Candidates visible, waiting for the user to pick one
    Offering { offer: CandidateOffer },
}

impl SessionState {
    /// Whether the user may start something new.
    ///
    /// Controls stay disabled for the whole candidate cycle, including while
    /// an offer is open.
    pub fn accepting_input(&self) -> bool {
        matches!(self, SessionState::Idle)
    }

    pub fn pending(&self) -> Option<&PendingSubmission> {
        match self {
            SessionState::Evaluating { pending } => Some(pending),
            _ => None,
        }
    }

    pub fn offer(&self) -> Option<&CandidateOffer> {
        match self {
            SessionState::Offering { offer } => Some(offer),
            _ => None,
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            SessionState::Idle => "idle",
            SessionState::Evaluating { .. } => "evaluating",
            SessionState::Generating { .. } => "generating",
            SessionState::Offering { .. } => "offering",
        }
    }
}
