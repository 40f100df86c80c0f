//! Effects produced by state transitions

use crate::engine::EvaluationRequest;
use crate::transcript::{AnswerTurn, Turn, TurnId};

/// How the waiting `submit` caller is resolved
#[derive(Debug, Clone, PartialEq)]
pub enum SubmissionOutcome {
    Answered(AnswerTurn),
    Failed { message: String },
    Cancelled,
}

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Append a turn to the transcript and notify clients
    AppendTurn { turn: Turn },

    /// Start the engine call (spawns as background task)
    RequestEvaluation {
        question_turn_id: TurnId,
        request: EvaluationRequest,
    },

    /// Abort the running engine call
    AbortEvaluation,

    /// Resolve the caller waiting on the pending submission
    ResolveSubmission { outcome: SubmissionOutcome },

    /// Draw candidates and deliver them after the configured delay
    ScheduleOffer { generation: u64 },

    /// Cancel a scheduled offer that has not been delivered
    CancelScheduledOffer,

    /// Discard the whole transcript
    ClearTranscript,

    /// Broadcast the new state
    PublishState,
}

impl Effect {
    pub fn append(turn: impl Into<Turn>) -> Self {
        Effect::AppendTurn { turn: turn.into() }
    }

    pub fn resolve(outcome: SubmissionOutcome) -> Self {
        Effect::ResolveSubmission { outcome }
    }
}
