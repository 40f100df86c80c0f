//! Pure state transition function

use super::{Effect, Event, PendingSubmission, SessionState, SubmissionOutcome};
use crate::candidates::{CandidateId, CandidateOffer};
use crate::engine::{EvaluationPayload, EvaluationRequest};
use crate::transcript::{AnswerSource, AnswerTurn, QuestionTurn, TurnId};
use crate::validation::{validate, ValidationError};
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: SessionState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: SessionState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Clone, PartialEq, Error)]
pub enum TransitionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("A request is already in flight")]
    AlreadyInFlight,
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(CandidateId),
    #[error("No candidate offer is open")]
    NoOpenOffer,
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
/// Rejected events leave the state untouched and produce no effects.
#[allow(clippy::too_many_lines)]
pub fn transition(
    state: &SessionState,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // Question submission
        // ============================================================

        // Idle + Submit -> Evaluating
        (
            SessionState::Idle,
            Event::Submit {
                question,
                options,
                question_turn_id,
                submitted_at,
            },
        ) => {
            validate(&question, &options)?;

            let turn = QuestionTurn {
                id: question_turn_id.clone(),
                text: question.trim().to_string(),
                options: options.iter().map(|o| o.trim().to_string()).collect(),
                created_at: submitted_at,
            };
            let request = EvaluationRequest {
                question: turn.text.clone(),
                options: turn.options.clone(),
            };
            let pending = PendingSubmission {
                question_turn_id: question_turn_id.clone(),
                question: turn.text.clone(),
                options: turn.options.clone(),
                started_at: submitted_at,
            };

            Ok(TransitionResult::new(SessionState::Evaluating { pending })
                .with_effect(Effect::append(turn))
                .with_effect(Effect::PublishState)
                .with_effect(Effect::RequestEvaluation {
                    question_turn_id,
                    request,
                }))
        }

        // Anything open + Submit -> rejected, pending call untouched
        (_, Event::Submit { .. }) => Err(TransitionError::AlreadyInFlight),

        // ============================================================
        // Engine outcomes
        // ============================================================

        // Evaluating + matching completion -> Idle
        (
            SessionState::Evaluating { pending },
            Event::EvaluationComplete {
                question_turn_id,
                answer_turn_id,
                payload,
                completed_at,
            },
        ) if question_turn_id == pending.question_turn_id => {
            let answer = engine_answer(pending, answer_turn_id, payload, completed_at);
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::append(answer.clone()))
                .with_effect(Effect::resolve(SubmissionOutcome::Answered(answer)))
                .with_effect(Effect::PublishState))
        }

        // Evaluating + matching failure -> Idle, question stays in transcript
        (
            SessionState::Evaluating { pending },
            Event::EvaluationFailed {
                question_turn_id,
                message,
            },
        ) if question_turn_id == pending.question_turn_id => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::resolve(SubmissionOutcome::Failed { message }))
                .with_effect(Effect::PublishState))
        }

        // Late or foreign engine outcome -> discarded
        (_, Event::EvaluationComplete { .. } | Event::EvaluationFailed { .. }) => {
            Ok(TransitionResult::new(state.clone()))
        }

        // ============================================================
        // Cancellation and reset
        // ============================================================
        (SessionState::Evaluating { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::AbortEvaluation)
                .with_effect(Effect::resolve(SubmissionOutcome::Cancelled))
                .with_effect(Effect::PublishState))
        }

        (SessionState::Generating { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::CancelScheduledOffer)
                .with_effect(Effect::PublishState))
        }

        // Dismiss an open offer without picking anything
        (SessionState::Offering { .. }, Event::Cancel) => {
            Ok(TransitionResult::new(SessionState::Idle).with_effect(Effect::PublishState))
        }

        (SessionState::Idle, Event::Cancel) => Ok(TransitionResult::new(SessionState::Idle)),

        (_, Event::Reset) => {
            let teardown = match state {
                SessionState::Evaluating { .. } => vec![
                    Effect::AbortEvaluation,
                    Effect::resolve(SubmissionOutcome::Cancelled),
                ],
                SessionState::Generating { .. } => vec![Effect::CancelScheduledOffer],
                SessionState::Idle | SessionState::Offering { .. } => vec![],
            };
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effects(teardown)
                .with_effect(Effect::ClearTranscript)
                .with_effect(Effect::PublishState))
        }

        // ============================================================
        // Candidate cycle
        // ============================================================
        (
            SessionState::Idle | SessionState::Offering { .. },
            Event::Generate { seed, generation },
        ) => Ok(start_generation(generation, seed)),

        // Regenerate keeps whatever seed produced the current offer
        (SessionState::Idle, Event::Regenerate { generation }) => {
            Ok(start_generation(generation, None))
        }
        (SessionState::Offering { offer }, Event::Regenerate { generation }) => {
            Ok(start_generation(generation, offer.seed.clone()))
        }

        (
            SessionState::Evaluating { .. } | SessionState::Generating { .. },
            Event::Generate { .. } | Event::Regenerate { .. },
        ) => Err(TransitionError::AlreadyInFlight),

        // Generating + current offer -> Offering
        (
            SessionState::Generating { generation, seed },
            Event::OfferReady {
                generation: ready,
                candidates,
            },
        ) if ready == *generation => Ok(TransitionResult::new(SessionState::Offering {
            offer: CandidateOffer {
                generation: ready,
                seed: seed.clone(),
                candidates,
            },
        })
        .with_effect(Effect::PublishState)),

        // Superseded or cancelled offer -> dropped
        (_, Event::OfferReady { .. }) => Ok(TransitionResult::new(state.clone())),

        (
            SessionState::Offering { offer },
            Event::Select {
                candidate_id,
                answer_turn_id,
                selected_at,
            },
        ) => {
            let Some(candidate) = offer.find(&candidate_id) else {
                return Err(TransitionError::UnknownCandidate(candidate_id));
            };
            let answer =
                AnswerTurn::from_candidate(answer_turn_id, candidate.content.clone(), selected_at);
            Ok(TransitionResult::new(SessionState::Idle)
                .with_effect(Effect::append(answer))
                .with_effect(Effect::PublishState))
        }

        // With no offer open there is nothing to match the id against, so this
        // is reported apart from an id missing from an open offer
        (_, Event::Select { .. }) => Err(TransitionError::NoOpenOffer),
    }
}

fn start_generation(generation: u64, seed: Option<String>) -> TransitionResult {
    TransitionResult::new(SessionState::Generating { generation, seed })
        .with_effect(Effect::ScheduleOffer { generation })
        .with_effect(Effect::PublishState)
}

fn engine_answer(
    pending: &PendingSubmission,
    answer_turn_id: TurnId,
    payload: EvaluationPayload,
    completed_at: DateTime<Utc>,
) -> AnswerTurn {
    AnswerTurn {
        id: answer_turn_id,
        answers: Some(pending.question_turn_id.clone()),
        source: AnswerSource::Engine,
        predicted_index: Some(payload.predicted_answer),
        answer_text: payload.answer_text,
        confidence: Some(payload.confidence),
        category: Some(payload.category),
        category_confidence: payload.category_confidence,
        reasoning: Some(payload.reasoning),
        created_at: completed_at,
    }
}
