//! Property-based tests for the state machine
//!
//! These tests verify key invariants hold across all possible inputs.

use super::*;
use crate::candidates::{Candidate, CandidateId, CandidateOffer};
use crate::engine::EvaluationPayload;
use crate::transcript::{AnswerSource, TranscriptStore, Turn, TurnId};
use chrono::Utc;
use proptest::prelude::*;

// ============================================================================
// Arbitrary Generators
// ============================================================================

fn arb_valid_question() -> impl Strategy<Value = String> {
    "[a-zA-Z?]{10,40}"
}

fn arb_valid_options() -> impl Strategy<Value = Vec<String>> {
    proptest::collection::vec("[a-z0-9]{1,8}", 5)
}

/// Submissions that may or may not pass validation
fn arb_submission() -> impl Strategy<Value = (String, Vec<String>)> {
    prop_oneof![
        (arb_valid_question(), arb_valid_options()),
        (
            "[a-zA-Z ]{0,20}",
            proptest::collection::vec("[a-z ]{0,4}", 0..7)
        ),
    ]
}

fn arb_candidate() -> impl Strategy<Value = Candidate> {
    ("[a-z]{6}", "[a-zA-Z ]{1,30}").prop_map(|(id, content)| Candidate {
        id: CandidateId::new(format!("cand-{id}")),
        content,
    })
}

fn arb_offer() -> impl Strategy<Value = CandidateOffer> {
    (
        1u64..100,
        proptest::option::of("[a-z ]{1,10}"),
        proptest::collection::vec(arb_candidate(), 1..6),
    )
        .prop_map(|(generation, seed, candidates)| CandidateOffer {
            generation,
            seed,
            candidates,
        })
}

fn arb_pending() -> impl Strategy<Value = PendingSubmission> {
    (arb_valid_question(), arb_valid_options(), "[a-z0-9]{8}").prop_map(
        |(question, options, id)| PendingSubmission {
            question_turn_id: TurnId::new(format!("q-{id}")),
            question,
            options,
            started_at: Utc::now(),
        },
    )
}

fn arb_busy_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![
        arb_pending().prop_map(|pending| SessionState::Evaluating { pending }),
        (1u64..100, proptest::option::of("[a-z]{1,8}"))
            .prop_map(|(generation, seed)| SessionState::Generating { generation, seed }),
        arb_offer().prop_map(|offer| SessionState::Offering { offer }),
    ]
}

fn arb_state() -> impl Strategy<Value = SessionState> {
    prop_oneof![Just(SessionState::Idle), arb_busy_state()]
}

/// Abstract user and background actions, resolved against the current state
#[derive(Debug, Clone)]
enum Action {
    Submit(String, Vec<String>),
    CompleteCurrent(u8),
    CompleteStale,
    FailCurrent,
    Cancel,
    Reset,
    Generate(Option<String>),
    Regenerate,
    DeliverCurrent(Vec<Candidate>),
    DeliverStale,
    SelectExisting(usize),
    SelectUnknown,
}

fn arb_action() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => arb_submission().prop_map(|(q, o)| Action::Submit(q, o)),
        2 => (1u8..=5).prop_map(Action::CompleteCurrent),
        1 => Just(Action::CompleteStale),
        1 => Just(Action::FailCurrent),
        1 => Just(Action::Cancel),
        1 => Just(Action::Reset),
        2 => proptest::option::of("[a-z]{1,8}").prop_map(Action::Generate),
        1 => Just(Action::Regenerate),
        2 => proptest::collection::vec(arb_candidate(), 1..5).prop_map(Action::DeliverCurrent),
        1 => Just(Action::DeliverStale),
        2 => (0usize..8).prop_map(Action::SelectExisting),
        1 => Just(Action::SelectUnknown),
    ]
}

// ============================================================================
// Simulation harness
// ============================================================================

/// Drives `transition` and applies transcript effects the way the runtime does
struct Sim {
    state: SessionState,
    transcript: TranscriptStore,
    next_id: u64,
    generation: u64,
}

impl Sim {
    fn new() -> Self {
        Self {
            state: SessionState::Idle,
            transcript: TranscriptStore::new(),
            next_id: 0,
            generation: 0,
        }
    }

    fn mint(&mut self, prefix: &str) -> TurnId {
        self.next_id += 1;
        TurnId::new(format!("{prefix}-{}", self.next_id))
    }

    fn event_for(&mut self, action: Action) -> Event {
        match action {
            Action::Submit(question, options) => Event::Submit {
                question,
                options,
                question_turn_id: self.mint("q"),
                submitted_at: Utc::now(),
            },
            Action::CompleteCurrent(predicted) => {
                let question_turn_id = self
                    .state
                    .pending()
                    .map_or_else(|| TurnId::new("q-none"), |p| p.question_turn_id.clone());
                Event::EvaluationComplete {
                    question_turn_id,
                    answer_turn_id: self.mint("a"),
                    payload: payload(predicted),
                    completed_at: Utc::now(),
                }
            }
            Action::CompleteStale => Event::EvaluationComplete {
                question_turn_id: TurnId::new("q-stale"),
                answer_turn_id: self.mint("a"),
                payload: payload(1),
                completed_at: Utc::now(),
            },
            Action::FailCurrent => Event::EvaluationFailed {
                question_turn_id: self
                    .state
                    .pending()
                    .map_or_else(|| TurnId::new("q-none"), |p| p.question_turn_id.clone()),
                message: "Server error: boom".to_string(),
            },
            Action::Cancel => Event::Cancel,
            Action::Reset => Event::Reset,
            Action::Generate(seed) => {
                self.generation += 1;
                Event::Generate {
                    seed,
                    generation: self.generation,
                }
            }
            Action::Regenerate => {
                self.generation += 1;
                Event::Regenerate {
                    generation: self.generation,
                }
            }
            Action::DeliverCurrent(candidates) => Event::OfferReady {
                generation: self.generation,
                candidates,
            },
            Action::DeliverStale => Event::OfferReady {
                generation: self.generation.wrapping_sub(1),
                candidates: vec![],
            },
            Action::SelectExisting(index) => {
                let candidate_id = self
                    .state
                    .offer()
                    .and_then(|o| o.candidates.get(index % o.candidates.len().max(1)))
                    .map_or_else(|| CandidateId::new("cand-none"), |c| c.id.clone());
                Event::Select {
                    candidate_id,
                    answer_turn_id: self.mint("a"),
                    selected_at: Utc::now(),
                }
            }
            Action::SelectUnknown => Event::Select {
                candidate_id: CandidateId::new("cand-unknown"),
                answer_turn_id: self.mint("a"),
                selected_at: Utc::now(),
            },
        }
    }
}

fn payload(predicted_answer: u8) -> EvaluationPayload {
    EvaluationPayload {
        predicted_answer,
        answer_text: "answer".to_string(),
        confidence: 0.5,
        category: "Category".to_string(),
        reasoning: "Because.".to_string(),
        category_confidence: None,
        timestamp: None,
    }
}

fn has_effect(effects: &[Effect], pred: impl Fn(&Effect) -> bool) -> bool {
    effects.iter().any(pred)
}

// ============================================================================
// Invariants
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// Any busy state rejects a new submission and stays untouched
    #[test]
    fn busy_state_rejects_submit(
        state in arb_busy_state(),
        (question, options) in arb_submission(),
    ) {
        let event = Event::Submit {
            question,
            options,
            question_turn_id: TurnId::new("q-new"),
            submitted_at: Utc::now(),
        };
        let result = transition(&state, event);
        prop_assert_eq!(result.unwrap_err(), TransitionError::AlreadyInFlight);
    }

    /// Reset always lands in Idle and clears the transcript
    #[test]
    fn reset_always_returns_to_idle(state in arb_state()) {
        let result = transition(&state, Event::Reset).unwrap();
        prop_assert_eq!(&result.new_state, &SessionState::Idle);
        prop_assert!(result.effects.contains(&Effect::ClearTranscript));

        let resolves = has_effect(&result.effects, |e| matches!(e, Effect::ResolveSubmission { .. }));
        prop_assert_eq!(resolves, matches!(state, SessionState::Evaluating { .. }));
    }

    /// Selecting an id from the open offer succeeds; anything else is unknown
    #[test]
    fn select_matches_offer(offer in arb_offer(), index in 0usize..8, stranger in "[A-Z]{6}") {
        let state = SessionState::Offering { offer: offer.clone() };
        let chosen = &offer.candidates[index % offer.candidates.len()];

        let ok = transition(&state, Event::Select {
            candidate_id: chosen.id.clone(),
            answer_turn_id: TurnId::new("a-x"),
            selected_at: Utc::now(),
        }).unwrap();
        prop_assert_eq!(&ok.new_state, &SessionState::Idle);
        let appended_content = ok.effects.iter().find_map(|e| match e {
            Effect::AppendTurn { turn: Turn::Answer(a) } => Some(a.answer_text.clone()),
            _ => None,
        });
        prop_assert_eq!(appended_content, Some(chosen.content.clone()));

        let unknown = CandidateId::new(stranger);
        let err = transition(&state, Event::Select {
            candidate_id: unknown.clone(),
            answer_turn_id: TurnId::new("a-y"),
            selected_at: Utc::now(),
        }).unwrap_err();
        prop_assert_eq!(err, TransitionError::UnknownCandidate(unknown));
    }

    /// Random sessions keep the transcript consistent with the state
    #[test]
    fn transitions_preserve_session_invariants(
        actions in proptest::collection::vec(arb_action(), 1..60)
    ) {
        let mut sim = Sim::new();

        for action in actions {
            let before = sim.state.clone();
            let turns_before = sim.transcript.len();
            let event = sim.event_for(action);
            let is_submit = matches!(event, Event::Submit { .. });

            let result = match transition(&sim.state, event) {
                Ok(r) => r,
                Err(TransitionError::AlreadyInFlight) => {
                    prop_assert!(!before.accepting_input() || !is_submit);
                    continue;
                }
                Err(_) => continue,
            };

            // Engine calls start only from Idle, and only into Evaluating
            let requests = has_effect(&result.effects, |e| matches!(e, Effect::RequestEvaluation { .. }));
            prop_assert_eq!(
                requests,
                before == SessionState::Idle
                    && matches!(result.new_state, SessionState::Evaluating { .. })
            );

            // Offers are scheduled only when entering Generating
            let schedules = has_effect(&result.effects, |e| matches!(e, Effect::ScheduleOffer { .. }));
            prop_assert_eq!(
                schedules,
                matches!(result.new_state, SessionState::Generating { .. })
                    && result.new_state != before
            );

            // The waiting caller is resolved exactly when the pending call ends
            let resolves = has_effect(&result.effects, |e| matches!(e, Effect::ResolveSubmission { .. }));
            prop_assert_eq!(
                resolves,
                before.pending().is_some() && result.new_state.pending().is_none()
            );

            for effect in &result.effects {
                match effect {
                    Effect::AppendTurn { turn } => {
                        prop_assert!(sim.transcript.push(turn.clone()).is_ok());
                    }
                    Effect::ClearTranscript => sim.transcript.reset(),
                    _ => {}
                }
            }

            // No-op transitions do not touch the transcript
            if result.effects.is_empty() {
                prop_assert_eq!(sim.transcript.len(), turns_before);
                prop_assert_eq!(&result.new_state, &before);
            }

            sim.state = result.new_state;

            // A pending submission always refers to a question in the transcript
            if let Some(pending) = sim.state.pending() {
                prop_assert!(sim.transcript.question(&pending.question_turn_id).is_some());
            }
        }

        // Engine answers always follow the question they answer
        let turns = sim.transcript.all_turns();
        for (pos, turn) in turns.iter().enumerate() {
            if let Turn::Answer(a) = turn {
                if a.source == AnswerSource::Engine {
                    let linked = a.answers.as_ref().unwrap();
                    let q_pos = turns.iter().position(|t| t.id() == linked).unwrap();
                    prop_assert!(q_pos < pos);
                }
            }
        }
    }
}
