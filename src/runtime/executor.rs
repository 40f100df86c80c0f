//! Session runtime executor

use super::{Completion, Request, SessionError, SessionEvent, SessionSnapshot};
use crate::candidates::CandidatePool;
use crate::correlation::highlights;
use crate::engine::{EngineError, EvaluationRequest, ReasoningEngine};
use crate::state_machine::{
    transition, Effect, Event, SessionState, SubmissionOutcome, TransitionError,
};
use crate::transcript::{TranscriptStore, Turn, TurnId};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;

/// Owns the session and processes requests and background events one at a time
pub struct SessionRuntime<E: ReasoningEngine + 'static> {
    state: SessionState,
    transcript: TranscriptStore,
    engine: Arc<E>,
    pool: CandidatePool,
    offer_delay: Duration,
    rng: StdRng,
    request_rx: mpsc::Receiver<Request>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    /// Token to cancel the running engine call
    evaluation_cancel_token: Option<CancellationToken>,
    /// Token to cancel the scheduled offer
    offer_cancel_token: Option<CancellationToken>,
    /// Caller waiting on the pending submission
    completion: Option<Completion>,
}

impl<E: ReasoningEngine + 'static> SessionRuntime<E> {
    pub(crate) fn new(
        engine: E,
        pool: CandidatePool,
        offer_delay: Duration,
        request_rx: mpsc::Receiver<Request>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            state: SessionState::Idle,
            transcript: TranscriptStore::new(),
            engine: Arc::new(engine),
            pool,
            offer_delay,
            rng: StdRng::from_entropy(),
            request_rx,
            event_rx,
            event_tx,
            broadcast_tx,
            evaluation_cancel_token: None,
            offer_cancel_token: None,
            completion: None,
        }
    }

    /// Use a fixed random source for candidate draws
    #[cfg(test)]
    pub fn with_rng(mut self, rng: StdRng) -> Self {
        self.rng = rng;
        self
    }

    pub async fn run(mut self) {
        tracing::info!(engine = %self.engine.name(), "Starting session runtime");

        loop {
            tokio::select! {
                biased;

                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event, None) {
                        tracing::error!(error = %e, "Error handling background event");
                    }
                }
                request = self.request_rx.recv() => match request {
                    Some(request) => self.handle_request(request),
                    None => break,
                },
            }
        }

        // Nobody can observe the outcome any more
        if let Some(token) = self.evaluation_cancel_token.take() {
            token.cancel();
        }
        if let Some(token) = self.offer_cancel_token.take() {
            token.cancel();
        }
        tracing::info!("Session runtime stopped");
    }

    fn handle_request(&mut self, request: Request) {
        match request {
            Request::Dispatch {
                event,
                reply,
                completion,
            } => {
                let result = self.process_event(event, completion);
                if let Err(e) = &result {
                    tracing::warn!(error = %e, state = self.state.name(), "Request rejected");
                    let _ = self.broadcast_tx.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                }
                let _ = reply.send(result);
            }
            Request::Snapshot { reply } => {
                let _ = reply.send(SessionSnapshot::capture(&self.state, &self.transcript));
            }
        }
    }

    /// Run one event through the state machine and execute its effects.
    ///
    /// Returns the turns appended along the way.
    fn process_event(
        &mut self,
        event: Event,
        completion: Option<Completion>,
    ) -> Result<Vec<Turn>, TransitionError> {
        let internal = event.is_internal();
        let result = transition(&self.state, event)?;

        let old_state = std::mem::replace(&mut self.state, result.new_state);
        if old_state.name() != self.state.name() {
            tracing::info!(
                from = old_state.name(),
                to = self.state.name(),
                internal,
                "Session state changed"
            );
        }

        if let Some(completion) = completion {
            self.completion = Some(completion);
        }

        let mut appended = Vec::new();
        for effect in result.effects {
            if let Some(turn) = self.execute_effect(effect) {
                appended.push(turn);
            }
        }
        if !appended.is_empty() {
            tracing::debug!(
                appended = appended.len(),
                transcript_len = self.transcript.len(),
                "Transcript updated"
            );
        }

        // Finished tasks leave their tokens behind
        if !matches!(self.state, SessionState::Evaluating { .. }) {
            self.evaluation_cancel_token = None;
        }
        if !matches!(self.state, SessionState::Generating { .. }) {
            self.offer_cancel_token = None;
        }

        Ok(appended)
    }

    /// Execute an effect, returning the turn it appended if any
    fn execute_effect(&mut self, effect: Effect) -> Option<Turn> {
        match effect {
            Effect::AppendTurn { turn } => match self.transcript.push(turn.clone()) {
                Ok(()) => {
                    tracing::debug!(turn_id = %turn.id(), "Turn appended");
                    let _ = self.broadcast_tx.send(SessionEvent::Turn {
                        turn: turn.clone(),
                        highlights: highlights(self.transcript.turns()),
                    });
                    Some(turn)
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to append turn");
                    let _ = self.broadcast_tx.send(SessionEvent::Error {
                        message: e.to_string(),
                    });
                    None
                }
            },

            Effect::RequestEvaluation {
                question_turn_id,
                request,
            } => {
                self.request_evaluation(question_turn_id, request);
                None
            }

            Effect::AbortEvaluation => {
                if let Some(token) = self.evaluation_cancel_token.take() {
                    tracing::info!("Aborting engine call");
                    token.cancel();
                }
                None
            }

            Effect::ResolveSubmission { outcome } => {
                let result = match outcome {
                    SubmissionOutcome::Answered(answer) => Ok(answer),
                    SubmissionOutcome::Failed { message } => {
                        let _ = self.broadcast_tx.send(SessionEvent::Error {
                            message: message.clone(),
                        });
                        Err(SessionError::Request(message))
                    }
                    SubmissionOutcome::Cancelled => Err(SessionError::Cancelled),
                };
                match self.completion.take() {
                    Some(completion) => {
                        // The caller may have gone away; the transcript is already updated
                        let _ = completion.send(result);
                    }
                    None => tracing::debug!("No caller waiting on submission"),
                }
                None
            }

            Effect::ScheduleOffer { generation } => {
                self.schedule_offer(generation);
                None
            }

            Effect::CancelScheduledOffer => {
                if let Some(token) = self.offer_cancel_token.take() {
                    token.cancel();
                }
                None
            }

            Effect::ClearTranscript => {
                self.transcript.reset();
                let _ = self.broadcast_tx.send(SessionEvent::Snapshot(
                    SessionSnapshot::capture(&self.state, &self.transcript),
                ));
                None
            }

            Effect::PublishState => {
                let _ = self.broadcast_tx.send(SessionEvent::StateChange {
                    state: self.state.clone(),
                    accepting_input: self.state.accepting_input(),
                });
                if let Some(offer) = self.state.offer() {
                    let _ = self.broadcast_tx.send(SessionEvent::Offer {
                        offer: offer.clone(),
                    });
                }
                None
            }
        }
    }

    fn request_evaluation(
        &mut self,
        question_turn_id: TurnId,
        request: EvaluationRequest,
    ) {
        let cancel_token = CancellationToken::new();
        self.evaluation_cancel_token = Some(cancel_token.clone());

        let engine = Arc::clone(&self.engine);
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tracing::info!(turn_id = %question_turn_id, "Requesting evaluation (background)");

            // The engine call runs in its own task so a panic still reports back
            let mut call = tokio::spawn(async move { engine.evaluate(&request).await });

            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    call.abort();
                    tracing::info!(turn_id = %question_turn_id, "Engine call cancelled");
                }

                joined = &mut call => {
                    let result = joined.unwrap_or_else(|e| {
                        tracing::error!(turn_id = %question_turn_id, error = %e, "Engine task failed");
                        Err(EngineError::unknown(format!("Engine task failed: {e}")))
                    });
                    let event = match result {
                        Ok(payload) => Event::EvaluationComplete {
                            question_turn_id,
                            answer_turn_id: TurnId::answer(),
                            payload,
                            completed_at: Utc::now(),
                        },
                        Err(e) => Event::EvaluationFailed {
                            question_turn_id,
                            message: e.message,
                        },
                    };
                    let _ = event_tx.send(event).await;
                }
            }
        });
    }

    fn schedule_offer(&mut self, generation: u64) {
        if let Some(previous) = self.offer_cancel_token.take() {
            previous.cancel();
        }
        let cancel_token = CancellationToken::new();
        self.offer_cancel_token = Some(cancel_token.clone());

        let candidates = self.pool.draw(&mut self.rng);
        let delay = self.offer_delay;
        let event_tx = self.event_tx.clone();

        tokio::spawn(async move {
            tokio::select! {
                biased;

                () = cancel_token.cancelled() => {
                    tracing::debug!(generation, "Scheduled offer cancelled");
                }

                () = tokio::time::sleep(delay) => {
                    let _ = event_tx.send(Event::OfferReady { generation, candidates }).await;
                }
            }
        });
    }
}
