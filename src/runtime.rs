//! Runtime for driving the session
//!
//! One task owns the transcript and the state; callers talk to it through a
//! cloneable [`SessionHandle`] and observe it through a broadcast channel.

mod executor;


pub use executor::SessionRuntime;

use crate::candidates::{CandidateId, CandidateOffer, CandidatePool};
use crate::correlation::highlights;
use crate::engine::ReasoningEngine;
use crate::state_machine::{Event, SessionState, TransitionError};
use crate::transcript::{AnswerTurn, TranscriptStore, Turn, TurnId};
use crate::validation::ValidationError;
use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, oneshot};

/// Errors surfaced to session callers
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("{0}")]
    Request(String),
    #[error("A request is already in flight")]
    AlreadyInFlight,
    #[error("Unknown candidate: {0}")]
    UnknownCandidate(CandidateId),
    #[error("No candidate offer is open")]
    NoOpenOffer,
    #[error("Request was cancelled")]
    Cancelled,
    #[error("Session runtime is not running")]
    RuntimeGone,
}

impl From<TransitionError> for SessionError {
    fn from(err: TransitionError) -> Self {
        match err {
            TransitionError::Validation(e) => SessionError::Validation(e),
            TransitionError::AlreadyInFlight => SessionError::AlreadyInFlight,
            TransitionError::UnknownCandidate(id) => SessionError::UnknownCandidate(id),
            TransitionError::NoOpenOffer => SessionError::NoOpenOffer,
        }
    }
}

/// Everything a client needs to render the session
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub state: SessionState,
    pub accepting_input: bool,
    pub turns: Vec<Turn>,
    pub highlights: HashMap<TurnId, Option<u8>>,
    pub offer: Option<CandidateOffer>,
}

impl SessionSnapshot {
    pub(crate) fn capture(state: &SessionState, transcript: &TranscriptStore) -> Self {
        Self {
            state: state.clone(),
            accepting_input: state.accepting_input(),
            turns: transcript.all_turns(),
            highlights: highlights(transcript.turns()),
            offer: state.offer().cloned(),
        }
    }
}

/// Events sent to subscribers
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Full resync, sent after the transcript is cleared
    Snapshot(SessionSnapshot),
    StateChange {
        state: SessionState,
        accepting_input: bool,
    },
    Turn {
        turn: Turn,
        highlights: HashMap<TurnId, Option<u8>>,
    },
    Offer {
        offer: CandidateOffer,
    },
    Error {
        message: String,
    },
}

pub(crate) type Completion = oneshot::Sender<Result<AnswerTurn, SessionError>>;

/// Messages from handles to the runtime task
pub(crate) enum Request {
    Dispatch {
        event: Event,
        /// Turns appended while handling the event, or why it was rejected
        reply: oneshot::Sender<Result<Vec<Turn>, TransitionError>>,
        /// Resolved when a started evaluation ends
        completion: Option<Completion>,
    },
    Snapshot {
        reply: oneshot::Sender<SessionSnapshot>,
    },
}

/// Handle to interact with the running session
#[derive(Clone)]
pub struct SessionHandle {
    request_tx: mpsc::Sender<Request>,
    broadcast_tx: broadcast::Sender<SessionEvent>,
    generations: Arc<AtomicU64>,
}

impl SessionHandle {
    pub(crate) fn new(
        request_tx: mpsc::Sender<Request>,
        broadcast_tx: broadcast::Sender<SessionEvent>,
    ) -> Self {
        Self {
            request_tx,
            broadcast_tx,
            generations: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Start a session runtime on the current tokio runtime
    pub fn spawn<E: ReasoningEngine + 'static>(
        engine: E,
        pool: CandidatePool,
        offer_delay: Duration,
    ) -> Self {
        let (request_tx, request_rx) = mpsc::channel(32);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, _) = broadcast::channel(128);

        let runtime = SessionRuntime::new(
            engine,
            pool,
            offer_delay,
            request_rx,
            event_rx,
            event_tx,
            broadcast_tx.clone(),
        );
        tokio::spawn(runtime.run());

        Self::new(request_tx, broadcast_tx)
    }

    async fn dispatch(
        &self,
        event: Event,
        completion: Option<Completion>,
    ) -> Result<Vec<Turn>, SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Dispatch {
                event,
                reply,
                completion,
            })
            .await
            .map_err(|_| SessionError::RuntimeGone)?;
        reply_rx
            .await
            .map_err(|_| SessionError::RuntimeGone)?
            .map_err(SessionError::from)
    }

    fn next_generation(&self) -> u64 {
        self.generations.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Submit a question and wait for the engine's answer.
    ///
    /// Fails fast with `AlreadyInFlight` while anything else is open.
    pub async fn submit(
        &self,
        question: &str,
        options: &[String],
    ) -> Result<AnswerTurn, SessionError> {
        let (completion, done) = oneshot::channel();
        let event = Event::Submit {
            question: question.to_string(),
            options: options.to_vec(),
            question_turn_id: TurnId::question(),
            submitted_at: Utc::now(),
        };
        self.dispatch(event, Some(completion)).await?;
        done.await.map_err(|_| SessionError::RuntimeGone)?
    }

    /// Abandon the pending evaluation or candidate cycle; no-op when idle
    pub async fn cancel(&self) -> Result<(), SessionError> {
        self.dispatch(Event::Cancel, None).await.map(|_| ())
    }

    /// Start a new session, discarding the transcript
    pub async fn reset(&self) -> Result<(), SessionError> {
        self.dispatch(Event::Reset, None).await.map(|_| ())
    }

    pub async fn generate(&self, seed: Option<String>) -> Result<(), SessionError> {
        let generation = self.next_generation();
        self.dispatch(Event::Generate { seed, generation }, None)
            .await
            .map(|_| ())
    }

    pub async fn regenerate(&self) -> Result<(), SessionError> {
        let generation = self.next_generation();
        self.dispatch(Event::Regenerate { generation }, None)
            .await
            .map(|_| ())
    }

    /// Pick a candidate from the open offer
    pub async fn select(&self, candidate_id: CandidateId) -> Result<AnswerTurn, SessionError> {
        let event = Event::Select {
            candidate_id,
            answer_turn_id: TurnId::answer(),
            selected_at: Utc::now(),
        };
        self.dispatch(event, None)
            .await?
            .into_iter()
            .find_map(|turn| match turn {
                Turn::Answer(answer) => Some(answer),
                Turn::Question(_) => None,
            })
            .ok_or(SessionError::NoOpenOffer)
    }

    pub async fn snapshot(&self) -> Result<SessionSnapshot, SessionError> {
        let (reply, reply_rx) = oneshot::channel();
        self.request_tx
            .send(Request::Snapshot { reply })
            .await
            .map_err(|_| SessionError::RuntimeGone)?;
        reply_rx.await.map_err(|_| SessionError::RuntimeGone)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.broadcast_tx.subscribe()
    }
}
