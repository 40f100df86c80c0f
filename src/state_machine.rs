//! Core session state machine
//!
//! Implements the Elm Architecture pattern with pure state transitions. The
//! evaluation cycle and the candidate cycle share one state enum, so at most
//! one of them can be open at a time.

mod effect;
pub mod event;
pub mod state;
pub(crate) mod transition;

#[cfg(test)]
mod proptests;

pub use effect::{Effect, SubmissionOutcome};
pub use event::Event;
pub use state::{PendingSubmission, SessionState};
pub use transition::{transition, TransitionError, TransitionResult};
