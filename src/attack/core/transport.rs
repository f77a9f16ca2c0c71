//! Seams between the solver and the outside world.
//!
//! The solver only ever talks to a [`GuessSubmitter`] (outbound guesses) and an
//! [`EventSource`] (inbound callbacks), so it can be driven by the real network
//! stack or by a scripted stand-in.

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use super::types::{ConnectionEvent, GuessSubmission};

/// Contract for delivering a guess to the verifier.
///
/// Submission is fire-and-forget from the solver's point of view: an error is
/// logged and the solver still waits for the paired callback.
#[async_trait]
pub trait GuessSubmitter: Send + Sync {
    async fn submit(&self, submission: &GuessSubmission) -> Result<(), SubmitError>;
}

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("http transport error: {0}")]
    Transport(String),
}

/// Ordered stream of callback events.
///
/// Returns `None` once the producing side is gone and no event will ever
/// arrive again.
#[async_trait]
pub trait EventSource: Send {
    async fn next_event(&mut self) -> Option<ConnectionEvent>;
}

#[async_trait]
impl EventSource for mpsc::UnboundedReceiver<ConnectionEvent> {
    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.recv().await
    }
}

#[async_trait]
impl EventSource for mpsc::Receiver<ConnectionEvent> {
    async fn next_event(&mut self) -> Option<ConnectionEvent> {
        self.recv().await
    }
}
