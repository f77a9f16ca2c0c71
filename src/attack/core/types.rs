//! Core data structures shared by the listener, the confirmer and the solver.

use serde::{Deserialize, Serialize};

/// One inbound webhook callback.
///
/// Only the ordering and magnitude of `connection_id` matter; it is the source
/// port the verifier's callback connection came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectionEvent {
    pub connection_id: i64,
    pub success: bool,
}

impl ConnectionEvent {
    pub fn new(connection_id: impl Into<i64>, success: bool) -> Self {
        Self {
            connection_id: connection_id.into(),
            success,
        }
    }

    pub fn failure(connection_id: impl Into<i64>) -> Self {
        Self::new(connection_id, false)
    }
}

/// Request body posted to the verifier for every guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessSubmission {
    pub password: String,
    pub webhooks: Vec<String>,
}

impl GuessSubmission {
    pub fn new(password: impl Into<String>, webhooks: &[String]) -> Self {
        Self {
            password: password.into(),
            webhooks: webhooks.to_vec(),
        }
    }
}
