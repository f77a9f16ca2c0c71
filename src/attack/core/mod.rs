//! Core types and transport seams shared by the confirmer, solver and listener.

pub mod reqwest_client;
pub mod transport;
pub mod types;

pub use reqwest_client::ReqwestGuessSubmitter;
pub use transport::{EventSource, GuessSubmitter, SubmitError};
pub use types::{ConnectionEvent, GuessSubmission};
