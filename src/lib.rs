//! # pwdb-cracker-rs
//!
//! Recovers a numeric PasswordDB password by watching the source ports of
//! the verifier's webhook callbacks.
//!
//! The verifier compares a guess chunk by chunk and opens one outbound
//! connection per matching chunk before calling back. The gap between two
//! consecutive callback source ports therefore leaks how many chunks of a
//! guess were right, which lets the password be brute forced one chunk at a
//! time instead of all at once.
//!
//! ## Example
//!
//! ```no_run
//! use pwdb_cracker_rs::Cracker;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let cracker = Cracker::builder()
//!         .with_endpoint("http://127.0.0.1:3000/")?
//!         .with_webhook_targets(["127.0.0.1:50012"])
//!         .build()?;
//!     let outcome = cracker.run().await?;
//!     println!("{:?}", outcome.password());
//!     Ok(())
//! }
//! ```

mod cracker;

pub mod attack;
pub mod config;
pub mod listener;
pub mod modules;

pub use crate::cracker::{Cracker, CrackerBuilder, CrackerConfig, CrackerError, CrackerResult};

pub use crate::attack::core::{
    ConnectionEvent, EventSource, GuessSubmission, GuessSubmitter, ReqwestGuessSubmitter,
    SubmitError,
};

pub use crate::attack::{
    AbortReason, ChunkSolver, Confirmation, DeltaConfirmer, PasswordLayout, SolveOutcome,
    SolverError, SolverState, Verdict,
};

pub use crate::config::{ConfigError, ListenerConfig, SolverConfig};

pub use crate::listener::{
    CallbackHandler, ConnectionHandler, EventStream, ListenerError, ListenerHandle,
    WebhookListener,
};

pub use crate::modules::{EventDispatcher, EventHandler, MetricsCollector, MetricsSnapshot};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
