//! Side-channel attack primitives.
//!
//! `confirmer` filters source-port deltas, `layout` builds guesses and
//! `solver` drives the chunk-by-chunk brute force on top of both.

pub mod confirmer;
pub mod core;
pub mod layout;
pub mod solver;

pub use confirmer::{Confirmation, DeltaConfirmer, UNCONFIRMED};
pub use layout::PasswordLayout;
pub use solver::{AbortReason, ChunkSolver, SolveOutcome, SolverError, SolverState, Verdict};
