//! Settings and configuration module
//!
//! Provides the tuning knobs of the attack:
//! - JSON loading with per-field defaults
//! - Validation of chunk layout and confirmation window
//! - Listener read limits

pub mod config;

pub use config::{ConfigError, ListenerConfig, MAX_CHUNK_WIDTH, SolverConfig};
