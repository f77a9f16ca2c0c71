//! Attack tuning parameters.
//!
//! The numbers below depend on the network between the verifier and its
//! downstream services (DNS lookups, fixed infrastructure calls...), so they
//! are loadable from JSON and overridable from the command line.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Widest chunk whose counter space still fits comfortably in a `u64`.
pub const MAX_CHUNK_WIDTH: usize = 18;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Parameters of the chunked brute force and of delta confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SolverConfig {
    /// Total number of digits in the password.
    pub password_length: usize,
    /// Number of equal-width chunks the verifier compares one after another.
    pub chunks: usize,
    /// Identical deltas required before a value is trusted.
    pub confirmations: usize,
    /// Extra agreeing samples required before a chunk is committed.
    pub extra_confirmations: usize,
    /// Source port increments caused by a guess whose first chunk is wrong.
    pub min_sockets: i64,
    /// Anomalies tolerated before giving up.
    pub anomaly_ceiling: u32,
    /// Only commit a chunk once every buffered sample agrees, not just the
    /// `confirmations` quorum.
    pub require_confidence: bool,
    /// Give up waiting for a callback after this many milliseconds.
    pub event_timeout_ms: Option<u64>,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            password_length: 12,
            chunks: 4,
            confirmations: 3,
            extra_confirmations: 0,
            min_sockets: 3,
            anomaly_ceiling: 5,
            require_confidence: false,
            event_timeout_ms: None,
        }
    }
}

impl SolverConfig {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Number of digits in every chunk.
    pub fn chunk_width(&self) -> usize {
        self.password_length / self.chunks.max(1)
    }

    /// Capacity of the confirmer ring buffer.
    pub fn confirmation_window(&self) -> usize {
        self.confirmations + self.extra_confirmations
    }

    pub fn event_timeout(&self) -> Option<Duration> {
        self.event_timeout_ms.map(Duration::from_millis)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.chunks == 0 {
            return Err(ConfigError::Invalid("chunks must be at least 1".into()));
        }
        if self.password_length == 0 || self.password_length % self.chunks != 0 {
            return Err(ConfigError::Invalid(format!(
                "password length {} is not divisible into {} chunks",
                self.password_length, self.chunks
            )));
        }
        if self.chunk_width() > MAX_CHUNK_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "chunk width {} exceeds {MAX_CHUNK_WIDTH} digits",
                self.chunk_width()
            )));
        }
        if self.confirmations == 0 {
            return Err(ConfigError::Invalid(
                "confirmations must be at least 1".into(),
            ));
        }
        if self.min_sockets < 1 {
            return Err(ConfigError::Invalid("min_sockets must be at least 1".into()));
        }
        if self.anomaly_ceiling == 0 {
            return Err(ConfigError::Invalid(
                "anomaly_ceiling must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Behaviour of the callback listener for each accepted connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerConfig {
    /// Upper bound on bytes read from a single callback.
    pub read_buffer: usize,
    /// How long a single connection may take to deliver its payload.
    pub read_timeout: Duration,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            read_buffer: 1024,
            read_timeout: Duration::from_secs(2),
        }
    }
}
