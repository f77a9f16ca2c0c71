//! Event system for the solver.
//!
//! Provides hooks for metrics, logging, and custom reactions around every
//! guess/observe iteration.

use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::metrics::MetricsCollector;
use crate::attack::solver::AbortReason;

/// A guess left for the verifier.
#[derive(Debug, Clone)]
pub struct GuessEvent {
    pub guess: String,
    pub chunk_index: usize,
    pub counter: u64,
}

/// The verifier endpoint could not be reached for a guess.
#[derive(Debug, Clone)]
pub struct SubmitFailedEvent {
    pub guess: String,
    pub error: String,
}

/// A callback whose delta was not (yet) usable.
#[derive(Debug, Clone)]
pub struct SampleEvent {
    pub guess: String,
    pub delta: i64,
    pub confident: bool,
}

/// The active chunk moved on to its next candidate value.
#[derive(Debug, Clone)]
pub struct CounterEvent {
    pub chunk_index: usize,
    pub counter: u64,
    pub delta: i64,
}

#[derive(Debug, Clone)]
pub struct ChunkSolvedEvent {
    pub chunk_index: usize,
    pub value: String,
    pub partial_password: String,
    pub timestamp: DateTime<Utc>,
}

/// A delta matching neither expected signature, or a callback that never came.
#[derive(Debug, Clone)]
pub struct AnomalyEvent {
    pub chunk_index: usize,
    pub delta: Option<i64>,
    pub anomaly_count: u32,
    pub ceiling: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SolvedEvent {
    pub password: String,
    pub guesses: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct AbortedEvent {
    pub reason: AbortReason,
    pub guesses: u64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub enum SolverEvent {
    GuessSubmitted(GuessEvent),
    SubmitFailed(SubmitFailedEvent),
    SampleDiscarded(SampleEvent),
    CounterAdvanced(CounterEvent),
    ChunkSolved(ChunkSolvedEvent),
    Anomaly(AnomalyEvent),
    Solved(SolvedEvent),
    Aborted(AbortedEvent),
}

/// Trait implemented by event handlers.
pub trait EventHandler: Send + Sync {
    fn handle(&self, event: &SolverEvent);
}

/// Dispatcher that broadcasts events to registered handlers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: Vec<Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self { handlers: Vec::new() }
    }

    /// Dispatcher with the [`LoggingHandler`] already registered.
    pub fn with_logging() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher
    }

    pub fn register_handler(&mut self, handler: Arc<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn dispatch(&self, event: SolverEvent) {
        for handler in &self.handlers {
            handler.handle(&event);
        }
    }
}

/// Logs events using the `log` crate.
#[derive(Debug)]
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn handle(&self, event: &SolverEvent) {
        match event {
            SolverEvent::GuessSubmitted(guess) => {
                log::debug!(
                    "-> pw={} (chunk={} counter={})",
                    guess.guess,
                    guess.chunk_index,
                    guess.counter
                );
            }
            SolverEvent::SubmitFailed(failed) => {
                log::warn!("submitting {} failed: {}", failed.guess, failed.error);
            }
            SolverEvent::SampleDiscarded(sample) => {
                log::debug!(
                    "delta={} confident={} pw={} not stable yet",
                    sample.delta,
                    sample.confident,
                    sample.guess
                );
            }
            SolverEvent::CounterAdvanced(step) => {
                log::debug!(
                    "delta={} -> chunk #{} counter={}",
                    step.delta,
                    step.chunk_index,
                    step.counter
                );
            }
            SolverEvent::ChunkSolved(chunk) => {
                log::info!(
                    "Found chunk #{} ({}). Current PW: {}",
                    chunk.chunk_index,
                    chunk.value,
                    chunk.partial_password
                );
            }
            SolverEvent::Anomaly(anomaly) => match anomaly.delta {
                Some(delta) => log::error!(
                    "Weird delta={} at chunk={}. Resetting current chunk state ({}/{}).",
                    delta,
                    anomaly.chunk_index,
                    anomaly.anomaly_count,
                    anomaly.ceiling
                ),
                None => log::error!(
                    "No callback at chunk={}. Resetting current chunk state ({}/{}).",
                    anomaly.chunk_index,
                    anomaly.anomaly_count,
                    anomaly.ceiling
                ),
            },
            SolverEvent::Solved(solved) => {
                log::info!("password {} found after {} guesses", solved.password, solved.guesses);
            }
            SolverEvent::Aborted(aborted) => {
                log::error!("giving up after {} guesses: {}", aborted.guesses, aborted.reason);
            }
        }
    }
}

/// Metrics handler that feeds the metrics collector.
#[derive(Clone, Debug)]
pub struct MetricsHandler {
    metrics: MetricsCollector,
}

impl MetricsHandler {
    pub fn new(metrics: MetricsCollector) -> Self {
        Self { metrics }
    }
}

impl EventHandler for MetricsHandler {
    fn handle(&self, event: &SolverEvent) {
        match event {
            SolverEvent::GuessSubmitted(guess) => self.metrics.record_guess(guess.chunk_index),
            SolverEvent::SubmitFailed(_) => self.metrics.record_submit_failure(),
            SolverEvent::SampleDiscarded(_) => self.metrics.record_discarded(),
            SolverEvent::CounterAdvanced(step) => self.metrics.record_delta(step.delta),
            SolverEvent::ChunkSolved(chunk) => {
                self.metrics
                    .record_chunk_solved(chunk.chunk_index, &chunk.value, chunk.timestamp)
            }
            SolverEvent::Anomaly(anomaly) => self.metrics.record_anomaly(anomaly.delta),
            SolverEvent::Solved(solved) => self.metrics.record_finished(true, solved.timestamp),
            SolverEvent::Aborted(aborted) => {
                self.metrics.record_finished(false, aborted.timestamp)
            }
        }
    }
}
