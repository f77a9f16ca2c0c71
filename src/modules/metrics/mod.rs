//! Metrics collection utilities.
//!
//! Aggregates per-run counters (guesses, discarded samples, anomalies), the
//! histogram of confirmed deltas and a record of every solved chunk.

use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Record of a single solved chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkStats {
    pub chunk_index: usize,
    pub value: String,
    pub guesses: u64,
    pub solved_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub solved: Option<bool>,
    pub guesses: u64,
    pub submit_failures: u64,
    pub discarded: u64,
    pub anomalies: u64,
    pub timeouts: u64,
    pub delta_histogram: BTreeMap<i64, u64>,
    pub chunks: Vec<ChunkStats>,
}

impl MetricsSnapshot {
    /// Wall-clock duration of the run so far (or until it finished).
    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at.unwrap_or_else(Utc::now) - self.started_at
    }
}

#[derive(Debug)]
struct MetricsState {
    started_at: DateTime<Utc>,
    finished_at: Option<DateTime<Utc>>,
    solved: Option<bool>,
    guesses: u64,
    submit_failures: u64,
    discarded: u64,
    anomalies: u64,
    timeouts: u64,
    delta_histogram: BTreeMap<i64, u64>,
    guesses_by_chunk: HashMap<usize, u64>,
    chunks: Vec<ChunkStats>,
}

impl MetricsState {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            solved: None,
            guesses: 0,
            submit_failures: 0,
            discarded: 0,
            anomalies: 0,
            timeouts: 0,
            delta_histogram: BTreeMap::new(),
            guesses_by_chunk: HashMap::new(),
            chunks: Vec::new(),
        }
    }

    fn bump_delta(&mut self, delta: i64) {
        *self.delta_histogram.entry(delta).or_insert(0) += 1;
    }
}

/// Thread-safe metrics collector shared between the solver's handlers and the
/// caller.
#[derive(Clone, Debug)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsState>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsState::new())),
        }
    }

    pub fn record_guess(&self, chunk_index: usize) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.guesses += 1;
        *guard.guesses_by_chunk.entry(chunk_index).or_insert(0) += 1;
    }

    pub fn record_submit_failure(&self) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.submit_failures += 1;
    }

    pub fn record_discarded(&self) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.discarded += 1;
    }

    pub fn record_delta(&self, delta: i64) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.bump_delta(delta);
    }

    /// `None` marks a callback that never arrived.
    pub fn record_anomaly(&self, delta: Option<i64>) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.anomalies += 1;
        match delta {
            Some(delta) => guard.bump_delta(delta),
            None => guard.timeouts += 1,
        }
    }

    pub fn record_chunk_solved(&self, chunk_index: usize, value: &str, solved_at: DateTime<Utc>) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        let guesses = guard
            .guesses_by_chunk
            .get(&chunk_index)
            .copied()
            .unwrap_or(0);
        guard.chunks.push(ChunkStats {
            chunk_index,
            value: value.to_string(),
            guesses,
            solved_at,
        });
    }

    pub fn record_finished(&self, solved: bool, at: DateTime<Utc>) {
        let mut guard = self.inner.lock().expect("metrics lock poisoned");
        guard.solved = Some(solved);
        guard.finished_at = Some(at);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let guard = self.inner.lock().expect("metrics lock poisoned");
        MetricsSnapshot {
            started_at: guard.started_at,
            finished_at: guard.finished_at,
            solved: guard.solved,
            guesses: guard.guesses,
            submit_failures: guard.submit_failures,
            discarded: guard.discarded,
            anomalies: guard.anomalies,
            timeouts: guard.timeouts,
            delta_histogram: guard.delta_histogram.clone(),
            chunks: guard.chunks.clone(),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}
