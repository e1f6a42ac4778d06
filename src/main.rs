//! duckbridge Binary Entry Point
//!
//! Runs SQL statements through the bridge and prints each result as JSON.
//! Core functionality is provided by the `duckbridge` library crate.

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use duckbridge::config::{BridgeConfig, parse_duration};
use duckbridge::{BridgeError, Completion, Database, EventLoop, Row};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// duckbridge - run SQL against DuckDB through the async bridge
#[derive(Parser, Debug)]
#[command(name = "duckbridge", version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, env = "DUCKBRIDGE_CONFIG")]
    config: Option<PathBuf>,

    /// Database file (overrides config file; in-memory when unset)
    #[arg(short, long, env = "DUCKBRIDGE_DATABASE")]
    database: Option<PathBuf>,

    /// Idle worker lifetime, e.g. `500ms` or `1m` (overrides config file)
    #[arg(long, env = "DUCKBRIDGE_THREAD_KEEP_ALIVE", value_parser = parse_duration)]
    thread_keep_alive: Option<Duration>,

    /// Dispatch every statement at once instead of one after another
    #[arg(long)]
    parallel: bool,

    /// SQL statements to run, in order
    #[arg(required = true)]
    statements: Vec<String>,
}

fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => BridgeConfig::load(path)?,
        None => BridgeConfig::default(),
    };

    // CLI/ENV > config file
    if let Some(database) = cli.database {
        config.database = Some(database);
    }
    if let Some(keep_alive) = cli.thread_keep_alive {
        config.dispatcher.thread_keep_alive = keep_alive;
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(
        worker_threads = config.dispatcher.worker_threads,
        database = ?config.database,
        "duckbridge starting"
    );

    let event_loop = EventLoop::new(&config.dispatcher)?;
    let db = event_loop.block_on(Database::create(
        &event_loop.dispatcher(),
        config.database.as_deref(),
    )?)?;

    let failures = event_loop.block_on(async {
        if cli.parallel {
            let pending: Vec<_> = cli.statements.iter().map(|sql| db.query(sql)).collect();
            let mut failures = 0;
            for (sql, completion) in cli.statements.iter().zip(pending) {
                failures += report(sql, settle(completion).await);
            }
            failures
        } else {
            let mut failures = 0;
            for sql in &cli.statements {
                failures += report(sql, settle(db.query(sql)).await);
            }
            failures
        }
    });

    db.close()?;

    if failures > 0 {
        tracing::warn!(failures, total = cli.statements.len(), "Some statements failed");
        return Ok(ExitCode::FAILURE);
    }
    Ok(ExitCode::SUCCESS)
}

async fn settle(
    dispatched: Result<Completion<Vec<Row>>, BridgeError>,
) -> Result<Vec<Row>, BridgeError> {
    dispatched?.await
}

/// Print one statement's outcome. Returns 1 on failure, 0 otherwise.
fn report(sql: &str, outcome: Result<Vec<Row>, BridgeError>) -> usize {
    match outcome {
        Ok(rows) => match serde_json::to_string_pretty(&rows) {
            Ok(json) => {
                println!("{json}");
                0
            }
            Err(e) => {
                tracing::error!(sql, error = %e, "Failed to render result");
                1
            }
        },
        Err(e) => {
            tracing::error!(sql, kind = %e.kind(), error = %e, "Statement failed");
            eprintln!("error: {e}");
            1
        }
    }
}
