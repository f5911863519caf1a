//! Moluscoyield Agent
//!
//! An autonomous yield allocation agent for Solana that:
//! - Scans LST and lending-vault yields every cycle
//! - Scores opportunities against the configured risk tolerance
//! - Allocates capital across the top-ranked opportunities
//! - Holds, enters or rebalances a single tracked position per cycle

use anyhow::Result;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing::{error, info, warn};

mod agent;
mod config;
mod execution;
mod feeds;
mod position;
mod risk;
mod scanner;
mod state;
mod telemetry;
mod utils;

use agent::{DecisionEngine, DecisionJournal};
use config::AppConfig;
use execution::{Executor, PaperExecutor};
use feeds::{NetworkSignalProvider, OpportunityFeed, SignalFeed};
use position::PositionStore;
use state::SharedState;
use telemetry::{init_logging, init_metrics};

/// Moluscoyield Agent - autonomous yield allocation on Solana
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Enable paper trading mode (no real transactions)
    #[arg(long)]
    paper: bool,

    /// Run a single decision cycle and exit
    #[arg(long)]
    once: bool,

    /// Override log level
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = AppConfig::load(&args.config)?;
    if args.paper {
        config.paper_trading = true;
    }
    if let Some(level) = args.log_level {
        config.telemetry.log_level = level;
    }

    init_logging(&config.telemetry)?;

    info!("Starting Moluscoyield Agent v{}", env!("CARGO_PKG_VERSION"));
    info!("Paper trading: {}", config.paper_trading);

    if config.telemetry.enable_metrics {
        init_metrics(config.telemetry.metrics_port)?;
    }

    let engine = Arc::new(build_engine(Arc::new(config))?);

    if args.once {
        let record = engine.run_cycle().await;
        info!(action = %record.action, reason = %record.reason, "Single cycle complete");
        return Ok(());
    }

    let runner = engine.clone();
    let handle = tokio::spawn(async move { runner.run().await });

    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Shutdown signal received, stopping at next cycle boundary...");
        }
        Err(err) => {
            error!("Error listening for shutdown signal: {}", err);
        }
    }

    engine.stop().await;
    let _ = handle.await;
    info!("Moluscoyield Agent stopped");
    Ok(())
}

fn build_engine(config: Arc<AppConfig>) -> Result<DecisionEngine> {
    let state = Arc::new(SharedState::new());

    let opportunities = Arc::new(OpportunityFeed::from_config(&config.providers)?);

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(config.providers.request_timeout_ms))
        .build()?;
    let signals = Arc::new(SignalFeed::new(Arc::new(NetworkSignalProvider::new(
        &config.providers,
        client,
    ))));

    // Live execution plugs in behind the Executor trait; the core itself
    // never holds key material.
    let executor: Arc<dyn Executor> = if config.paper_trading {
        Arc::new(PaperExecutor)
    } else {
        warn!("No live executor configured, falling back to paper execution");
        Arc::new(PaperExecutor)
    };

    let journal = match &config.telemetry.journal_path {
        Some(path) => Arc::new(DecisionJournal::with_sink(Path::new(path))?),
        None => Arc::new(DecisionJournal::new()),
    };

    Ok(DecisionEngine::new(
        config,
        state,
        opportunities,
        signals,
        executor,
        Arc::new(PositionStore::new()),
        journal,
    ))
}
