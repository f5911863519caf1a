//! Moluscoyield Agent Library
//!
//! An autonomous yield allocation agent for Solana that:
//! - Scans liquid-staking tokens and lending vaults for yield opportunities
//! - Scores them against a configurable risk-tolerance profile
//! - Allocates capital across the top-ranked opportunities
//! - Gates every action behind market-regime detection and a circuit breaker

pub mod agent;
pub mod config;
pub mod execution;
pub mod feeds;
pub mod position;
pub mod risk;
pub mod scanner;
pub mod state;
pub mod telemetry;
pub mod utils;

// Re-export main types
pub use agent::{DecisionEngine, DecisionJournal};
pub use config::AppConfig;
pub use execution::{Executor, PaperExecutor};
pub use feeds::{OpportunityFeed, OpportunityProvider, SignalFeed, SignalProvider};
pub use position::PositionStore;
pub use risk::RiskManager;
pub use scanner::Scanner;
pub use state::SharedState;
pub use utils::error::AgentError;
