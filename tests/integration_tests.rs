//! Integration Tests for the Moluscoyield Agent
//!
//! Exercises the complete decision flow from configuration to journaled
//! decision records, with stubbed data sources in place of live APIs.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use moluscoyield::agent::{DecisionEngine, DecisionJournal};
use moluscoyield::config::AppConfig;
use moluscoyield::execution::PaperExecutor;
use moluscoyield::feeds::{OpportunityFeed, OpportunityProvider, SignalFeed, SignalProvider};
use moluscoyield::position::PositionStore;
use moluscoyield::state::SharedState;
use moluscoyield::utils::types::{
    AppResult, DecisionAction, OpportunityKind, RegimeSignals, RiskTier, YieldOpportunity,
};

const CONFIG_YAML: &str = r#"
paper_trading: true

agent:
  check_interval_secs: 300
  total_capital: 10000.0
  top_k: 3
  rebalance_threshold: 0.02
  min_yield_threshold: 0.03
  max_slippage_bps: 50
  risk_tolerance: moderate

providers:
  rpc_url: "https://api.mainnet-beta.solana.com"
  request_timeout_ms: 10000
  lst:
    api_url: "https://extra-api.sanctum.so"
    assets:
      - symbol: "jitoSOL"
        protocol: "Jito"
        risk_tier: low
      - symbol: "mSOL"
        protocol: "Marinade"
        risk_tier: low
  lending:
    api_url: "https://api.kamino.finance"
    protocol: "Kamino"
    vaults:
      - name: "USDC Main"
        asset: "USDC"
        address: "GJZhNhQ1dVL1VqR2DUWLczVmmUC7cQA6FcqLCbEt2Cm7"
        risk_tier: medium
  signals:
    sol_price_url: "https://price.jup.ag/v6/price?ids=SOL"
    volatility_window: 24

breaker:
  min_network_tps: 500.0
  max_lst_spread: 0.05
  max_consecutive_losses: 3

sizing:
  kelly_multiplier: 0.5
  target_apy: 0.08

telemetry:
  log_level: "info"
  enable_metrics: false
"#;

struct ScriptedOpportunities {
    scans: Mutex<Vec<Vec<YieldOpportunity>>>,
}

#[async_trait]
impl OpportunityProvider for ScriptedOpportunities {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch(&self) -> AppResult<Vec<YieldOpportunity>> {
        let mut scans = self.scans.lock();
        if scans.len() > 1 {
            Ok(scans.remove(0))
        } else {
            Ok(scans[0].clone())
        }
    }
}

struct StaticSignals(RegimeSignals);

#[async_trait]
impl SignalProvider for StaticSignals {
    fn name(&self) -> &str {
        "static"
    }

    async fn fetch(&self) -> AppResult<RegimeSignals> {
        Ok(self.0)
    }
}

fn opportunity(protocol: &str, asset: &str, apy: f64, tier: RiskTier) -> YieldOpportunity {
    YieldOpportunity {
        protocol: protocol.into(),
        strategy: "Liquid Staking".into(),
        asset: asset.into(),
        apy,
        tvl_usd: 8_000_000.0,
        risk_tier: tier,
        kind: OpportunityKind::LiquidStaking,
    }
}

fn healthy_signals() -> RegimeSignals {
    RegimeSignals {
        volatility_index: 14.0,
        network_tps: 2800.0,
        lst_spread: 0.008,
    }
}

fn build_engine(
    scans: Vec<Vec<YieldOpportunity>>,
    signals: RegimeSignals,
) -> DecisionEngine {
    let config = Arc::new(AppConfig::from_yaml(CONFIG_YAML).unwrap());
    DecisionEngine::new(
        config,
        Arc::new(SharedState::new()),
        Arc::new(OpportunityFeed::new(vec![Arc::new(ScriptedOpportunities {
            scans: Mutex::new(scans),
        })])),
        Arc::new(SignalFeed::new(Arc::new(StaticSignals(signals)))),
        Arc::new(PaperExecutor),
        Arc::new(PositionStore::new()),
        Arc::new(DecisionJournal::new()),
    )
}

#[test]
fn test_config_parses_and_validates() {
    let config = AppConfig::from_yaml(CONFIG_YAML).unwrap();
    assert_eq!(config.agent.top_k, 3);
    assert_eq!(config.agent.rebalance_threshold, 0.02);
    assert_eq!(config.breaker.max_consecutive_losses, 3);
    assert_eq!(config.providers.lst.assets.len(), 2);
    // defaulted sections
    assert_eq!(config.regime.crisis_tps_floor, 500.0);
    assert_eq!(config.policy.crisis.max_hold_days, 3);
}

#[test]
fn test_config_rejects_bad_values() {
    let broken = CONFIG_YAML.replace("top_k: 3", "top_k: 0");
    assert!(AppConfig::from_yaml(&broken).is_err());

    let broken = CONFIG_YAML.replace("total_capital: 10000.0", "total_capital: -5.0");
    assert!(AppConfig::from_yaml(&broken).is_err());
}

#[tokio::test]
async fn test_enter_then_hold_then_rebalance() {
    let engine = build_engine(
        vec![
            // cycle 1: enter the best opportunity
            vec![
                opportunity("Jito", "jitoSOL", 0.06, RiskTier::Low),
                opportunity("Marinade", "mSOL", 0.055, RiskTier::Low),
            ],
            // cycle 2: nothing better by more than the threshold
            vec![
                opportunity("Jito", "jitoSOL", 0.062, RiskTier::Low),
                opportunity("Marinade", "mSOL", 0.07, RiskTier::Low),
            ],
            // cycle 3: 0.085 - 0.06 = 0.025 > 0.02 triggers the rotation
            vec![
                opportunity("Jito", "jitoSOL", 0.058, RiskTier::Low),
                opportunity("Marinade", "mSOL", 0.085, RiskTier::Low),
            ],
        ],
        healthy_signals(),
    );

    let first = engine.run_cycle().await;
    assert_eq!(first.action, DecisionAction::Enter);
    assert_eq!(engine.positions().active().unwrap().entry_apy, 0.06);

    let second = engine.run_cycle().await;
    assert_eq!(second.action, DecisionAction::Hold);
    assert_eq!(engine.positions().active().unwrap().protocol, "Jito");

    let third = engine.run_cycle().await;
    assert_eq!(third.action, DecisionAction::Rebalance);
    let rotated = engine.positions().active().unwrap();
    assert_eq!(rotated.protocol, "Marinade");
    assert_eq!(rotated.entry_apy, 0.085);

    // one record per cycle, ordered by cycle start
    let records = engine.journal().snapshot();
    assert_eq!(records.len(), 3);
    for pair in records.windows(2) {
        assert!(pair[0].at <= pair[1].at);
    }
}

#[tokio::test]
async fn test_crisis_signals_halt_everything() {
    let engine = build_engine(
        vec![vec![opportunity("Jito", "jitoSOL", 0.30, RiskTier::Low)]],
        RegimeSignals {
            volatility_index: 12.0,
            network_tps: 120.0,
            lst_spread: 0.09,
        },
    );

    for _ in 0..3 {
        let record = engine.run_cycle().await;
        assert_eq!(record.action, DecisionAction::Hold);
        assert!(record.reason.contains("circuit breaker"));
    }
    assert!(engine.positions().active().is_none());
}

#[tokio::test]
async fn test_allocation_vector_recorded_on_enter() {
    let engine = build_engine(
        vec![vec![
            opportunity("Jito", "jitoSOL", 0.08, RiskTier::Low),
            opportunity("Marinade", "mSOL", 0.07, RiskTier::Low),
            opportunity("Kamino", "USDC", 0.09, RiskTier::Medium),
            opportunity("Degen", "WIF", 0.45, RiskTier::High),
        ]],
        healthy_signals(),
    );

    let record = engine.run_cycle().await;
    assert_eq!(record.action, DecisionAction::Enter);
    assert_eq!(record.allocations.len(), 3);

    let total: f64 = record.allocations.iter().map(|a| a.amount).sum();
    assert!((total - 10_000.0).abs() < 1e-6);
    // allocation follows weighted score, not raw APY
    for allocation in &record.allocations {
        assert!(allocation.amount > 0.0);
    }
}

#[tokio::test]
async fn test_identical_scans_allocate_identically() {
    let scan = vec![
        opportunity("Jito", "jitoSOL", 0.08, RiskTier::Low),
        opportunity("Marinade", "mSOL", 0.08, RiskTier::Low),
        opportunity("Kamino", "USDC", 0.06, RiskTier::Medium),
    ];

    let first_engine = build_engine(vec![scan.clone()], healthy_signals());
    let second_engine = build_engine(vec![scan], healthy_signals());

    let first = first_engine.run_cycle().await;
    let second = second_engine.run_cycle().await;

    assert_eq!(first.allocations.len(), second.allocations.len());
    for (a, b) in first.allocations.iter().zip(second.allocations.iter()) {
        assert!(a.opportunity.same_market(&b.opportunity));
        assert_eq!(a.amount, b.amount);
    }
}
