//! Common types used throughout the application

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Risk tier assigned to a yield opportunity by its provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RiskTier::Low => write!(f, "low"),
            RiskTier::Medium => write!(f, "medium"),
            RiskTier::High => write!(f, "high"),
        }
    }
}

/// Kind of yield-bearing venue
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpportunityKind {
    LiquidStaking,
    Vault,
    Other,
}

/// A single yield opportunity as reported by a provider for one scan.
///
/// Immutable once produced; a fresh list is generated every cycle. TVL and
/// price-derived fields may be best-effort placeholders when a provider is
/// degraded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct YieldOpportunity {
    pub protocol: String,
    pub strategy: String,
    pub asset: String,
    /// Annualized yield as a decimal fraction (0.08 = 8%)
    pub apy: f64,
    /// Total value locked in USD (0.0 when the provider could not report it)
    pub tvl_usd: f64,
    pub risk_tier: RiskTier,
    pub kind: OpportunityKind,
}

impl YieldOpportunity {
    /// Two opportunities refer to the same market when protocol, strategy
    /// and asset all match.
    pub fn same_market(&self, other: &YieldOpportunity) -> bool {
        self.protocol == other.protocol
            && self.strategy == other.strategy
            && self.asset == other.asset
    }
}

/// Coarse market-stress classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegimeClass {
    Normal,
    Elevated,
    Crisis,
}

impl RegimeClass {
    /// Ordering key: higher = more stressed
    pub fn severity(&self) -> u8 {
        match self {
            RegimeClass::Normal => 0,
            RegimeClass::Elevated => 1,
            RegimeClass::Crisis => 2,
        }
    }
}

impl fmt::Display for RegimeClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegimeClass::Normal => write!(f, "NORMAL"),
            RegimeClass::Elevated => write!(f, "ELEVATED"),
            RegimeClass::Crisis => write!(f, "CRISIS"),
        }
    }
}

/// Raw stress signals consumed by regime detection and the circuit breaker
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegimeSignals {
    /// Realized-volatility index on a VIX-like scale
    pub volatility_index: f64,
    /// Network throughput in transactions per second
    pub network_tps: f64,
    /// Worst LST price deviation from fair value, as a decimal fraction
    pub lst_spread: f64,
}

/// Market regime classification for one cycle. Never mutated after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketRegime {
    pub class: RegimeClass,
    pub signals: RegimeSignals,
    pub observed_at: DateTime<Utc>,
}

/// Regime-conditioned operating policy, derived by pure lookup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimePolicy {
    /// Maximum position holding duration in days
    pub max_hold_days: u32,
    /// Preferred protocols, most preferred first
    pub preferred_protocols: Vec<String>,
    /// Liquidity priority weight in [0, 1]
    pub liquidity_priority: f64,
    /// Minimum acceptable APY as a decimal fraction
    pub min_apy: f64,
}

/// Capital assigned to one opportunity by the allocator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Allocation {
    pub opportunity: YieldOpportunity,
    /// Capital amount in the same currency unit as the total capital input
    pub amount: f64,
    /// Annualized expected yield: amount × APY
    pub expected_yield: f64,
}

/// An active yield position tracked by the decision engine.
///
/// Entry APY is frozen at entry time; it is never refreshed from the market
/// before comparison against new opportunities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Position {
    pub id: Uuid,
    pub protocol: String,
    pub strategy: String,
    pub asset: String,
    pub amount: f64,
    pub entry_apy: f64,
    pub entered_at: DateTime<Utc>,
}

impl Position {
    /// Build a position from an allocation at the given cycle start time.
    pub fn from_allocation(allocation: &Allocation, entered_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            protocol: allocation.opportunity.protocol.clone(),
            strategy: allocation.opportunity.strategy.clone(),
            asset: allocation.opportunity.asset.clone(),
            amount: allocation.amount,
            entry_apy: allocation.opportunity.apy,
            entered_at,
        }
    }

    /// Whole days the position has been held as of `now`.
    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.entered_at).num_days()
    }
}

/// Daily operating costs and gross yield, supplied externally each cycle
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CostTracker {
    pub daily_api_cost: f64,
    pub daily_compute_cost: f64,
    pub daily_tx_cost: f64,
    pub daily_gross_yield: f64,
}

impl CostTracker {
    pub fn daily_costs(&self) -> f64 {
        self.daily_api_cost + self.daily_compute_cost + self.daily_tx_cost
    }
}

/// Annualized economics derived from a [`CostTracker`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct YieldEconomics {
    pub annual_gross: f64,
    pub annual_costs: f64,
    pub annual_net: f64,
    /// Capital required for the target APY to cover annual costs
    pub breakeven_capital: f64,
}

/// Action produced by one decision cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionAction {
    Enter,
    Rebalance,
    Hold,
}

impl fmt::Display for DecisionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecisionAction::Enter => write!(f, "ENTER"),
            DecisionAction::Rebalance => write!(f, "REBALANCE"),
            DecisionAction::Hold => write!(f, "HOLD"),
        }
    }
}

/// Audit record produced once per cycle, success or failure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: Uuid,
    /// Cycle start time; records are totally ordered by this field
    pub at: DateTime<Utc>,
    pub action: DecisionAction,
    pub reason: String,
    pub regime: Option<RegimeClass>,
    /// Top opportunities considered (empty for failure-path HOLDs)
    pub considered: Vec<YieldOpportunity>,
    /// Allocation vector backing an ENTER/REBALANCE (empty for HOLD)
    pub allocations: Vec<Allocation>,
}

impl DecisionRecord {
    pub fn hold(at: DateTime<Utc>, reason: String, regime: Option<RegimeClass>) -> Self {
        Self {
            id: Uuid::new_v4(),
            at,
            action: DecisionAction::Hold,
            reason,
            regime,
            considered: Vec::new(),
            allocations: Vec::new(),
        }
    }
}

/// Result contract reported by the external executor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    pub signature: Option<String>,
    pub error: Option<String>,
}

pub type AppResult<T> = anyhow::Result<T>;

#[cfg(test)]
mod tests {
    use super::*;

    fn opp(protocol: &str, strategy: &str, asset: &str) -> YieldOpportunity {
        YieldOpportunity {
            protocol: protocol.into(),
            strategy: strategy.into(),
            asset: asset.into(),
            apy: 0.08,
            tvl_usd: 1_000_000.0,
            risk_tier: RiskTier::Low,
            kind: OpportunityKind::LiquidStaking,
        }
    }

    #[test]
    fn test_same_market() {
        let a = opp("JitoSOL", "Liquid Staking", "SOL");
        let mut b = opp("JitoSOL", "Liquid Staking", "SOL");
        assert!(a.same_market(&b));

        b.asset = "mSOL".into();
        assert!(!a.same_market(&b));
    }

    #[test]
    fn test_regime_severity_ordering() {
        assert!(RegimeClass::Crisis.severity() > RegimeClass::Elevated.severity());
        assert!(RegimeClass::Elevated.severity() > RegimeClass::Normal.severity());
    }

    #[test]
    fn test_position_from_allocation() {
        let allocation = Allocation {
            opportunity: opp("Kamino", "USDC Vault", "USDC"),
            amount: 2500.0,
            expected_yield: 200.0,
        };
        let now = Utc::now();
        let position = Position::from_allocation(&allocation, now);
        assert_eq!(position.protocol, "Kamino");
        assert_eq!(position.entry_apy, 0.08);
        assert_eq!(position.entered_at, now);
        assert_eq!(position.age_days(now), 0);
    }
}
