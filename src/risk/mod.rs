//! Risk Manager
//!
//! Classifies market regime, derives regime policy, sizes positions with a
//! discounted Kelly fraction, computes operating-cost economics, and
//! evaluates the circuit breaker.

use chrono::Utc;
use tracing::{debug, warn};

use crate::config::{AppConfig, BreakerConfig, PolicyConfig, RegimeConfig, SizingConfig};
use crate::utils::error::AgentError;
use crate::utils::types::{
    CostTracker, MarketRegime, RegimeClass, RegimePolicy, RegimeSignals, YieldEconomics,
};

const DAYS_PER_YEAR: f64 = 365.0;

/// Circuit-breaker evaluation result
#[derive(Debug, Clone)]
pub struct BreakerStatus {
    /// Trading must halt this cycle
    pub tripped: bool,
    /// Specific triggering conditions
    pub reasons: Vec<String>,
}

/// Stateless risk computations over per-cycle inputs
#[derive(Debug, Clone)]
pub struct RiskManager {
    regime: RegimeConfig,
    breaker: BreakerConfig,
    policy: PolicyConfig,
    sizing: SizingConfig,
}

impl RiskManager {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            regime: config.regime.clone(),
            breaker: config.breaker.clone(),
            policy: config.policy.clone(),
            sizing: config.sizing.clone(),
        }
    }

    /// Classify the current market regime from raw signals.
    ///
    /// Crisis conditions are evaluated first and take precedence over
    /// volatility-based elevation.
    pub fn detect_regime(&self, signals: RegimeSignals) -> MarketRegime {
        let class = if signals.network_tps < self.regime.crisis_tps_floor
            || signals.lst_spread > self.regime.crisis_spread_ceiling
            || signals.volatility_index >= self.regime.crisis_volatility
        {
            RegimeClass::Crisis
        } else if signals.volatility_index > self.regime.elevated_volatility {
            RegimeClass::Elevated
        } else {
            RegimeClass::Normal
        };

        if class != RegimeClass::Normal {
            warn!(
                %class,
                volatility = signals.volatility_index,
                tps = signals.network_tps,
                spread = signals.lst_spread,
                "Market regime degraded"
            );
        }

        MarketRegime {
            class,
            signals,
            observed_at: Utc::now(),
        }
    }

    /// Pure policy lookup per regime class.
    pub fn regime_policy(&self, class: RegimeClass) -> RegimePolicy {
        match class {
            RegimeClass::Normal => self.policy.normal.clone(),
            RegimeClass::Elevated => self.policy.elevated.clone(),
            RegimeClass::Crisis => self.policy.crisis.clone(),
        }
    }

    /// Kelly position sizing with the configured safety discount.
    ///
    /// f* = (p·b − q) / b with b = avg_win / avg_loss; the deployed fraction
    /// is max(0, f*) × kelly_multiplier.
    pub fn kelly_position(
        &self,
        win_rate: f64,
        avg_win: f64,
        avg_loss: f64,
        bankroll: f64,
    ) -> Result<f64, AgentError> {
        if avg_loss <= 0.0 {
            return Err(AgentError::InvalidAllocationInput(
                "invalid risk inputs: average loss must be positive".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&win_rate) {
            return Err(AgentError::InvalidAllocationInput(
                "invalid risk inputs: win rate must be within [0, 1]".to_string(),
            ));
        }

        let b = avg_win / avg_loss;
        let q = 1.0 - win_rate;
        let raw = (win_rate * b - q) / b;
        let used = raw.max(0.0) * self.sizing.kelly_multiplier;

        debug!(
            win_rate,
            payout_ratio = b,
            raw_kelly = raw,
            deployed_fraction = used,
            "Kelly sizing"
        );
        Ok(bankroll * used)
    }

    /// Annualized cost economics. Informational only; never gates actions.
    pub fn net_yield(&self, costs: &CostTracker) -> YieldEconomics {
        let annual_gross = costs.daily_gross_yield * DAYS_PER_YEAR;
        let annual_costs = costs.daily_costs() * DAYS_PER_YEAR;
        YieldEconomics {
            annual_gross,
            annual_costs,
            annual_net: annual_gross - annual_costs,
            breakeven_capital: annual_costs / self.sizing.target_apy,
        }
    }

    /// The sole gate that can force a HOLD regardless of opportunity quality.
    ///
    /// Three independent triggers combined with OR: network throughput below
    /// the floor, LST spread above the ceiling, or too many consecutive
    /// losses.
    pub fn should_halt(&self, regime: &MarketRegime, consecutive_losses: u32) -> BreakerStatus {
        let mut reasons = Vec::new();

        if regime.signals.network_tps < self.breaker.min_network_tps {
            reasons.push(format!(
                "network throughput {:.0} tps below floor {:.0}",
                regime.signals.network_tps, self.breaker.min_network_tps
            ));
        }
        if regime.signals.lst_spread > self.breaker.max_lst_spread {
            reasons.push(format!(
                "LST spread {:.2}% above ceiling {:.2}%",
                regime.signals.lst_spread * 100.0,
                self.breaker.max_lst_spread * 100.0
            ));
        }
        if consecutive_losses >= self.breaker.max_consecutive_losses {
            reasons.push(format!(
                "{} consecutive losses (limit {})",
                consecutive_losses, self.breaker.max_consecutive_losses
            ));
        }

        BreakerStatus {
            tripped: !reasons.is_empty(),
            reasons,
        }
    }
}
