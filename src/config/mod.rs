//! Configuration module
//!
//! Handles loading and validation of the application configuration.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;
use url::Url;

use crate::utils::types::{RegimePolicy, RiskTier};

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub agent: AgentConfig,
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub regime: RegimeConfig,
    #[serde(default)]
    pub breaker: BreakerConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub sizing: SizingConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default = "default_true")]
    pub paper_trading: bool,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config = Self::from_yaml(&content)?;
        info!("Configuration loaded from {:?}", path);
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        let config: Self =
            serde_yaml::from_str(content).with_context(|| "Failed to parse config file")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.agent.check_interval_secs > 0,
            "check_interval_secs must be positive"
        );
        anyhow::ensure!(
            self.agent.total_capital > 0.0,
            "total_capital must be positive"
        );
        anyhow::ensure!(self.agent.top_k >= 1, "top_k must be at least 1");
        anyhow::ensure!(
            self.agent.rebalance_threshold > 0.0,
            "rebalance_threshold must be positive"
        );
        anyhow::ensure!(
            self.agent.min_yield_threshold >= 0.0,
            "min_yield_threshold must be non-negative"
        );
        if let Some(weights) = &self.agent.custom_risk_weights {
            anyhow::ensure!(
                weights.low >= 0.0 && weights.medium >= 0.0 && weights.high >= 0.0,
                "custom risk weights must be non-negative"
            );
        }
        anyhow::ensure!(
            self.sizing.kelly_multiplier > 0.0 && self.sizing.kelly_multiplier <= 1.0,
            "kelly_multiplier must be between 0 and 1"
        );
        anyhow::ensure!(self.sizing.target_apy > 0.0, "target_apy must be positive");
        anyhow::ensure!(
            self.regime.elevated_volatility < self.regime.crisis_volatility,
            "elevated_volatility must be below crisis_volatility"
        );
        anyhow::ensure!(
            self.breaker.min_network_tps > 0.0,
            "min_network_tps must be positive"
        );
        anyhow::ensure!(
            self.breaker.max_consecutive_losses >= 1,
            "max_consecutive_losses must be at least 1"
        );
        self.validate_policy_ordering()?;

        for endpoint in [
            &self.providers.rpc_url,
            &self.providers.lst.api_url,
            &self.providers.lending.api_url,
            &self.providers.signals.sol_price_url,
        ] {
            Url::parse(endpoint).with_context(|| format!("Invalid endpoint URL: {}", endpoint))?;
        }
        Ok(())
    }

    /// Higher-severity regimes must raise liquidity priority and the yield
    /// floor, and shorten the maximum holding duration.
    fn validate_policy_ordering(&self) -> Result<()> {
        let tiers = [
            ("normal", &self.policy.normal),
            ("elevated", &self.policy.elevated),
            ("crisis", &self.policy.crisis),
        ];
        for (name, policy) in &tiers {
            anyhow::ensure!(
                (0.0..=1.0).contains(&policy.liquidity_priority),
                "{} liquidity_priority must be in [0, 1]",
                name
            );
        }
        for window in tiers.windows(2) {
            let (lower_name, lower) = &window[0];
            let (upper_name, upper) = &window[1];
            anyhow::ensure!(
                upper.liquidity_priority >= lower.liquidity_priority,
                "{} liquidity_priority must not be below {}",
                upper_name,
                lower_name
            );
            anyhow::ensure!(
                upper.min_apy >= lower.min_apy,
                "{} min_apy must not be below {}",
                upper_name,
                lower_name
            );
            anyhow::ensure!(
                upper.max_hold_days <= lower.max_hold_days,
                "{} max_hold_days must not exceed {}",
                upper_name,
                lower_name
            );
        }
        Ok(())
    }

    /// Create a default config for testing
    #[cfg(test)]
    pub fn default_for_test() -> Self {
        Self {
            agent: AgentConfig {
                check_interval_secs: 300,
                total_capital: 10_000.0,
                top_k: 3,
                rebalance_threshold: 0.02,
                min_yield_threshold: 0.03,
                max_slippage_bps: 50,
                risk_tolerance: RiskTolerance::Moderate,
                custom_risk_weights: None,
            },
            providers: ProvidersConfig {
                rpc_url: "https://api.mainnet-beta.solana.com".to_string(),
                request_timeout_ms: 10_000,
                lst: LstProviderConfig {
                    api_url: "https://extra-api.sanctum.so".to_string(),
                    assets: vec![
                        LstAssetConfig {
                            symbol: "jitoSOL".to_string(),
                            protocol: "Jito".to_string(),
                            risk_tier: RiskTier::Low,
                        },
                        LstAssetConfig {
                            symbol: "mSOL".to_string(),
                            protocol: "Marinade".to_string(),
                            risk_tier: RiskTier::Low,
                        },
                    ],
                },
                lending: LendingProviderConfig {
                    api_url: "https://api.kamino.finance".to_string(),
                    protocol: "Kamino".to_string(),
                    vaults: vec![VaultConfig {
                        name: "USDC Main".to_string(),
                        asset: "USDC".to_string(),
                        address: "GJZhNhQ1dVL1VqR2DUWLczVmmUC7cQA6FcqLCbEt2Cm7".to_string(),
                        risk_tier: RiskTier::Medium,
                    }],
                },
                signals: SignalsConfig {
                    sol_price_url: "https://price.jup.ag/v6/price?ids=SOL".to_string(),
                    volatility_window: 24,
                },
            },
            regime: RegimeConfig::default(),
            breaker: BreakerConfig::default(),
            policy: PolicyConfig::default(),
            sizing: SizingConfig::default(),
            telemetry: TelemetryConfig::default(),
            paper_trading: true,
        }
    }
}

fn default_true() -> bool {
    true
}

/// Decision-loop configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Seconds between decision cycles
    pub check_interval_secs: u64,
    /// Total capital distributed by the allocator, in USD
    pub total_capital: f64,
    /// Number of top-scored opportunities receiving capital
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    /// APY improvement over the entry APY that triggers a rebalance
    #[serde(default = "default_rebalance_threshold")]
    pub rebalance_threshold: f64,
    /// Global APY floor for entering any position
    #[serde(default = "default_min_yield")]
    pub min_yield_threshold: f64,
    /// Slippage tolerance passed through to the executor, in basis points
    #[serde(default = "default_max_slippage_bps")]
    pub max_slippage_bps: u32,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// Overrides the named tolerance profile when set
    #[serde(default)]
    pub custom_risk_weights: Option<RiskWeights>,
}

fn default_top_k() -> usize {
    3
}
fn default_rebalance_threshold() -> f64 {
    0.02
}
fn default_min_yield() -> f64 {
    0.03
}
fn default_max_slippage_bps() -> u32 {
    50
}

/// Named risk-tolerance profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

/// Multiplicative score weight per risk tier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskWeights {
    pub low: f64,
    pub medium: f64,
    pub high: f64,
}

impl RiskWeights {
    pub fn conservative() -> Self {
        Self {
            low: 1.0,
            medium: 0.3,
            high: 0.0,
        }
    }

    pub fn moderate() -> Self {
        Self {
            low: 0.6,
            medium: 1.0,
            high: 0.3,
        }
    }

    pub fn aggressive() -> Self {
        Self {
            low: 0.3,
            medium: 0.7,
            high: 1.0,
        }
    }

    pub fn weight(&self, tier: RiskTier) -> f64 {
        match tier {
            RiskTier::Low => self.low,
            RiskTier::Medium => self.medium,
            RiskTier::High => self.high,
        }
    }
}

impl RiskTolerance {
    pub fn weights(&self) -> RiskWeights {
        match self {
            RiskTolerance::Conservative => RiskWeights::conservative(),
            RiskTolerance::Moderate => RiskWeights::moderate(),
            RiskTolerance::Aggressive => RiskWeights::aggressive(),
        }
    }
}

/// Regime classification thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegimeConfig {
    /// Volatility index above which the regime is at least elevated
    #[serde(default = "default_elevated_volatility")]
    pub elevated_volatility: f64,
    /// Volatility index at or above which the regime is crisis
    #[serde(default = "default_crisis_volatility")]
    pub crisis_volatility: f64,
    /// Network throughput below which the regime is crisis
    #[serde(default = "default_tps_floor")]
    pub crisis_tps_floor: f64,
    /// LST spread above which the regime is crisis
    #[serde(default = "default_spread_ceiling")]
    pub crisis_spread_ceiling: f64,
}

fn default_elevated_volatility() -> f64 {
    30.0
}
fn default_crisis_volatility() -> f64 {
    40.0
}
fn default_tps_floor() -> f64 {
    500.0
}
fn default_spread_ceiling() -> f64 {
    0.05
}

impl Default for RegimeConfig {
    fn default() -> Self {
        Self {
            elevated_volatility: default_elevated_volatility(),
            crisis_volatility: default_crisis_volatility(),
            crisis_tps_floor: default_tps_floor(),
            crisis_spread_ceiling: default_spread_ceiling(),
        }
    }
}

/// Circuit-breaker thresholds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerConfig {
    #[serde(default = "default_tps_floor")]
    pub min_network_tps: f64,
    #[serde(default = "default_spread_ceiling")]
    pub max_lst_spread: f64,
    #[serde(default = "default_max_losses")]
    pub max_consecutive_losses: u32,
}

fn default_max_losses() -> u32 {
    3
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            min_network_tps: default_tps_floor(),
            max_lst_spread: default_spread_ceiling(),
            max_consecutive_losses: default_max_losses(),
        }
    }
}

/// Regime policy lookup table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    pub normal: RegimePolicy,
    pub elevated: RegimePolicy,
    pub crisis: RegimePolicy,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            normal: RegimePolicy {
                max_hold_days: 30,
                preferred_protocols: vec![
                    "Marinade".to_string(),
                    "Jito".to_string(),
                    "Kamino".to_string(),
                ],
                liquidity_priority: 0.3,
                min_apy: 0.04,
            },
            elevated: RegimePolicy {
                max_hold_days: 14,
                preferred_protocols: vec!["Jito".to_string(), "Marinade".to_string()],
                liquidity_priority: 0.6,
                min_apy: 0.055,
            },
            crisis: RegimePolicy {
                max_hold_days: 3,
                preferred_protocols: vec!["Jito".to_string()],
                liquidity_priority: 0.9,
                min_apy: 0.08,
            },
        }
    }
}

/// Position sizing and economics constants
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizingConfig {
    /// Fraction of the raw Kelly fraction actually deployed (0.5 = half-Kelly)
    #[serde(default = "default_kelly_multiplier")]
    pub kelly_multiplier: f64,
    /// Target APY used for breakeven-capital computation
    #[serde(default = "default_target_apy")]
    pub target_apy: f64,
}

fn default_kelly_multiplier() -> f64 {
    0.5
}
fn default_target_apy() -> f64 {
    0.08
}

impl Default for SizingConfig {
    fn default() -> Self {
        Self {
            kelly_multiplier: default_kelly_multiplier(),
            target_apy: default_target_apy(),
        }
    }
}

/// Data source endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvidersConfig {
    pub rpc_url: String,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
    pub lst: LstProviderConfig,
    pub lending: LendingProviderConfig,
    pub signals: SignalsConfig,
}

fn default_request_timeout() -> u64 {
    10_000
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstProviderConfig {
    pub api_url: String,
    pub assets: Vec<LstAssetConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LstAssetConfig {
    pub symbol: String,
    pub protocol: String,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LendingProviderConfig {
    pub api_url: String,
    #[serde(default = "default_lending_protocol")]
    pub protocol: String,
    pub vaults: Vec<VaultConfig>,
}

fn default_lending_protocol() -> String {
    "Kamino".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VaultConfig {
    pub name: String,
    pub asset: String,
    pub address: String,
    pub risk_tier: RiskTier,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalsConfig {
    /// Endpoint returning the current SOL price, used for realized volatility
    pub sol_price_url: String,
    /// Number of price samples in the rolling volatility window
    #[serde(default = "default_volatility_window")]
    pub volatility_window: usize,
}

fn default_volatility_window() -> usize {
    24
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
    #[serde(default = "default_true")]
    pub enable_metrics: bool,
    /// JSONL sink for the decision journal; in-memory only when unset
    #[serde(default)]
    pub journal_path: Option<String>,
}

fn default_log_level() -> String {
    "info".to_string()
}
fn default_metrics_port() -> u16 {
    9184
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logs: false,
            metrics_port: default_metrics_port(),
            enable_metrics: true,
            journal_path: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = AppConfig::default_for_test();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_profile_weights() {
        let conservative = RiskTolerance::Conservative.weights();
        assert_eq!(conservative.weight(RiskTier::Low), 1.0);
        assert_eq!(conservative.weight(RiskTier::High), 0.0);

        let aggressive = RiskTolerance::Aggressive.weights();
        assert_eq!(aggressive.weight(RiskTier::High), 1.0);
    }

    #[test]
    fn test_rejects_inverted_volatility_thresholds() {
        let mut config = AppConfig::default_for_test();
        config.regime.elevated_volatility = 50.0;
        config.regime.crisis_volatility = 40.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_non_monotonic_policy() {
        let mut config = AppConfig::default_for_test();
        config.policy.crisis.min_apy = 0.01;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default_for_test();
        config.policy.crisis.max_hold_days = 60;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_bad_endpoint() {
        let mut config = AppConfig::default_for_test();
        config.providers.rpc_url = "not a url".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_top_k() {
        let mut config = AppConfig::default_for_test();
        config.agent.top_k = 0;
        assert!(config.validate().is_err());
    }
}
