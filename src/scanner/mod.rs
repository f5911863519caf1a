//! Opportunity Scanner
//!
//! Normalizes yield opportunities from all providers into one ranked list:
//! - Risk-tolerance-weighted scoring
//! - Raw-APY ranking for display
//! - Top-K proportional capital allocation

use tracing::debug;

use crate::config::{AgentConfig, RiskWeights};
use crate::utils::error::AgentError;
use crate::utils::types::{Allocation, YieldOpportunity};

/// An opportunity with its risk-weighted score attached
#[derive(Debug, Clone)]
pub struct ScoredOpportunity {
    pub opportunity: YieldOpportunity,
    pub score: f64,
}

/// Stateless scoring and allocation engine
#[derive(Debug, Clone)]
pub struct Scanner {
    weights: RiskWeights,
    top_k: usize,
}

impl Scanner {
    /// Resolve the weight table from the configured tolerance profile,
    /// preferring an explicit custom table when one is set.
    pub fn new(config: &AgentConfig) -> Self {
        let weights = config
            .custom_risk_weights
            .unwrap_or_else(|| config.risk_tolerance.weights());
        Self {
            weights,
            top_k: config.top_k,
        }
    }

    pub fn with_weights(weights: RiskWeights, top_k: usize) -> Self {
        Self { weights, top_k }
    }

    /// Score all opportunities and sort by score, highest first.
    ///
    /// The sort is stable: equal scores keep the input order, so allocation
    /// is deterministic across otherwise-identical inputs.
    pub fn score(&self, opportunities: &[YieldOpportunity]) -> Vec<ScoredOpportunity> {
        let mut scored: Vec<ScoredOpportunity> = opportunities
            .iter()
            .map(|opportunity| ScoredOpportunity {
                score: opportunity.apy * self.weights.weight(opportunity.risk_tier),
                opportunity: opportunity.clone(),
            })
            .collect();
        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }

    /// Display ranking by raw APY descending, independent of risk weighting.
    pub fn rank_by_apy(opportunities: &[YieldOpportunity]) -> Vec<YieldOpportunity> {
        let mut ranked = opportunities.to_vec();
        ranked.sort_by(|a, b| b.apy.total_cmp(&a.apy));
        ranked
    }

    /// Distribute `total_capital` across the top-K opportunities by score,
    /// proportionally to score.
    ///
    /// Opportunities with zero weighted score never receive capital. When
    /// nothing is eligible the allocator fails rather than divide by zero.
    pub fn allocate(
        &self,
        opportunities: &[YieldOpportunity],
        total_capital: f64,
    ) -> Result<Vec<Allocation>, AgentError> {
        let eligible: Vec<ScoredOpportunity> = self
            .score(opportunities)
            .into_iter()
            .filter(|scored| scored.score > 0.0)
            .take(self.top_k)
            .collect();

        if eligible.is_empty() {
            return Err(AgentError::InvalidAllocationInput(
                "no eligible opportunities".to_string(),
            ));
        }

        let score_sum: f64 = eligible.iter().map(|scored| scored.score).sum();
        let allocations = eligible
            .into_iter()
            .map(|scored| {
                let amount = (scored.score / score_sum) * total_capital;
                let expected_yield = amount * scored.opportunity.apy;
                debug!(
                    protocol = %scored.opportunity.protocol,
                    asset = %scored.opportunity.asset,
                    score = scored.score,
                    amount,
                    "Allocated"
                );
                Allocation {
                    opportunity: scored.opportunity,
                    amount,
                    expected_yield,
                }
            })
            .collect();

        Ok(allocations)
    }
}
