//! Lending Vault Yield Provider
//!
//! Fetches supply APY and TVL per configured vault from a Kamino-style
//! vault metrics API, one request per vault fanned out concurrently.

use async_trait::async_trait;
use futures::future::join_all;
use serde::Deserialize;
use tracing::{debug, warn};

use super::OpportunityProvider;
use crate::config::{LendingProviderConfig, VaultConfig};
use crate::utils::types::{AppResult, OpportunityKind, YieldOpportunity};

#[derive(Debug, Deserialize)]
struct VaultMetricsResponse {
    apy: f64,
    #[serde(default)]
    tvl: f64,
}

pub struct LendingVaultProvider {
    api_url: String,
    protocol: String,
    vaults: Vec<VaultConfig>,
    client: reqwest::Client,
}

impl LendingVaultProvider {
    pub fn new(config: &LendingProviderConfig, client: reqwest::Client) -> Self {
        Self {
            api_url: config.api_url.clone(),
            protocol: config.protocol.clone(),
            vaults: config.vaults.clone(),
            client,
        }
    }

    async fn fetch_vault(&self, vault: &VaultConfig) -> AppResult<VaultMetricsResponse> {
        let url = format!("{}/kvaults/{}/metrics", self.api_url, vault.address);
        let response = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response)
    }

    fn to_opportunity(&self, vault: &VaultConfig, metrics: &VaultMetricsResponse) -> YieldOpportunity {
        YieldOpportunity {
            protocol: self.protocol.clone(),
            strategy: vault.name.clone(),
            asset: vault.asset.clone(),
            apy: metrics.apy,
            tvl_usd: metrics.tvl,
            risk_tier: vault.risk_tier,
            kind: OpportunityKind::Vault,
        }
    }
}

#[async_trait]
impl OpportunityProvider for LendingVaultProvider {
    fn name(&self) -> &str {
        "lending"
    }

    async fn fetch(&self) -> AppResult<Vec<YieldOpportunity>> {
        let results = join_all(self.vaults.iter().map(|vault| self.fetch_vault(vault))).await;

        let mut opportunities = Vec::new();
        for (vault, result) in self.vaults.iter().zip(results) {
            match result {
                Ok(metrics) => opportunities.push(self.to_opportunity(vault, &metrics)),
                Err(e) => {
                    warn!(vault = %vault.name, error = %e, "Vault metrics fetch failed, skipped");
                }
            }
        }

        if opportunities.is_empty() && !self.vaults.is_empty() {
            anyhow::bail!("all {} vault fetches failed", self.vaults.len());
        }
        debug!(count = opportunities.len(), "Vault opportunities fetched");
        Ok(opportunities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::types::RiskTier;

    #[test]
    fn test_metrics_payload_parses() {
        let payload = r#"{"apy":0.0934,"tvl":48211003.55,"tokensAvailable":"120040"}"#;
        let response: VaultMetricsResponse = serde_json::from_str(payload).unwrap();
        assert!((response.apy - 0.0934).abs() < 1e-12);
        assert!((response.tvl - 48_211_003.55).abs() < 1e-6);
    }

    #[test]
    fn test_missing_tvl_defaults_to_zero() {
        let payload = r#"{"apy":0.051}"#;
        let response: VaultMetricsResponse = serde_json::from_str(payload).unwrap();
        assert_eq!(response.tvl, 0.0);
    }

    #[test]
    fn test_to_opportunity_maps_vault_fields() {
        let config = LendingProviderConfig {
            api_url: "https://api.kamino.finance".into(),
            protocol: "Kamino".into(),
            vaults: vec![],
        };
        let provider = LendingVaultProvider::new(&config, reqwest::Client::new());
        let vault = VaultConfig {
            name: "USDC Main".into(),
            asset: "USDC".into(),
            address: "GJZhNhQ1dVL1VqR2DUWLczVmmUC7cQA6FcqLCbEt2Cm7".into(),
            risk_tier: RiskTier::Medium,
        };
        let metrics = VaultMetricsResponse {
            apy: 0.09,
            tvl: 1_000_000.0,
        };
        let opportunity = provider.to_opportunity(&vault, &metrics);
        assert_eq!(opportunity.protocol, "Kamino");
        assert_eq!(opportunity.strategy, "USDC Main");
        assert_eq!(opportunity.kind, OpportunityKind::Vault);
        assert_eq!(opportunity.risk_tier, RiskTier::Medium);
    }
}
