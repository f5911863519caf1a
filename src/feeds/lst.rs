//! Liquid-Staking Token Yield Provider
//!
//! Fetches epoch APYs and TVL for the configured LSTs from a Sanctum-style
//! aggregator API. TVL is best-effort: when the endpoint is unavailable the
//! opportunities carry a zero placeholder rather than failing the scan.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

use super::OpportunityProvider;
use crate::config::{LstAssetConfig, LstProviderConfig};
use crate::utils::types::{AppResult, OpportunityKind, YieldOpportunity};

const STRATEGY_LABEL: &str = "Liquid Staking";

#[derive(Debug, Deserialize)]
struct ApyResponse {
    apys: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct TvlResponse {
    tvls: HashMap<String, f64>,
}

pub struct LstYieldProvider {
    api_url: String,
    assets: Vec<LstAssetConfig>,
    client: reqwest::Client,
}

impl LstYieldProvider {
    pub fn new(config: &LstProviderConfig, client: reqwest::Client) -> Self {
        Self {
            api_url: config.api_url.clone(),
            assets: config.assets.clone(),
            client,
        }
    }

    fn lst_query(&self) -> String {
        self.assets
            .iter()
            .map(|asset| format!("lst={}", asset.symbol))
            .collect::<Vec<_>>()
            .join("&")
    }

    async fn fetch_apys(&self) -> AppResult<HashMap<String, f64>> {
        let url = format!("{}/v1/apy/latest?{}", self.api_url, self.lst_query());
        let response: ApyResponse = self
            .client
            .get(&url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(response.apys)
    }

    async fn fetch_tvls(&self) -> HashMap<String, f64> {
        let url = format!("{}/v1/tvl/latest?{}", self.api_url, self.lst_query());
        let result: AppResult<TvlResponse> = async {
            Ok(self
                .client
                .get(&url)
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?)
        }
        .await;

        match result {
            Ok(response) => response.tvls,
            Err(e) => {
                warn!(error = %e, "LST TVL unavailable, using placeholders");
                HashMap::new()
            }
        }
    }

    fn build_opportunities(
        assets: &[LstAssetConfig],
        apys: &HashMap<String, f64>,
        tvls: &HashMap<String, f64>,
    ) -> Vec<YieldOpportunity> {
        assets
            .iter()
            .filter_map(|asset| match apys.get(&asset.symbol) {
                Some(&apy) => Some(YieldOpportunity {
                    protocol: asset.protocol.clone(),
                    strategy: STRATEGY_LABEL.to_string(),
                    asset: asset.symbol.clone(),
                    apy,
                    tvl_usd: tvls.get(&asset.symbol).copied().unwrap_or(0.0),
                    risk_tier: asset.risk_tier,
                    kind: OpportunityKind::LiquidStaking,
                }),
                None => {
                    warn!(symbol = %asset.symbol, "LST missing from APY response, skipped");
                    None
                }
            })
            .collect()
    }
}

#[async_trait]
impl OpportunityProvider for LstYieldProvider {
    fn name(&self) -> &str {
        "lst"
    }

    async fn fetch(&self) -> AppResult<Vec<YieldOpportunity>> {
        let apys = self.fetch_apys().await?;
        let tvls = self.fetch_tvls().await;
        let opportunities = Self::build_opportunities(&self.assets, &apys, &tvls);
        debug!(count = opportunities.len(), "LST opportunities fetched");
        Ok(opportunities)
    }
}
