//! Yield Data Feeds Module
//!
//! Providers for yield opportunities and market risk signals:
//! - LST APYs from a liquid-staking aggregator API
//! - Lending vault APYs from a vault provider API
//! - Risk signals (volatility, network throughput, LST spread)
//!
//! Each cycle fans provider fetches out concurrently; a failing provider
//! falls back to its last good snapshot instead of failing the cycle.

pub mod lending;
pub mod lst;
pub mod signals;

pub use lending::LendingVaultProvider;
pub use lst::LstYieldProvider;
pub use signals::{NetworkSignalProvider, SignalFeed, SignalProvider};

use arc_swap::ArcSwap;
use async_trait::async_trait;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::ProvidersConfig;
use crate::utils::error::AgentError;
use crate::utils::types::{AppResult, YieldOpportunity};

/// A source of yield opportunities, queried once per cycle
#[async_trait]
pub trait OpportunityProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> AppResult<Vec<YieldOpportunity>>;
}

/// One cycle's merged opportunity scan
#[derive(Debug, Clone)]
pub struct OpportunitySet {
    pub opportunities: Vec<YieldOpportunity>,
    /// Providers that served cached data this cycle
    pub degraded_providers: Vec<String>,
}

struct CachedProvider {
    provider: Arc<dyn OpportunityProvider>,
    last_good: ArcSwap<Vec<YieldOpportunity>>,
}

/// Fans all opportunity providers out concurrently and merges the results
pub struct OpportunityFeed {
    providers: Vec<CachedProvider>,
}

impl OpportunityFeed {
    pub fn new(providers: Vec<Arc<dyn OpportunityProvider>>) -> Self {
        Self {
            providers: providers
                .into_iter()
                .map(|provider| CachedProvider {
                    provider,
                    last_good: ArcSwap::from_pointee(Vec::new()),
                })
                .collect(),
        }
    }

    pub fn from_config(config: &ProvidersConfig) -> AppResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()?;

        let providers: Vec<Arc<dyn OpportunityProvider>> = vec![
            Arc::new(LstYieldProvider::new(&config.lst, client.clone())),
            Arc::new(LendingVaultProvider::new(&config.lending, client)),
        ];
        Ok(Self::new(providers))
    }

    /// Fetch from every provider concurrently. The cycle proceeds only after
    /// all fetches have settled or fallen back to cached data.
    pub async fn fetch_all(&self) -> Result<OpportunitySet, AgentError> {
        let results = join_all(
            self.providers
                .iter()
                .map(|cached| cached.provider.fetch()),
        )
        .await;

        let mut opportunities = Vec::new();
        let mut degraded_providers = Vec::new();

        for (cached, result) in self.providers.iter().zip(results) {
            match result {
                Ok(fresh) if !fresh.is_empty() => {
                    cached.last_good.store(Arc::new(fresh.clone()));
                    opportunities.extend(fresh);
                }
                Ok(_) => {
                    warn!(provider = cached.provider.name(), "Provider returned no opportunities");
                    Self::fall_back(cached, &mut opportunities, &mut degraded_providers);
                }
                Err(e) => {
                    warn!(provider = cached.provider.name(), error = %e, "Provider fetch failed");
                    Self::fall_back(cached, &mut opportunities, &mut degraded_providers);
                }
            }
        }

        if opportunities.is_empty() {
            return Err(AgentError::DataUnavailable(
                "all opportunity providers failed and no cached data exists".to_string(),
            ));
        }

        if !degraded_providers.is_empty() {
            info!(providers = ?degraded_providers, "Serving cached opportunities");
        }
        Ok(OpportunitySet {
            opportunities,
            degraded_providers,
        })
    }

    fn fall_back(
        cached: &CachedProvider,
        opportunities: &mut Vec<YieldOpportunity>,
        degraded: &mut Vec<String>,
    ) {
        let snapshot = cached.last_good.load();
        if !snapshot.is_empty() {
            opportunities.extend(snapshot.iter().cloned());
            degraded.push(cached.provider.name().to_string());
        }
    }
}
