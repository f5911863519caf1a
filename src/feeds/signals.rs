//! Risk Signal Provider
//!
//! Assembles the three regime inputs each cycle:
//! - network throughput from recent RPC performance samples
//! - worst LST price deviation from fair value
//! - realized SOL volatility over a rolling price window
//!
//! The three sub-fetches run concurrently; the signal set is only produced
//! once all have settled.

use arc_swap::ArcSwapOption;
use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Deserialize;
use solana_client::nonblocking::rpc_client::RpcClient;
use solana_sdk::commitment_config::CommitmentConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::config::ProvidersConfig;
use crate::utils::error::AgentError;
use crate::utils::types::{AppResult, RegimeSignals};

/// Hours per year, for annualizing hourly-sampled volatility
const ANNUALIZATION_HOURS: f64 = 8760.0;
const PERF_SAMPLE_LIMIT: usize = 5;

/// A source of raw regime signals, queried once per cycle
#[async_trait]
pub trait SignalProvider: Send + Sync {
    fn name(&self) -> &str;
    async fn fetch(&self) -> AppResult<RegimeSignals>;
}

#[derive(Debug, Deserialize)]
struct SolPriceEntry {
    price: f64,
}

#[derive(Debug, Deserialize)]
struct SolPriceResponse {
    data: HashMap<String, SolPriceEntry>,
}

#[derive(Debug, Deserialize)]
struct LstPriceResponse {
    prices: HashMap<String, f64>,
}

#[derive(Debug, Deserialize)]
struct SolValueResponse {
    #[serde(rename = "solValues")]
    sol_values: HashMap<String, f64>,
}

pub struct NetworkSignalProvider {
    rpc: RpcClient,
    client: reqwest::Client,
    sol_price_url: String,
    lst_api_url: String,
    lst_symbols: Vec<String>,
    price_window: Mutex<VecDeque<f64>>,
    window: usize,
}

impl NetworkSignalProvider {
    pub fn new(config: &ProvidersConfig, client: reqwest::Client) -> Self {
        Self {
            rpc: RpcClient::new_with_commitment(
                config.rpc_url.clone(),
                CommitmentConfig::confirmed(),
            ),
            client,
            sol_price_url: config.signals.sol_price_url.clone(),
            lst_api_url: config.lst.api_url.clone(),
            lst_symbols: config
                .lst
                .assets
                .iter()
                .map(|asset| asset.symbol.clone())
                .collect(),
            price_window: Mutex::new(VecDeque::new()),
            window: config.signals.volatility_window,
        }
    }

    async fn fetch_tps(&self) -> AppResult<f64> {
        let samples = self
            .rpc
            .get_recent_performance_samples(Some(PERF_SAMPLE_LIMIT))
            .await?;
        if samples.is_empty() {
            anyhow::bail!("no performance samples returned");
        }
        let total: f64 = samples
            .iter()
            .filter(|sample| sample.sample_period_secs > 0)
            .map(|sample| sample.num_transactions as f64 / sample.sample_period_secs as f64)
            .sum();
        Ok(total / samples.len() as f64)
    }

    async fn fetch_spread(&self) -> AppResult<f64> {
        let query = self
            .lst_symbols
            .iter()
            .map(|symbol| format!("lst={}", symbol))
            .collect::<Vec<_>>()
            .join("&");

        let price_url = format!("{}/v1/price/latest?{}", self.lst_api_url, query);
        let value_url = format!("{}/v1/sol-value/current?{}", self.lst_api_url, query);

        let (prices, values) = tokio::try_join!(
            self.get_json::<LstPriceResponse>(&price_url),
            self.get_json::<SolValueResponse>(&value_url),
        )?;

        worst_spread(&prices.prices, &values.sol_values)
            .ok_or_else(|| anyhow::anyhow!("no overlapping LST price/value quotes"))
    }

    async fn fetch_sol_price(&self) -> AppResult<f64> {
        let response: SolPriceResponse = self.get_json(&self.sol_price_url).await?;
        response
            .data
            .values()
            .next()
            .map(|entry| entry.price)
            .ok_or_else(|| anyhow::anyhow!("SOL price missing from response"))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> AppResult<T> {
        Ok(self
            .client
            .get(url)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?)
    }

    /// Push the latest price into the rolling window and return the
    /// annualized realized-volatility index.
    fn record_price(&self, price: f64) -> f64 {
        let mut window = self.price_window.lock();
        window.push_back(price);
        while window.len() > self.window {
            window.pop_front();
        }
        volatility_index(&window)
    }
}

#[async_trait]
impl SignalProvider for NetworkSignalProvider {
    fn name(&self) -> &str {
        "network"
    }

    async fn fetch(&self) -> AppResult<RegimeSignals> {
        let (tps, spread, price) =
            tokio::join!(self.fetch_tps(), self.fetch_spread(), self.fetch_sol_price());
        let network_tps = tps?;
        let lst_spread = spread?;
        let volatility_index = self.record_price(price?);

        debug!(volatility_index, network_tps, lst_spread, "Signals fetched");
        Ok(RegimeSignals {
            volatility_index,
            network_tps,
            lst_spread,
        })
    }
}

/// Largest relative deviation of market price from fair value across the
/// symbols present in both maps.
fn worst_spread(prices: &HashMap<String, f64>, fair_values: &HashMap<String, f64>) -> Option<f64> {
    prices
        .iter()
        .filter_map(|(symbol, price)| {
            let fair = fair_values.get(symbol)?;
            (*fair > 0.0).then(|| ((price - fair) / fair).abs())
        })
        .max_by(f64::total_cmp)
}

/// Annualized standard deviation of log returns over the window, scaled to
/// a VIX-like percentage index. Fewer than two samples yield zero.
fn volatility_index(window: &VecDeque<f64>) -> f64 {
    if window.len() < 2 {
        return 0.0;
    }
    let returns: Vec<f64> = window
        .iter()
        .zip(window.iter().skip(1))
        .filter(|(prev, _)| **prev > 0.0)
        .map(|(prev, next)| (next / prev).ln())
        .collect();
    if returns.len() < 2 {
        return 0.0;
    }
    let mean = returns.iter().sum::<f64>() / returns.len() as f64;
    let variance = returns
        .iter()
        .map(|r| (r - mean).powi(2))
        .sum::<f64>()
        / (returns.len() - 1) as f64;
    variance.sqrt() * ANNUALIZATION_HOURS.sqrt() * 100.0
}

/// Wraps a signal provider with last-good-value fallback
pub struct SignalFeed {
    provider: Arc<dyn SignalProvider>,
    last_good: ArcSwapOption<RegimeSignals>,
}

impl SignalFeed {
    pub fn new(provider: Arc<dyn SignalProvider>) -> Self {
        Self {
            provider,
            last_good: ArcSwapOption::from(None),
        }
    }

    pub async fn fetch(&self) -> Result<RegimeSignals, AgentError> {
        match self.provider.fetch().await {
            Ok(signals) => {
                self.last_good.store(Some(Arc::new(signals)));
                Ok(signals)
            }
            Err(e) => {
                warn!(provider = self.provider.name(), error = %e, "Signal fetch failed");
                match self.last_good.load_full() {
                    Some(cached) => {
                        info!("Using cached risk signals");
                        Ok(*cached)
                    }
                    None => Err(AgentError::DataUnavailable(format!(
                        "risk signals unavailable: {}",
                        e
                    ))),
                }
            }
        }
    }
}
