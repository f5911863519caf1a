//! Prometheus metrics export

use anyhow::Result;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use tracing::info;

pub fn init_metrics(port: u16) -> Result<()> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()?;

    register_metrics();
    info!("Prometheus metrics server started on {}", addr);
    Ok(())
}

fn register_metrics() {
    // Signal metrics
    describe_gauge!("moluscoyield_volatility_index", "Realized SOL volatility index");
    describe_gauge!("moluscoyield_network_tps", "Network throughput in transactions per second");
    describe_gauge!("moluscoyield_lst_spread", "Worst LST deviation from fair value");

    // Scan metrics
    describe_gauge!("moluscoyield_best_apy", "APY of the top-scored opportunity");
    describe_gauge!("moluscoyield_regime", "Market regime severity (0=normal, 2=crisis)");

    // Decision metrics
    describe_counter!("moluscoyield_cycles_total", "Total decision cycles run");
    describe_counter!("moluscoyield_decisions_enter", "ENTER decisions");
    describe_counter!("moluscoyield_decisions_rebalance", "REBALANCE decisions");
    describe_counter!("moluscoyield_decisions_hold", "HOLD decisions");
    describe_counter!("moluscoyield_breaker_trips_total", "Circuit breaker trips");

    // System metrics
    describe_counter!("moluscoyield_errors_total", "Total cycle-level errors");
    describe_gauge!("moluscoyield_consecutive_losses", "Current consecutive-loss streak");
}

pub fn record_signals(volatility: f64, tps: f64, spread: f64) {
    gauge!("moluscoyield_volatility_index").set(volatility);
    gauge!("moluscoyield_network_tps").set(tps);
    gauge!("moluscoyield_lst_spread").set(spread);
}

pub fn record_regime(severity: u8) {
    gauge!("moluscoyield_regime").set(severity as f64);
}

pub fn record_best_apy(apy: f64) {
    gauge!("moluscoyield_best_apy").set(apy);
}

pub fn record_cycle() {
    counter!("moluscoyield_cycles_total").increment(1);
}

pub fn record_enter() {
    counter!("moluscoyield_decisions_enter").increment(1);
}

pub fn record_rebalance() {
    counter!("moluscoyield_decisions_rebalance").increment(1);
}

pub fn record_hold() {
    counter!("moluscoyield_decisions_hold").increment(1);
}

pub fn record_breaker_trip() {
    counter!("moluscoyield_breaker_trips_total").increment(1);
}

pub fn record_error() {
    counter!("moluscoyield_errors_total").increment(1);
}

pub fn record_consecutive_losses(losses: u32) {
    gauge!("moluscoyield_consecutive_losses").set(losses as f64);
}
