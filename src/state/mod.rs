//! Shared State Module
//!
//! Thread-safe snapshot of the latest signals and counters, read by
//! telemetry and the metrics exporter. The decision engine is the only
//! writer.

use parking_lot::RwLock;
use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, Ordering};

use crate::utils::types::RegimeClass;

/// Atomic floating point wrapper using u64 bit representation
#[derive(Debug, Default)]
pub struct AtomicF64 {
    inner: AtomicU64,
}

impl AtomicF64 {
    pub fn new(val: f64) -> Self {
        Self {
            inner: AtomicU64::new(val.to_bits()),
        }
    }

    pub fn load(&self) -> f64 {
        f64::from_bits(self.inner.load(Ordering::SeqCst))
    }

    pub fn store(&self, val: f64) {
        self.inner.store(val.to_bits(), Ordering::SeqCst);
    }
}

/// Central shared state store
pub struct SharedState {
    // Risk signals
    pub volatility_index: AtomicF64,
    pub network_tps: AtomicF64,
    pub lst_spread: AtomicF64,

    // Scan results
    pub best_apy: AtomicF64,
    pub last_regime: RwLock<Option<RegimeClass>>,

    // Execution tracking
    pub consecutive_losses: AtomicU32,

    // System
    pub cycle_count: AtomicU64,
    pub error_count: AtomicU64,
    pub last_cycle_at: AtomicI64,
}

impl SharedState {
    pub fn new() -> Self {
        Self {
            volatility_index: AtomicF64::new(0.0),
            network_tps: AtomicF64::new(0.0),
            lst_spread: AtomicF64::new(0.0),
            best_apy: AtomicF64::new(0.0),
            last_regime: RwLock::new(None),
            consecutive_losses: AtomicU32::new(0),
            cycle_count: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            last_cycle_at: AtomicI64::new(0),
        }
    }

    pub fn record_signals(&self, volatility: f64, tps: f64, spread: f64) {
        self.volatility_index.store(volatility);
        self.network_tps.store(tps);
        self.lst_spread.store(spread);
    }

    pub fn record_regime(&self, regime: RegimeClass) {
        *self.last_regime.write() = Some(regime);
    }

    pub fn last_regime(&self) -> Option<RegimeClass> {
        *self.last_regime.read()
    }

    /// Track the consecutive-loss streak from executor outcomes.
    pub fn record_execution(&self, success: bool) {
        if success {
            self.consecutive_losses.store(0, Ordering::SeqCst);
        } else {
            self.consecutive_losses.fetch_add(1, Ordering::SeqCst);
        }
    }

    pub fn consecutive_losses(&self) -> u32 {
        self.consecutive_losses.load(Ordering::SeqCst)
    }

    pub fn record_cycle(&self, started_at_millis: i64) {
        self.cycle_count.fetch_add(1, Ordering::SeqCst);
        self.last_cycle_at.store(started_at_millis, Ordering::SeqCst);
    }

    pub fn increment_error_count(&self) {
        self.error_count.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self::new()
    }
}
