//! Position Tracking Module
//!
//! Owned position table keyed by position id. The decision engine currently
//! runs a single-slot portfolio: one active position, replaced wholesale on
//! rebalance. The table form leaves room for multi-position portfolios
//! without changing the engine's transition logic.

use dashmap::DashMap;
use parking_lot::RwLock;
use tracing::info;
use uuid::Uuid;

use crate::utils::types::Position;

pub struct PositionStore {
    positions: DashMap<Uuid, Position>,
    active: RwLock<Option<Uuid>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self {
            positions: DashMap::new(),
            active: RwLock::new(None),
        }
    }

    /// Record a freshly entered position and mark it active.
    pub fn open(&self, position: Position) -> Uuid {
        let id = position.id;
        info!(
            protocol = %position.protocol,
            asset = %position.asset,
            amount = position.amount,
            entry_apy = position.entry_apy,
            "Position opened"
        );
        self.positions.insert(id, position);
        *self.active.write() = Some(id);
        id
    }

    /// Replace the active position wholesale, returning the displaced one.
    pub fn replace(&self, position: Position) -> Option<Position> {
        let displaced = {
            let mut active = self.active.write();
            let old = active.take();
            *active = Some(position.id);
            old
        };
        info!(
            protocol = %position.protocol,
            asset = %position.asset,
            amount = position.amount,
            "Position replaced"
        );
        self.positions.insert(position.id, position);
        displaced.and_then(|id| self.positions.remove(&id).map(|(_, old)| old))
    }

    /// Current active position, if any.
    pub fn active(&self) -> Option<Position> {
        let id = (*self.active.read())?;
        self.positions.get(&id).map(|entry| entry.clone())
    }

    pub fn has_position(&self) -> bool {
        self.active.read().is_some()
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }
}

impl Default for PositionStore {
    fn default() -> Self {
        Self::new()
    }
}
