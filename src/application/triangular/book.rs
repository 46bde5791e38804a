//! Open arbitrage positions with the single in-flight rule.

use std::collections::BTreeMap;

use parking_lot::Mutex;

use crate::domain::{ArbitrageId, ArbitragePosition};

/// Positions that have not been evicted yet.
///
/// At most one of them is non-terminal at any time; [`try_open`] is the only
/// way in and refuses while another run is in flight.
///
/// [`try_open`]: ArbitrageBook::try_open
#[derive(Debug, Default)]
pub struct ArbitrageBook {
    positions: Mutex<BTreeMap<ArbitrageId, ArbitragePosition>>,
}

impl ArbitrageBook {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert `position` unless a non-terminal one exists.
    pub fn try_open(&self, position: ArbitragePosition) -> bool {
        let mut positions = self.positions.lock();
        if positions.values().any(|p| !p.status().is_terminal()) {
            return false;
        }
        positions.insert(position.id().clone(), position);
        true
    }

    #[must_use]
    pub fn in_flight(&self) -> bool {
        self.positions
            .lock()
            .values()
            .any(|p| !p.status().is_terminal())
    }

    /// Run `f` on the position with `id`, if still present.
    pub fn update<R>(&self, id: &ArbitrageId, f: impl FnOnce(&mut ArbitragePosition) -> R) -> Option<R> {
        self.positions.lock().get_mut(id).map(f)
    }

    #[must_use]
    pub fn get(&self, id: &ArbitrageId) -> Option<ArbitragePosition> {
        self.positions.lock().get(id).cloned()
    }

    pub fn evict(&self, id: &ArbitrageId) -> Option<ArbitragePosition> {
        self.positions.lock().remove(id)
    }

    #[must_use]
    pub fn positions(&self) -> Vec<ArbitragePosition> {
        self.positions.lock().values().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.positions.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.positions.lock().is_empty()
    }
}
