use std::{collections::HashMap, sync::Arc};

use crate::{protocol::ObjectState, types::InternalIndex};

pub type BaselineIndex = u32;

/// Baseline slots kept per object.
pub const MAX_BASELINE_COUNT: u32 = 2;
/// Width of a baseline index on the wire.
pub const BASELINE_INDEX_BIT_COUNT: u32 = 2;
/// Baseline index meaning "no baseline".
pub const INVALID_BASELINE_INDEX: BaselineIndex = 2;

/// Baseline following `index` in the ring.
pub fn next_baseline_index(index: BaselineIndex) -> BaselineIndex {
    if index >= MAX_BASELINE_COUNT {
        0
    } else {
        (index + 1) % MAX_BASELINE_COUNT
    }
}

/// State snapshots a connection's writer deltas against, with a
/// per-connection budget.
pub struct BaselineStore {
    slots: HashMap<InternalIndex, [Option<Arc<ObjectState>>; MAX_BASELINE_COUNT as usize]>,
    live_count: usize,
    max_live_count: usize,
}

impl BaselineStore {
    pub fn new(max_live_count: usize) -> Self {
        Self {
            slots: HashMap::new(),
            live_count: 0,
            max_live_count,
        }
    }

    pub fn can_create(&self) -> bool {
        self.live_count < self.max_live_count
    }

    /// Stores a snapshot in `baseline`, replacing whatever was there.
    pub fn create(&mut self, index: InternalIndex, baseline: BaselineIndex, state: Arc<ObjectState>) {
        let Some(slot) = self.slot_mut(index, baseline) else {
            return;
        };
        let replaced = slot.replace(state);
        if replaced.is_none() {
            self.live_count += 1;
        }
    }

    pub fn get(&self, index: InternalIndex, baseline: BaselineIndex) -> Option<&Arc<ObjectState>> {
        if baseline >= MAX_BASELINE_COUNT {
            return None;
        }
        self.slots
            .get(&index)
            .and_then(|slots| slots[baseline as usize].as_ref())
    }

    pub fn release(&mut self, index: InternalIndex, baseline: BaselineIndex) {
        if baseline >= MAX_BASELINE_COUNT {
            return;
        }
        let Some(slots) = self.slots.get_mut(&index) else {
            return;
        };
        if slots[baseline as usize].take().is_some() {
            self.live_count -= 1;
        }
        if slots.iter().all(Option::is_none) {
            self.slots.remove(&index);
        }
    }

    pub fn release_all(&mut self, index: InternalIndex) {
        if let Some(slots) = self.slots.remove(&index) {
            self.live_count -= slots.iter().filter(|slot| slot.is_some()).count();
        }
    }

    pub fn clear(&mut self) {
        self.slots.clear();
        self.live_count = 0;
    }

    pub fn live_count(&self) -> usize {
        self.live_count
    }

    fn slot_mut(&mut self, index: InternalIndex, baseline: BaselineIndex) -> Option<&mut Option<Arc<ObjectState>>> {
        if baseline >= MAX_BASELINE_COUNT {
            return None;
        }
        let slots = self.slots.entry(index).or_default();
        Some(&mut slots[baseline as usize])
    }
}
