use std::collections::VecDeque;

use crate::{
    bit_array::ChangeMask,
    handle::NetHandle,
    types::InternalIndex,
    wrapping_number::SequenceNumber,
    writer::{baselines::BaselineIndex, state::ReplicatedObjectState},
};

/// What one packet carried for one object, replayed when the packet is
/// acknowledged, lost or discarded.
#[derive(Clone, Debug, PartialEq)]
pub struct RecordInfo {
    pub index: InternalIndex,
    /// Replication epoch of the object when written. Records from an earlier
    /// epoch are ignored.
    pub epoch: u32,
    /// State the object was moved to by the write.
    pub state: ReplicatedObjectState,
    /// Members whose state was written.
    pub change_mask: Option<ChangeMask>,
    pub new_baseline: BaselineIndex,
    pub reliable_attachments: Vec<SequenceNumber>,
    pub exports: Vec<NetHandle>,
    pub wrote_destroy: bool,
    pub wrote_tear_off: bool,
}

impl RecordInfo {
    pub fn new(index: InternalIndex, epoch: u32, state: ReplicatedObjectState) -> Self {
        Self {
            index,
            epoch,
            state,
            change_mask: None,
            new_baseline: crate::writer::baselines::INVALID_BASELINE_INDEX,
            reliable_attachments: Vec::new(),
            exports: Vec::new(),
            wrote_destroy: false,
            wrote_tear_off: false,
        }
    }
}

/// One entry per written packet, in write order.
#[derive(Default)]
pub struct ReplicationRecord {
    entries: VecDeque<Vec<RecordInfo>>,
    info_count: usize,
}

impl ReplicationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, infos: Vec<RecordInfo>) {
        self.info_count += infos.len();
        self.entries.push_back(infos);
    }

    pub fn pop(&mut self) -> Option<Vec<RecordInfo>> {
        let infos = self.entries.pop_front()?;
        self.info_count -= infos.len();
        Some(infos)
    }

    pub fn packet_count(&self) -> usize {
        self.entries.len()
    }

    /// Record infos across all packets still awaiting a delivery status.
    pub fn info_count(&self) -> usize {
        self.info_count
    }

    pub fn infos(&self) -> impl Iterator<Item = &RecordInfo> {
        self.entries.iter().flatten()
    }

    /// Union of every in-flight changemask written for `index` during
    /// `epoch`.
    pub fn in_flight_change_mask(&self, index: InternalIndex, epoch: u32, bit_count: u32) -> ChangeMask {
        let mut mask = ChangeMask::new(bit_count);
        for info in self.infos() {
            if info.index == index && info.epoch == epoch {
                if let Some(written) = &info.change_mask {
                    mask.combine(written);
                }
            }
        }
        mask
    }

    pub fn clear(&mut self) -> Vec<Vec<RecordInfo>> {
        self.info_count = 0;
        self.entries.drain(..).collect()
    }
}
