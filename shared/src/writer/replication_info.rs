use log::trace;

use crate::{
    attachment::AttachmentSendQueue,
    bit_array::ChangeMask,
    handle::NetHandle,
    writer::{
        baselines::{BaselineIndex, INVALID_BASELINE_INDEX},
        error::StateTransitionError,
        state::ReplicatedObjectState,
    },
};

/// One object's replication bookkeeping on one connection.
pub struct ReplicationInfo {
    pub(crate) handle: NetHandle,
    pub(crate) state: ReplicatedObjectState,
    /// Bumped every time replication restarts, so records from an earlier
    /// life of the object can be told apart.
    pub(crate) epoch: u32,
    pub(crate) change_mask: ChangeMask,
    pub(crate) has_dirty_change_mask: bool,
    pub(crate) has_dirty_sub_objects: bool,
    pub(crate) is_sub_object: bool,
    pub(crate) is_creation_confirmed: bool,
    pub(crate) tear_off: bool,
    pub(crate) destroy_instance: bool,
    pub(crate) is_destruction_info: bool,
    pub(crate) delta_enabled: bool,
    pub(crate) last_acked_baseline: BaselineIndex,
    pub(crate) pending_baseline: BaselineIndex,
    /// Written state records not yet delivered, lost or discarded.
    pub(crate) in_flight_state_count: u32,
    pub(crate) attachments: AttachmentSendQueue,
    pub(crate) cannot_send_count: u32,
}

impl ReplicationInfo {
    pub(crate) fn new(max_reliable_attachments_in_flight: u16) -> Self {
        Self {
            handle: NetHandle::INVALID,
            state: ReplicatedObjectState::Invalid,
            epoch: 0,
            change_mask: ChangeMask::new(0),
            has_dirty_change_mask: false,
            has_dirty_sub_objects: false,
            is_sub_object: false,
            is_creation_confirmed: false,
            tear_off: false,
            destroy_instance: false,
            is_destruction_info: false,
            delta_enabled: false,
            last_acked_baseline: INVALID_BASELINE_INDEX,
            pending_baseline: INVALID_BASELINE_INDEX,
            in_flight_state_count: 0,
            attachments: AttachmentSendQueue::new(max_reliable_attachments_in_flight),
            cannot_send_count: 0,
        }
    }

    pub fn handle(&self) -> NetHandle {
        self.handle
    }

    pub fn state(&self) -> ReplicatedObjectState {
        self.state
    }

    pub fn is_creation_confirmed(&self) -> bool {
        self.is_creation_confirmed
    }

    pub fn change_mask(&self) -> &ChangeMask {
        &self.change_mask
    }

    pub(crate) fn set_state(&mut self, to: ReplicatedObjectState) -> Result<(), StateTransitionError> {
        if self.state != to {
            trace!("{} {:?} -> {:?}", self.handle, self.state, to);
        }
        self.state.transition(to)
    }

    pub(crate) fn mark_dirty(&mut self, mask: &ChangeMask) {
        self.change_mask.combine(mask);
        self.has_dirty_change_mask = self.change_mask.is_any_set();
    }

    pub(crate) fn clear_dirty(&mut self) {
        self.change_mask.clear_all();
        self.has_dirty_change_mask = false;
    }

    pub(crate) fn reset_baselines(&mut self) {
        self.last_acked_baseline = INVALID_BASELINE_INDEX;
        self.pending_baseline = INVALID_BASELINE_INDEX;
    }
}
