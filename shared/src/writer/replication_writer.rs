use std::collections::HashSet;

use log::{debug, info, trace};

use crate::{
    attachment::{AttachmentError, AttachmentSendQueue, NetAttachment, MAX_QUEUED_RELIABLE_ATTACHMENTS},
    bit_array::{BitArray, ChangeMask},
    config::ReplicationConfig,
    constants::MAX_HUGE_OBJECT_FRAGMENTS_IN_FLIGHT,
    handle::NetHandle,
    registry::{MaxInternalIndexListener, ObjectRegistry, SubObjectCondition},
    types::{ConnectionId, InternalIndex},
    writer::{
        baselines::BaselineStore,
        error::WriterError,
        huge_object::HugeObjectSendQueue,
        record::ReplicationRecord,
        replication_info::ReplicationInfo,
        state::ReplicatedObjectState,
    },
};

/// Decides what one connection is sent about every object in its scope,
/// and keeps track of it until the peer has acknowledged it.
pub struct ReplicationWriter {
    pub(super) connection_id: ConnectionId,
    pub(super) config: ReplicationConfig,
    pub(super) infos: Vec<ReplicationInfo>,
    pub(super) objects_in_scope: BitArray,
    /// Objects leaving the connection: waiting for a flush, for creation to
    /// be confirmed, or for their destroy to be written.
    pub(super) objects_pending_destroy: BitArray,
    pub(super) priorities: Vec<f32>,
    pub(super) baselines: BaselineStore,
    pub(super) record: ReplicationRecord,
    pub(super) huge_objects: HugeObjectSendQueue,
    pub(super) oob_attachments: AttachmentSendQueue,
    pub(super) acked_exports: HashSet<NetHandle>,
    /// Static objects whose destroy this connection has acknowledged.
    pub(super) destroyed_statics: HashSet<NetHandle>,
    next_epoch: u32,
}

impl ReplicationWriter {
    pub fn new(connection_id: ConnectionId, config: &ReplicationConfig, max_internal_index: InternalIndex) -> Self {
        let mut writer = Self {
            connection_id,
            config: config.clone(),
            infos: Vec::new(),
            objects_in_scope: BitArray::new(max_internal_index),
            objects_pending_destroy: BitArray::new(max_internal_index),
            priorities: Vec::new(),
            baselines: BaselineStore::new(config.max_baselines_per_connection),
            record: ReplicationRecord::new(),
            huge_objects: HugeObjectSendQueue::new(config.max_huge_objects_in_transit),
            oob_attachments: AttachmentSendQueue::new(MAX_HUGE_OBJECT_FRAGMENTS_IN_FLIGHT),
            acked_exports: HashSet::new(),
            destroyed_statics: HashSet::new(),
            next_epoch: 1,
        };
        writer.resize(max_internal_index);
        writer
    }

    fn resize(&mut self, max_internal_index: InternalIndex) {
        let max_in_flight = self.config.max_reliable_attachments_in_flight;
        self.infos
            .resize_with(max_internal_index as usize, || ReplicationInfo::new(max_in_flight));
        self.priorities.resize(max_internal_index as usize, 0.0);
        self.objects_in_scope.resize(max_internal_index);
        self.objects_pending_destroy.resize(max_internal_index);
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    // Scope

    /// Applies the connection's new scope. Roots are handled before
    /// subobjects so a subobject always sees its root's new state.
    pub fn update_scope(&mut self, registry: &mut ObjectRegistry, in_scope: &BitArray) -> Result<(), WriterError> {
        let mut entered = in_scope.clone();
        entered.and_not(&self.objects_in_scope);
        let mut left = self.objects_in_scope.clone();
        left.and_not(in_scope);
        self.objects_in_scope = in_scope.clone();

        let (entered_sub_objects, entered_roots): (Vec<InternalIndex>, Vec<InternalIndex>) = entered
            .iter_set_bits()
            .partition(|index| registry.is_sub_object(*index));
        let (left_sub_objects, left_roots): (Vec<InternalIndex>, Vec<InternalIndex>) = left
            .iter_set_bits()
            .partition(|index| self.infos[*index as usize].is_sub_object || registry.is_sub_object(*index));

        for index in left_roots.into_iter().chain(left_sub_objects) {
            self.on_left_scope(index, registry)?;
        }
        for index in entered_roots.into_iter().chain(entered_sub_objects) {
            self.on_entered_scope(index, registry)?;
        }
        Ok(())
    }

    fn on_entered_scope(&mut self, index: InternalIndex, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let Some(data) = registry.object(index) else {
            return Ok(());
        };
        let destruction_info_target = data.destruction_info_target();
        let slot = index as usize;
        self.objects_pending_destroy.clear_bit(index);

        match self.infos[slot].state {
            Invalid => match destruction_info_target {
                Some(target) => self.start_destruction_info(index, target, registry)?,
                None => self.start_replication(index, registry)?,
            },
            WaitOnFlush => {
                let info = &mut self.infos[slot];
                info.set_state(Created)?;
                info.has_dirty_change_mask = info.change_mask.is_any_set();
            }
            WaitOnCreateConfirmation => {
                let info = &mut self.infos[slot];
                info.has_dirty_change_mask = info.change_mask.is_any_set();
            }
            WaitOnDestroyConfirmation | CancelPendingDestroy => {
                self.infos[slot].set_state(CancelPendingDestroy)?;
            }
            PendingDestroy | SubObjectPendingDestroy => {
                // nothing was written yet, so walk back to the live state
                let info = &mut self.infos[slot];
                info.set_state(WaitOnDestroyConfirmation)?;
                info.set_state(CancelPendingDestroy)?;
                if info.is_creation_confirmed {
                    info.set_state(Created)?;
                } else {
                    info.set_state(WaitOnCreateConfirmation)?;
                }
                info.has_dirty_change_mask = info.change_mask.is_any_set();

                if info.is_sub_object {
                    let root = registry.root_of(index);
                    self.infos[root as usize].has_dirty_sub_objects = true;
                } else {
                    for sub_object in registry.sub_objects(index) {
                        let sub_info = &mut self.infos[*sub_object as usize];
                        if sub_info.state == PendingDestroy {
                            sub_info.set_state(SubObjectPendingDestroy)?;
                            self.infos[slot].has_dirty_sub_objects = true;
                        }
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn on_left_scope(&mut self, index: InternalIndex, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let slot = index as usize;
        if self.infos[slot].tear_off {
            return Ok(());
        }
        match self.infos[slot].state {
            PendingCreate => self.stop_replication(index, registry)?,
            PermanentlyDestroyed => self.stop_replication(index, registry)?,
            CancelPendingDestroy => {
                self.infos[slot].set_state(WaitOnDestroyConfirmation)?;
                self.objects_pending_destroy.set_bit(index);
            }
            WaitOnCreateConfirmation => {
                // decided once creation is confirmed or lost
                self.objects_pending_destroy.set_bit(index);
            }
            Created | WaitOnFlush => {
                self.objects_pending_destroy.set_bit(index);
                if self.needs_flush(index, registry) {
                    self.infos[slot].set_state(WaitOnFlush)?;
                } else {
                    self.set_pending_destroy_state(index, registry)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// PendingDestroy, or SubObjectPendingDestroy for a subobject leaving on
    /// its own while its root stays.
    pub(super) fn set_pending_destroy_state(
        &mut self,
        index: InternalIndex,
        registry: &ObjectRegistry,
    ) -> Result<(), WriterError> {
        let slot = index as usize;
        self.objects_pending_destroy.set_bit(index);
        if self.infos[slot].is_sub_object {
            let root = registry.root_of(index);
            if root != index && !self.is_root_leaving(root) {
                self.infos[slot].set_state(ReplicatedObjectState::SubObjectPendingDestroy)?;
                self.infos[root as usize].has_dirty_sub_objects = true;
                return Ok(());
            }
        }
        self.infos[slot].set_state(ReplicatedObjectState::PendingDestroy)?;
        Ok(())
    }

    pub(super) fn is_root_leaving(&self, root: InternalIndex) -> bool {
        use ReplicatedObjectState::*;

        self.objects_pending_destroy.get_bit(root)
            || matches!(
                self.infos[root as usize].state,
                Invalid | PendingTearOff | PendingDestroy | WaitOnDestroyConfirmation | Destroyed
            )
    }

    /// Everything that must be acknowledged before the object may leave:
    /// reliable attachments, written state, huge-object fragments, and the
    /// same for its subobjects.
    pub(super) fn needs_flush(&self, index: InternalIndex, registry: &ObjectRegistry) -> bool {
        if self.object_needs_flush(index) {
            return true;
        }
        if self.infos[index as usize].is_sub_object {
            return false;
        }
        registry
            .sub_objects(index)
            .iter()
            .any(|sub_object| self.object_needs_flush(*sub_object))
    }

    fn object_needs_flush(&self, index: InternalIndex) -> bool {
        let info = &self.infos[index as usize];
        info.in_flight_state_count > 0
            || info.attachments.has_unacked_reliable()
            || self.huge_objects.contains(index)
    }

    /// Leaving objects whose flush has completed move on to their destroy.
    pub(super) fn poll_pending_destroys(&mut self, registry: &ObjectRegistry) -> Result<(), WriterError> {
        let (sub_objects, roots): (Vec<InternalIndex>, Vec<InternalIndex>) = self
            .objects_pending_destroy
            .iter_set_bits()
            .partition(|index| self.infos[*index as usize].is_sub_object);
        for index in sub_objects.into_iter().chain(roots) {
            if self.infos[index as usize].state == ReplicatedObjectState::WaitOnFlush
                && !self.needs_flush(index, registry)
            {
                self.set_pending_destroy_state(index, registry)?;
            }
        }
        Ok(())
    }

    // Lifecycle

    pub(super) fn start_replication(&mut self, index: InternalIndex, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        let Some(data) = registry.object(index) else {
            return Ok(());
        };
        let protocol = data.protocol();
        let delta_enabled = self.config.delta_compression_enabled && protocol.delta_compression();
        let bit_count = protocol.change_mask_bit_count();
        let handle = data.handle();
        let is_sub_object = data.is_sub_object();
        let root = data.root();
        let tear_off = data.is_torn_off();

        let epoch = self.next_epoch;
        self.next_epoch = self.next_epoch.wrapping_add(1);

        let info = &mut self.infos[index as usize];
        info.set_state(ReplicatedObjectState::PendingCreate)?;
        info.handle = handle;
        info.epoch = epoch;
        info.change_mask = ChangeMask::new(bit_count);
        info.has_dirty_change_mask = false;
        info.has_dirty_sub_objects = false;
        info.is_sub_object = is_sub_object;
        info.is_creation_confirmed = false;
        info.tear_off = tear_off;
        info.destroy_instance = false;
        info.is_destruction_info = false;
        info.delta_enabled = delta_enabled;
        info.reset_baselines();
        info.in_flight_state_count = 0;
        info.attachments.clear();
        info.cannot_send_count = 0;

        registry.add_connection_ref(index);
        if is_sub_object {
            self.infos[root as usize].has_dirty_sub_objects = true;
        }
        trace!("connection {} starts replicating {}", self.connection_id, handle);
        Ok(())
    }

    fn start_destruction_info(
        &mut self,
        index: InternalIndex,
        target: NetHandle,
        registry: &mut ObjectRegistry,
    ) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let target_known = self.destroyed_statics.contains(&target)
            || registry
                .index_of(target)
                .is_some_and(|target_index| !matches!(self.infos[target_index as usize].state, Invalid | PendingCreate));

        self.start_replication(index, registry)?;
        let info = &mut self.infos[index as usize];
        info.is_destruction_info = true;
        info.delta_enabled = false;
        if target_known {
            // the connection learns of the destroy from the object itself
            info.set_state(Invalid)?;
            info.set_state(PermanentlyDestroyed)?;
            self.destroyed_statics.remove(&target);
        }
        Ok(())
    }

    /// Forgets everything about an object on this connection and lets go
    /// of its index.
    pub(super) fn stop_replication(&mut self, index: InternalIndex, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        let slot = index as usize;
        self.infos[slot].set_state(ReplicatedObjectState::Invalid)?;
        self.reset_info(index);
        registry.release_connection_ref(index);
        trace!("connection {} stopped replicating index {}", self.connection_id, index);
        Ok(())
    }

    fn reset_info(&mut self, index: InternalIndex) {
        let slot = index as usize;
        self.baselines.release_all(index);
        let info = &mut self.infos[slot];
        info.state = ReplicatedObjectState::Invalid;
        info.clear_dirty();
        info.reset_baselines();
        info.attachments.clear();
        info.in_flight_state_count = 0;
        info.has_dirty_sub_objects = false;
        info.is_creation_confirmed = false;
        info.tear_off = false;
        info.is_destruction_info = false;
        self.objects_pending_destroy.clear_bit(index);
        self.priorities[slot] = 0.0;
    }

    /// Releases everything the connection holds: connection references,
    /// baselines, records and queued fragments.
    pub fn teardown(&mut self, registry: &mut ObjectRegistry) {
        for index in 1..self.infos.len() as InternalIndex {
            if self.infos[index as usize].state != ReplicatedObjectState::Invalid {
                self.reset_info(index);
                registry.release_connection_ref(index);
            }
        }
        self.record.clear();
        self.huge_objects.clear();
        self.oob_attachments.clear();
        self.baselines.clear();
        self.objects_in_scope.clear_all();
        self.acked_exports.clear();
        self.destroyed_statics.clear();
        info!("connection {} replication writer torn down", self.connection_id);
    }

    // Changes

    /// Copies an object's dirty members into this connection.
    pub fn add_dirty(&mut self, index: InternalIndex, mask: &ChangeMask, registry: &ObjectRegistry) {
        use ReplicatedObjectState::*;

        let Some(info) = self.infos.get_mut(index as usize) else {
            return;
        };
        if !matches!(
            info.state,
            PendingCreate | WaitOnCreateConfirmation | Created | WaitOnFlush | PendingTearOff
        ) {
            return;
        }
        if info.is_sub_object
            && registry.sub_object_condition(index) == SubObjectCondition::InitialOnly
        {
            return;
        }
        info.mark_dirty(mask);
        if info.is_sub_object {
            let root = registry.root_of(index);
            self.infos[root as usize].has_dirty_sub_objects = true;
        }
    }

    /// An object was torn off: its last state goes out, then replication
    /// ends without destroying the remote instance.
    pub fn tear_off(&mut self, index: InternalIndex) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let slot = index as usize;
        let Some(info) = self.infos.get_mut(slot) else {
            return Ok(());
        };
        match info.state {
            PendingCreate | WaitOnCreateConfirmation => info.tear_off = true,
            Created | WaitOnFlush => {
                info.tear_off = true;
                info.set_state(PendingTearOff)?;
                self.objects_pending_destroy.clear_bit(index);
            }
            _ => {}
        }
        Ok(())
    }

    pub fn queue_attachment(
        &mut self,
        index: InternalIndex,
        reliable: bool,
        attachment: NetAttachment,
        registry: &ObjectRegistry,
    ) -> Result<(), AttachmentError> {
        use ReplicatedObjectState::*;

        let handle = registry.handle_of(index).unwrap_or(NetHandle::INVALID);
        let max_bits = self.config.max_huge_object_bits;
        if attachment.bit_length() > max_bits {
            return Err(AttachmentError::AttachmentTooLarge {
                bit_length: attachment.bit_length(),
                max_bits,
            });
        }
        let Some(info) = self.infos.get_mut(index as usize) else {
            return Err(AttachmentError::ObjectNotReplicated { handle });
        };
        if !matches!(info.state, PendingCreate | WaitOnCreateConfirmation | Created) {
            return Err(AttachmentError::ObjectNotReplicated { handle });
        }
        if reliable && !info.attachments.can_enqueue_reliable() {
            return Err(AttachmentError::ReliableQueueFull {
                handle,
                limit: MAX_QUEUED_RELIABLE_ATTACHMENTS,
            });
        }
        info.attachments.enqueue(reliable, attachment);
        if info.is_sub_object {
            let root = registry.root_of(index);
            self.infos[root as usize].has_dirty_sub_objects = true;
        }
        Ok(())
    }

    // Scheduling

    /// Whether an object has anything to put on the wire right now.
    pub(super) fn has_work(&self, index: InternalIndex) -> bool {
        use ReplicatedObjectState::*;

        let info = &self.infos[index as usize];
        if self.huge_objects.contains(index) {
            return false;
        }
        match info.state {
            PendingCreate | PendingTearOff => true,
            Created => {
                info.has_dirty_change_mask || info.has_dirty_sub_objects || info.attachments.has_unsent()
            }
            WaitOnFlush => info.attachments.has_unsent() || info.has_dirty_sub_objects,
            SubObjectPendingDestroy => info.is_sub_object,
            _ => false,
        }
    }

    /// Accrues priority for every root with something to send.
    pub fn update_priorities(&mut self, registry: &ObjectRegistry) {
        for index in 1..self.infos.len() as InternalIndex {
            let slot = index as usize;
            if !self.infos[slot].is_sub_object || !self.infos[slot].state.is_replicating() {
                continue;
            }
            if self.has_work(index) {
                let root = registry.root_of(index);
                self.infos[root as usize].has_dirty_sub_objects = true;
            }
        }

        let priority_fn = self.config.priority_fn;
        for index in 1..self.infos.len() as InternalIndex {
            let slot = index as usize;
            let info = &self.infos[slot];
            if info.is_sub_object || !info.state.is_replicating() || !self.has_work(index) {
                continue;
            }
            let mut priority = self.priorities[slot] + priority_fn(info.handle);
            if info.state == ReplicatedObjectState::PendingTearOff {
                priority = priority.max(self.config.tear_off_priority);
            }
            self.priorities[slot] = priority;
        }
    }

    // Queries

    pub fn object_state(&self, index: InternalIndex) -> ReplicatedObjectState {
        self.infos
            .get(index as usize)
            .map(|info| info.state)
            .unwrap_or_default()
    }

    pub fn info(&self, index: InternalIndex) -> Option<&ReplicationInfo> {
        self.infos.get(index as usize)
    }

    pub fn priority(&self, index: InternalIndex) -> f32 {
        self.priorities.get(index as usize).copied().unwrap_or(0.0)
    }

    pub fn is_in_scope(&self, index: InternalIndex) -> bool {
        self.objects_in_scope.get_bit(index)
    }

    pub fn live_baseline_count(&self) -> usize {
        self.baselines.live_count()
    }

    pub fn in_flight_packet_count(&self) -> usize {
        self.record.packet_count()
    }

    pub fn huge_objects_in_transit(&self) -> usize {
        self.huge_objects.len()
    }

    /// Objects this connection currently holds a reference to.
    pub fn replicated_object_count(&self) -> usize {
        self.infos
            .iter()
            .filter(|info| info.state != ReplicatedObjectState::Invalid)
            .count()
    }
}

impl MaxInternalIndexListener for ReplicationWriter {
    fn on_max_internal_index_increased(&mut self, new_max_internal_index: InternalIndex) {
        debug!(
            "connection {} writer grows to {} indices",
            self.connection_id, new_max_internal_index
        );
        self.resize(new_max_internal_index);
    }
}
