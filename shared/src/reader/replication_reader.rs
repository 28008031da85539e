use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::Instant,
};

use log::{debug, error, trace, warn};
use netrep_serde::{BitReader, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{
    attachment::{AttachmentReceiveQueue, NetAttachment},
    bit_array::ChangeMask,
    bridge::{EndReplicationFlags, ReplicationBridge, StateUpdate},
    config::ReplicationConfig,
    constants::{
        BATCH_COUNT_BIT_COUNT, DESTROY_HEADER_BIT_COUNT, DESTROY_HEADER_DESTROY_INSTANCE,
        DESTROY_HEADER_END_REPLICATION, DESTROY_HEADER_TEAR_OFF,
    },
    handle::NetHandle,
    protocol::{ObjectState, Protocol, ReplicationProtocol},
    reader::{
        dispatch::DispatchPlan,
        error::ReaderError,
        event::ReaderEvent,
        huge_object::HugeObjectAssembler,
        object_info::RemoteObjectInfo,
        pending_batches::{PendingBatches, PendingChunk},
        reference_tracking::ReferenceTracker,
    },
    registry::ObjectRegistry,
    types::{ConnectionId, ProtocolId},
    writer::{BaselineIndex, BASELINE_INDEX_BIT_COUNT, INVALID_BASELINE_INDEX},
};

/// Receives what the peer replicates over one connection and hands it to a
/// [`ReplicationBridge`].
pub struct ReplicationReader {
    pub(super) connection_id: ConnectionId,
    pub(super) config: ReplicationConfig,
    /// Mirrors of the remote objects, with their received state.
    pub(super) objects: ObjectRegistry,
    pub(super) infos: HashMap<NetHandle, RemoteObjectInfo>,
    /// Objects whose data is dropped until their replication ends.
    pub(super) broken: HashSet<NetHandle>,
    pub(super) pending: PendingBatches,
    pub(super) references: ReferenceTracker,
    /// Objects instantiated by the batch being read, released again if the
    /// batch fails.
    created_in_batch: Vec<NetHandle>,
    oob_attachments: AttachmentReceiveQueue,
    huge_object: HugeObjectAssembler,
    events: Vec<ReaderEvent>,
}

impl ReplicationReader {
    pub fn new(connection_id: ConnectionId, config: &ReplicationConfig) -> Self {
        Self {
            connection_id,
            config: config.clone(),
            objects: ObjectRegistry::new(0, config),
            infos: HashMap::new(),
            broken: HashSet::new(),
            pending: PendingBatches::new(),
            references: ReferenceTracker::new(config.hot_resolving_lifetime, config.cold_resolving_retry_time),
            created_in_batch: Vec::new(),
            oob_attachments: AttachmentReceiveQueue::new(),
            huge_object: HugeObjectAssembler::new(config.max_huge_object_bits),
            events: Vec::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.connection_id
    }

    // Queries

    pub fn is_replicated(&self, handle: NetHandle) -> bool {
        self.infos.contains_key(&handle)
    }

    pub fn remote_object_count(&self) -> usize {
        self.infos.len()
    }

    pub fn remote_handles(&self) -> Vec<NetHandle> {
        let mut handles: Vec<NetHandle> = self.infos.keys().copied().collect();
        handles.sort();
        handles
    }

    /// Everything received for `handle` so far.
    pub fn remote_state(&self, handle: NetHandle) -> Option<&ObjectState> {
        self.objects.object_by_handle(handle).map(|data| data.state())
    }

    pub fn object_info(&self, handle: NetHandle) -> Option<&RemoteObjectInfo> {
        self.infos.get(&handle)
    }

    pub fn is_broken(&self, handle: NetHandle) -> bool {
        self.broken.contains(&handle)
    }

    pub fn is_queued(&self, handle: NetHandle) -> bool {
        self.pending.contains(handle)
    }

    pub fn queued_object_count(&self) -> usize {
        self.pending.len()
    }

    pub fn has_unresolved_references(&self) -> bool {
        self.references.has_unresolved()
    }

    pub fn take_events(&mut self) -> Vec<ReaderEvent> {
        std::mem::take(&mut self.events)
    }

    // Packets

    /// Reads one packet segment and dispatches everything in it.
    ///
    /// Errors that only concern one object break that object and are
    /// reported through [`ReaderEvent`]. An `Err` means the stream itself is
    /// unusable and the connection should be closed.
    pub fn read_packet(
        &mut self,
        reader: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
    ) -> Result<(), ReaderError> {
        let mut plan = DispatchPlan::prepare();
        if let Err(error) = self.read_segment(reader, protocols, bridge, now, false, &mut plan) {
            error!("connection {}: malformed replication data: {}", self.connection_id, error);
            return Err(error);
        }
        self.dispatch(&plan, bridge, now);
        Ok(())
    }

    /// Retries batches held back on must-be-mapped references.
    pub fn process_queued_batches(
        &mut self,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
    ) -> Result<(), ReaderError> {
        if self.pending.is_empty() && !self.references.has_unresolved() {
            return Ok(());
        }
        let mut plan = DispatchPlan::prepare();
        for handle in self.pending.handles() {
            self.process_queue(handle, protocols, bridge, now, &mut plan)?;
        }
        self.dispatch(&plan, bridge, now);
        Ok(())
    }

    fn dispatch(&mut self, plan: &DispatchPlan, bridge: &mut dyn ReplicationBridge, now: Instant) {
        if !plan.is_empty() {
            plan.apply(self, bridge, now);
            plan.finalize(self, bridge, now);
        }
        self.apply_resolved_references(bridge, now);
    }

    fn read_segment(
        &mut self,
        reader: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        is_huge: bool,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let batch_count = reader.read_bits(BATCH_COUNT_BIT_COUNT)? as u16;
        let max = self.config.max_object_batch_count_to_read;
        if batch_count > max {
            return Err(ReaderError::BatchCountTooLarge { count: batch_count, max });
        }

        self.read_root_destroys(reader, now, plan)?;
        for _ in 0..batch_count {
            self.read_batch(reader, protocols, bridge, now, is_huge, plan)?;
        }
        Ok(())
    }

    fn read_root_destroys(
        &mut self,
        reader: &mut BitReader,
        now: Instant,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let destroy_count = reader.read_bits(BATCH_COUNT_BIT_COUNT)?;
        for _ in 0..destroy_count {
            let handle = NetHandle::de(reader)?;
            let destroy_instance = reader.read_bit()?;
            if self.pending.contains(handle) {
                self.pending
                    .push(handle, PendingChunk::EndReplication { destroy_instance }, Vec::new(), now);
                continue;
            }
            self.broken.remove(&handle);
            if self.infos.contains_key(&handle) {
                plan.add_end(
                    handle,
                    EndReplicationFlags {
                        tear_off: false,
                        destroy_instance,
                    },
                );
            }
        }
        Ok(())
    }

    fn read_batch(
        &mut self,
        reader: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        is_huge: bool,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        if reader.read_bit()? {
            let target = NetHandle::de(reader)?;
            trace!("connection {}: destruction info for {}", self.connection_id, target);
            plan.add_destruction_info(target);
            return Ok(());
        }

        let handle = NetHandle::de(reader)?;
        let size_bit_count = if is_huge || !handle.is_valid() {
            self.config.huge_object_batch_size_bit_count
        } else {
            self.config.batch_size_bit_count
        };
        let size = reader.read_bits(size_bit_count)?;
        let size = u32::try_from(size).map_err(|_| SerdeErr::ValueOutOfRange {
            value: size,
            type_name: "batch size",
        })?;
        let mut content = reader.sub_reader(size)?;

        // exports trail the content, outside its size
        let has_exports = {
            let mut peek = content.clone();
            peek.read_bit()?;
            peek.read_bit()?
        };
        let mut exports = Vec::new();
        if has_exports {
            let count = u16::de(reader)?;
            for _ in 0..count {
                exports.push(NetHandle::de(reader)?);
            }
        }

        if !handle.is_valid() {
            self.read_batch_content(handle, &mut content, protocols, bridge, plan)?;
            return self.receive_fragments(protocols, bridge, now, plan);
        }
        if self.broken.contains(&handle) {
            trace!("connection {}: skipping batch for broken object {}", self.connection_id, handle);
            return Ok(());
        }

        let unloaded: Vec<NetHandle> = exports
            .iter()
            .filter(|export| !bridge.is_reference_loaded(**export))
            .copied()
            .collect();
        if self.pending.contains(handle) || !unloaded.is_empty() {
            if !self.pending.contains(handle) {
                debug!(
                    "connection {}: queuing batch for {} until {} references load",
                    self.connection_id,
                    handle,
                    unloaded.len()
                );
            }
            let content = content.copy_bits(size)?;
            self.pending
                .push(handle, PendingChunk::Batch { content, exports }, unloaded, now);
            return Ok(());
        }

        self.read_batch_guarded(handle, &mut content, protocols, bridge, now, plan)
    }

    /// Reads a batch, turning local failures into a broken object.
    ///
    /// Nothing of a failed batch reaches the bridge: its work is staged
    /// apart from `plan` and the instances it created are released.
    fn read_batch_guarded(
        &mut self,
        handle: NetHandle,
        content: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let mark = self.created_in_batch.len();
        let mut staged = DispatchPlan::prepare();
        let result = self.read_batch_content(handle, content, protocols, bridge, &mut staged);
        let created = self.created_in_batch.split_off(mark);
        match result {
            Ok(()) => {
                plan.merge(staged);
                Ok(())
            }
            Err(error) if !error.is_fatal() => {
                for created in created.into_iter().rev() {
                    self.end_object(
                        created,
                        EndReplicationFlags {
                            tear_off: false,
                            destroy_instance: true,
                        },
                        bridge,
                        now,
                    );
                }
                self.mark_broken(handle, error);
                Ok(())
            }
            Err(error) => Err(error),
        }
    }

    fn read_batch_content(
        &mut self,
        handle: NetHandle,
        content: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let has_owner = content.read_bit()?;
        let _has_exports = content.read_bit()?;
        if has_owner {
            self.read_entry(handle, None, content, protocols, bridge, plan)?;
        }
        while content.read_bit()? {
            let sub_object = NetHandle::de(content)?;
            self.read_entry(sub_object, Some(handle), content, protocols, bridge, plan)?;
        }
        Ok(())
    }

    fn read_entry(
        &mut self,
        handle: NetHandle,
        root: Option<NetHandle>,
        content: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let destroy_header = content.read_bits(DESTROY_HEADER_BIT_COUNT)?;
        if content.read_bit()? {
            if content.read_bit()? {
                self.read_initial_state(handle, root, content, protocols, bridge, plan)?;
            } else {
                self.read_state_update(handle, content, plan)?;
            }
        }
        if content.read_bit()? {
            self.read_attachments(handle, content, plan)?;
        }

        if destroy_header & DESTROY_HEADER_END_REPLICATION != 0 {
            plan.add_end(
                handle,
                EndReplicationFlags {
                    tear_off: destroy_header & DESTROY_HEADER_TEAR_OFF != 0,
                    destroy_instance: destroy_header & DESTROY_HEADER_DESTROY_INSTANCE != 0,
                },
            );
        }
        Ok(())
    }

    fn read_initial_state(
        &mut self,
        handle: NetHandle,
        root: Option<NetHandle>,
        content: &mut BitReader,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let delta_enabled = content.read_bit()?;
        let new_baseline = if delta_enabled {
            content.read_bits(BASELINE_INDEX_BIT_COUNT)? as BaselineIndex
        } else {
            INVALID_BASELINE_INDEX
        };
        let raw_id = UnsignedVariableInteger::<7>::de(content)?.get();
        let protocol_id = ProtocolId::try_from(raw_id).map_err(|_| SerdeErr::ValueOutOfRange {
            value: raw_id,
            type_name: "protocol id",
        })?;

        // a resent creation for an object that already exists is a full update
        if self.infos.contains_key(&handle) {
            return self.read_full_update(handle, new_baseline, content, plan);
        }

        let Some(protocol) = protocols.get(protocol_id).map(Arc::clone) else {
            return Err(ReaderError::UnknownProtocol { handle, protocol_id });
        };
        let index = self.objects.create_remote_object(handle, &protocol, root)?;
        if let Err(error) = bridge.instantiate(handle, &protocol, root) {
            self.objects.remove_remote_object(handle)?;
            return Err(error.into());
        }
        self.created_in_batch.push(handle);
        debug!(
            "connection {}: replicating {} ({})",
            self.connection_id,
            handle,
            protocol.name()
        );

        let mut state = protocol.default_state();
        protocol.read_state(content, &mut state)?;
        let mut info = RemoteObjectInfo::new(handle, root, Arc::clone(&protocol), delta_enabled);
        info.store_baseline(new_baseline, state.clone());
        self.infos.insert(handle, info);
        if let Some(data) = self.objects.object_mut(index) {
            *data.state_mut() = state;
        }

        plan.add_state(handle, true, ChangeMask::full(protocol.change_mask_bit_count()));
        Ok(())
    }

    fn read_full_update(
        &mut self,
        handle: NetHandle,
        new_baseline: BaselineIndex,
        content: &mut BitReader,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let (protocol, before) = self.current_state(handle)?;
        let mut state = before.clone();
        let mask = protocol.read_state(content, &mut state)?;
        self.store_state(handle, new_baseline, &before, state, &mask, plan);
        Ok(())
    }

    fn read_state_update(
        &mut self,
        handle: NetHandle,
        content: &mut BitReader,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let (protocol, before) = self.current_state(handle)?;
        let mut state = before.clone();
        let delta_enabled = self.infos.get(&handle).is_some_and(|info| info.delta_enabled);

        let mut new_baseline = INVALID_BASELINE_INDEX;
        let mask = if delta_enabled {
            let baseline = content.read_bits(BASELINE_INDEX_BIT_COUNT)? as BaselineIndex;
            if baseline == INVALID_BASELINE_INDEX {
                new_baseline = content.read_bits(BASELINE_INDEX_BIT_COUNT)? as BaselineIndex;
                protocol.read_state(content, &mut state)?
            } else {
                if content.read_bit()? {
                    new_baseline = content.read_bits(BASELINE_INDEX_BIT_COUNT)? as BaselineIndex;
                }
                let baseline_state = self
                    .infos
                    .get(&handle)
                    .and_then(|info| info.baseline(baseline))
                    .ok_or(ReaderError::MissingBaseline { handle, baseline })?;
                protocol.read_delta(content, baseline_state, &mut state)?
            }
        } else {
            protocol.read_state(content, &mut state)?
        };

        self.store_state(handle, new_baseline, &before, state, &mask, plan);
        Ok(())
    }

    fn current_state(&self, handle: NetHandle) -> Result<(Arc<ReplicationProtocol>, ObjectState), ReaderError> {
        let info = self.infos.get(&handle).ok_or(ReaderError::UnknownObject { handle })?;
        let data = self
            .objects
            .object_by_handle(handle)
            .ok_or(ReaderError::UnknownObject { handle })?;
        Ok((Arc::clone(&info.protocol), data.state().clone()))
    }

    /// Keeps the newly read state and plans the members whose value
    /// actually changed.
    fn store_state(
        &mut self,
        handle: NetHandle,
        new_baseline: BaselineIndex,
        before: &ObjectState,
        state: ObjectState,
        mask: &ChangeMask,
        plan: &mut DispatchPlan,
    ) {
        let mut changed = ChangeMask::new(mask.bit_count());
        for bit in mask.iter_set_bits() {
            if before.get(bit as usize) != state.get(bit as usize) {
                changed.set_bit(bit);
            }
        }
        if let Some(info) = self.infos.get_mut(&handle) {
            info.store_baseline(new_baseline, state.clone());
        }
        if let Some(index) = self.objects.index_of(handle) {
            if let Some(data) = self.objects.object_mut(index) {
                *data.state_mut() = state;
            }
        }
        plan.add_state(handle, false, changed);
    }

    fn read_attachments(
        &mut self,
        handle: NetHandle,
        content: &mut BitReader,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        let count = UnsignedVariableInteger::<7>::de(content)?.get();
        let mut received: Vec<(Option<u16>, NetAttachment)> = Vec::new();
        for _ in 0..count {
            let sequence = if content.read_bit()? {
                Some(u16::de(content)?)
            } else {
                None
            };
            let attachment = NetAttachment::de(content, self.config.max_huge_object_bits)?;
            received.push((sequence, attachment));
        }

        let queue = if handle.is_valid() {
            let info = self
                .infos
                .get_mut(&handle)
                .ok_or(ReaderError::UnknownObject { handle })?;
            &mut info.attachments
        } else {
            &mut self.oob_attachments
        };
        for (sequence, attachment) in received {
            match sequence {
                Some(sequence) => queue.receive_reliable(sequence, attachment),
                None => queue.receive_unreliable(attachment),
            }
        }
        if handle.is_valid() {
            plan.add_attachments(handle);
        }
        Ok(())
    }

    /// Feeds ready out-of-band fragments to the assembler and reads every
    /// huge object they complete.
    fn receive_fragments(
        &mut self,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        for fragment in self.oob_attachments.take_all() {
            let Some(buffer) = self.huge_object.receive(&fragment)? else {
                continue;
            };
            debug!(
                "connection {}: reassembled a huge object of {} bits",
                self.connection_id,
                buffer.bit_length()
            );
            let mut reader = buffer.borrow();
            self.read_segment(&mut reader, protocols, bridge, now, true, plan)?;
        }
        Ok(())
    }

    // Queued batches

    fn process_queue(
        &mut self,
        handle: NetHandle,
        protocols: &Protocol,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
        plan: &mut DispatchPlan,
    ) -> Result<(), ReaderError> {
        loop {
            let Some(queue) = self.pending.get_mut(handle) else {
                return Ok(());
            };
            let unloaded: Vec<NetHandle> = match queue.chunks.front() {
                Some(PendingChunk::Batch { exports, .. }) => exports
                    .iter()
                    .filter(|export| !bridge.is_reference_loaded(**export))
                    .copied()
                    .collect(),
                Some(PendingChunk::EndReplication { .. }) => Vec::new(),
                None => {
                    self.pending.remove(handle);
                    return Ok(());
                }
            };
            if !unloaded.is_empty() {
                queue.pending_references = unloaded;
                self.note_queue_stalled(handle, now);
                return Ok(());
            }

            let Some(chunk) = queue.chunks.pop_front() else {
                continue;
            };
            queue.queued_at = now;
            queue.retries = 0;
            if queue.chunks.is_empty() {
                self.pending.remove(handle);
                debug!("connection {}: queued data for {} released", self.connection_id, handle);
            }

            match chunk {
                PendingChunk::Batch { content, .. } => {
                    if self.broken.contains(&handle) {
                        continue;
                    }
                    let mut reader = content.borrow();
                    self.read_batch_guarded(handle, &mut reader, protocols, bridge, now, plan)?;
                }
                PendingChunk::EndReplication { destroy_instance } => {
                    self.broken.remove(&handle);
                    if self.infos.contains_key(&handle) {
                        plan.add_end(
                            handle,
                            EndReplicationFlags {
                                tear_off: false,
                                destroy_instance,
                            },
                        );
                    }
                }
            }
        }
    }

    fn note_queue_stalled(&mut self, handle: NetHandle, now: Instant) {
        let Some(queue) = self.pending.get_mut(handle) else {
            return;
        };
        queue.retries += 1;
        let interval = self.config.queued_batch_timeout_warning_interval.max(1);
        if queue.retries % interval != 0
            || now.saturating_duration_since(queue.queued_at) < self.config.queued_batch_timeout
        {
            return;
        }
        let pending: Vec<NetHandle> = queue
            .pending_references
            .iter()
            .take(self.config.max_must_be_mapped_handles_reported)
            .copied()
            .collect();
        warn!(
            "connection {}: data for {} has waited {:?} on references {:?}",
            self.connection_id,
            handle,
            now.saturating_duration_since(queue.queued_at),
            pending
        );
        self.events.push(ReaderEvent::QueuedBatchTimeout { handle, pending });
    }

    // References

    /// Hands over reference members whose target became known, and only
    /// those members.
    fn apply_resolved_references(&mut self, bridge: &mut dyn ReplicationBridge, now: Instant) {
        if !self.references.has_unresolved() {
            return;
        }
        let resolved = {
            let objects = &self.objects;
            let resolver: &dyn ReplicationBridge = &*bridge;
            self.references
                .take_resolved(now, |target| objects.contains(target) || resolver.resolve_reference(target))
        };
        for (owner, bits) in resolved {
            let Some(data) = self.objects.object_by_handle(owner) else {
                continue;
            };
            let mut changed = ChangeMask::new(data.protocol().change_mask_bit_count());
            for bit in bits {
                changed.set_bit(bit);
            }
            trace!("connection {}: resolved references of {}", self.connection_id, owner);
            bridge.apply_state(StateUpdate {
                handle: owner,
                state: data.state(),
                changed: &changed,
                is_initial: false,
            });
        }
    }

    // Ending replication

    pub(super) fn sub_objects_of(&self, handle: NetHandle) -> Vec<NetHandle> {
        let Some(index) = self.objects.index_of(handle) else {
            return Vec::new();
        };
        self.objects
            .sub_objects(index)
            .iter()
            .filter_map(|sub_object| self.objects.handle_of(*sub_object))
            .collect()
    }

    pub(super) fn end_object(
        &mut self,
        handle: NetHandle,
        flags: EndReplicationFlags,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
    ) {
        if self.infos.remove(&handle).is_none() {
            return;
        }
        debug!(
            "connection {}: replication of {} ended (tear off: {}, destroy: {})",
            self.connection_id, handle, flags.tear_off, flags.destroy_instance
        );
        bridge.end_replication(handle, flags);
        self.pending.remove(handle);
        self.references.remove_owner(handle);
        self.references.on_target_ended(handle, now);
        if let Err(error) = self.objects.remove_remote_object(handle) {
            warn!("connection {}: {}", self.connection_id, error);
        }
        self.broken.remove(&handle);
    }

    fn mark_broken(&mut self, handle: NetHandle, error: ReaderError) {
        warn!(
            "connection {}: dropping data for {} until its replication ends: {}",
            self.connection_id, handle, error
        );
        self.broken.insert(handle);
        self.events.push(ReaderEvent::BrokenObject { handle, error });
    }

    /// Forgets every remote object, e.g. when the connection closes.
    /// Returns the objects that were still replicated.
    pub fn teardown(&mut self) -> Vec<NetHandle> {
        let handles = self.remote_handles();
        for handle in &handles {
            if let Err(error) = self.objects.remove_remote_object(*handle) {
                trace!("connection {}: {}", self.connection_id, error);
            }
        }
        self.infos.clear();
        self.broken.clear();
        self.pending.clear();
        self.references = ReferenceTracker::new(
            self.config.hot_resolving_lifetime,
            self.config.cold_resolving_retry_time,
        );
        self.created_in_batch.clear();
        self.oob_attachments = AttachmentReceiveQueue::new();
        self.huge_object = HugeObjectAssembler::new(self.config.max_huge_object_bits);
        handles
    }
}
