use std::{collections::HashSet, sync::Arc};

use log::{debug, warn};
use netrep_serde::{BitCounter, BitWrite, BitWriter, Serde, UnsignedVariableInteger};

use crate::{
    attachment::AttachmentWritePlan,
    bit_array::ChangeMask,
    constants::{
        BATCH_COUNT_BIT_COUNT, DESTROY_HEADER_BIT_COUNT, DESTROY_HEADER_DESTROY_INSTANCE,
        DESTROY_HEADER_END_REPLICATION, DESTROY_HEADER_TEAR_OFF,
    },
    handle::NetHandle,
    protocol::{ObjectState, ReplicationProtocol},
    registry::{DependentObjectInfo, DependentSchedulingHint, ObjectRegistry},
    types::{InternalIndex, WriteResult, OOB_ATTACHMENT_INDEX},
    writer::{
        baselines::{next_baseline_index, BaselineIndex, BASELINE_INDEX_BIT_COUNT, INVALID_BASELINE_INDEX},
        error::WriterError,
        huge_object::{split_into_fragments, HugeObjectContext},
        record::RecordInfo,
        replication_writer::ReplicationWriter,
        scheduler::{order_with_dependents, select_candidates, SchedulingView},
        state::ReplicatedObjectState,
    },
};

/// Bookkeeping for the packet being written.
struct WriteContext {
    records: Vec<RecordInfo>,
    written: HashSet<InternalIndex>,
    destroy_count: u32,
    batch_count: u32,
    failed_small_objects: u32,
    wrote_oob: bool,
    has_more: bool,
    /// Bits free when the packet segment started.
    packet_capacity: u32,
}

impl WriteContext {
    fn new(packet_capacity: u32) -> Self {
        Self {
            records: Vec::new(),
            written: HashSet::new(),
            destroy_count: 0,
            batch_count: 0,
            failed_small_objects: 0,
            wrote_oob: false,
            has_more: false,
            packet_capacity,
        }
    }
}

enum BatchOutcome {
    NoData,
    Written,
    DidNotFit,
}

/// What will be written for one object of a batch, decided before anything
/// touches the wire.
struct EntryPlan {
    index: InternalIndex,
    handle: NetHandle,
    destroy_header: u64,
    write_state: bool,
    is_initial: bool,
    delta_enabled: bool,
    mask: ChangeMask,
    baseline: BaselineIndex,
    new_baseline: BaselineIndex,
    write_attachments: bool,
    next_state: Option<ReplicatedObjectState>,
}

struct BatchPlan {
    root: InternalIndex,
    handle: NetHandle,
    owner: Option<EntryPlan>,
    sub_objects: Vec<EntryPlan>,
    exports: Vec<NetHandle>,
}

impl BatchPlan {
    fn entries(&self) -> impl Iterator<Item = &EntryPlan> {
        self.owner.iter().chain(self.sub_objects.iter())
    }
}

struct WriterSchedulingView<'a> {
    writer: &'a ReplicationWriter,
    registry: &'a ObjectRegistry,
}

impl SchedulingView for WriterSchedulingView<'_> {
    fn dependents(&self, index: InternalIndex) -> Vec<DependentObjectInfo> {
        self.registry.dependents(index).to_vec()
    }

    fn has_work(&self, index: InternalIndex) -> bool {
        self.writer.has_work(index)
    }

    fn needs_initial_state(&self, index: InternalIndex) -> bool {
        self.writer.infos[index as usize].state == ReplicatedObjectState::PendingCreate
    }
}

impl ReplicationWriter {
    /// Writes one packet segment: the batch count, root destroys, then
    /// out-of-band fragments and object batches in priority order. Nothing
    /// is kept if nothing useful was written.
    pub fn write(&mut self, registry: &ObjectRegistry, writer: &mut BitWriter) -> Result<WriteResult, WriterError> {
        self.poll_pending_destroys(registry)?;

        let start = writer.bit_position();
        let mut context = WriteContext::new(writer.bits_free());

        let count_position = writer.bit_position();
        writer.write_bits(0, BATCH_COUNT_BIT_COUNT);
        if writer.overflowed() {
            writer.rollback(start);
            return Ok(WriteResult::NoData);
        }

        self.write_root_destroys(registry, writer, &mut context)?;
        if writer.overflowed() {
            writer.rollback(start);
            return Ok(WriteResult::NoData);
        }

        self.write_oob_attachments(writer, &mut context);

        if self.record.info_count() >= self.config.max_in_flight_record_infos {
            warn!(
                "connection {}: {} record infos in flight, not scheduling objects until acks arrive",
                self.connection_id,
                self.record.info_count()
            );
            context.has_more = true;
        } else {
            self.write_objects(registry, writer, &mut context)?;
            if !context.wrote_oob {
                // fragments of a huge object queued by this very write
                self.write_oob_attachments(writer, &mut context);
            }
        }

        if context.batch_count == 0 && context.destroy_count == 0 {
            writer.rollback(start);
            return Ok(WriteResult::NoData);
        }
        writer.write_bits_at(count_position, u64::from(context.batch_count), BATCH_COUNT_BIT_COUNT);
        self.record.push(context.records);

        if context.has_more {
            Ok(WriteResult::HasMoreData)
        } else {
            Ok(WriteResult::Ok)
        }
    }

    /// Whether a write would put anything on the wire.
    pub fn has_data_to_send(&self, registry: &ObjectRegistry) -> bool {
        if self.oob_attachments.has_unsent() {
            return true;
        }
        if self
            .objects_pending_destroy
            .iter_set_bits()
            .any(|index| self.is_root_destroy_ready(index, registry))
        {
            return true;
        }
        (1..self.infos.len() as InternalIndex)
            .any(|index| !self.infos[index as usize].is_sub_object && self.has_work(index))
    }

    // Root destroys

    fn write_root_destroys(
        &mut self,
        registry: &ObjectRegistry,
        writer: &mut BitWriter,
        context: &mut WriteContext,
    ) -> Result<(), WriterError> {
        let count_position = writer.bit_position();
        writer.write_bits(0, BATCH_COUNT_BIT_COUNT);
        if writer.overflowed() {
            return Ok(());
        }

        let ready: Vec<InternalIndex> = self
            .objects_pending_destroy
            .iter_set_bits()
            .filter(|index| self.is_root_destroy_ready(*index, registry))
            .collect();

        let mut count: u16 = 0;
        for index in ready {
            if count >= self.config.max_destroy_objects_per_frame {
                context.has_more = true;
                break;
            }
            let destroy_instance = registry
                .object(index)
                .is_some_and(|data| data.destroy_instance());
            let mark = writer.bit_position();
            self.infos[index as usize].handle.ser(writer);
            writer.write_bit(destroy_instance);
            if writer.overflowed() {
                writer.rollback(mark);
                context.has_more = true;
                break;
            }
            count += 1;
            self.commit_root_destroy(index, destroy_instance, registry, context)?;
        }

        writer.write_bits_at(count_position, u64::from(count), BATCH_COUNT_BIT_COUNT);
        context.destroy_count = u32::from(count);
        Ok(())
    }

    fn is_root_destroy_ready(&self, index: InternalIndex, registry: &ObjectRegistry) -> bool {
        use ReplicatedObjectState::*;

        let info = &self.infos[index as usize];
        if info.is_sub_object
            || info.state != PendingDestroy
            || !info.is_creation_confirmed
            || self.huge_objects.contains(index)
            || self.needs_flush(index, registry)
        {
            return false;
        }
        registry.sub_objects(index).iter().all(|sub_object| {
            !matches!(
                self.infos[*sub_object as usize].state,
                PendingCreate | WaitOnCreateConfirmation | Created | WaitOnFlush | CancelPendingDestroy | PendingTearOff
            )
        })
    }

    fn commit_root_destroy(
        &mut self,
        index: InternalIndex,
        destroy_instance: bool,
        registry: &ObjectRegistry,
        context: &mut WriteContext,
    ) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let info = &mut self.infos[index as usize];
        info.destroy_instance = destroy_instance;
        info.set_state(WaitOnDestroyConfirmation)?;
        let mut record = RecordInfo::new(index, info.epoch, info.state);
        record.wrote_destroy = true;
        context.records.push(record);

        for sub_object in registry.sub_objects(index) {
            let sub_info = &mut self.infos[*sub_object as usize];
            if matches!(sub_info.state, PendingDestroy | SubObjectPendingDestroy) {
                sub_info.destroy_instance = destroy_instance;
                sub_info.set_state(WaitOnDestroyConfirmation)?;
                let mut record = RecordInfo::new(*sub_object, sub_info.epoch, sub_info.state);
                record.wrote_destroy = true;
                context.records.push(record);
            }
        }
        self.priorities[index as usize] = 0.0;
        Ok(())
    }

    // Out-of-band attachments

    fn write_oob_attachments(&mut self, writer: &mut BitWriter, context: &mut WriteContext) {
        if !self.oob_attachments.has_unsent() {
            return;
        }
        let fragment_bits = self.config.huge_object_fragment_bits.max(1);
        let mut max_reliable = self
            .oob_attachments
            .unsent_reliable_count()
            .min((writer.bits_free() / fragment_bits).max(1) as usize);

        while max_reliable > 0 {
            let mark = writer.bit_position();
            let plan = self.write_oob_batch(writer, max_reliable);
            if !writer.overflowed() {
                self.oob_attachments.commit(&plan);
                let mut record = RecordInfo::new(OOB_ATTACHMENT_INDEX, 0, ReplicatedObjectState::Invalid);
                record.reliable_attachments = plan.reliable;
                context.records.push(record);
                context.batch_count += 1;
                context.wrote_oob = true;
                if self.oob_attachments.has_unsent() {
                    context.has_more = true;
                }
                return;
            }
            writer.rollback(mark);
            max_reliable -= 1;
        }
        context.has_more = true;
    }

    /// Out-of-band batches carry whole fragments, so their size field has
    /// the huge-object width.
    fn write_oob_batch(&self, writer: &mut BitWriter, max_reliable: usize) -> AttachmentWritePlan {
        let size_bit_count = self.config.huge_object_batch_size_bit_count;

        // not a destruction info
        writer.write_bit(false);
        NetHandle::INVALID.ser(writer);
        let size_position = writer.bit_position();
        writer.write_bits(0, size_bit_count);
        let content_start = writer.bit_position();

        // has owner data, no exports
        writer.write_bit(true);
        writer.write_bit(false);
        // owner entry: no destroy header, no state, attachments only
        writer.write_bits(0, DESTROY_HEADER_BIT_COUNT);
        writer.write_bit(false);
        writer.write_bit(true);
        let plan = self.oob_attachments.write(writer, max_reliable);
        // no subobjects
        writer.write_bit(false);

        let content_bits = writer.bit_position() - content_start;
        if u64::from(content_bits) > max_value(size_bit_count) {
            writer.force_overflow();
        }
        writer.write_bits_at(size_position, u64::from(content_bits), size_bit_count);
        plan
    }

    // Objects

    fn schedule(&mut self, registry: &ObjectRegistry) -> Vec<InternalIndex> {
        let mut candidates: Vec<(InternalIndex, f32)> = (1..self.infos.len() as InternalIndex)
            .filter(|index| {
                let info = &self.infos[*index as usize];
                !info.is_sub_object && info.state.can_send() && self.has_work(*index)
            })
            .map(|index| (index, self.priorities[index as usize]))
            .collect();
        select_candidates(
            &mut candidates,
            self.config.scheduling_threshold_priority,
            self.config.partial_sort_object_count,
        );

        let ordered = {
            let view = WriterSchedulingView {
                writer: self,
                registry,
            };
            order_with_dependents(&view, &candidates)
        };
        for (index, priority) in &ordered {
            let slot = *index as usize;
            self.priorities[slot] = self.priorities[slot].max(*priority);
        }
        ordered.into_iter().map(|(index, _)| index).collect()
    }

    fn write_objects(
        &mut self,
        registry: &ObjectRegistry,
        writer: &mut BitWriter,
        context: &mut WriteContext,
    ) -> Result<(), WriterError> {
        let scheduled = self.schedule(registry);
        let max_batch_count = u32::from(u16::MAX);

        for index in scheduled {
            if context.batch_count >= max_batch_count || writer.bits_free() < self.config.small_object_bit_threshold {
                context.has_more = true;
                break;
            }
            if context.written.contains(&index) {
                continue;
            }
            if !self.can_send_object(index, registry, context) {
                self.note_cannot_send(index);
                context.has_more = true;
                continue;
            }

            let bits_free = writer.bits_free();
            let outcome = if self.infos[index as usize].is_destruction_info {
                self.write_destruction_info(index, registry, writer, context)?
            } else {
                self.write_object_batch(index, registry, writer, context)?
            };
            if let BatchOutcome::DidNotFit = outcome {
                context.has_more = true;
                if bits_free < self.config.small_object_bit_threshold {
                    break;
                }
                if bits_free >= self.config.split_threshold_bits
                    && self.huge_objects.can_enqueue()
                    && self.try_send_huge_object(index, registry, context)?
                {
                    continue;
                }
                context.failed_small_objects += 1;
                if context.failed_small_objects > self.config.max_failed_small_object_count {
                    break;
                }
            }
        }
        Ok(())
    }

    fn can_send_object(&self, index: InternalIndex, registry: &ObjectRegistry, context: &WriteContext) -> bool {
        use ReplicatedObjectState::*;

        let info = &self.infos[index as usize];
        if !info.state.can_send() || self.huge_objects.contains(index) {
            return false;
        }
        if info.is_destruction_info {
            return info.state == PendingCreate;
        }
        for sub_object in registry.sub_objects(index) {
            let sub_info = &self.infos[*sub_object as usize];
            if sub_info.state == WaitOnCreateConfirmation
                && (sub_info.has_dirty_change_mask || sub_info.attachments.has_unsent())
            {
                return false;
            }
        }
        for dependent in registry.dependents(index) {
            let dependent_state = self.infos[dependent.index as usize].state;
            let written = context.written.contains(&dependent.index);
            let blocked = match dependent.hint {
                DependentSchedulingHint::Default => false,
                DependentSchedulingHint::ScheduleBeforeParent => self.has_work(dependent.index) && !written,
                DependentSchedulingHint::ScheduleBeforeParentIfInitialState => {
                    matches!(dependent_state, PendingCreate | WaitOnCreateConfirmation) && !written
                }
            };
            if blocked {
                return false;
            }
        }
        true
    }

    fn note_cannot_send(&mut self, index: InternalIndex) {
        let interval = self.config.cannot_send_warning_interval.max(1);
        let info = &mut self.infos[index as usize];
        info.cannot_send_count += 1;
        if info.cannot_send_count % interval == 0 {
            warn!(
                "connection {}: object {} skipped {} times, waiting on its subobjects or dependents",
                self.connection_id, info.handle, info.cannot_send_count
            );
        }
    }

    fn write_destruction_info(
        &mut self,
        index: InternalIndex,
        registry: &ObjectRegistry,
        writer: &mut BitWriter,
        context: &mut WriteContext,
    ) -> Result<BatchOutcome, WriterError> {
        let Some(target) = registry.object(index).and_then(|data| data.destruction_info_target()) else {
            return Ok(BatchOutcome::NoData);
        };
        let mark = writer.bit_position();
        writer.write_bit(true);
        target.ser(writer);
        if writer.overflowed() {
            writer.rollback(mark);
            return Ok(BatchOutcome::DidNotFit);
        }

        let info = &mut self.infos[index as usize];
        info.set_state(ReplicatedObjectState::WaitOnCreateConfirmation)?;
        context.records.push(RecordInfo::new(index, info.epoch, info.state));
        context.written.insert(index);
        context.batch_count += 1;
        self.priorities[index as usize] = 0.0;
        Ok(BatchOutcome::Written)
    }

    fn write_object_batch(
        &mut self,
        index: InternalIndex,
        registry: &ObjectRegistry,
        writer: &mut BitWriter,
        context: &mut WriteContext,
    ) -> Result<BatchOutcome, WriterError> {
        let Some(plan) = self.prepare_batch(index, registry) else {
            return Ok(BatchOutcome::NoData);
        };
        let size_bit_count = self.config.batch_size_bit_count;
        let mut counter = writer.counter();
        let content_bits = self.count_batch(&plan, registry, &mut counter, size_bit_count);
        if counter.overflowed() || u64::from(content_bits) > max_value(size_bit_count) {
            return Ok(BatchOutcome::DidNotFit);
        }

        let mark = writer.bit_position();
        let (attachment_plans, _) = self.serialize_batch(&plan, registry, writer, size_bit_count);
        if writer.overflowed() {
            writer.rollback(mark);
            return Ok(BatchOutcome::DidNotFit);
        }

        for entry in plan.entries() {
            context.written.insert(entry.index);
        }
        let records = self.commit_batch(plan, attachment_plans, registry)?;
        context.records.extend(records);
        context.batch_count += 1;
        Ok(BatchOutcome::Written)
    }

    /// Serializes an object that does not fit a packet into a scratch
    /// buffer and queues it as out-of-band fragments. Returns false if the
    /// object would fit an empty packet after all.
    fn try_send_huge_object(
        &mut self,
        index: InternalIndex,
        registry: &ObjectRegistry,
        context: &mut WriteContext,
    ) -> Result<bool, WriterError> {
        let Some(plan) = self.prepare_batch(index, registry) else {
            return Ok(false);
        };
        let max_bits = self.config.max_huge_object_bits;
        let size_bit_count = self.config.huge_object_batch_size_bit_count;

        // batch count and destroy count of the reassembled segment
        let mut counter = BitCounter::new(0, 2 * BATCH_COUNT_BIT_COUNT, max_bits);
        let content_bits = self.count_batch(&plan, registry, &mut counter, size_bit_count);
        if counter.overflowed() {
            return Err(WriterError::HugeObjectTooLarge {
                handle: plan.handle,
                max_bits,
            });
        }
        let max_content_bits = max_value(size_bit_count);
        if u64::from(content_bits) > max_content_bits {
            return Err(WriterError::ObjectStateTooLarge {
                handle: plan.handle,
                bits: content_bits,
                max_bits: max_content_bits as u32,
            });
        }
        let fits_a_packet = u64::from(content_bits) <= max_value(self.config.batch_size_bit_count)
            && counter.bits_needed() <= context.packet_capacity;
        if fits_a_packet {
            return Ok(false);
        }

        let mut buffer = BitWriter::with_max_bits(max_bits);
        buffer.write_bits(1, BATCH_COUNT_BIT_COUNT);
        buffer.write_bits(0, BATCH_COUNT_BIT_COUNT);
        let (attachment_plans, _) = self.serialize_batch(&plan, registry, &mut buffer, size_bit_count);

        for entry in plan.entries() {
            context.written.insert(entry.index);
        }
        let handle = plan.handle;
        let records = self.commit_batch(plan, attachment_plans, registry)?;
        let mut fragments = Vec::new();
        for fragment in split_into_fragments(&buffer, self.config.huge_object_fragment_bits) {
            if let Some(sequence) = self.oob_attachments.enqueue(true, fragment) {
                fragments.push(sequence);
            }
        }
        debug!(
            "connection {}: object {} sent as a huge object of {} bits in {} fragments",
            self.connection_id,
            handle,
            buffer.bit_position(),
            fragments.len()
        );
        self.huge_objects
            .enqueue(HugeObjectContext::new(index, records, fragments));
        Ok(true)
    }

    fn prepare_batch(&self, root: InternalIndex, registry: &ObjectRegistry) -> Option<BatchPlan> {
        let handle = self.infos[root as usize].handle;
        let owner = self.prepare_entry(root, registry);
        let sub_objects: Vec<EntryPlan> = registry
            .sub_objects(root)
            .iter()
            .filter_map(|sub_object| self.prepare_entry(*sub_object, registry))
            .collect();
        if owner.is_none() && sub_objects.is_empty() {
            return None;
        }

        let mut exports = Vec::new();
        let mut plan = BatchPlan {
            root,
            handle,
            owner,
            sub_objects,
            exports: Vec::new(),
        };
        for entry in plan.entries().filter(|entry| entry.write_state) {
            let Some(data) = registry.object(entry.index) else {
                continue;
            };
            for reference in data.protocol().references(data.state(), &entry.mask) {
                if reference.must_be_mapped
                    && reference.handle.is_valid()
                    && !self.acked_exports.contains(&reference.handle)
                    && !exports.contains(&reference.handle)
                {
                    exports.push(reference.handle);
                }
            }
        }
        plan.exports = exports;
        Some(plan)
    }

    fn prepare_entry(&self, index: InternalIndex, registry: &ObjectRegistry) -> Option<EntryPlan> {
        use ReplicatedObjectState::*;

        let info = &self.infos[index as usize];
        let data = registry.object(index)?;
        let bit_count = data.protocol().change_mask_bit_count();
        let mut entry = EntryPlan {
            index,
            handle: info.handle,
            destroy_header: 0,
            write_state: false,
            is_initial: false,
            delta_enabled: info.delta_enabled,
            mask: ChangeMask::new(bit_count),
            baseline: INVALID_BASELINE_INDEX,
            new_baseline: INVALID_BASELINE_INDEX,
            write_attachments: false,
            next_state: None,
        };

        match info.state {
            PendingCreate => {
                entry.write_state = true;
                entry.is_initial = true;
                entry.mask = ChangeMask::full(bit_count);
                if info.delta_enabled && self.baselines.can_create() {
                    entry.new_baseline = 0;
                }
                if info.tear_off {
                    entry.destroy_header = DESTROY_HEADER_TEAR_OFF | DESTROY_HEADER_END_REPLICATION;
                }
                entry.next_state = Some(WaitOnCreateConfirmation);
            }
            Created => {
                if info.has_dirty_change_mask {
                    entry.write_state = true;
                    self.plan_delta(index, &mut entry);
                }
            }
            PendingTearOff => {
                entry.write_state = true;
                entry.destroy_header = DESTROY_HEADER_TEAR_OFF | DESTROY_HEADER_END_REPLICATION;
                self.plan_delta(index, &mut entry);
                entry.next_state = Some(WaitOnDestroyConfirmation);
            }
            SubObjectPendingDestroy if info.is_sub_object => {
                entry.destroy_header = DESTROY_HEADER_END_REPLICATION;
                if data.destroy_instance() {
                    entry.destroy_header |= DESTROY_HEADER_DESTROY_INSTANCE;
                }
                entry.next_state = Some(WaitOnDestroyConfirmation);
            }
            WaitOnFlush => {}
            _ => return None,
        }

        entry.write_attachments =
            matches!(info.state, PendingCreate | Created | PendingTearOff | WaitOnFlush) && info.attachments.has_unsent();
        if !entry.write_state && entry.destroy_header == 0 && !entry.write_attachments {
            return None;
        }
        Some(entry)
    }

    /// Picks the baseline to delta against and whether to request a new one.
    /// A new baseline carries every member so both sides store the same
    /// snapshot.
    fn plan_delta(&self, index: InternalIndex, entry: &mut EntryPlan) {
        let info = &self.infos[index as usize];
        entry.mask = info.change_mask.clone();
        if !info.delta_enabled {
            return;
        }
        let acked = info.last_acked_baseline;
        if acked != INVALID_BASELINE_INDEX && self.baselines.get(index, acked).is_some() {
            entry.baseline = acked;
        }
        if info.pending_baseline == INVALID_BASELINE_INDEX && self.baselines.can_create() {
            entry.new_baseline = next_baseline_index(acked);
            entry.mask.set_all();
        }
    }

    /// Writes a batch. Returns the attachment plans of its entries, owner
    /// first, and the bits the size field covers. The caller checks both
    /// against its limits.
    fn serialize_batch(
        &self,
        plan: &BatchPlan,
        registry: &ObjectRegistry,
        writer: &mut BitWriter,
        size_bit_count: u32,
    ) -> (Vec<AttachmentWritePlan>, u32) {
        // not a destruction info
        writer.write_bit(false);
        plan.handle.ser(writer);
        let size_position = writer.bit_position();
        writer.write_bits(0, size_bit_count);
        let content_start = writer.bit_position();

        let attachment_plans = self.write_batch_content(plan, registry, writer);
        let content_bits = writer.bit_position() - content_start;
        write_exports(&plan.exports, writer);
        if !writer.overflowed() && u64::from(content_bits) <= max_value(size_bit_count) {
            writer.write_bits_at(size_position, u64::from(content_bits), size_bit_count);
        }
        (attachment_plans, content_bits)
    }

    /// Runs the batch through `counter` instead of a packet. Returns the
    /// bits its size field would hold.
    fn count_batch(
        &self,
        plan: &BatchPlan,
        registry: &ObjectRegistry,
        counter: &mut BitCounter,
        size_bit_count: u32,
    ) -> u32 {
        counter.write_bit(false);
        plan.handle.ser(counter);
        counter.write_bits(0, size_bit_count);
        let content_start = counter.bits_needed();
        self.write_batch_content(plan, registry, counter);
        let content_bits = counter.bits_needed() - content_start;
        write_exports(&plan.exports, counter);
        content_bits
    }

    fn write_batch_content(
        &self,
        plan: &BatchPlan,
        registry: &ObjectRegistry,
        writer: &mut dyn BitWrite,
    ) -> Vec<AttachmentWritePlan> {
        writer.write_bit(plan.owner.is_some());
        writer.write_bit(!plan.exports.is_empty());

        let mut attachment_plans = Vec::new();
        if let Some(owner) = &plan.owner {
            attachment_plans.push(self.write_entry(owner, registry, writer));
        }
        for sub_object in &plan.sub_objects {
            writer.write_bit(true);
            sub_object.handle.ser(writer);
            attachment_plans.push(self.write_entry(sub_object, registry, writer));
        }
        writer.write_bit(false);
        attachment_plans
    }

    fn write_entry(&self, entry: &EntryPlan, registry: &ObjectRegistry, writer: &mut dyn BitWrite) -> AttachmentWritePlan {
        writer.write_bits(entry.destroy_header, DESTROY_HEADER_BIT_COUNT);
        writer.write_bit(entry.write_state);
        if entry.write_state {
            if let Some(data) = registry.object(entry.index) {
                self.write_entry_state(entry, data.protocol(), data.state(), writer);
            }
        }

        writer.write_bit(entry.write_attachments);
        if !entry.write_attachments {
            return AttachmentWritePlan::default();
        }
        self.infos[entry.index as usize]
            .attachments
            .write(writer, usize::MAX)
    }

    fn write_entry_state(
        &self,
        entry: &EntryPlan,
        protocol: &ReplicationProtocol,
        state: &ObjectState,
        writer: &mut dyn BitWrite,
    ) {
        writer.write_bit(entry.is_initial);
        if entry.is_initial {
            writer.write_bit(entry.delta_enabled);
            if entry.delta_enabled {
                writer.write_bits(u64::from(entry.new_baseline), BASELINE_INDEX_BIT_COUNT);
            }
            UnsignedVariableInteger::<7>::new(protocol.id()).ser(writer);
            protocol.write_state(state, &entry.mask, writer);
            return;
        }
        if !entry.delta_enabled {
            protocol.write_state(state, &entry.mask, writer);
            return;
        }

        writer.write_bits(u64::from(entry.baseline), BASELINE_INDEX_BIT_COUNT);
        let baseline_state = self.baselines.get(entry.index, entry.baseline);
        match baseline_state {
            Some(baseline_state) if entry.baseline != INVALID_BASELINE_INDEX => {
                let is_new_baseline = entry.new_baseline != INVALID_BASELINE_INDEX;
                writer.write_bit(is_new_baseline);
                if is_new_baseline {
                    writer.write_bits(u64::from(entry.new_baseline), BASELINE_INDEX_BIT_COUNT);
                }
                protocol.write_delta(state, baseline_state, &entry.mask, writer);
            }
            _ => {
                writer.write_bits(u64::from(entry.new_baseline), BASELINE_INDEX_BIT_COUNT);
                protocol.write_state(state, &entry.mask, writer);
            }
        }
    }

    /// Applies a batch that made it onto the wire: attachments move in
    /// flight, baselines are stored, states advance.
    fn commit_batch(
        &mut self,
        plan: BatchPlan,
        attachment_plans: Vec<AttachmentWritePlan>,
        registry: &ObjectRegistry,
    ) -> Result<Vec<RecordInfo>, WriterError> {
        let mut records = Vec::new();
        let root = plan.root;
        let exports = plan.exports;
        let entries = plan.owner.into_iter().chain(plan.sub_objects);

        for (entry, attachments) in entries.zip(attachment_plans) {
            let index = entry.index;
            let info = &mut self.infos[index as usize];
            info.attachments.commit(&attachments);

            let mut record = RecordInfo::new(index, info.epoch, info.state);
            record.reliable_attachments = attachments.reliable;
            if entry.write_state {
                if entry.new_baseline != INVALID_BASELINE_INDEX {
                    if let Some(data) = registry.object(index) {
                        self.baselines
                            .create(index, entry.new_baseline, Arc::new(data.state().clone()));
                        info.pending_baseline = entry.new_baseline;
                    }
                }
                record.new_baseline = entry.new_baseline;
                record.change_mask = Some(entry.mask);
                info.clear_dirty();
                info.in_flight_state_count += 1;
            }
            if let Some(next_state) = entry.next_state {
                info.set_state(next_state)?;
            }
            if entry.destroy_header & DESTROY_HEADER_END_REPLICATION != 0 {
                info.destroy_instance = entry.destroy_header & DESTROY_HEADER_DESTROY_INSTANCE != 0;
            }
            record.state = info.state;
            record.wrote_destroy = entry.destroy_header & DESTROY_HEADER_END_REPLICATION != 0;
            record.wrote_tear_off = entry.destroy_header & DESTROY_HEADER_TEAR_OFF != 0;
            info.cannot_send_count = 0;
            records.push(record);
        }
        if let Some(first) = records.first_mut() {
            first.exports = exports;
        }

        let sub_objects_with_work = registry
            .sub_objects(root)
            .iter()
            .any(|sub_object| self.has_work(*sub_object));
        self.infos[root as usize].has_dirty_sub_objects = sub_objects_with_work;
        self.priorities[root as usize] = 0.0;
        Ok(records)
    }
}

fn write_exports(exports: &[NetHandle], writer: &mut dyn BitWrite) {
    if exports.is_empty() {
        return;
    }
    (exports.len() as u16).ser(writer);
    for export in exports {
        export.ser(writer);
    }
}

fn max_value(bit_count: u32) -> u64 {
    if bit_count >= 64 {
        u64::MAX
    } else {
        (1u64 << bit_count) - 1
    }
}
