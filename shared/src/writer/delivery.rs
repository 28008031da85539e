use log::{trace, warn};

use crate::{
    registry::ObjectRegistry,
    types::{DeliveryStatus, InternalIndex, OOB_ATTACHMENT_INDEX},
    writer::{
        baselines::INVALID_BASELINE_INDEX, error::WriterError, record::RecordInfo,
        replication_writer::ReplicationWriter, state::ReplicatedObjectState,
    },
};

impl ReplicationWriter {
    /// Applies the outcome of the oldest packet still in flight. Statuses
    /// must be reported in the order the packets were written.
    pub fn process_delivery(&mut self, status: DeliveryStatus, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        let Some(records) = self.record.pop() else {
            warn!(
                "connection {}: delivery status {:?} reported with no packet in flight",
                self.connection_id, status
            );
            return Ok(());
        };
        for record in records {
            if record.index == OOB_ATTACHMENT_INDEX {
                self.handle_oob_record(status, &record, registry)?;
                continue;
            }
            match status {
                DeliveryStatus::Delivered => self.handle_delivered(&record, registry)?,
                DeliveryStatus::Lost => self.handle_lost(&record, registry)?,
                DeliveryStatus::Discarded => self.handle_discarded(&record),
            }
        }
        Ok(())
    }

    fn is_current(&self, record: &RecordInfo) -> bool {
        self.infos.get(record.index as usize).is_some_and(|info| {
            info.epoch == record.epoch && info.state != ReplicatedObjectState::Invalid
        })
    }

    fn handle_oob_record(
        &mut self,
        status: DeliveryStatus,
        record: &RecordInfo,
        registry: &mut ObjectRegistry,
    ) -> Result<(), WriterError> {
        match status {
            DeliveryStatus::Lost => {
                for sequence in &record.reliable_attachments {
                    self.oob_attachments.lost(*sequence);
                }
                return Ok(());
            }
            DeliveryStatus::Discarded => {
                self.discard_oob_record(record);
                return Ok(());
            }
            DeliveryStatus::Delivered => {}
        }

        for sequence in &record.reliable_attachments {
            self.oob_attachments.ack(*sequence);
            self.huge_objects.ack_fragment(*sequence);
        }
        for context in self.huge_objects.take_completed() {
            trace!(
                "connection {}: huge object rooted at index {} fully acknowledged",
                self.connection_id,
                context.root_index
            );
            for object_record in &context.records {
                self.handle_delivered(object_record, registry)?;
            }
        }
        Ok(())
    }

    /// A discarded fragment abandons its whole huge object: the remaining
    /// fragments are dropped unacknowledged and the object records are
    /// discarded with it.
    fn discard_oob_record(&mut self, record: &RecordInfo) {
        for sequence in &record.reliable_attachments {
            self.oob_attachments.discard(*sequence);
            let Some(context) = self.huge_objects.remove_with_fragment(*sequence) else {
                continue;
            };
            trace!(
                "connection {}: huge object rooted at index {} discarded",
                self.connection_id,
                context.root_index
            );
            for fragment in context.unacked_fragments() {
                self.oob_attachments.discard(*fragment);
            }
            for object_record in &context.records {
                self.handle_discarded(object_record);
            }
        }
    }

    // Delivered

    fn handle_delivered(&mut self, record: &RecordInfo, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        if !self.is_current(record) {
            return Ok(());
        }
        let index = record.index;
        let slot = index as usize;

        let info = &mut self.infos[slot];
        for sequence in &record.reliable_attachments {
            info.attachments.ack(*sequence);
        }
        if record.change_mask.is_some() {
            info.in_flight_state_count = info.in_flight_state_count.saturating_sub(1);
        }
        if record.new_baseline != INVALID_BASELINE_INDEX && info.pending_baseline == record.new_baseline {
            let previous = info.last_acked_baseline;
            info.last_acked_baseline = record.new_baseline;
            info.pending_baseline = INVALID_BASELINE_INDEX;
            if previous != INVALID_BASELINE_INDEX && previous != record.new_baseline {
                self.baselines.release(index, previous);
            }
        }
        self.acked_exports.extend(record.exports.iter().copied());

        match (record.state, self.infos[slot].state) {
            (WaitOnCreateConfirmation, WaitOnCreateConfirmation) => {
                self.on_creation_delivered(index, record, registry)?;
            }
            (WaitOnDestroyConfirmation, WaitOnDestroyConfirmation | CancelPendingDestroy) => {
                self.on_destroy_delivered(index, registry)?;
            }
            _ => {}
        }
        Ok(())
    }

    fn on_creation_delivered(
        &mut self,
        index: InternalIndex,
        record: &RecordInfo,
        registry: &mut ObjectRegistry,
    ) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        let slot = index as usize;
        let pending_destroy = self.objects_pending_destroy.get_bit(index);
        let info = &mut self.infos[slot];
        info.is_creation_confirmed = true;

        if info.is_destruction_info {
            info.set_state(PermanentlyDestroyed)?;
            if pending_destroy {
                self.stop_replication(index, registry)?;
            }
            return Ok(());
        }

        if record.wrote_tear_off {
            // the creation carried the final state
            info.set_state(PendingTearOff)?;
            info.set_state(Destroyed)?;
            return self.stop_replication(index, registry);
        }
        if info.tear_off {
            info.set_state(PendingTearOff)?;
            self.objects_pending_destroy.clear_bit(index);
            return Ok(());
        }

        info.set_state(Created)?;
        if pending_destroy {
            if self.needs_flush(index, registry) {
                self.infos[slot].set_state(WaitOnFlush)?;
            } else {
                self.set_pending_destroy_state(index, registry)?;
            }
        }
        Ok(())
    }

    fn on_destroy_delivered(&mut self, index: InternalIndex, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        let slot = index as usize;
        let cancelled = self.infos[slot].state == ReplicatedObjectState::CancelPendingDestroy;
        let info = &mut self.infos[slot];
        info.set_state(ReplicatedObjectState::Destroyed)?;
        if info.destroy_instance && info.handle.is_static() {
            self.destroyed_statics.insert(info.handle);
        }
        self.stop_replication(index, registry)?;

        if cancelled && self.objects_in_scope.get_bit(index) {
            let restart = registry
                .object(index)
                .is_some_and(|data| !data.is_pending_destroy() && !data.is_torn_off());
            if restart {
                trace!(
                    "connection {}: index {} came back into scope, replicating it again",
                    self.connection_id,
                    index
                );
                self.start_replication(index, registry)?;
            }
        }
        Ok(())
    }

    // Lost

    fn handle_lost(&mut self, record: &RecordInfo, registry: &mut ObjectRegistry) -> Result<(), WriterError> {
        use ReplicatedObjectState::*;

        if !self.is_current(record) {
            return Ok(());
        }
        let index = record.index;
        let slot = index as usize;

        let info = &mut self.infos[slot];
        for sequence in &record.reliable_attachments {
            info.attachments.lost(*sequence);
        }
        if record.change_mask.is_some() {
            info.in_flight_state_count = info.in_flight_state_count.saturating_sub(1);
        }
        self.release_pending_baseline(record);

        let pending_destroy = self.objects_pending_destroy.get_bit(index);
        match (record.state, self.infos[slot].state) {
            (WaitOnCreateConfirmation, WaitOnCreateConfirmation) => {
                self.infos[slot].set_state(PendingCreate)?;
                if pending_destroy && !self.infos[slot].tear_off {
                    return self.stop_replication(index, registry);
                }
            }
            (WaitOnDestroyConfirmation, WaitOnDestroyConfirmation) => {
                if record.wrote_tear_off {
                    self.infos[slot].set_state(PendingTearOff)?;
                } else {
                    self.set_pending_destroy_state(index, registry)?;
                }
            }
            (WaitOnDestroyConfirmation, CancelPendingDestroy) => {
                let info = &mut self.infos[slot];
                info.set_state(Created)?;
                info.has_dirty_change_mask = info.change_mask.is_any_set();
            }
            _ => {}
        }

        self.restore_lost_changes(record);

        let bump = self.config.lost_state_priority_bump;
        self.priorities[slot] += bump;
        if self.infos[slot].is_sub_object {
            let root = registry.root_of(index);
            self.priorities[root as usize] += bump;
            self.infos[root as usize].has_dirty_sub_objects = true;
        }
        Ok(())
    }

    /// Marks the members of a lost record dirty again, minus whatever a
    /// later packet still carries.
    fn restore_lost_changes(&mut self, record: &RecordInfo) {
        use ReplicatedObjectState::*;

        let Some(lost_mask) = &record.change_mask else {
            return;
        };
        let slot = record.index as usize;
        if !matches!(self.infos[slot].state, Created | PendingTearOff | WaitOnCreateConfirmation) {
            return;
        }
        let mut in_flight = self
            .record
            .in_flight_change_mask(record.index, record.epoch, lost_mask.bit_count());
        self.huge_objects
            .in_flight_change_mask(record.index, record.epoch, &mut in_flight);

        let mut restore = lost_mask.clone();
        restore.and_not(&in_flight);
        if restore.is_any_set() {
            self.infos[slot].mark_dirty(&restore);
        }
    }

    fn release_pending_baseline(&mut self, record: &RecordInfo) {
        let info = &mut self.infos[record.index as usize];
        if record.new_baseline != INVALID_BASELINE_INDEX && info.pending_baseline == record.new_baseline {
            info.pending_baseline = INVALID_BASELINE_INDEX;
            self.baselines.release(record.index, record.new_baseline);
        }
    }

    // Discarded

    fn handle_discarded(&mut self, record: &RecordInfo) {
        if !self.is_current(record) {
            return;
        }
        let info = &mut self.infos[record.index as usize];
        if record.change_mask.is_some() {
            info.in_flight_state_count = info.in_flight_state_count.saturating_sub(1);
        }
        self.release_pending_baseline(record);
    }
}
