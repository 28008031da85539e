use std::{sync::Arc, time::Instant};

use crate::{
    bit_array::ChangeMask,
    bridge::{EndReplicationFlags, ReplicationBridge, StateUpdate},
    handle::NetHandle,
    reader::replication_reader::ReplicationReader,
};

struct ReceivedState {
    handle: NetHandle,
    is_initial: bool,
    changed: ChangeMask,
}

/// Everything one packet (or one round of queued batches) asked of the
/// bridge, collected while reading and executed afterwards.
///
/// Execution runs in two steps. `apply` hands over state, root before
/// subobjects in read order. `finalize` delivers the remaining attachments,
/// then destruction infos, then ends replication, so an object's final
/// state is always observed before it goes away.
#[derive(Default)]
pub struct DispatchPlan {
    states: Vec<ReceivedState>,
    attachments: Vec<NetHandle>,
    destruction_infos: Vec<NetHandle>,
    ends: Vec<(NetHandle, EndReplicationFlags)>,
}

impl DispatchPlan {
    pub fn prepare() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
            && self.attachments.is_empty()
            && self.destruction_infos.is_empty()
            && self.ends.is_empty()
    }

    pub fn add_state(&mut self, handle: NetHandle, is_initial: bool, changed: ChangeMask) {
        if let Some(received) = self.states.iter_mut().find(|received| received.handle == handle) {
            received.is_initial |= is_initial;
            received.changed.combine(&changed);
            return;
        }
        self.states.push(ReceivedState {
            handle,
            is_initial,
            changed,
        });
    }

    pub fn add_attachments(&mut self, handle: NetHandle) {
        if !self.attachments.contains(&handle) {
            self.attachments.push(handle);
        }
    }

    pub fn add_destruction_info(&mut self, handle: NetHandle) {
        self.destruction_infos.push(handle);
    }

    pub fn add_end(&mut self, handle: NetHandle, flags: EndReplicationFlags) {
        if !self.ends.iter().any(|(ending, _)| *ending == handle) {
            self.ends.push((handle, flags));
        }
    }

    /// Folds a plan read later into this one.
    pub fn merge(&mut self, other: DispatchPlan) {
        for received in other.states {
            self.add_state(received.handle, received.is_initial, received.changed);
        }
        for handle in other.attachments {
            self.add_attachments(handle);
        }
        self.destruction_infos.extend(other.destruction_infos);
        for (handle, flags) in other.ends {
            self.add_end(handle, flags);
        }
    }

    pub fn apply(&self, reader: &mut ReplicationReader, bridge: &mut dyn ReplicationBridge, now: Instant) {
        for received in &self.states {
            let handle = received.handle;
            let Some(info) = reader.infos.get_mut(&handle) else {
                continue;
            };
            if !received.is_initial && reader.config.execute_reliable_attachments_before_state {
                for attachment in info.attachments.take_reliable() {
                    bridge.on_attachment(handle, attachment);
                }
            }
            let protocol = Arc::clone(&info.protocol);
            let Some(data) = reader.objects.object_by_handle(handle) else {
                continue;
            };

            let held_back = {
                let objects = &reader.objects;
                let resolver: &dyn ReplicationBridge = &*bridge;
                reader.references.update(handle, &protocol, data.state(), &received.changed, now, |target| {
                    objects.contains(target) || resolver.resolve_reference(target)
                })
            };
            let mut changed = received.changed.clone();
            changed.and_not(&held_back);
            if received.is_initial || changed.is_any_set() {
                bridge.apply_state(StateUpdate {
                    handle,
                    state: data.state(),
                    changed: &changed,
                    is_initial: received.is_initial,
                });
            }
        }
    }

    pub fn finalize(&self, reader: &mut ReplicationReader, bridge: &mut dyn ReplicationBridge, now: Instant) {
        for handle in &self.attachments {
            let Some(info) = reader.infos.get_mut(handle) else {
                continue;
            };
            for attachment in info.attachments.take_all() {
                bridge.on_attachment(*handle, attachment);
            }
        }

        for target in &self.destruction_infos {
            bridge.on_destruction_info(*target);
        }

        for (handle, flags) in &self.ends {
            for sub_object in reader.sub_objects_of(*handle) {
                reader.end_object(sub_object, *flags, bridge, now);
            }
            reader.end_object(*handle, *flags, bridge, now);
        }
    }
}
