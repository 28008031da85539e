use std::{collections::HashMap, sync::Arc};

use log::{debug, trace};

use crate::{
    bit_array::{BitArray, ChangeMask},
    config::ReplicationConfig,
    handle::{HandleAllocator, HandleKind, NetHandle},
    protocol::{MemberValue, ObjectState, ReplicationProtocol},
    registry::{
        error::RegistryError,
        object_data::{
            DependentObjectInfo, DependentSchedulingHint, DestroyFlags, ReplicatedObjectData,
            SubObjectCondition,
        },
    },
    types::InternalIndex,
};

/// Implemented by everything holding arrays indexed by internal index, so
/// they can grow in lockstep with the registry.
pub trait MaxInternalIndexListener {
    fn on_max_internal_index_increased(&mut self, new_max_internal_index: InternalIndex);
}

/// Owns object identity: handles, internal indices, the subobject and
/// dependent-object graphs, and the global scope and dirty bitsets.
pub struct ObjectRegistry {
    max_object_count: u32,
    growth: u32,
    objects: Vec<Option<ReplicatedObjectData>>,
    handle_to_index: HashMap<NetHandle, InternalIndex>,
    free_indices: Vec<InternalIndex>,
    next_fresh_index: InternalIndex,
    max_internal_index: InternalIndex,
    scopable: BitArray,
    dirty: BitArray,
    pending_destroy: BitArray,
    torn_off: Vec<InternalIndex>,
    destruction_infos: HashMap<NetHandle, InternalIndex>,
    handle_allocator: HandleAllocator,
    pending_capacity_increase: Option<InternalIndex>,
}

impl ObjectRegistry {
    pub fn new(replication_system_id: u32, config: &ReplicationConfig) -> Self {
        let growth = config.internal_index_growth.max(2);
        let max_internal_index = growth.min(config.max_object_count);
        let mut objects = Vec::new();
        objects.resize_with(max_internal_index as usize, || None);
        Self {
            max_object_count: config.max_object_count,
            growth,
            objects,
            handle_to_index: HashMap::new(),
            free_indices: Vec::new(),
            next_fresh_index: 1,
            max_internal_index,
            scopable: BitArray::new(max_internal_index),
            dirty: BitArray::new(max_internal_index),
            pending_destroy: BitArray::new(max_internal_index),
            torn_off: Vec::new(),
            destruction_infos: HashMap::new(),
            handle_allocator: HandleAllocator::new(replication_system_id),
            pending_capacity_increase: None,
        }
    }

    // Creation

    /// Registers a new host object. `state` defaults to the protocol's
    /// default state.
    pub fn create_object(
        &mut self,
        protocol: &Arc<ReplicationProtocol>,
        state: Option<ObjectState>,
        kind: HandleKind,
    ) -> Result<NetHandle, RegistryError> {
        let handle = self.handle_allocator.allocate(kind);
        let state = state.unwrap_or_else(|| protocol.default_state());
        let index = self.insert(handle, Arc::clone(protocol), state)?;
        self.scopable.set_bit(index);
        debug!("created object {} at index {}", handle, index);
        Ok(handle)
    }

    /// Registers a mirror of an object replicated from the remote peer.
    pub fn create_remote_object(
        &mut self,
        handle: NetHandle,
        protocol: &Arc<ReplicationProtocol>,
        root: Option<NetHandle>,
    ) -> Result<InternalIndex, RegistryError> {
        let root_index = match root {
            Some(root) => Some(self.try_index_of(root)?),
            None => None,
        };
        let index = self.insert(handle, Arc::clone(protocol), protocol.default_state())?;
        if let Some(data) = self.objects[index as usize].as_mut() {
            data.is_remote = true;
        }
        if let Some(root_index) = root_index {
            self.link_sub_object(root_index, root_index, index, None);
        }
        Ok(index)
    }

    fn insert(
        &mut self,
        handle: NetHandle,
        protocol: Arc<ReplicationProtocol>,
        state: ObjectState,
    ) -> Result<InternalIndex, RegistryError> {
        if self.handle_to_index.contains_key(&handle) {
            return Err(RegistryError::HandleAlreadyRegistered { handle });
        }
        let index = self.allocate_index()?;
        self.objects[index as usize] = Some(ReplicatedObjectData::new(handle, protocol, state));
        self.handle_to_index.insert(handle, index);
        Ok(index)
    }

    fn allocate_index(&mut self) -> Result<InternalIndex, RegistryError> {
        if let Some(index) = self.free_indices.pop() {
            return Ok(index);
        }
        if self.next_fresh_index >= self.max_internal_index {
            self.grow()?;
        }
        let index = self.next_fresh_index;
        self.next_fresh_index += 1;
        Ok(index)
    }

    fn grow(&mut self) -> Result<(), RegistryError> {
        if self.max_internal_index >= self.max_object_count {
            return Err(RegistryError::IndexSpaceExhausted {
                max_object_count: self.max_object_count,
            });
        }
        let new_max = self
            .max_internal_index
            .saturating_add(self.growth)
            .min(self.max_object_count);
        debug!(
            "growing internal index space from {} to {}",
            self.max_internal_index, new_max
        );
        self.objects.resize_with(new_max as usize, || None);
        self.scopable.resize(new_max);
        self.dirty.resize(new_max);
        self.pending_destroy.resize(new_max);
        self.max_internal_index = new_max;
        self.pending_capacity_increase = Some(new_max);
        Ok(())
    }

    /// New capacity to broadcast to per-connection listeners, if the index
    /// space grew since the last call.
    pub fn take_capacity_increase(&mut self) -> Option<InternalIndex> {
        self.pending_capacity_increase.take()
    }

    pub fn max_internal_index(&self) -> InternalIndex {
        self.max_internal_index
    }

    // Destruction

    /// Stops replicating an object. The index is only released once every
    /// connection has let go of it and no subobjects remain attached.
    ///
    /// Returns the handle of a destruction-info placeholder when a static
    /// instance is destroyed.
    pub fn destroy_object(
        &mut self,
        handle: NetHandle,
        flags: DestroyFlags,
    ) -> Result<Option<NetHandle>, RegistryError> {
        let index = self.try_index_of(handle)?;
        let data = self.try_object(index)?;
        if data.pending_destroy {
            return Ok(None);
        }
        let doomed_sub_objects = if data.is_sub_object() {
            self.descendants(index)
        } else {
            data.sub_objects.clone()
        };
        for sub_object in doomed_sub_objects {
            self.mark_pending_destroy(sub_object, flags);
        }
        self.mark_pending_destroy(index, flags);

        if handle.is_static() && flags.destroy_static_instance && !flags.tear_off {
            if self.object(index).is_some_and(|data| data.is_sub_object()) {
                return Ok(None);
            }
            return self.create_destruction_info(index).map(Some);
        }
        Ok(None)
    }

    fn descendants(&self, index: InternalIndex) -> Vec<InternalIndex> {
        let mut output = Vec::new();
        let mut stack: Vec<InternalIndex> = self.object(index).map(|data| data.children.clone()).unwrap_or_default();
        while let Some(child) = stack.pop() {
            output.push(child);
            if let Some(data) = self.object(child) {
                stack.extend(data.children.iter().copied());
            }
        }
        output
    }

    fn mark_pending_destroy(&mut self, index: InternalIndex, flags: DestroyFlags) {
        let Some(data) = self.objects.get_mut(index as usize).and_then(Option::as_mut) else {
            return;
        };
        if data.pending_destroy {
            return;
        }
        trace!("object {} pending destroy", data.handle);
        data.pending_destroy = true;
        data.tear_off = flags.tear_off;
        data.destroyed_startup = data.handle.is_static() && flags.destroy_static_instance;
        self.scopable.clear_bit(index);
        // a torn-off object still sends its last changes
        if !flags.tear_off {
            self.dirty.clear_bit(index);
        }
        self.pending_destroy.set_bit(index);
        if flags.tear_off {
            self.torn_off.push(index);
        }
        self.unlink_dependents(index);
    }

    fn create_destruction_info(&mut self, target: InternalIndex) -> Result<NetHandle, RegistryError> {
        let data = self.try_object(target)?;
        let target_handle = data.handle;
        let protocol = Arc::clone(&data.protocol);
        let handle = self.handle_allocator.allocate(HandleKind::Dynamic);
        let index = self.insert(handle, protocol, ObjectState::new(Vec::new()))?;
        if let Some(data) = self.objects[index as usize].as_mut() {
            data.destruction_info_target = Some(target_handle);
        }
        self.scopable.set_bit(index);
        self.destruction_infos.insert(target_handle, index);
        debug!("destruction info {} created for {}", handle, target_handle);
        Ok(handle)
    }

    /// Drops the destruction-info placeholder for `target`, e.g. once the
    /// static content it belonged to is unloaded everywhere.
    pub fn remove_destruction_info(&mut self, target: NetHandle) -> Result<(), RegistryError> {
        let Some(index) = self.destruction_infos.remove(&target) else {
            return Err(RegistryError::UnknownHandle { handle: target });
        };
        self.mark_pending_destroy(index, DestroyFlags::default());
        Ok(())
    }

    pub fn destruction_info_for(&self, target: NetHandle) -> Option<NetHandle> {
        self.destruction_infos
            .get(&target)
            .and_then(|index| self.handle_of(*index))
    }

    /// Removes a remote mirror immediately, with any subobjects still
    /// attached to it.
    pub fn remove_remote_object(&mut self, handle: NetHandle) -> Result<(), RegistryError> {
        let index = self.try_index_of(handle)?;
        let sub_objects = self.try_object(index)?.sub_objects.clone();
        for sub_object in sub_objects {
            self.release_index(sub_object);
        }
        self.release_index(index);
        Ok(())
    }

    /// Indices torn off since the last call.
    pub fn take_torn_off(&mut self) -> Vec<InternalIndex> {
        std::mem::take(&mut self.torn_off)
    }

    /// Releases every pending-destroy index nobody references any more.
    /// Subobjects go first so their roots can follow in the same pass.
    pub fn release_pending_indices(&mut self) -> Vec<NetHandle> {
        let pending: Vec<InternalIndex> = self.pending_destroy.iter_set_bits().collect();
        let (sub_objects, roots): (Vec<InternalIndex>, Vec<InternalIndex>) = pending
            .into_iter()
            .partition(|index| self.object(*index).is_some_and(|data| data.is_sub_object()));

        let mut released = Vec::new();
        for index in sub_objects.into_iter().chain(roots) {
            let handle = self.handle_of(index);
            if self.try_release_index(index) {
                if let Some(handle) = handle {
                    released.push(handle);
                }
            }
        }
        released
    }

    /// Frees `index` if it is pending destroy, unreferenced and has no
    /// subobjects left.
    pub fn try_release_index(&mut self, index: InternalIndex) -> bool {
        let Some(data) = self.object(index) else {
            return false;
        };
        if !data.pending_destroy || data.connection_refs > 0 || !data.sub_objects.is_empty() {
            return false;
        }
        self.release_index(index);
        true
    }

    fn release_index(&mut self, index: InternalIndex) {
        let Some(data) = self.objects.get_mut(index as usize).and_then(Option::take) else {
            return;
        };
        trace!("released index {} ({})", index, data.handle);
        self.handle_to_index.remove(&data.handle);
        if let Some(target) = data.destruction_info_target {
            if self.destruction_infos.get(&target) == Some(&index) {
                self.destruction_infos.remove(&target);
            }
        }
        if data.is_sub_object() {
            self.unlink_sub_object(data.root, data.parent, index);
        }
        for child in data.children {
            if let Some(child) = self.object_mut(child) {
                child.parent = data.root;
            }
        }
        for dependent in &data.dependents {
            if let Some(dependent) = self.object_mut(dependent.index) {
                dependent.dependent_parents.retain(|parent| *parent != index);
            }
        }
        for parent in &data.dependent_parents {
            if let Some(parent) = self.object_mut(*parent) {
                parent.dependents.retain(|dependent| dependent.index != index);
            }
        }
        self.scopable.clear_bit(index);
        self.dirty.clear_bit(index);
        self.pending_destroy.clear_bit(index);
        self.free_indices.push(index);
    }

    // Subobjects

    /// Attaches `sub_object` below `parent`. The subobject joins the root's
    /// flat subobject list and the parent's child list.
    pub fn add_sub_object(
        &mut self,
        parent: NetHandle,
        sub_object: NetHandle,
        condition: SubObjectCondition,
    ) -> Result<(), RegistryError> {
        let parent_index = self.try_index_of(parent)?;
        let sub_index = self.try_index_of(sub_object)?;
        let parent_data = self.try_object(parent_index)?;
        let sub_data = self.try_object(sub_index)?;
        let invalid = RegistryError::InvalidSubObject {
            owner: parent,
            sub_object,
        };
        if parent_index == sub_index || sub_data.is_sub_object() || !sub_data.sub_objects.is_empty() {
            return Err(invalid);
        }
        if parent_data.pending_destroy {
            return Err(RegistryError::ObjectPendingDestroy { handle: parent });
        }
        if sub_data.pending_destroy {
            return Err(RegistryError::ObjectPendingDestroy { handle: sub_object });
        }
        let root_index = if parent_data.is_sub_object() {
            parent_data.root
        } else {
            parent_index
        };
        let condition = (condition != SubObjectCondition::Always).then_some(condition);
        self.unlink_dependents(sub_index);
        self.link_sub_object(root_index, parent_index, sub_index, condition);
        Ok(())
    }

    /// Stops replicating a subobject; remote peers end its replication.
    pub fn remove_sub_object(&mut self, sub_object: NetHandle) -> Result<(), RegistryError> {
        let index = self.try_index_of(sub_object)?;
        if !self.try_object(index)?.is_sub_object() {
            return Err(RegistryError::NotASubObject { handle: sub_object });
        }
        self.destroy_object(sub_object, DestroyFlags::default())?;
        Ok(())
    }

    fn link_sub_object(
        &mut self,
        root: InternalIndex,
        parent: InternalIndex,
        sub_object: InternalIndex,
        condition: Option<SubObjectCondition>,
    ) {
        if let Some(data) = self.object_mut(sub_object) {
            data.root = root;
            data.parent = parent;
        }
        if let Some(root_data) = self.object_mut(root) {
            root_data.sub_objects.push(sub_object);
        }
        if let Some(parent_data) = self.object_mut(parent) {
            parent_data.children.push(sub_object);
            match (&mut parent_data.child_conditions, condition) {
                (Some(conditions), condition) => conditions.push(condition.unwrap_or_default()),
                (None, Some(condition)) => {
                    let mut conditions = vec![SubObjectCondition::Always; parent_data.children.len() - 1];
                    conditions.push(condition);
                    parent_data.child_conditions = Some(conditions);
                }
                (None, None) => {}
            }
        }
    }

    fn unlink_sub_object(&mut self, root: InternalIndex, parent: InternalIndex, sub_object: InternalIndex) {
        if let Some(root_data) = self.object_mut(root) {
            root_data.sub_objects.retain(|index| *index != sub_object);
        }
        if let Some(parent_data) = self.object_mut(parent) {
            if let Some(position) = parent_data.children.iter().position(|index| *index == sub_object) {
                parent_data.children.remove(position);
                if let Some(conditions) = parent_data.child_conditions.as_mut() {
                    conditions.remove(position);
                }
            }
        }
    }

    /// Condition `sub_object` was attached with.
    pub fn sub_object_condition(&self, sub_object: InternalIndex) -> SubObjectCondition {
        let Some(data) = self.object(sub_object) else {
            return SubObjectCondition::Always;
        };
        let Some(parent) = self.object(data.parent) else {
            return SubObjectCondition::Always;
        };
        let Some(conditions) = parent.child_conditions.as_ref() else {
            return SubObjectCondition::Always;
        };
        parent
            .children
            .iter()
            .position(|child| *child == sub_object)
            .and_then(|position| conditions.get(position).copied())
            .unwrap_or_default()
    }

    // Dependent objects

    pub fn add_dependent_object(
        &mut self,
        parent: NetHandle,
        dependent: NetHandle,
        hint: DependentSchedulingHint,
    ) -> Result<(), RegistryError> {
        let parent_index = self.try_index_of(parent)?;
        let dependent_index = self.try_index_of(dependent)?;
        if parent_index == dependent_index {
            return Err(RegistryError::SelfDependency { handle: parent });
        }
        let parent_data = self.try_object(parent_index)?;
        let dependent_data = self.try_object(dependent_index)?;
        if dependent_data.is_sub_object() {
            return Err(RegistryError::SubObjectCannotBeDependent { handle: dependent });
        }
        if parent_data.pending_destroy {
            return Err(RegistryError::ObjectPendingDestroy { handle: parent });
        }
        if dependent_data.pending_destroy {
            return Err(RegistryError::ObjectPendingDestroy { handle: dependent });
        }
        if parent_data
            .dependents
            .iter()
            .any(|info| info.index == dependent_index)
        {
            return Err(RegistryError::DuplicateDependentObject { parent, dependent });
        }
        if self.is_dependent_reachable(dependent_index, parent_index) {
            return Err(RegistryError::DependentObjectCycle { parent, dependent });
        }

        if let Some(parent_data) = self.object_mut(parent_index) {
            parent_data.dependents.push(DependentObjectInfo {
                index: dependent_index,
                hint,
            });
        }
        if let Some(dependent_data) = self.object_mut(dependent_index) {
            dependent_data.dependent_parents.push(parent_index);
        }
        Ok(())
    }

    pub fn remove_dependent_object(&mut self, parent: NetHandle, dependent: NetHandle) -> Result<(), RegistryError> {
        let parent_index = self.try_index_of(parent)?;
        let dependent_index = self.try_index_of(dependent)?;
        let parent_data = self.try_object(parent_index)?;
        if !parent_data
            .dependents
            .iter()
            .any(|info| info.index == dependent_index)
        {
            return Err(RegistryError::DependentObjectNotFound { parent, dependent });
        }
        if let Some(parent_data) = self.object_mut(parent_index) {
            parent_data.dependents.retain(|info| info.index != dependent_index);
        }
        if let Some(dependent_data) = self.object_mut(dependent_index) {
            dependent_data.dependent_parents.retain(|index| *index != parent_index);
        }
        Ok(())
    }

    /// Whether `target` can be reached from `from` along dependent links.
    fn is_dependent_reachable(&self, from: InternalIndex, target: InternalIndex) -> bool {
        let mut visited = BitArray::new(self.max_internal_index);
        let mut stack = vec![from];
        while let Some(index) = stack.pop() {
            if index == target {
                return true;
            }
            if visited.get_bit(index) {
                continue;
            }
            visited.set_bit(index);
            if let Some(data) = self.object(index) {
                stack.extend(data.dependents.iter().map(|info| info.index));
            }
        }
        false
    }

    fn unlink_dependents(&mut self, index: InternalIndex) {
        let Some(data) = self.object_mut(index) else {
            return;
        };
        let dependents = std::mem::take(&mut data.dependents);
        let parents = std::mem::take(&mut data.dependent_parents);
        for dependent in dependents {
            if let Some(dependent) = self.object_mut(dependent.index) {
                dependent.dependent_parents.retain(|parent| *parent != index);
            }
        }
        for parent in parents {
            if let Some(parent) = self.object_mut(parent) {
                parent.dependents.retain(|dependent| dependent.index != index);
            }
        }
    }

    // State

    /// Writes one member and marks its changemask bit dirty.
    pub fn set_member(
        &mut self,
        handle: NetHandle,
        member_index: usize,
        value: MemberValue,
    ) -> Result<(), RegistryError> {
        let index = self.try_index_of(handle)?;
        let data = self
            .object_mut(index)
            .ok_or(RegistryError::UnknownHandle { handle })?;
        if data.pending_destroy && !data.tear_off {
            return Err(RegistryError::ObjectPendingDestroy { handle });
        }
        let Some(member) = data.protocol.members().get(member_index) else {
            return Err(RegistryError::MemberOutOfRange {
                handle,
                member_index,
            });
        };
        if !value.fits(member.kind()) {
            return Err(RegistryError::MemberKindMismatch {
                handle,
                member: member.name().to_string(),
            });
        }
        if data.state.get(member_index) == Some(&value) {
            return Ok(());
        }
        data.state.set(member_index, value);
        data.dirty_mask.set_bit(member_index as u32);
        self.dirty.set_bit(index);
        Ok(())
    }

    /// Marks every member of an object dirty.
    pub fn mark_all_dirty(&mut self, handle: NetHandle) -> Result<(), RegistryError> {
        let index = self.try_index_of(handle)?;
        let data = self
            .object_mut(index)
            .ok_or(RegistryError::UnknownHandle { handle })?;
        data.dirty_mask.set_all();
        self.dirty.set_bit(index);
        Ok(())
    }

    /// Dormant objects keep their dirty bits here until woken.
    pub fn set_dormant(&mut self, handle: NetHandle, dormant: bool) -> Result<(), RegistryError> {
        let index = self.try_index_of(handle)?;
        let data = self
            .object_mut(index)
            .ok_or(RegistryError::UnknownHandle { handle })?;
        data.dormant = dormant;
        Ok(())
    }

    /// Drains the dirty set: every awake object with changes since the last
    /// call, with the members that changed.
    pub fn take_dirty_objects(&mut self) -> Vec<(InternalIndex, ChangeMask)> {
        let dirty: Vec<InternalIndex> = self.dirty.iter_set_bits().collect();
        let mut output = Vec::with_capacity(dirty.len());
        for index in dirty {
            let Some(data) = self.objects.get_mut(index as usize).and_then(Option::as_mut) else {
                self.dirty.clear_bit(index);
                continue;
            };
            if data.dormant {
                continue;
            }
            let mask = std::mem::replace(
                &mut data.dirty_mask,
                ChangeMask::new(data.protocol.change_mask_bit_count()),
            );
            self.dirty.clear_bit(index);
            output.push((index, mask));
        }
        output
    }

    // Connection references

    pub fn add_connection_ref(&mut self, index: InternalIndex) {
        if let Some(data) = self.object_mut(index) {
            data.connection_refs += 1;
        }
    }

    pub fn release_connection_ref(&mut self, index: InternalIndex) {
        if let Some(data) = self.object_mut(index) {
            data.connection_refs = data.connection_refs.saturating_sub(1);
        }
    }

    pub fn total_connection_refs(&self) -> u64 {
        self.objects
            .iter()
            .flatten()
            .map(|data| u64::from(data.connection_refs))
            .sum()
    }

    // Lookup

    pub fn index_of(&self, handle: NetHandle) -> Option<InternalIndex> {
        self.handle_to_index.get(&handle).copied()
    }

    pub fn try_index_of(&self, handle: NetHandle) -> Result<InternalIndex, RegistryError> {
        self.index_of(handle)
            .ok_or(RegistryError::UnknownHandle { handle })
    }

    pub fn handle_of(&self, index: InternalIndex) -> Option<NetHandle> {
        self.object(index).map(|data| data.handle)
    }

    pub fn object(&self, index: InternalIndex) -> Option<&ReplicatedObjectData> {
        self.objects.get(index as usize).and_then(Option::as_ref)
    }

    pub fn object_mut(&mut self, index: InternalIndex) -> Option<&mut ReplicatedObjectData> {
        self.objects.get_mut(index as usize).and_then(Option::as_mut)
    }

    fn try_object(&self, index: InternalIndex) -> Result<&ReplicatedObjectData, RegistryError> {
        self.object(index).ok_or(RegistryError::UnknownHandle {
            handle: NetHandle::INVALID,
        })
    }

    pub fn object_by_handle(&self, handle: NetHandle) -> Option<&ReplicatedObjectData> {
        self.index_of(handle).and_then(|index| self.object(index))
    }

    pub fn contains(&self, handle: NetHandle) -> bool {
        self.handle_to_index.contains_key(&handle)
    }

    /// Host objects that may currently be put in scope, roots and
    /// subobjects alike.
    pub fn scopable(&self) -> &BitArray {
        &self.scopable
    }

    pub fn live_object_count(&self) -> usize {
        self.handle_to_index.len()
    }

    pub fn sub_objects(&self, index: InternalIndex) -> &[InternalIndex] {
        self.object(index)
            .map(|data| data.sub_objects.as_slice())
            .unwrap_or(&[])
    }

    pub fn dependents(&self, index: InternalIndex) -> &[DependentObjectInfo] {
        self.object(index)
            .map(|data| data.dependents.as_slice())
            .unwrap_or(&[])
    }

    /// Root of `index`, or `index` itself for roots.
    pub fn root_of(&self, index: InternalIndex) -> InternalIndex {
        match self.object(index) {
            Some(data) if data.is_sub_object() => data.root,
            _ => index,
        }
    }

    pub fn is_sub_object(&self, index: InternalIndex) -> bool {
        self.object(index).is_some_and(|data| data.is_sub_object())
    }

    pub fn protocol_ref_counts(&self) -> HashMap<u32, usize> {
        let mut counts = HashMap::new();
        for data in self.objects.iter().flatten() {
            counts.insert(data.protocol.id(), Arc::strong_count(&data.protocol));
        }
        counts
    }
}
