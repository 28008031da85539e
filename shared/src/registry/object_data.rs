use std::sync::Arc;

use crate::{
    bit_array::ChangeMask,
    handle::NetHandle,
    protocol::{ObjectState, ReplicationProtocol},
    types::{ConnectionId, InternalIndex, INVALID_INTERNAL_INDEX},
};

/// Per-child replication condition kept alongside a parent's child list.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SubObjectCondition {
    #[default]
    Always,
    /// Only the initial state is replicated; later changes are not.
    InitialOnly,
    /// Only replicated to one connection.
    OnlyConnection(ConnectionId),
}

impl SubObjectCondition {
    pub fn allows_connection(&self, connection: ConnectionId) -> bool {
        match self {
            SubObjectCondition::OnlyConnection(only) => *only == connection,
            _ => true,
        }
    }
}

/// How a dependent object is ordered relative to its parent.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum DependentSchedulingHint {
    /// Scheduled together with the parent, right after it.
    #[default]
    Default,
    /// Always written before the parent in the same packet.
    ScheduleBeforeParent,
    /// Written before the parent only while the dependent still needs its
    /// initial state sent.
    ScheduleBeforeParentIfInitialState,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependentObjectInfo {
    pub index: InternalIndex,
    pub hint: DependentSchedulingHint,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct DestroyFlags {
    /// Replicate one last state, then stop without destroying the remote
    /// instance.
    pub tear_off: bool,
    /// Destroy a static object's remote instance as well. Dynamic objects are
    /// always destroyed remotely.
    pub destroy_static_instance: bool,
}

/// Everything the registry keeps about one live object.
pub struct ReplicatedObjectData {
    pub(crate) handle: NetHandle,
    pub(crate) protocol: Arc<ReplicationProtocol>,
    pub(crate) state: ObjectState,
    pub(crate) root: InternalIndex,
    pub(crate) parent: InternalIndex,
    /// Every subobject in the hierarchy below a root, in attach order.
    pub(crate) sub_objects: Vec<InternalIndex>,
    pub(crate) children: Vec<InternalIndex>,
    /// Same length as `children` once any child has a condition.
    pub(crate) child_conditions: Option<Vec<SubObjectCondition>>,
    pub(crate) dependents: Vec<DependentObjectInfo>,
    pub(crate) dependent_parents: Vec<InternalIndex>,
    pub(crate) dirty_mask: ChangeMask,
    pub(crate) connection_refs: u32,
    pub(crate) is_remote: bool,
    pub(crate) tear_off: bool,
    pub(crate) dormant: bool,
    pub(crate) destroyed_startup: bool,
    pub(crate) pending_destroy: bool,
    /// Set on destruction-info placeholders: the static object they announce.
    pub(crate) destruction_info_target: Option<NetHandle>,
}

impl ReplicatedObjectData {
    pub(crate) fn new(handle: NetHandle, protocol: Arc<ReplicationProtocol>, state: ObjectState) -> Self {
        let dirty_mask = ChangeMask::new(protocol.change_mask_bit_count());
        Self {
            handle,
            protocol,
            state,
            root: INVALID_INTERNAL_INDEX,
            parent: INVALID_INTERNAL_INDEX,
            sub_objects: Vec::new(),
            children: Vec::new(),
            child_conditions: None,
            dependents: Vec::new(),
            dependent_parents: Vec::new(),
            dirty_mask,
            connection_refs: 0,
            is_remote: false,
            tear_off: false,
            dormant: false,
            destroyed_startup: false,
            pending_destroy: false,
            destruction_info_target: None,
        }
    }

    pub fn handle(&self) -> NetHandle {
        self.handle
    }

    pub fn protocol(&self) -> &Arc<ReplicationProtocol> {
        &self.protocol
    }

    pub fn state(&self) -> &ObjectState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ObjectState {
        &mut self.state
    }

    pub fn is_sub_object(&self) -> bool {
        self.root != INVALID_INTERNAL_INDEX
    }

    pub fn root(&self) -> InternalIndex {
        self.root
    }

    pub fn parent(&self) -> InternalIndex {
        self.parent
    }

    pub fn sub_objects(&self) -> &[InternalIndex] {
        &self.sub_objects
    }

    pub fn children(&self) -> &[InternalIndex] {
        &self.children
    }

    pub fn child_conditions(&self) -> Option<&[SubObjectCondition]> {
        self.child_conditions.as_deref()
    }

    pub fn dependents(&self) -> &[DependentObjectInfo] {
        &self.dependents
    }

    pub fn dependent_parents(&self) -> &[InternalIndex] {
        &self.dependent_parents
    }

    pub fn connection_refs(&self) -> u32 {
        self.connection_refs
    }

    pub fn is_pending_destroy(&self) -> bool {
        self.pending_destroy
    }

    pub fn is_torn_off(&self) -> bool {
        self.tear_off
    }

    pub fn is_dormant(&self) -> bool {
        self.dormant
    }

    pub fn is_remote(&self) -> bool {
        self.is_remote
    }

    pub fn destruction_info_target(&self) -> Option<NetHandle> {
        self.destruction_info_target
    }

    /// Whether ending replication should destroy the remote instance.
    pub fn destroy_instance(&self) -> bool {
        self.handle.is_dynamic() || self.destroyed_startup
    }
}
