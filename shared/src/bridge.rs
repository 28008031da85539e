use thiserror::Error;

use crate::{
    attachment::NetAttachment,
    bit_array::ChangeMask,
    handle::NetHandle,
    protocol::{ObjectState, ReplicationProtocol},
};

/// Errors a bridge reports back to the reader
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeError {
    /// The bridge would not create a local instance for a replicated object
    #[error("Instantiation of {handle} refused: {reason}")]
    InstantiationRefused { handle: NetHandle, reason: String },
}

/// Received state for one object, handed to the bridge when it is applied.
pub struct StateUpdate<'a> {
    pub handle: NetHandle,
    /// Everything received for the object so far.
    pub state: &'a ObjectState,
    /// Members to copy into the instance. References that cannot be
    /// resolved yet are left out and delivered later on their own.
    pub changed: &'a ChangeMask,
    pub is_initial: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct EndReplicationFlags {
    /// Keep the local instance alive; it just stops receiving updates.
    pub tear_off: bool,
    pub destroy_instance: bool,
}

/// Connects replicated objects on the receiving side to whatever represents
/// them locally.
pub trait ReplicationBridge {
    /// Creates the local instance for a newly replicated object. `root` is
    /// set for subobjects.
    fn instantiate(
        &mut self,
        handle: NetHandle,
        protocol: &ReplicationProtocol,
        root: Option<NetHandle>,
    ) -> Result<(), BridgeError>;

    fn apply_state(&mut self, update: StateUpdate<'_>);

    fn on_attachment(&mut self, handle: NetHandle, attachment: NetAttachment);

    fn end_replication(&mut self, handle: NetHandle, flags: EndReplicationFlags);

    /// A static object was destroyed on the sending side before this
    /// connection ever replicated it.
    fn on_destruction_info(&mut self, handle: NetHandle);

    /// Whether a must-be-mapped reference can be used right now. Batches
    /// exporting a reference that is still loading are held back.
    fn is_reference_loaded(&self, _handle: NetHandle) -> bool {
        true
    }

    /// Whether the bridge knows `handle` without it being replicated, e.g.
    /// a static object loaded with a level.
    fn resolve_reference(&self, _handle: NetHandle) -> bool {
        false
    }
}
