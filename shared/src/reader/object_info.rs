use std::sync::Arc;

use crate::{
    attachment::AttachmentReceiveQueue,
    handle::NetHandle,
    protocol::{ObjectState, ReplicationProtocol},
    writer::{BaselineIndex, MAX_BASELINE_COUNT},
};

/// What the reader keeps about one object replicated from the peer.
pub struct RemoteObjectInfo {
    pub(crate) handle: NetHandle,
    pub(crate) root: Option<NetHandle>,
    pub(crate) protocol: Arc<ReplicationProtocol>,
    pub(crate) delta_enabled: bool,
    baselines: [Option<ObjectState>; MAX_BASELINE_COUNT as usize],
    pub(crate) attachments: AttachmentReceiveQueue,
}

impl RemoteObjectInfo {
    pub fn new(
        handle: NetHandle,
        root: Option<NetHandle>,
        protocol: Arc<ReplicationProtocol>,
        delta_enabled: bool,
    ) -> Self {
        Self {
            handle,
            root,
            protocol,
            delta_enabled,
            baselines: [None, None],
            attachments: AttachmentReceiveQueue::new(),
        }
    }

    pub fn handle(&self) -> NetHandle {
        self.handle
    }

    pub fn root(&self) -> Option<NetHandle> {
        self.root
    }

    pub fn protocol(&self) -> &Arc<ReplicationProtocol> {
        &self.protocol
    }

    pub fn is_delta_enabled(&self) -> bool {
        self.delta_enabled
    }

    pub fn baseline(&self, index: BaselineIndex) -> Option<&ObjectState> {
        self.baselines.get(index as usize).and_then(Option::as_ref)
    }

    /// Stores `state` as baseline `index`. Invalid indices are ignored.
    pub fn store_baseline(&mut self, index: BaselineIndex, state: ObjectState) {
        if let Some(slot) = self.baselines.get_mut(index as usize) {
            *slot = Some(state);
        }
    }

    pub fn baseline_count(&self) -> usize {
        self.baselines.iter().flatten().count()
    }
}
