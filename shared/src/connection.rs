use std::collections::HashSet;

use log::info;

use crate::{
    bit_array::BitArray,
    config::ReplicationConfig,
    handle::NetHandle,
    reader::ReplicationReader,
    registry::ObjectRegistry,
    types::{ConnectionId, InternalIndex},
    writer::ReplicationWriter,
};

/// Replication state of one peer: what is sent to it, what was received
/// from it, and which objects it must not see.
pub struct Connection {
    pub writer: ReplicationWriter,
    pub reader: ReplicationReader,
    excluded: HashSet<NetHandle>,
}

impl Connection {
    pub fn new(connection_id: ConnectionId, config: &ReplicationConfig, max_internal_index: InternalIndex) -> Self {
        info!("connection {} added", connection_id);
        Self {
            writer: ReplicationWriter::new(connection_id, config, max_internal_index),
            reader: ReplicationReader::new(connection_id, config),
            excluded: HashSet::new(),
        }
    }

    pub fn connection_id(&self) -> ConnectionId {
        self.writer.connection_id()
    }

    // Scope

    /// Every object is in scope unless filtered out here.
    pub fn set_in_scope(&mut self, handle: NetHandle, in_scope: bool) {
        if in_scope {
            self.excluded.remove(&handle);
        } else {
            self.excluded.insert(handle);
        }
    }

    pub fn is_filtered_out(&self, handle: NetHandle) -> bool {
        self.excluded.contains(&handle)
    }

    /// Objects this connection should see: the scopable set minus filtered
    /// roots, their subobjects, and subobjects reserved for another peer.
    pub fn scope(&self, registry: &ObjectRegistry) -> BitArray {
        let connection_id = self.connection_id();
        let mut scope = registry.scopable().clone();
        for index in registry.scopable().iter_set_bits() {
            let root = registry.root_of(index);
            let root_filtered = registry
                .handle_of(root)
                .is_some_and(|handle| self.excluded.contains(&handle));
            let own_filtered = registry
                .handle_of(index)
                .is_some_and(|handle| self.excluded.contains(&handle));
            let condition_allows = !registry.is_sub_object(index)
                || registry.sub_object_condition(index).allows_connection(connection_id);
            let root_scopable = root == index || registry.scopable().get_bit(root);
            if root_filtered || own_filtered || !condition_allows || !root_scopable {
                scope.clear_bit(index);
            }
        }
        scope
    }

    /// Forgets handles that are no longer registered.
    pub fn retain_filters(&mut self, registry: &ObjectRegistry) {
        self.excluded.retain(|handle| registry.contains(*handle));
    }

    /// Releases everything the connection holds in `registry` and forgets
    /// every remote object. Returns the remote objects that were still
    /// replicated.
    pub fn teardown(&mut self, registry: &mut ObjectRegistry) -> Vec<NetHandle> {
        self.writer.teardown(registry);
        let remote = self.reader.teardown();
        self.excluded.clear();
        info!(
            "connection {} removed, {} remote objects forgotten",
            self.connection_id(),
            remote.len()
        );
        remote
    }
}
