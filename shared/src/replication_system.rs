use std::{
    collections::{hash_map::Entry, HashMap},
    sync::Arc,
    time::Instant,
};

use log::{debug, info};
use netrep_serde::{BitReader, BitWriter};

use crate::{
    attachment::NetAttachment,
    bridge::ReplicationBridge,
    config::ReplicationConfig,
    connection::Connection,
    error::ReplicationError,
    handle::{HandleKind, NetHandle},
    protocol::{MemberValue, ObjectState, Protocol, ReplicationProtocol},
    reader::ReaderEvent,
    registry::{DependentSchedulingHint, DestroyFlags, ObjectRegistry, SubObjectCondition},
    types::{ConnectionId, DeliveryStatus, ProtocolId, WriteResult},
};

/// Owns the objects a peer replicates and one [`Connection`] per remote
/// peer.
///
/// A tick looks like this: mutate objects, call
/// [`pre_send_update`](Self::pre_send_update), then
/// [`write_packet`](Self::write_packet) for every connection until it
/// reports no more data. Delivery outcomes come back through
/// [`notify_packet_delivery`](Self::notify_packet_delivery) in the order the
/// packets were written.
pub struct ReplicationSystem {
    config: ReplicationConfig,
    protocols: Protocol,
    registry: ObjectRegistry,
    connections: HashMap<ConnectionId, Connection>,
}

impl ReplicationSystem {
    pub fn new(replication_system_id: u32, mut protocols: Protocol, config: ReplicationConfig) -> Self {
        if !protocols.is_locked() {
            protocols.lock();
        }
        let registry = ObjectRegistry::new(replication_system_id, &config);
        Self {
            config,
            protocols,
            registry,
            connections: HashMap::new(),
        }
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    pub fn protocols(&self) -> &Protocol {
        &self.protocols
    }

    pub fn registry(&self) -> &ObjectRegistry {
        &self.registry
    }

    // Connections

    pub fn add_connection(&mut self, connection_id: ConnectionId) -> Result<(), ReplicationError> {
        match self.connections.entry(connection_id) {
            Entry::Occupied(_) => Err(ReplicationError::ConnectionAlreadyExists { connection_id }),
            Entry::Vacant(entry) => {
                entry.insert(Connection::new(
                    connection_id,
                    &self.config,
                    self.registry.max_internal_index(),
                ));
                Ok(())
            }
        }
    }

    /// Tears a connection down. Every reference it held on host objects is
    /// released; returns the remote objects it was still receiving.
    pub fn remove_connection(&mut self, connection_id: ConnectionId) -> Result<Vec<NetHandle>, ReplicationError> {
        let mut connection = self
            .connections
            .remove(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })?;
        Ok(connection.teardown(&mut self.registry))
    }

    pub fn has_connection(&self, connection_id: ConnectionId) -> bool {
        self.connections.contains_key(&connection_id)
    }

    pub fn connection(&self, connection_id: ConnectionId) -> Option<&Connection> {
        self.connections.get(&connection_id)
    }

    pub fn connection_ids(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.connections.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    fn try_connection_mut(&mut self, connection_id: ConnectionId) -> Result<&mut Connection, ReplicationError> {
        self.connections
            .get_mut(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })
    }

    // Objects

    pub fn create_object(
        &mut self,
        protocol_id: ProtocolId,
        state: Option<ObjectState>,
        kind: HandleKind,
    ) -> Result<NetHandle, ReplicationError> {
        let protocol: Arc<ReplicationProtocol> = Arc::clone(self.protocols.try_get(protocol_id)?);
        let handle = self.registry.create_object(&protocol, state, kind)?;
        self.broadcast_capacity();
        Ok(handle)
    }

    /// See [`ObjectRegistry::destroy_object`].
    pub fn destroy_object(
        &mut self,
        handle: NetHandle,
        flags: DestroyFlags,
    ) -> Result<Option<NetHandle>, ReplicationError> {
        let destruction_info = self.registry.destroy_object(handle, flags)?;
        self.broadcast_capacity();
        Ok(destruction_info)
    }

    pub fn tear_off(&mut self, handle: NetHandle) -> Result<(), ReplicationError> {
        self.destroy_object(
            handle,
            DestroyFlags {
                tear_off: true,
                destroy_static_instance: false,
            },
        )?;
        Ok(())
    }

    pub fn set_member(
        &mut self,
        handle: NetHandle,
        member_index: usize,
        value: MemberValue,
    ) -> Result<(), ReplicationError> {
        self.registry.set_member(handle, member_index, value)?;
        Ok(())
    }

    pub fn mark_all_dirty(&mut self, handle: NetHandle) -> Result<(), ReplicationError> {
        self.registry.mark_all_dirty(handle)?;
        Ok(())
    }

    pub fn set_dormant(&mut self, handle: NetHandle, dormant: bool) -> Result<(), ReplicationError> {
        self.registry.set_dormant(handle, dormant)?;
        Ok(())
    }

    pub fn add_sub_object(
        &mut self,
        parent: NetHandle,
        sub_object: NetHandle,
        condition: SubObjectCondition,
    ) -> Result<(), ReplicationError> {
        self.registry.add_sub_object(parent, sub_object, condition)?;
        Ok(())
    }

    pub fn remove_sub_object(&mut self, sub_object: NetHandle) -> Result<(), ReplicationError> {
        self.registry.remove_sub_object(sub_object)?;
        Ok(())
    }

    pub fn add_dependent_object(
        &mut self,
        parent: NetHandle,
        dependent: NetHandle,
        hint: DependentSchedulingHint,
    ) -> Result<(), ReplicationError> {
        self.registry.add_dependent_object(parent, dependent, hint)?;
        Ok(())
    }

    pub fn remove_dependent_object(&mut self, parent: NetHandle, dependent: NetHandle) -> Result<(), ReplicationError> {
        self.registry.remove_dependent_object(parent, dependent)?;
        Ok(())
    }

    /// Queues an attachment for one connection. The object must currently
    /// be replicated to it.
    pub fn queue_attachment(
        &mut self,
        connection_id: ConnectionId,
        handle: NetHandle,
        reliable: bool,
        attachment: NetAttachment,
    ) -> Result<(), ReplicationError> {
        let index = self.registry.try_index_of(handle)?;
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })?;
        connection
            .writer
            .queue_attachment(index, reliable, attachment, &self.registry)?;
        Ok(())
    }

    // Scope

    /// Filters an object out of (or back into) one connection's scope.
    /// Subobjects follow their root.
    pub fn set_in_scope(
        &mut self,
        connection_id: ConnectionId,
        handle: NetHandle,
        in_scope: bool,
    ) -> Result<(), ReplicationError> {
        self.registry.try_index_of(handle)?;
        self.try_connection_mut(connection_id)?
            .set_in_scope(handle, in_scope);
        Ok(())
    }

    // Sending

    /// Copies everything that changed since the last call into the
    /// connections and refreshes their scope and priorities. Returns the
    /// objects whose indices were released because nobody references them
    /// any more.
    pub fn pre_send_update(&mut self) -> Result<Vec<NetHandle>, ReplicationError> {
        self.broadcast_capacity();

        let torn_off = self.registry.take_torn_off();
        let dirty = self.registry.take_dirty_objects();

        let mut connection_ids = self.connection_ids();
        connection_ids.reverse();
        while let Some(connection_id) = connection_ids.pop() {
            let Some(connection) = self.connections.get_mut(&connection_id) else {
                continue;
            };
            for index in &torn_off {
                connection.writer.tear_off(*index)?;
            }
            for (index, mask) in &dirty {
                connection.writer.add_dirty(*index, mask, &self.registry);
            }
            let scope = connection.scope(&self.registry);
            connection.writer.update_scope(&mut self.registry, &scope)?;
            connection.writer.update_priorities(&self.registry);
        }

        let released = self.registry.release_pending_indices();
        if !released.is_empty() {
            debug!("released {} object indices", released.len());
            for connection in self.connections.values_mut() {
                connection.retain_filters(&self.registry);
            }
        }
        Ok(released)
    }

    pub fn write_packet(
        &mut self,
        connection_id: ConnectionId,
        writer: &mut BitWriter,
    ) -> Result<WriteResult, ReplicationError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })?;
        Ok(connection.writer.write(&self.registry, writer)?)
    }

    /// Must be called once per written packet, in write order.
    pub fn notify_packet_delivery(
        &mut self,
        connection_id: ConnectionId,
        status: DeliveryStatus,
    ) -> Result<(), ReplicationError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })?;
        connection.writer.process_delivery(status, &mut self.registry)?;
        Ok(())
    }

    // Receiving

    pub fn read_packet(
        &mut self,
        connection_id: ConnectionId,
        reader: &mut BitReader,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
    ) -> Result<(), ReplicationError> {
        let connection = self
            .connections
            .get_mut(&connection_id)
            .ok_or(ReplicationError::UnknownConnection { connection_id })?;
        connection
            .reader
            .read_packet(reader, &self.protocols, bridge, now)?;
        Ok(())
    }

    /// Retries, for every connection, the data held back on references that
    /// were not available yet.
    pub fn process_queued_batches(
        &mut self,
        bridge: &mut dyn ReplicationBridge,
        now: Instant,
    ) -> Result<(), ReplicationError> {
        for connection_id in self.connection_ids() {
            if let Some(connection) = self.connections.get_mut(&connection_id) {
                connection
                    .reader
                    .process_queued_batches(&self.protocols, bridge, now)?;
            }
        }
        Ok(())
    }

    pub fn take_reader_events(&mut self, connection_id: ConnectionId) -> Result<Vec<ReaderEvent>, ReplicationError> {
        Ok(self.try_connection_mut(connection_id)?.reader.take_events())
    }

    // Diagnostics

    /// Baselines held across every connection's writer.
    pub fn live_baseline_count(&self) -> usize {
        self.connections
            .values()
            .map(|connection| connection.writer.live_baseline_count())
            .sum()
    }

    fn broadcast_capacity(&mut self) {
        let Some(max_internal_index) = self.registry.take_capacity_increase() else {
            return;
        };
        info!(
            "internal index space grew to {}, resizing {} connections",
            max_internal_index,
            self.connections.len()
        );
        for connection in self.connections.values_mut() {
            crate::registry::MaxInternalIndexListener::on_max_internal_index_increased(
                &mut connection.writer,
                max_internal_index,
            );
        }
    }
}
