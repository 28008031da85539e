use std::{collections::HashMap, sync::Arc};

use crate::types::ProtocolId;

pub mod error;
pub mod object_state;
pub mod replication_protocol;

pub use error::ProtocolError;
pub use object_state::{MemberValue, ObjectState};
pub use replication_protocol::{
    MemberKind, MemberReference, ReplicationMember, ReplicationProtocol, ReplicationProtocolBuilder,
};

// Protocol Plugin
pub trait ProtocolPlugin {
    fn build(&self, protocol: &mut Protocol);
}

/// Table of every replication protocol both peers agree on, keyed by id.
/// Built once, locked, then shared by the replication system.
#[derive(Default)]
pub struct Protocol {
    replication_protocols: HashMap<ProtocolId, Arc<ReplicationProtocol>>,
    locked: bool,
}

impl Protocol {
    pub fn builder() -> Self {
        Self::default()
    }

    pub fn add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> &mut Self {
        self.check_lock();
        plugin.build(self);
        self
    }

    pub fn add_replication_protocol(&mut self, protocol: Arc<ReplicationProtocol>) -> &mut Self {
        if let Err(error) = self.try_add_replication_protocol(protocol) {
            panic!("{}", error);
        }
        self
    }

    // Non-panicking builder methods

    pub fn try_add_plugin<P: ProtocolPlugin>(&mut self, plugin: P) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        plugin.build(self);
        Ok(self)
    }

    pub fn try_add_replication_protocol(
        &mut self,
        protocol: Arc<ReplicationProtocol>,
    ) -> Result<&mut Self, ProtocolError> {
        self.try_check_lock()?;
        if let Some(existing) = self.replication_protocols.get(&protocol.id()) {
            return Err(ProtocolError::DuplicateProtocolId {
                id: protocol.id(),
                existing: existing.name().to_string(),
            });
        }
        self.replication_protocols.insert(protocol.id(), protocol);
        Ok(self)
    }

    pub fn try_lock(&mut self) -> Result<(), ProtocolError> {
        self.try_check_lock()?;
        self.locked = true;
        Ok(())
    }

    pub fn lock(&mut self) {
        self.check_lock();
        self.locked = true;
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Checks if protocol is locked without panicking
    pub fn try_check_lock(&self) -> Result<(), ProtocolError> {
        if self.locked {
            Err(ProtocolError::AlreadyLocked)
        } else {
            Ok(())
        }
    }

    /// Checks if protocol is locked, panics if it is
    pub fn check_lock(&self) {
        if self.locked {
            panic!("Protocol already locked!");
        }
    }

    pub fn build(&mut self) -> Self {
        std::mem::take(self)
    }

    pub fn get(&self, id: ProtocolId) -> Option<&Arc<ReplicationProtocol>> {
        self.replication_protocols.get(&id)
    }

    pub fn try_get(&self, id: ProtocolId) -> Result<&Arc<ReplicationProtocol>, ProtocolError> {
        self.get(id).ok_or(ProtocolError::UnknownProtocolId { id })
    }

    pub fn replication_protocols(&self) -> impl Iterator<Item = &Arc<ReplicationProtocol>> {
        self.replication_protocols.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pawn() -> Arc<ReplicationProtocol> {
        ReplicationProtocol::builder(1, "Pawn")
            .member("health", MemberKind::Unsigned { bits: 8 })
            .build()
    }

    #[test]
    fn lookup_by_id() {
        let mut protocol = Protocol::builder();
        protocol.add_replication_protocol(pawn());
        let protocol = protocol.build();

        assert_eq!(protocol.try_get(1).unwrap().name(), "Pawn");
        assert_eq!(
            protocol.try_get(2).unwrap_err(),
            ProtocolError::UnknownProtocolId { id: 2 }
        );
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut protocol = Protocol::builder();
        protocol.add_replication_protocol(pawn());
        let result = protocol.try_add_replication_protocol(pawn());
        assert!(matches!(
            result,
            Err(ProtocolError::DuplicateProtocolId { id: 1, .. })
        ));
    }

    #[test]
    fn locked_protocol_rejects_changes() {
        let mut protocol = Protocol::builder();
        protocol.lock();
        assert!(matches!(
            protocol.try_add_replication_protocol(pawn()),
            Err(ProtocolError::AlreadyLocked)
        ));
        assert_eq!(protocol.try_lock(), Err(ProtocolError::AlreadyLocked));
    }
}
