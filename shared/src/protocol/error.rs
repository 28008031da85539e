use thiserror::Error;

use crate::types::ProtocolId;

/// Errors that can occur while building or querying a protocol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// Protocol is locked and cannot be modified
    #[error("Protocol is already locked and cannot be modified. Protocol.lock() has been called and no further changes are allowed")]
    AlreadyLocked,

    /// Two replication protocols were registered under the same id
    #[error("Replication protocol id {id} is already registered (existing: '{existing}')")]
    DuplicateProtocolId { id: ProtocolId, existing: String },

    /// A protocol id read or requested is not registered
    #[error("Replication protocol id {id} is not registered")]
    UnknownProtocolId { id: ProtocolId },

    /// An integer member was declared with an unsupported width
    #[error("Member '{member}' of protocol '{protocol}' has invalid width {bits}; integer members need 1 to 64 bits")]
    InvalidMemberWidth {
        protocol: String,
        member: String,
        bits: u8,
    },
}
