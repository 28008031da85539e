use netrep_serde::SerdeErr;
use thiserror::Error;

use crate::{
    bridge::BridgeError, handle::NetHandle, registry::RegistryError, types::ProtocolId,
    writer::BaselineIndex,
};

/// Errors raised while reading replication data
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReaderError {
    /// The bit stream is malformed or truncated
    #[error(transparent)]
    BitStream(#[from] SerdeErr),

    /// A packet claims more batches than any sender would write
    #[error("Packet announces {count} batches, more than the {max} allowed")]
    BatchCountTooLarge { count: u16, max: u16 },

    /// A huge-object fragment arrived out of sequence
    #[error("Huge-object fragment {index} of {count} received, expected fragment {expected}")]
    HugeObjectFragmentMismatch { index: u64, count: u64, expected: u64 },

    /// A reassembled huge object exceeds the configured buffer
    #[error("Reassembled huge object would need {bits} bits, more than the {max_bits} allowed")]
    HugeObjectTooLarge { bits: u64, max_bits: u32 },

    /// An initial state names a protocol this peer does not know
    #[error("Object {handle} uses unknown protocol {protocol_id}")]
    UnknownProtocol { handle: NetHandle, protocol_id: ProtocolId },

    /// Data arrived for an object that was never created here
    #[error("Received data for unknown object {handle}")]
    UnknownObject { handle: NetHandle },

    /// A delta names a baseline this peer does not hold
    #[error("Object {handle} has no baseline {baseline}")]
    MissingBaseline { handle: NetHandle, baseline: BaselineIndex },

    /// The bridge refused to create a local instance
    #[error(transparent)]
    Bridge(#[from] BridgeError),

    /// The remote object mirror rejected an operation
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ReaderError {
    /// Whether the rest of the packet can no longer be trusted. Other errors
    /// only break the object they occurred on.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ReaderError::BitStream(_)
                | ReaderError::BatchCountTooLarge { .. }
                | ReaderError::HugeObjectFragmentMismatch { .. }
                | ReaderError::HugeObjectTooLarge { .. }
        )
    }
}
