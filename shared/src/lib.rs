//! # Netrep Shared
//! Object replication for networked simulations: identity, scheduling,
//! delta-compressed serialization and reception of replicated objects.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

#[macro_use]
extern crate cfg_if;

cfg_if! {
    if #[cfg(target_pointer_width = "16")]
    {
        // Internal indices address per-object arrays directly
        compile_error!("'netrep_shared' crate needs at least a 32-bit target: internal indices are used as array offsets.");
    }
}

pub use netrep_serde::{
    BitCounter, BitReader, BitWrite, BitWriter, ConstBitLength, OwnedBitReader, Serde, SerdeErr,
    UnsignedInteger, UnsignedVariableInteger, MTU_SIZE_BITS, MTU_SIZE_BYTES,
};

mod bit_array;
mod bridge;
mod config;
mod connection;
mod constants;
mod error;
mod handle;
mod replication_system;
mod types;
mod wrapping_number;

pub mod attachment;
pub mod protocol;
pub mod reader;
pub mod registry;
pub mod writer;

pub use attachment::{AttachmentError, NetAttachment};
pub use bit_array::{BitArray, ChangeMask};
pub use bridge::{BridgeError, EndReplicationFlags, ReplicationBridge, StateUpdate};
pub use config::{PriorityFn, ReplicationConfig};
pub use connection::Connection;
pub use constants::{
    BATCH_COUNT_BIT_COUNT, DESTROY_HEADER_BIT_COUNT, DESTROY_HEADER_DESTROY_INSTANCE,
    DESTROY_HEADER_END_REPLICATION, DESTROY_HEADER_TEAR_OFF, MAX_HUGE_OBJECT_FRAGMENTS_IN_FLIGHT,
};
pub use error::ReplicationError;
pub use handle::{HandleAllocator, HandleKind, NetHandle};
pub use protocol::{
    MemberKind, MemberReference, MemberValue, ObjectState, Protocol, ProtocolError, ProtocolPlugin,
    ReplicationMember, ReplicationProtocol, ReplicationProtocolBuilder,
};
pub use reader::{ReaderError, ReaderEvent, ReplicationReader};
pub use registry::{
    DependentSchedulingHint, DestroyFlags, ObjectRegistry, RegistryError, SubObjectCondition,
};
pub use replication_system::ReplicationSystem;
pub use types::{
    ConnectionId, DeliveryStatus, InternalIndex, ProtocolId, WriteResult, INVALID_INTERNAL_INDEX,
    OOB_ATTACHMENT_INDEX,
};
pub use wrapping_number::{sequence_greater_than, sequence_less_than, SequenceNumber};
pub use writer::{ReplicatedObjectState, ReplicationWriter, StateTransitionError, WriterError};
