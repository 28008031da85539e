use thiserror::Error;

use crate::{handle::NetHandle, writer::state::ReplicatedObjectState};

/// A state machine edge that is not in the legal transition table
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StateTransitionError {
    /// The object cannot move from `from` to `to`
    #[error("Illegal replication state transition from {from:?} to {to:?}")]
    Illegal {
        from: ReplicatedObjectState,
        to: ReplicatedObjectState,
    },
}

/// Errors that end writing for a connection
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WriterError {
    /// A batch does not fit the batch size field
    #[error("Object {handle} needs {bits} bits but a batch can carry at most {max_bits}; it must be sent as a huge object")]
    ObjectStateTooLarge {
        handle: NetHandle,
        bits: u32,
        max_bits: u32,
    },

    /// An object does not fit even the huge-object scratch buffer
    #[error("Object {handle} does not fit the {max_bits} bit huge-object buffer")]
    HugeObjectTooLarge { handle: NetHandle, max_bits: u32 },

    /// An object was driven through an illegal state transition
    #[error(transparent)]
    StateTransition(#[from] StateTransitionError),
}
