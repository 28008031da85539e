use thiserror::Error;

use crate::handle::NetHandle;

/// Errors that can occur when queueing attachments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttachmentError {
    /// Too many reliable attachments are waiting for acknowledgement
    #[error("Reliable attachment queue for {handle} is full ({limit} queued)")]
    ReliableQueueFull { handle: NetHandle, limit: usize },

    /// The target object is not replicated to the connection
    #[error("Cannot attach to {handle}: the object is not replicated to this connection")]
    ObjectNotReplicated { handle: NetHandle },

    /// The attachment does not fit in the largest payload a batch can carry
    #[error("Attachment of {bit_length} bits exceeds the {max_bits} bit limit")]
    AttachmentTooLarge { bit_length: u32, max_bits: u32 },
}
