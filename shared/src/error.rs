use thiserror::Error;

use crate::{
    attachment::AttachmentError, protocol::ProtocolError, reader::ReaderError,
    registry::RegistryError, types::ConnectionId, writer::WriterError,
};

/// Errors surfaced by [`ReplicationSystem`](crate::ReplicationSystem)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReplicationError {
    /// No connection is registered under this id
    #[error("Connection {connection_id} does not exist")]
    UnknownConnection { connection_id: ConnectionId },

    /// A connection was added twice
    #[error("Connection {connection_id} already exists")]
    ConnectionAlreadyExists { connection_id: ConnectionId },

    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    #[error(transparent)]
    Writer(#[from] WriterError),

    #[error(transparent)]
    Reader(#[from] ReaderError),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),
}
