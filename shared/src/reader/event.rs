use crate::{handle::NetHandle, reader::error::ReaderError};

/// Things the reader reports to the application instead of failing the
/// packet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReaderEvent {
    /// Reading data for `handle` failed. Its data is dropped until the
    /// sender ends its replication.
    BrokenObject { handle: NetHandle, error: ReaderError },
    /// Data for `handle` has been waiting on `pending` references for
    /// longer than the configured timeout.
    QueuedBatchTimeout { handle: NetHandle, pending: Vec<NetHandle> },
}
