/// Dense per-system offset of a replicated object.
pub type InternalIndex = u32;

/// Index 0 never names an object.
pub const INVALID_INTERNAL_INDEX: InternalIndex = 0;

/// Out-of-band attachments (huge-object fragments) travel under index 0.
pub const OOB_ATTACHMENT_INDEX: InternalIndex = 0;

pub type ConnectionId = u32;

pub type ProtocolId = u32;

/// Outcome of a written packet, reported back by the transport in the order
/// the packets were written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeliveryStatus {
    Delivered,
    Lost,
    /// The packet will never be resent or acknowledged, e.g. the connection
    /// is closing.
    Discarded,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum WriteResult {
    /// Nothing was written and the packet segment was rolled back.
    NoData,
    Ok,
    /// Data was written but more is waiting for a later packet.
    HasMoreData,
}
