/// Replication protocols shared by every scenario

use std::sync::Arc;

use netrep_shared::{MemberKind, Protocol, ProtocolId, ReplicationProtocol};

pub const CRATE: ProtocolId = 1;
pub const TURRET: ProtocolId = 2;
pub const GATE: ProtocolId = 3;
pub const SCROLL: ProtocolId = 4;

// Crate members
pub const CRATE_OPEN: usize = 0;
pub const CRATE_WEIGHT: usize = 1;
pub const CRATE_LABEL: usize = 2;

// Turret members
pub const TURRET_HEADING: usize = 0;
pub const TURRET_TARGET: usize = 1;

// Gate members
pub const GATE_KEY: usize = 0;

pub const SCROLL_TEXT: usize = 0;
pub const SCROLL_MAX_LEN: u16 = 4000;

/// Delta-compressed, plain values only.
pub fn crate_protocol() -> Arc<ReplicationProtocol> {
    ReplicationProtocol::builder(CRATE, "Crate")
        .member("open", MemberKind::Bool)
        .member("weight", MemberKind::Unsigned { bits: 16 })
        .member("label", MemberKind::Bytes { max_len: 64 })
        .delta_compression(true)
        .build()
}

/// Holds a dynamic reference that may arrive before its target.
pub fn turret_protocol() -> Arc<ReplicationProtocol> {
    ReplicationProtocol::builder(TURRET, "Turret")
        .member("heading", MemberKind::Unsigned { bits: 9 })
        .member("target", MemberKind::Reference { must_be_mapped: false })
        .build()
}

/// Its key must be loaded before the gate itself can be applied.
pub fn gate_protocol() -> Arc<ReplicationProtocol> {
    ReplicationProtocol::builder(GATE, "Gate")
        .member("key", MemberKind::Reference { must_be_mapped: true })
        .build()
}

/// Large enough to need the huge-object path.
pub fn scroll_protocol() -> Arc<ReplicationProtocol> {
    ReplicationProtocol::builder(SCROLL, "Scroll")
        .member("text", MemberKind::Bytes { max_len: SCROLL_MAX_LEN })
        .build()
}

pub fn protocol() -> Protocol {
    Protocol::builder()
        .add_replication_protocol(crate_protocol())
        .add_replication_protocol(turret_protocol())
        .add_replication_protocol(gate_protocol())
        .add_replication_protocol(scroll_protocol())
        .build()
}
