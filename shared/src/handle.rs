use std::{
    fmt,
    hash::{Hash, Hasher},
};

use netrep_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

/// Globally stable identifier of a replicated object.
///
/// The lowest bit of the id tells static (1) from dynamic (0) objects. Id 0
/// is the invalid handle. Only the id travels on the wire, so handles
/// compare and hash by id alone.
#[derive(Clone, Copy, Default)]
pub struct NetHandle {
    id: u64,
    replication_system_id: u32,
}

impl NetHandle {
    pub const INVALID: NetHandle = NetHandle {
        id: 0,
        replication_system_id: 0,
    };

    pub fn new(id: u64, replication_system_id: u32) -> Self {
        Self {
            id,
            replication_system_id,
        }
    }

    /// Handle for an id read off the wire.
    pub fn from_id(id: u64) -> Self {
        Self {
            id,
            replication_system_id: 0,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn replication_system_id(&self) -> u32 {
        self.replication_system_id
    }

    pub fn is_valid(&self) -> bool {
        self.id != 0
    }

    pub fn is_static(&self) -> bool {
        self.id & 1 == 1
    }

    pub fn is_dynamic(&self) -> bool {
        self.is_valid() && !self.is_static()
    }

    pub fn kind(&self) -> HandleKind {
        if self.is_static() {
            HandleKind::Static
        } else {
            HandleKind::Dynamic
        }
    }
}

impl PartialEq for NetHandle {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for NetHandle {}

impl Hash for NetHandle {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for NetHandle {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NetHandle {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.id.cmp(&other.id)
    }
}

impl fmt::Debug for NetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NetHandle({}:{})", self.id, self.replication_system_id)
    }
}

impl fmt::Display for NetHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl Serde for NetHandle {
    fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<7>::new(self.id).ser(writer);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let id = UnsignedVariableInteger::<7>::de(reader)?.get();
        Ok(Self::from_id(id))
    }

    fn bit_length(&self) -> u32 {
        UnsignedVariableInteger::<7>::new(self.id).bit_length()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum HandleKind {
    /// Exists on both peers ahead of replication, e.g. loaded with a level.
    Static,
    /// Spawned at runtime; the receiver must instantiate it.
    Dynamic,
}

/// Hands out handles for one replication system.
pub struct HandleAllocator {
    replication_system_id: u32,
    next_static: u64,
    next_dynamic: u64,
}

impl HandleAllocator {
    pub fn new(replication_system_id: u32) -> Self {
        Self {
            replication_system_id,
            next_static: 1,
            next_dynamic: 1,
        }
    }

    pub fn allocate(&mut self, kind: HandleKind) -> NetHandle {
        let id = match kind {
            HandleKind::Static => {
                let sequence = self.next_static;
                self.next_static += 1;
                (sequence << 1) | 1
            }
            HandleKind::Dynamic => {
                let sequence = self.next_dynamic;
                self.next_dynamic += 1;
                sequence << 1
            }
        };
        NetHandle::new(id, self.replication_system_id)
    }
}
