use crate::{handle::NetHandle, protocol::replication_protocol::MemberKind};

/// Value of a single replicated member.
#[derive(Clone, Debug, PartialEq)]
pub enum MemberValue {
    Bool(bool),
    Unsigned(u64),
    Signed(i64),
    Float(f32),
    Bytes(Vec<u8>),
    /// Reference to another replicated object; `NetHandle::INVALID` is "none".
    Reference(NetHandle),
}

impl MemberValue {
    pub fn default_for(kind: &MemberKind) -> Self {
        match kind {
            MemberKind::Bool => MemberValue::Bool(false),
            MemberKind::Unsigned { .. } => MemberValue::Unsigned(0),
            MemberKind::Signed { .. } => MemberValue::Signed(0),
            MemberKind::Float => MemberValue::Float(0.0),
            MemberKind::Bytes { .. } => MemberValue::Bytes(Vec::new()),
            MemberKind::Reference { .. } => MemberValue::Reference(NetHandle::INVALID),
        }
    }

    /// Whether this value can be stored in a member of `kind`, including
    /// range checks for narrow integers and byte strings.
    pub fn fits(&self, kind: &MemberKind) -> bool {
        match (self, kind) {
            (MemberValue::Bool(_), MemberKind::Bool) => true,
            (MemberValue::Unsigned(value), MemberKind::Unsigned { bits }) => {
                *bits >= 64 || *value < (1u64 << bits)
            }
            (MemberValue::Signed(value), MemberKind::Signed { bits }) => {
                if *bits >= 64 {
                    return true;
                }
                let limit = 1i64 << (bits - 1);
                (-limit..limit).contains(value)
            }
            (MemberValue::Float(_), MemberKind::Float) => true,
            (MemberValue::Bytes(bytes), MemberKind::Bytes { max_len }) => {
                bytes.len() <= usize::from(*max_len)
            }
            (MemberValue::Reference(_), MemberKind::Reference { .. }) => true,
            _ => false,
        }
    }

    pub fn as_reference(&self) -> Option<NetHandle> {
        match self {
            MemberValue::Reference(handle) => Some(*handle),
            _ => None,
        }
    }
}

/// Current value of every member of one object, indexed like the protocol's
/// member table.
#[derive(Clone, Debug, PartialEq)]
pub struct ObjectState {
    values: Vec<MemberValue>,
}

impl ObjectState {
    pub fn new(values: Vec<MemberValue>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[MemberValue] {
        &self.values
    }

    pub fn get(&self, member_index: usize) -> Option<&MemberValue> {
        self.values.get(member_index)
    }

    /// Overwrites one member; out-of-range indices are ignored.
    pub fn set(&mut self, member_index: usize, value: MemberValue) {
        if let Some(slot) = self.values.get_mut(member_index) {
            *slot = value;
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
