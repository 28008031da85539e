use std::sync::Arc;

use netrep_serde::{BitReader, BitWrite, Serde, SerdeErr, UnsignedVariableInteger};

use crate::{
    bit_array::ChangeMask,
    handle::NetHandle,
    protocol::{
        error::ProtocolError,
        object_state::{MemberValue, ObjectState},
    },
    types::ProtocolId,
};

/// Wire layout of one member.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MemberKind {
    Bool,
    Unsigned { bits: u8 },
    /// Two's complement, sign-extended on read.
    Signed { bits: u8 },
    Float,
    Bytes { max_len: u16 },
    /// Handle of another object. A must-be-mapped reference has to be
    /// loadable on the receiver before the owning batch is applied.
    Reference { must_be_mapped: bool },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReplicationMember {
    name: String,
    kind: MemberKind,
}

impl ReplicationMember {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> &MemberKind {
        &self.kind
    }
}

/// A reference found in an object's state.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MemberReference {
    pub change_mask_bit: u32,
    pub handle: NetHandle,
    pub must_be_mapped: bool,
}

/// Descriptor of a replicated object type: its members, in changemask-bit
/// order, and how each is serialized.
///
/// Member `i` owns changemask bit `i`.
#[derive(Debug, PartialEq, Eq)]
pub struct ReplicationProtocol {
    id: ProtocolId,
    name: String,
    members: Vec<ReplicationMember>,
    delta_compression: bool,
}

impl ReplicationProtocol {
    pub fn builder(id: ProtocolId, name: &str) -> ReplicationProtocolBuilder {
        ReplicationProtocolBuilder {
            id,
            name: name.to_string(),
            members: Vec::new(),
            delta_compression: false,
        }
    }

    pub fn id(&self) -> ProtocolId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn members(&self) -> &[ReplicationMember] {
        &self.members
    }

    pub fn member_index(&self, name: &str) -> Option<usize> {
        self.members.iter().position(|member| member.name == name)
    }

    pub fn change_mask_bit_count(&self) -> u32 {
        self.members.len() as u32
    }

    pub fn delta_compression(&self) -> bool {
        self.delta_compression
    }

    pub fn has_references(&self) -> bool {
        self.members
            .iter()
            .any(|member| matches!(member.kind, MemberKind::Reference { .. }))
    }

    pub fn default_state(&self) -> ObjectState {
        ObjectState::new(
            self.members
                .iter()
                .map(|member| MemberValue::default_for(&member.kind))
                .collect(),
        )
    }

    /// Valid references held by the members selected by `mask`.
    pub fn references(&self, state: &ObjectState, mask: &ChangeMask) -> Vec<MemberReference> {
        let mut output = Vec::new();
        for bit in mask.iter_set_bits() {
            let Some(member) = self.members.get(bit as usize) else {
                continue;
            };
            let MemberKind::Reference { must_be_mapped } = member.kind else {
                continue;
            };
            if let Some(MemberValue::Reference(handle)) = state.get(bit as usize) {
                if handle.is_valid() {
                    output.push(MemberReference {
                        change_mask_bit: bit,
                        handle: *handle,
                        must_be_mapped,
                    });
                }
            }
        }
        output
    }

    pub fn write_member(&self, member_index: usize, value: &MemberValue, writer: &mut dyn BitWrite) {
        let Some(member) = self.members.get(member_index) else {
            return;
        };
        match (&member.kind, value) {
            (MemberKind::Bool, MemberValue::Bool(value)) => writer.write_bit(*value),
            (MemberKind::Unsigned { bits }, MemberValue::Unsigned(value)) => {
                writer.write_bits(*value, u32::from(*bits));
            }
            (MemberKind::Signed { bits }, MemberValue::Signed(value)) => {
                writer.write_bits(*value as u64, u32::from(*bits));
            }
            (MemberKind::Float, MemberValue::Float(value)) => value.ser(writer),
            (MemberKind::Bytes { max_len }, MemberValue::Bytes(bytes)) => {
                let len = bytes.len().min(usize::from(*max_len));
                UnsignedVariableInteger::<7>::new(len as u64).ser(writer);
                for byte in &bytes[..len] {
                    writer.write_byte(*byte);
                }
            }
            (MemberKind::Reference { .. }, MemberValue::Reference(handle)) => handle.ser(writer),
            (kind, _) => {
                // values are checked on the way into the registry
                self.write_member(member_index, &MemberValue::default_for(kind), writer);
            }
        }
    }

    pub fn read_member(&self, member_index: usize, reader: &mut BitReader) -> Result<MemberValue, SerdeErr> {
        let Some(member) = self.members.get(member_index) else {
            return Err(SerdeErr::ValueOutOfRange {
                value: member_index as u64,
                type_name: "member index",
            });
        };
        let value = match member.kind {
            MemberKind::Bool => MemberValue::Bool(reader.read_bit()?),
            MemberKind::Unsigned { bits } => MemberValue::Unsigned(reader.read_bits(u32::from(bits))?),
            MemberKind::Signed { bits } => {
                let raw = reader.read_bits(u32::from(bits))?;
                let shift = 64 - u32::from(bits);
                MemberValue::Signed(((raw << shift) as i64) >> shift)
            }
            MemberKind::Float => MemberValue::Float(f32::de(reader)?),
            MemberKind::Bytes { max_len } => {
                let len = UnsignedVariableInteger::<7>::de(reader)?.get();
                if len > u64::from(max_len) {
                    return Err(SerdeErr::ValueOutOfRange {
                        value: len,
                        type_name: "byte string length",
                    });
                }
                let mut bytes = Vec::with_capacity(len as usize);
                for _ in 0..len {
                    bytes.push(reader.read_byte()?);
                }
                MemberValue::Bytes(bytes)
            }
            MemberKind::Reference { .. } => MemberValue::Reference(NetHandle::de(reader)?),
        };
        Ok(value)
    }

    /// Full (non-delta) form: the changemask, then every selected member.
    pub fn write_state(&self, state: &ObjectState, mask: &ChangeMask, writer: &mut dyn BitWrite) {
        mask.ser(writer);
        for bit in mask.iter_set_bits() {
            if let Some(value) = state.get(bit as usize) {
                self.write_member(bit as usize, value, writer);
            }
        }
    }

    /// Reads the full form into `state`, returning the changemask read.
    pub fn read_state(&self, reader: &mut BitReader, state: &mut ObjectState) -> Result<ChangeMask, SerdeErr> {
        let mask = ChangeMask::de(reader, self.change_mask_bit_count())?;
        for bit in mask.iter_set_bits() {
            let value = self.read_member(bit as usize, reader)?;
            state.set(bit as usize, value);
        }
        Ok(mask)
    }

    /// Delta form: the changemask, then for every selected member a bit
    /// saying whether it differs from `baseline`, and its value if it does.
    pub fn write_delta(
        &self,
        state: &ObjectState,
        baseline: &ObjectState,
        mask: &ChangeMask,
        writer: &mut dyn BitWrite,
    ) {
        mask.ser(writer);
        for bit in mask.iter_set_bits() {
            let index = bit as usize;
            let Some(value) = state.get(index) else {
                continue;
            };
            let differs = baseline.get(index) != Some(value);
            writer.write_bit(differs);
            if differs {
                self.write_member(index, value, writer);
            }
        }
    }

    /// Reads the delta form against `baseline` into `state`, returning the
    /// changemask read.
    pub fn read_delta(
        &self,
        reader: &mut BitReader,
        baseline: &ObjectState,
        state: &mut ObjectState,
    ) -> Result<ChangeMask, SerdeErr> {
        let mask = ChangeMask::de(reader, self.change_mask_bit_count())?;
        for bit in mask.iter_set_bits() {
            let index = bit as usize;
            if reader.read_bit()? {
                let value = self.read_member(index, reader)?;
                state.set(index, value);
            } else if let Some(value) = baseline.get(index) {
                state.set(index, value.clone());
            }
        }
        Ok(mask)
    }
}

pub struct ReplicationProtocolBuilder {
    id: ProtocolId,
    name: String,
    members: Vec<ReplicationMember>,
    delta_compression: bool,
}

impl ReplicationProtocolBuilder {
    pub fn member(mut self, name: &str, kind: MemberKind) -> Self {
        self.members.push(ReplicationMember {
            name: name.to_string(),
            kind,
        });
        self
    }

    pub fn delta_compression(mut self, enabled: bool) -> Self {
        self.delta_compression = enabled;
        self
    }

    pub fn try_build(self) -> Result<Arc<ReplicationProtocol>, ProtocolError> {
        for member in &self.members {
            let bits = match member.kind {
                MemberKind::Unsigned { bits } | MemberKind::Signed { bits } => bits,
                _ => continue,
            };
            if bits == 0 || bits > 64 {
                return Err(ProtocolError::InvalidMemberWidth {
                    protocol: self.name.clone(),
                    member: member.name.clone(),
                    bits,
                });
            }
        }
        Ok(Arc::new(ReplicationProtocol {
            id: self.id,
            name: self.name,
            members: self.members,
            delta_compression: self.delta_compression,
        }))
    }

    pub fn build(self) -> Arc<ReplicationProtocol> {
        match self.try_build() {
            Ok(protocol) => protocol,
            Err(error) => panic!("{}", error),
        }
    }
}
