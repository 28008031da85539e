use netrep_serde::{BitReader, BitWrite, BitWriter, Serde, SerdeErr, UnsignedVariableInteger};

/// Opaque payload sent alongside an object's state, e.g. a remote call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetAttachment {
    payload: Box<[u8]>,
    bit_length: u32,
}

impl NetAttachment {
    pub fn new(payload: Box<[u8]>, bit_length: u32) -> Self {
        let bit_length = bit_length.min((payload.len() * 8) as u32);
        Self {
            payload,
            bit_length,
        }
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        let bit_length = (bytes.len() * 8) as u32;
        Self {
            payload: bytes.into_boxed_slice(),
            bit_length,
        }
    }

    /// Attachment holding everything written to `writer`.
    pub fn from_writer(writer: BitWriter) -> Self {
        let bit_length = writer.bit_position();
        Self::new(writer.to_bytes(), bit_length)
    }

    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    pub fn reader(&self) -> BitReader<'_> {
        BitReader::with_bit_length(&self.payload, self.bit_length)
    }

    /// Bit length, then the payload bits.
    pub fn ser(&self, writer: &mut dyn BitWrite) {
        UnsignedVariableInteger::<7>::new(self.bit_length).ser(writer);
        let whole_bytes = (self.bit_length / 8) as usize;
        for byte in &self.payload[..whole_bytes] {
            writer.write_byte(*byte);
        }
        let tail_bits = self.bit_length % 8;
        if tail_bits != 0 {
            writer.write_bits(u64::from(self.payload[whole_bytes]), tail_bits);
        }
    }

    pub fn de(reader: &mut BitReader, max_bit_length: u32) -> Result<Self, SerdeErr> {
        let bit_length = UnsignedVariableInteger::<7>::de(reader)?.get();
        if bit_length > u64::from(max_bit_length) {
            return Err(SerdeErr::ValueOutOfRange {
                value: bit_length,
                type_name: "attachment bit length",
            });
        }
        let bits = reader.copy_bits(bit_length as u32)?;
        Ok(Self::new(bits.bytes().into(), bits.bit_length()))
    }
}
