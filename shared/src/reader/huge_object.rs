use netrep_serde::{BitWriter, OwnedBitReader, Serde, UnsignedVariableInteger};

use crate::{attachment::NetAttachment, reader::error::ReaderError};

/// Collects the fragments of one huge object at a time. Fragments arrive
/// through the reliable out-of-band lane, so they are already in order.
pub struct HugeObjectAssembler {
    buffer: BitWriter,
    expected_index: u64,
    fragment_count: u64,
    max_bits: u32,
}

impl HugeObjectAssembler {
    pub fn new(max_bits: u32) -> Self {
        Self {
            buffer: BitWriter::with_max_bits(max_bits),
            expected_index: 0,
            fragment_count: 0,
            max_bits,
        }
    }

    pub fn is_assembling(&self) -> bool {
        self.expected_index != 0
    }

    /// Appends one fragment. Returns the reassembled buffer once the last
    /// fragment is in.
    pub fn receive(&mut self, fragment: &NetAttachment) -> Result<Option<OwnedBitReader>, ReaderError> {
        let mut reader = fragment.reader();
        let index = UnsignedVariableInteger::<7>::de(&mut reader)?.get();
        let count = UnsignedVariableInteger::<7>::de(&mut reader)?.get();

        if index != self.expected_index || count == 0 || (index > 0 && count != self.fragment_count) {
            let expected = self.expected_index;
            self.reset();
            return Err(ReaderError::HugeObjectFragmentMismatch { index, count, expected });
        }
        if index == 0 {
            self.fragment_count = count;
        }

        let chunk_bits = reader.bits_left();
        let total_bits = u64::from(self.buffer.bit_position()) + u64::from(chunk_bits);
        if total_bits > u64::from(self.max_bits) {
            self.reset();
            return Err(ReaderError::HugeObjectTooLarge {
                bits: total_bits,
                max_bits: self.max_bits,
            });
        }
        self.buffer.write_from_reader(&mut reader, chunk_bits)?;
        self.expected_index += 1;

        if self.expected_index < self.fragment_count {
            return Ok(None);
        }
        let buffer = std::mem::replace(&mut self.buffer, BitWriter::with_max_bits(self.max_bits));
        self.expected_index = 0;
        self.fragment_count = 0;
        let bit_length = buffer.bit_position();
        Ok(Some(OwnedBitReader::new(buffer.to_bytes(), bit_length)))
    }

    fn reset(&mut self) {
        self.buffer = BitWriter::with_max_bits(self.max_bits);
        self.expected_index = 0;
        self.fragment_count = 0;
    }
}
