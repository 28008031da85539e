use crate::{bit_counter::BitCounter, constants::MTU_SIZE_BITS, BitReader, SerdeErr};

pub trait BitWrite {
    fn write_bit(&mut self, bit: bool);
    fn write_byte(&mut self, byte: u8);
    fn is_counter(&self) -> bool;
    fn count_bits(&mut self, bits: u32);

    /// Writes the lowest `bits` bits of `value`, least significant first.
    fn write_bits(&mut self, value: u64, bits: u32) {
        if self.is_counter() {
            self.count_bits(bits);
            return;
        }
        for i in 0..bits {
            self.write_bit((value >> i) & 1 != 0);
        }
    }
}

/// Bit writer with a fixed bit budget.
///
/// Overflow is sticky: once a write would exceed the budget nothing more is
/// written and `overflowed()` stays true until the writer is rolled back to a
/// position before the overflow.
pub struct BitWriter {
    buffer: Vec<u8>,
    position: u32,
    max_bits: u32,
    overflowed: bool,
}

impl BitWriter {
    pub fn new() -> Self {
        Self::with_max_bits(MTU_SIZE_BITS)
    }

    pub fn with_max_bits(max_bits: u32) -> Self {
        Self {
            buffer: Vec::with_capacity(((max_bits as usize) + 7) / 8),
            position: 0,
            max_bits,
            overflowed: false,
        }
    }

    pub fn counter(&self) -> BitCounter {
        BitCounter::new(self.position, self.position, self.max_bits)
    }

    pub fn bit_position(&self) -> u32 {
        self.position
    }

    pub fn bits_free(&self) -> u32 {
        self.max_bits.saturating_sub(self.position)
    }

    pub fn max_bits(&self) -> u32 {
        self.max_bits
    }

    pub fn overflowed(&self) -> bool {
        self.overflowed
    }

    /// Marks the writer as overflowed, which callers use to force a rollback.
    pub fn force_overflow(&mut self) {
        self.overflowed = true;
    }

    pub fn reserve_bits(&mut self, bits: u32) {
        self.max_bits = self.max_bits.saturating_sub(bits);
    }

    pub fn release_bits(&mut self, bits: u32) {
        self.max_bits += bits;
    }

    /// Overwrites `bits` already-written bits starting at `position`.
    /// Used to patch headers whose value is only known after the payload.
    pub fn write_bits_at(&mut self, position: u32, value: u64, bits: u32) {
        if position + bits > self.position {
            self.overflowed = true;
            return;
        }
        for i in 0..bits {
            self.put_bit(position + i, (value >> i) & 1 != 0);
        }
    }

    /// Discards everything written after `position` and clears the overflow flag.
    pub fn rollback(&mut self, position: u32) {
        if position >= self.position && !self.overflowed {
            return;
        }
        let position = position.min(self.position);
        self.position = position;
        self.buffer.truncate(((position as usize) + 7) / 8);
        let used_bits_in_last_byte = position % 8;
        if used_bits_in_last_byte != 0 {
            if let Some(last) = self.buffer.last_mut() {
                *last &= (1u8 << used_bits_in_last_byte) - 1;
            }
        }
        self.overflowed = false;
    }

    /// Copies the remaining bits of `reader`, up to `bits`, into this writer.
    pub fn write_from_reader(&mut self, reader: &mut BitReader, bits: u32) -> Result<(), SerdeErr> {
        for _ in 0..bits {
            let bit = reader.read_bit()?;
            self.write_bit(bit);
        }
        Ok(())
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn to_bytes(self) -> Box<[u8]> {
        self.buffer.into_boxed_slice()
    }

    fn put_bit(&mut self, position: u32, bit: bool) {
        let byte_index = (position / 8) as usize;
        let mask = 1u8 << (position % 8);
        if byte_index >= self.buffer.len() {
            self.buffer.resize(byte_index + 1, 0);
        }
        if bit {
            self.buffer[byte_index] |= mask;
        } else {
            self.buffer[byte_index] &= !mask;
        }
    }
}

impl Default for BitWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BitWrite for BitWriter {
    fn write_bit(&mut self, bit: bool) {
        if self.overflowed {
            return;
        }
        if self.position >= self.max_bits {
            self.overflowed = true;
            return;
        }
        self.put_bit(self.position, bit);
        self.position += 1;
    }

    fn write_byte(&mut self, byte: u8) {
        let mut temp = byte;
        for _ in 0..8 {
            self.write_bit(temp & 1 != 0);
            temp >>= 1;
        }
    }

    fn is_counter(&self) -> bool {
        false
    }

    fn count_bits(&mut self, _bits: u32) {
        // nothing to count, this writer records actual bits
    }
}
