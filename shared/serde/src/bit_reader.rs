use crate::SerdeErr;

/// Reads bits out of a borrowed buffer.
///
/// Positions are absolute bit offsets into the buffer, so a sub-reader taken
/// from the middle of a packet reports the same positions as its parent.
#[derive(Clone)]
pub struct BitReader<'b> {
    buffer: &'b [u8],
    position: u32,
    end: u32,
}

impl<'b> BitReader<'b> {
    pub fn new(buffer: &'b [u8]) -> Self {
        Self {
            buffer,
            position: 0,
            end: (buffer.len() * 8) as u32,
        }
    }

    /// Reader over the first `bit_length` bits of `buffer`.
    pub fn with_bit_length(buffer: &'b [u8], bit_length: u32) -> Self {
        let end = bit_length.min((buffer.len() * 8) as u32);
        Self {
            buffer,
            position: 0,
            end,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn end(&self) -> u32 {
        self.end
    }

    pub fn bits_left(&self) -> u32 {
        self.end - self.position
    }

    pub fn seek(&mut self, target: u32) -> Result<(), SerdeErr> {
        if target > self.end {
            return Err(SerdeErr::SeekOutOfRange {
                target,
                end: self.end,
            });
        }
        self.position = target;
        Ok(())
    }

    pub fn read_bit(&mut self) -> Result<bool, SerdeErr> {
        if self.position >= self.end {
            return Err(SerdeErr::EndOfStream {
                position: self.position,
                end: self.end,
            });
        }
        let byte = self.buffer[(self.position / 8) as usize];
        let bit = (byte >> (self.position % 8)) & 1 != 0;
        self.position += 1;
        Ok(bit)
    }

    /// Reads `bits` bits (at most 64), least significant first.
    pub fn read_bits(&mut self, bits: u32) -> Result<u64, SerdeErr> {
        if bits > self.bits_left() {
            return Err(SerdeErr::EndOfStream {
                position: self.position + bits,
                end: self.end,
            });
        }
        let mut output: u64 = 0;
        for i in 0..bits {
            if self.read_bit()? {
                output |= 1 << i;
            }
        }
        Ok(output)
    }

    pub fn read_byte(&mut self) -> Result<u8, SerdeErr> {
        let value = self.read_bits(8)?;
        Ok(value as u8)
    }

    /// Splits off a reader over the next `bits` bits and advances past them.
    pub fn sub_reader(&mut self, bits: u32) -> Result<BitReader<'b>, SerdeErr> {
        if bits > self.bits_left() {
            return Err(SerdeErr::EndOfStream {
                position: self.position + bits,
                end: self.end,
            });
        }
        let sub = BitReader {
            buffer: self.buffer,
            position: self.position,
            end: self.position + bits,
        };
        self.position += bits;
        Ok(sub)
    }

    /// Copies the next `bits` bits into an owned buffer and advances past them.
    pub fn copy_bits(&mut self, bits: u32) -> Result<OwnedBitReader, SerdeErr> {
        if bits > self.bits_left() {
            return Err(SerdeErr::EndOfStream {
                position: self.position + bits,
                end: self.end,
            });
        }
        let mut buffer = vec![0u8; ((bits as usize) + 7) / 8];
        for i in 0..bits {
            if self.read_bit()? {
                buffer[(i / 8) as usize] |= 1 << (i % 8);
            }
        }
        Ok(OwnedBitReader::new(buffer.into_boxed_slice(), bits))
    }
}

/// Owned copy of a bit range, used where data must outlive the packet it
/// arrived in.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnedBitReader {
    buffer: Box<[u8]>,
    bit_length: u32,
}

impl OwnedBitReader {
    pub fn new(buffer: Box<[u8]>, bit_length: u32) -> Self {
        Self { buffer, bit_length }
    }

    pub fn borrow(&self) -> BitReader<'_> {
        BitReader::with_bit_length(&self.buffer, self.bit_length)
    }

    pub fn bit_length(&self) -> u32 {
        self.bit_length
    }

    pub fn bytes(&self) -> &[u8] {
        &self.buffer
    }
}
