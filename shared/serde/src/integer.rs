use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

/// Unsigned integer written with exactly `BITS` bits.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct UnsignedInteger<const BITS: u8> {
    value: u64,
}

impl<const BITS: u8> UnsignedInteger<BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        let value = value.into();
        if BITS == 0 || BITS > 64 {
            panic!("can't create an integer with {} bits", BITS);
        }
        if BITS < 64 && value >= (1u64 << BITS) {
            panic!(
                "with {} bits, can't encode number greater than {}",
                BITS,
                (1u64 << BITS) - 1
            );
        }
        Self { value }
    }

    pub fn get(&self) -> u64 {
        self.value
    }

    /// Largest value representable with `BITS` bits.
    pub fn max_value() -> u64 {
        if BITS >= 64 {
            u64::MAX
        } else {
            (1u64 << BITS) - 1
        }
    }
}

impl<const BITS: u8> Serde for UnsignedInteger<BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.value, u32::from(BITS));
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let value = reader.read_bits(u32::from(BITS))?;
        Ok(Self { value })
    }

    fn bit_length(&self) -> u32 {
        u32::from(BITS)
    }
}

impl<const BITS: u8> ConstBitLength for UnsignedInteger<BITS> {
    fn const_bit_length() -> u32 {
        u32::from(BITS)
    }
}

/// Unsigned integer written in `BITS`-sized chunks, each preceded by a
/// proceed bit saying whether another chunk follows.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct UnsignedVariableInteger<const BITS: u8> {
    value: u64,
}

impl<const BITS: u8> UnsignedVariableInteger<BITS> {
    pub fn new<T: Into<u64>>(value: T) -> Self {
        if BITS == 0 || BITS >= 64 {
            panic!("can't create a variable integer with {} bit chunks", BITS);
        }
        Self {
            value: value.into(),
        }
    }

    pub fn get(&self) -> u64 {
        self.value
    }
}

impl<const BITS: u8> Serde for UnsignedVariableInteger<BITS> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        let mut value = self.value;
        loop {
            let proceed = value >= (1u64 << BITS);
            writer.write_bit(proceed);
            writer.write_bits(value, u32::from(BITS));
            value >>= BITS;
            if !proceed {
                return;
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let mut output: u64 = 0;
        let mut shift: u32 = 0;
        loop {
            let proceed = reader.read_bit()?;
            let chunk = reader.read_bits(u32::from(BITS))?;
            if shift >= 64 {
                return Err(SerdeErr::ValueOutOfRange {
                    value: chunk,
                    type_name: "UnsignedVariableInteger",
                });
            }
            output |= chunk << shift;
            shift += u32::from(BITS);
            if !proceed {
                return Ok(Self { value: output });
            }
        }
    }

    fn bit_length(&self) -> u32 {
        let mut output: u32 = 0;
        let mut value = self.value;
        loop {
            output += 1 + u32::from(BITS);
            if value < (1u64 << BITS) {
                return output;
            }
            value >>= BITS;
        }
    }
}
