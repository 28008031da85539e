use crate::{BitReader, BitWrite, ConstBitLength, Serde, SerdeErr};

// Booleans

impl Serde for bool {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bit(*self);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        reader.read_bit()
    }

    fn bit_length(&self) -> u32 {
        1
    }
}

impl ConstBitLength for bool {
    fn const_bit_length() -> u32 {
        1
    }
}

// Unsigned integers

macro_rules! impl_serde_unsigned {
    ($type:ty, $bits:expr) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(u64::from(*self), $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                let value = reader.read_bits($bits)?;
                <$type>::try_from(value).map_err(|_| SerdeErr::ValueOutOfRange {
                    value,
                    type_name: stringify!($type),
                })
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $type {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_unsigned!(u8, 8);
impl_serde_unsigned!(u16, 16);
impl_serde_unsigned!(u32, 32);
impl_serde_unsigned!(u64, 64);

// Signed integers, written as their two's complement bit pattern

macro_rules! impl_serde_signed {
    ($type:ty, $unsigned:ty, $bits:expr) => {
        impl Serde for $type {
            fn ser(&self, writer: &mut dyn BitWrite) {
                writer.write_bits(u64::from(*self as $unsigned), $bits);
            }

            fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
                // truncation keeps the two's complement bit pattern
                let value = reader.read_bits($bits)?;
                Ok(value as $type)
            }

            fn bit_length(&self) -> u32 {
                $bits
            }
        }

        impl ConstBitLength for $type {
            fn const_bit_length() -> u32 {
                $bits
            }
        }
    };
}

impl_serde_signed!(i8, u8, 8);
impl_serde_signed!(i16, u16, 16);
impl_serde_signed!(i32, u32, 32);
impl_serde_signed!(i64, u64, 64);

// Floats

impl Serde for f32 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(u64::from(self.to_bits()), 32);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let bits = reader.read_bits(32)?;
        Ok(f32::from_bits(bits as u32))
    }

    fn bit_length(&self) -> u32 {
        32
    }
}

impl Serde for f64 {
    fn ser(&self, writer: &mut dyn BitWrite) {
        writer.write_bits(self.to_bits(), 64);
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        let bits = reader.read_bits(64)?;
        Ok(f64::from_bits(bits))
    }

    fn bit_length(&self) -> u32 {
        64
    }
}

// Options

impl<T: Serde> Serde for Option<T> {
    fn ser(&self, writer: &mut dyn BitWrite) {
        match self {
            Some(value) => {
                writer.write_bit(true);
                value.ser(writer);
            }
            None => {
                writer.write_bit(false);
            }
        }
    }

    fn de(reader: &mut BitReader) -> Result<Self, SerdeErr> {
        if reader.read_bit()? {
            Ok(Some(T::de(reader)?))
        } else {
            Ok(None)
        }
    }

    fn bit_length(&self) -> u32 {
        match self {
            Some(value) => 1 + value.bit_length(),
            None => 1,
        }
    }
}
