use thiserror::Error;

/// Errors raised while reading from a bit stream.
///
/// A `SerdeErr` means the stream is no longer trustworthy; callers propagate
/// it with `?` and abandon the rest of the packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SerdeErr {
    /// Attempted to read past the end of the stream
    #[error("Read past end of bit stream at bit {position} (stream ends at bit {end})")]
    EndOfStream { position: u32, end: u32 },

    /// Attempted to seek outside of the stream
    #[error("Seek to bit {target} is outside of bit stream ending at bit {end}")]
    SeekOutOfRange { target: u32, end: u32 },

    /// A decoded value does not fit the type it is decoded into
    #[error("Decoded value {value} is out of range for {type_name}")]
    ValueOutOfRange { value: u64, type_name: &'static str },
}
