use netrep_serde::{BitReader, BitWrite, SerdeErr};

const WORD_BITS: u32 = 32;

/// Growable fixed-width bit set.
///
/// Used both for per-object changemasks and for the per-index bitsets kept
/// by the registry and the writers, which resize in lockstep with the
/// internal index space.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct BitArray {
    words: Vec<u32>,
    bit_count: u32,
}

/// One bit per protocol member, set when the member must be sent.
pub type ChangeMask = BitArray;

impl BitArray {
    pub fn new(bit_count: u32) -> Self {
        Self {
            words: vec![0; Self::word_count(bit_count)],
            bit_count,
        }
    }

    /// Bit array of `bit_count` bits, all set.
    pub fn full(bit_count: u32) -> Self {
        let mut array = Self::new(bit_count);
        array.set_all();
        array
    }

    fn word_count(bit_count: u32) -> usize {
        bit_count.div_ceil(WORD_BITS) as usize
    }

    pub fn bit_count(&self) -> u32 {
        self.bit_count
    }

    pub fn get_bit(&self, index: u32) -> bool {
        if index >= self.bit_count {
            return false;
        }
        self.words[(index / WORD_BITS) as usize] & (1 << (index % WORD_BITS)) != 0
    }

    pub fn set_bit(&mut self, index: u32) {
        if index < self.bit_count {
            self.words[(index / WORD_BITS) as usize] |= 1 << (index % WORD_BITS);
        }
    }

    pub fn clear_bit(&mut self, index: u32) {
        if index < self.bit_count {
            self.words[(index / WORD_BITS) as usize] &= !(1 << (index % WORD_BITS));
        }
    }

    pub fn set_bit_value(&mut self, index: u32, value: bool) {
        if value {
            self.set_bit(index);
        } else {
            self.clear_bit(index);
        }
    }

    pub fn set_all(&mut self) {
        for word in self.words.iter_mut() {
            *word = u32::MAX;
        }
        self.clear_padding();
    }

    pub fn clear_all(&mut self) {
        for word in self.words.iter_mut() {
            *word = 0;
        }
    }

    pub fn is_any_set(&self) -> bool {
        self.words.iter().any(|word| *word != 0)
    }

    pub fn is_empty(&self) -> bool {
        !self.is_any_set()
    }

    pub fn count_set_bits(&self) -> u32 {
        self.words.iter().map(|word| word.count_ones()).sum()
    }

    /// Grows or shrinks to `bit_count`, keeping existing bits.
    pub fn resize(&mut self, bit_count: u32) {
        self.words.resize(Self::word_count(bit_count), 0);
        self.bit_count = bit_count;
        self.clear_padding();
    }

    /// `self |= other`, over the bits both arrays have.
    pub fn combine(&mut self, other: &BitArray) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word |= *other_word;
        }
        self.clear_padding();
    }

    /// `self &= !other`
    pub fn and_not(&mut self, other: &BitArray) {
        for (word, other_word) in self.words.iter_mut().zip(other.words.iter()) {
            *word &= !*other_word;
        }
    }

    /// `self &= other`; bits past the end of `other` are cleared.
    pub fn intersect(&mut self, other: &BitArray) {
        for (index, word) in self.words.iter_mut().enumerate() {
            *word &= other.words.get(index).copied().unwrap_or(0);
        }
    }

    pub fn intersects(&self, other: &BitArray) -> bool {
        self.words
            .iter()
            .zip(other.words.iter())
            .any(|(word, other_word)| word & other_word != 0)
    }

    pub fn iter_set_bits(&self) -> impl Iterator<Item = u32> + '_ {
        self.words
            .iter()
            .enumerate()
            .flat_map(|(word_index, word)| {
                let word = *word;
                (0..WORD_BITS)
                    .filter(move |bit| word & (1 << bit) != 0)
                    .map(move |bit| word_index as u32 * WORD_BITS + bit)
            })
    }

    /// Writes exactly `bit_count` bits.
    pub fn ser(&self, writer: &mut dyn BitWrite) {
        let mut remaining = self.bit_count;
        for word in &self.words {
            let bits = remaining.min(WORD_BITS);
            writer.write_bits(u64::from(*word), bits);
            remaining -= bits;
        }
    }

    pub fn de(reader: &mut BitReader, bit_count: u32) -> Result<Self, SerdeErr> {
        let mut array = Self::new(bit_count);
        let mut remaining = bit_count;
        for word in array.words.iter_mut() {
            let bits = remaining.min(WORD_BITS);
            // at most 32 bits were read
            *word = reader.read_bits(bits)? as u32;
            remaining -= bits;
        }
        Ok(array)
    }

    fn clear_padding(&mut self) {
        let used = self.bit_count % WORD_BITS;
        if used != 0 {
            if let Some(last) = self.words.last_mut() {
                *last &= (1u32 << used) - 1;
            }
        }
    }
}
