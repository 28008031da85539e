use std::collections::VecDeque;

use netrep_serde::{BitReader, BitWrite, BitWriter, Serde, UnsignedVariableInteger};

use crate::{
    attachment::NetAttachment,
    bit_array::ChangeMask,
    types::InternalIndex,
    wrapping_number::SequenceNumber,
    writer::record::RecordInfo,
};

/// A huge object whose fragments are on their way.
pub struct HugeObjectContext {
    pub root_index: InternalIndex,
    /// Records of every object in the serialized batch, replayed once the
    /// last fragment is acknowledged.
    pub records: Vec<RecordInfo>,
    unacked_fragments: Vec<SequenceNumber>,
}

impl HugeObjectContext {
    pub fn new(root_index: InternalIndex, records: Vec<RecordInfo>, fragments: Vec<SequenceNumber>) -> Self {
        Self {
            root_index,
            records,
            unacked_fragments: fragments,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.unacked_fragments.is_empty()
    }

    pub fn unacked_fragments(&self) -> &[SequenceNumber] {
        &self.unacked_fragments
    }

    pub fn contains_object(&self, index: InternalIndex) -> bool {
        self.root_index == index || self.records.iter().any(|record| record.index == index)
    }
}

/// Huge objects in transit on one connection, in send order.
pub struct HugeObjectSendQueue {
    contexts: VecDeque<HugeObjectContext>,
    max_in_transit: usize,
}

impl HugeObjectSendQueue {
    pub fn new(max_in_transit: usize) -> Self {
        Self {
            contexts: VecDeque::new(),
            max_in_transit,
        }
    }

    pub fn can_enqueue(&self) -> bool {
        self.contexts.len() < self.max_in_transit
    }

    pub fn enqueue(&mut self, context: HugeObjectContext) {
        self.contexts.push_back(context);
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    /// Whether `index` is part of a huge object still in flight.
    pub fn contains(&self, index: InternalIndex) -> bool {
        self.contexts.iter().any(|context| context.contains_object(index))
    }

    pub fn ack_fragment(&mut self, sequence: SequenceNumber) {
        for context in self.contexts.iter_mut() {
            if let Some(position) = context
                .unacked_fragments
                .iter()
                .position(|fragment| *fragment == sequence)
            {
                context.unacked_fragments.swap_remove(position);
                return;
            }
        }
    }

    /// Takes out the huge object that fragment `sequence` belongs to.
    pub fn remove_with_fragment(&mut self, sequence: SequenceNumber) -> Option<HugeObjectContext> {
        let position = self
            .contexts
            .iter()
            .position(|context| context.unacked_fragments.contains(&sequence))?;
        self.contexts.remove(position)
    }

    /// Fully acknowledged huge objects, oldest first. A complete object
    /// waits behind an older incomplete one.
    pub fn take_completed(&mut self) -> Vec<HugeObjectContext> {
        let mut completed = Vec::new();
        while self.contexts.front().is_some_and(HugeObjectContext::is_complete) {
            if let Some(context) = self.contexts.pop_front() {
                completed.push(context);
            }
        }
        completed
    }

    /// Union of the changemasks carried by in-flight huge objects for
    /// `index` during `epoch`.
    pub fn in_flight_change_mask(&self, index: InternalIndex, epoch: u32, mask: &mut ChangeMask) {
        for record in self.contexts.iter().flat_map(|context| context.records.iter()) {
            if record.index == index && record.epoch == epoch {
                if let Some(written) = &record.change_mask {
                    mask.combine(written);
                }
            }
        }
    }

    pub fn clear(&mut self) -> Vec<HugeObjectContext> {
        self.contexts.drain(..).collect()
    }
}

/// Cuts a serialized huge object into fragments of `fragment_bits` payload
/// bits. Each fragment carries its index and the fragment count.
pub fn split_into_fragments(buffer: &BitWriter, fragment_bits: u32) -> Vec<NetAttachment> {
    let total_bits = buffer.bit_position();
    let fragment_bits = fragment_bits.max(1);
    let fragment_count = total_bits.div_ceil(fragment_bits).max(1);
    let mut reader = BitReader::with_bit_length(buffer.bytes(), total_bits);

    let mut fragments = Vec::with_capacity(fragment_count as usize);
    for fragment_index in 0..fragment_count {
        let chunk_bits = fragment_bits.min(reader.bits_left());
        let mut fragment = BitWriter::with_max_bits(chunk_bits + 64);
        UnsignedVariableInteger::<7>::new(fragment_index).ser(&mut fragment);
        UnsignedVariableInteger::<7>::new(fragment_count).ser(&mut fragment);
        for _ in 0..chunk_bits {
            // the reader is bounded by the buffer's own length
            let bit = reader.read_bit().unwrap_or(false);
            fragment.write_bit(bit);
        }
        fragments.push(NetAttachment::from_writer(fragment));
    }
    fragments
}
