use std::collections::VecDeque;

use crate::{
    attachment::net_attachment::NetAttachment,
    wrapping_number::{sequence_greater_than, SequenceNumber},
};

/// Incoming attachments of one object. Reliable ones are released strictly
/// in sequence order; duplicates and stale resends are dropped.
#[derive(Default)]
pub struct AttachmentReceiveQueue {
    next_reliable: SequenceNumber,
    buffered: Vec<(SequenceNumber, NetAttachment)>,
    ready_reliable: VecDeque<NetAttachment>,
    unreliable: VecDeque<NetAttachment>,
}

impl AttachmentReceiveQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn receive_reliable(&mut self, sequence: SequenceNumber, attachment: NetAttachment) {
        if sequence == self.next_reliable {
            self.ready_reliable.push_back(attachment);
            self.next_reliable = self.next_reliable.wrapping_add(1);
            self.release_buffered();
        } else if sequence_greater_than(sequence, self.next_reliable)
            && !self.buffered.iter().any(|(buffered, _)| *buffered == sequence)
        {
            self.buffered.push((sequence, attachment));
        }
    }

    pub fn receive_unreliable(&mut self, attachment: NetAttachment) {
        self.unreliable.push_back(attachment);
    }

    fn release_buffered(&mut self) {
        while let Some(position) = self
            .buffered
            .iter()
            .position(|(sequence, _)| *sequence == self.next_reliable)
        {
            let (_, attachment) = self.buffered.swap_remove(position);
            self.ready_reliable.push_back(attachment);
            self.next_reliable = self.next_reliable.wrapping_add(1);
        }
    }

    pub fn has_ready(&self) -> bool {
        !self.ready_reliable.is_empty() || !self.unreliable.is_empty()
    }

    pub fn has_ready_reliable(&self) -> bool {
        !self.ready_reliable.is_empty()
    }

    pub fn take_reliable(&mut self) -> Vec<NetAttachment> {
        self.ready_reliable.drain(..).collect()
    }

    /// Every ready attachment, reliable ones first.
    pub fn take_all(&mut self) -> Vec<NetAttachment> {
        let mut output = self.take_reliable();
        output.extend(self.unreliable.drain(..));
        output
    }
}
