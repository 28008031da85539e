use std::collections::VecDeque;

use netrep_serde::{BitWrite, Serde, UnsignedVariableInteger};

use crate::{
    attachment::net_attachment::NetAttachment,
    wrapping_number::{sequence_less_than, SequenceNumber},
};

/// Reliable attachments kept per object before the queue refuses more.
pub const MAX_QUEUED_RELIABLE_ATTACHMENTS: usize = 16_384;

/// What one write put on the wire, so it can be committed once the batch it
/// belongs to is known to fit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttachmentWritePlan {
    pub reliable: Vec<SequenceNumber>,
    pub unreliable_count: usize,
}

impl AttachmentWritePlan {
    pub fn is_empty(&self) -> bool {
        self.reliable.is_empty() && self.unreliable_count == 0
    }
}

/// Outgoing attachments of one object on one connection.
///
/// Reliable attachments are numbered, resent on loss and dropped on ack.
/// Unreliable ones are sent once.
pub struct AttachmentSendQueue {
    next_sequence: SequenceNumber,
    unsent_reliable: VecDeque<(SequenceNumber, NetAttachment)>,
    in_flight_reliable: Vec<(SequenceNumber, NetAttachment)>,
    unreliable: VecDeque<NetAttachment>,
    max_in_flight: u16,
}

impl AttachmentSendQueue {
    pub fn new(max_in_flight: u16) -> Self {
        Self {
            next_sequence: 0,
            unsent_reliable: VecDeque::new(),
            in_flight_reliable: Vec::new(),
            unreliable: VecDeque::new(),
            max_in_flight,
        }
    }

    pub fn reliable_count(&self) -> usize {
        self.unsent_reliable.len() + self.in_flight_reliable.len()
    }

    pub fn can_enqueue_reliable(&self) -> bool {
        self.reliable_count() < MAX_QUEUED_RELIABLE_ATTACHMENTS
    }

    /// Returns the sequence number given to a reliable attachment.
    pub fn enqueue(&mut self, reliable: bool, attachment: NetAttachment) -> Option<SequenceNumber> {
        if reliable {
            let sequence = self.next_sequence;
            self.next_sequence = self.next_sequence.wrapping_add(1);
            self.unsent_reliable.push_back((sequence, attachment));
            Some(sequence)
        } else {
            self.unreliable.push_back(attachment);
            None
        }
    }

    pub fn has_unsent(&self) -> bool {
        self.has_sendable_reliable() || !self.unreliable.is_empty()
    }

    fn has_sendable_reliable(&self) -> bool {
        !self.unsent_reliable.is_empty()
            && self.in_flight_reliable.len() < usize::from(self.max_in_flight)
    }

    /// Reliable attachments not yet acknowledged, sent or not.
    pub fn has_unacked_reliable(&self) -> bool {
        self.reliable_count() > 0
    }

    pub fn has_in_flight_reliable(&self) -> bool {
        !self.in_flight_reliable.is_empty()
    }

    pub fn unsent_reliable_count(&self) -> usize {
        self.unsent_reliable.len()
    }

    /// Writes the count, then each attachment as
    /// `bool reliable, [u16 sequence], payload`. At most `max_reliable`
    /// reliable attachments are included. Nothing is dequeued until `commit`.
    pub fn write(&self, writer: &mut dyn BitWrite, max_reliable: usize) -> AttachmentWritePlan {
        let window = usize::from(self.max_in_flight)
            .saturating_sub(self.in_flight_reliable.len())
            .min(max_reliable);
        let reliable: Vec<&(SequenceNumber, NetAttachment)> =
            self.unsent_reliable.iter().take(window).collect();

        let count = reliable.len() + self.unreliable.len();
        UnsignedVariableInteger::<7>::new(count as u64).ser(writer);

        let mut plan = AttachmentWritePlan::default();
        for (sequence, attachment) in reliable {
            writer.write_bit(true);
            sequence.ser(writer);
            attachment.ser(writer);
            plan.reliable.push(*sequence);
        }
        for attachment in &self.unreliable {
            writer.write_bit(false);
            attachment.ser(writer);
        }
        plan.unreliable_count = self.unreliable.len();
        plan
    }

    pub fn commit(&mut self, plan: &AttachmentWritePlan) {
        for _ in 0..plan.reliable.len() {
            if let Some(sent) = self.unsent_reliable.pop_front() {
                self.in_flight_reliable.push(sent);
            }
        }
        for _ in 0..plan.unreliable_count {
            self.unreliable.pop_front();
        }
    }

    pub fn ack(&mut self, sequence: SequenceNumber) {
        self.in_flight_reliable.retain(|(in_flight, _)| *in_flight != sequence);
    }

    /// Puts a lost reliable attachment back in sequence order.
    pub fn lost(&mut self, sequence: SequenceNumber) {
        let Some(position) = self
            .in_flight_reliable
            .iter()
            .position(|(in_flight, _)| *in_flight == sequence)
        else {
            return;
        };
        let entry = self.in_flight_reliable.remove(position);
        let insert_at = self
            .unsent_reliable
            .iter()
            .position(|(unsent, _)| sequence_less_than(entry.0, *unsent))
            .unwrap_or(self.unsent_reliable.len());
        self.unsent_reliable.insert(insert_at, entry);
    }

    /// Drops a reliable attachment without waiting for an ack.
    pub fn discard(&mut self, sequence: SequenceNumber) {
        self.in_flight_reliable.retain(|(in_flight, _)| *in_flight != sequence);
        self.unsent_reliable.retain(|(unsent, _)| *unsent != sequence);
    }

    pub fn clear(&mut self) {
        self.unsent_reliable.clear();
        self.in_flight_reliable.clear();
        self.unreliable.clear();
    }
}
