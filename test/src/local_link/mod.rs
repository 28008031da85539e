/// In-memory one-way link for scenario tests.
/// Carries packets from a sender to a receiver with scripted loss, and
/// reports each packet's fate back in send order. Like a sequenced
/// transport it never reorders: a late packet counts as lost.

use std::collections::VecDeque;

use netrep_shared::DeliveryStatus;

/// How the link treats packets.
#[derive(Clone, Debug, Default)]
pub struct LinkConditions {
    /// Consumed one entry per packet sent: `true` drops the packet. Once it
    /// runs out every packet is delivered.
    pub loss_script: VecDeque<bool>,
    /// Drop every n-th packet (1-based) when set.
    pub drop_every: Option<usize>,
}

impl LinkConditions {
    pub fn perfect() -> Self {
        Self::default()
    }

    pub fn scripted(losses: impl IntoIterator<Item = bool>) -> Self {
        Self {
            loss_script: losses.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn drop_every(n: usize) -> Self {
        Self {
            drop_every: Some(n.max(1)),
            ..Self::default()
        }
    }
}

struct InFlight {
    bytes: Box<[u8]>,
    lost: bool,
}

pub struct LocalLink {
    conditions: LinkConditions,
    in_flight: VecDeque<InFlight>,
    sent: usize,
    dropped: usize,
}

impl LocalLink {
    pub fn new(conditions: LinkConditions) -> Self {
        Self {
            conditions,
            in_flight: VecDeque::new(),
            sent: 0,
            dropped: 0,
        }
    }

    pub fn set_conditions(&mut self, conditions: LinkConditions) {
        self.conditions = conditions;
    }

    /// Drops the next `count` packets, then goes back to the current
    /// conditions.
    pub fn drop_next(&mut self, count: usize) {
        for _ in 0..count {
            self.conditions.loss_script.push_front(true);
        }
    }

    pub fn send(&mut self, bytes: Box<[u8]>) {
        self.sent += 1;
        let scripted = self.conditions.loss_script.pop_front().unwrap_or(false);
        let periodic = self
            .conditions
            .drop_every
            .is_some_and(|n| self.sent % n == 0);
        let lost = scripted || periodic;
        if lost {
            self.dropped += 1;
        }
        self.in_flight.push_back(InFlight { bytes, lost });
    }

    /// Empties the link. Returns the packets that arrive, in send order,
    /// and the fate of every packet in send order.
    pub fn flush(&mut self) -> (Vec<Box<[u8]>>, Vec<DeliveryStatus>) {
        let mut arrived = Vec::new();
        let mut statuses = Vec::new();
        for packet in self.in_flight.drain(..) {
            if packet.lost {
                statuses.push(DeliveryStatus::Lost);
            } else {
                statuses.push(DeliveryStatus::Delivered);
                arrived.push(packet.bytes);
            }
        }
        (arrived, statuses)
    }

    pub fn sent_count(&self) -> usize {
        self.sent
    }

    pub fn dropped_count(&self) -> usize {
        self.dropped
    }

    pub fn is_empty(&self) -> bool {
        self.in_flight.is_empty()
    }
}
