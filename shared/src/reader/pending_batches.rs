use std::{
    collections::{BTreeMap, VecDeque},
    time::Instant,
};

use netrep_serde::OwnedBitReader;

use crate::handle::NetHandle;

/// One piece of data held back for an object.
pub enum PendingChunk {
    /// Batch content as read from the wire, without its exports.
    Batch {
        content: OwnedBitReader,
        exports: Vec<NetHandle>,
    },
    /// The root destroy section ended the object while it was queued.
    EndReplication { destroy_instance: bool },
}

/// Chunks of one object, waiting on must-be-mapped references.
pub struct PendingBatchQueue {
    pub(crate) chunks: VecDeque<PendingChunk>,
    pub(crate) pending_references: Vec<NetHandle>,
    pub(crate) queued_at: Instant,
    pub(crate) retries: u32,
}

impl PendingBatchQueue {
    fn new(now: Instant) -> Self {
        Self {
            chunks: VecDeque::new(),
            pending_references: Vec::new(),
            queued_at: now,
            retries: 0,
        }
    }

    /// Handles that must load before the head chunk can be read.
    pub fn pending_references(&self) -> &[NetHandle] {
        &self.pending_references
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }
}

/// Every object with queued data, in handle order so retries are stable.
#[derive(Default)]
pub struct PendingBatches {
    queues: BTreeMap<NetHandle, PendingBatchQueue>,
}

impl PendingBatches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, handle: NetHandle) -> bool {
        self.queues.contains_key(&handle)
    }

    pub fn is_empty(&self) -> bool {
        self.queues.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queues.len()
    }

    pub fn get(&self, handle: NetHandle) -> Option<&PendingBatchQueue> {
        self.queues.get(&handle)
    }

    /// Appends `chunk` to the queue of `handle`, starting one if needed.
    /// `pending_references` only replaces the recorded list when the queue
    /// is new.
    pub fn push(&mut self, handle: NetHandle, chunk: PendingChunk, pending_references: Vec<NetHandle>, now: Instant) {
        let queue = self.queues.entry(handle).or_insert_with(|| {
            let mut queue = PendingBatchQueue::new(now);
            queue.pending_references = pending_references;
            queue
        });
        queue.chunks.push_back(chunk);
    }

    pub fn handles(&self) -> Vec<NetHandle> {
        self.queues.keys().copied().collect()
    }

    pub fn get_mut(&mut self, handle: NetHandle) -> Option<&mut PendingBatchQueue> {
        self.queues.get_mut(&handle)
    }

    pub fn remove(&mut self, handle: NetHandle) -> Option<PendingBatchQueue> {
        self.queues.remove(&handle)
    }

    pub fn clear(&mut self) {
        self.queues.clear();
    }
}
