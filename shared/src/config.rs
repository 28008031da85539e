//! # `ReplicationConfig`
//!
//! Numeric tuning for a replication system. One value is handed to
//! `ReplicationSystem::new` and cloned into every connection's writer and
//! reader; nothing mutates it afterwards.

use std::time::Duration;

use crate::handle::NetHandle;

/// Priority an object accrues for every tick it has unsent changes.
pub type PriorityFn = fn(NetHandle) -> f32;

fn constant_priority(_: NetHandle) -> f32 {
    1.0
}

#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Hard cap on live internal indices, index 0 included.
    pub max_object_count: u32,
    /// Step by which the internal index space grows when it runs out, and
    /// its initial size.
    pub internal_index_growth: u32,
    /// Width of the per-batch size field in a normal packet.
    /// - **Constraint**: a batch larger than `2^batch_size_bit_count - 1` bits
    ///   must go through the huge-object path.
    pub batch_size_bit_count: u32,
    /// Width of the batch size field inside a reassembled huge object.
    pub huge_object_batch_size_bit_count: u32,
    /// Scratch buffer size for one huge object. Objects that do not fit end
    /// the connection.
    pub max_huge_object_bits: u32,
    /// Payload bits carried by each huge-object fragment.
    pub huge_object_fragment_bits: u32,
    /// Huge objects that may be in flight at once per connection.
    pub max_huge_objects_in_transit: usize,
    /// Root destroys written per packet.
    pub max_destroy_objects_per_frame: u16,
    /// Objects with less accrued priority are not scheduled.
    pub scheduling_threshold_priority: f32,
    /// Objects selected per packet by the partial sort.
    pub partial_sort_object_count: usize,
    /// Priority added to an object (and its root) whose state was lost.
    pub lost_state_priority_bump: f32,
    /// Priority given to an object being torn off.
    pub tear_off_priority: f32,
    /// Below this many free bits the packet is considered full.
    pub small_object_bit_threshold: u32,
    /// An object that does not fit is only split into a huge object when at
    /// least this many bits were free at the start of its batch.
    pub split_threshold_bits: u32,
    /// Smaller objects tried after a failed fit before the packet is closed.
    pub max_failed_small_object_count: u32,
    /// Record entries in flight before the writer stops scheduling objects.
    pub max_in_flight_record_infos: usize,
    /// Live delta baselines per connection.
    pub max_baselines_per_connection: usize,
    /// Unacknowledged reliable attachments per object.
    /// - **Constraint**: well below 32 768 so sequence comparisons stay
    ///   unambiguous across the wrap.
    pub max_reliable_attachments_in_flight: u16,
    /// Global switch for delta compression. Protocols still opt in
    /// individually.
    pub delta_compression_enabled: bool,
    /// Accrued per tick by every object with unsent changes.
    pub priority_fn: PriorityFn,
    /// How long a batch may stay queued on unresolved must-be-mapped
    /// references before a timeout is reported.
    pub queued_batch_timeout: Duration,
    /// Retries between two timeout checks of a queued batch.
    pub queued_batch_timeout_warning_interval: u32,
    /// Pending references listed in one timeout report.
    pub max_must_be_mapped_handles_reported: usize,
    /// How long an unresolved reference member is retried after every
    /// dispatch before it is moved to the cold list.
    pub hot_resolving_lifetime: Duration,
    /// Interval between two retries of the cold list.
    pub cold_resolving_retry_time: Duration,
    /// Packets claiming more batches than this are rejected.
    pub max_object_batch_count_to_read: u16,
    /// Dispatch reliable attachments for existing objects before applying
    /// their state in the same packet.
    pub execute_reliable_attachments_before_state: bool,
    /// Consecutive "cannot send" skips of one object between two warnings.
    pub cannot_send_warning_interval: u32,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        Self {
            max_object_count: 1 << 16,
            internal_index_growth: 256,
            batch_size_bit_count: 16,
            huge_object_batch_size_bit_count: 24,
            max_huge_object_bits: 1 << 20,
            huge_object_fragment_bits: 4096,
            max_huge_objects_in_transit: 16,
            max_destroy_objects_per_frame: 150,
            scheduling_threshold_priority: 1.0,
            partial_sort_object_count: 256,
            lost_state_priority_bump: 1.0,
            tear_off_priority: 10.0,
            small_object_bit_threshold: 160,
            split_threshold_bits: 2048,
            max_failed_small_object_count: 10,
            max_in_flight_record_infos: 1 << 14,
            max_baselines_per_connection: 8192,
            max_reliable_attachments_in_flight: 256,
            delta_compression_enabled: true,
            priority_fn: constant_priority,
            queued_batch_timeout: Duration::from_secs(30),
            queued_batch_timeout_warning_interval: 30,
            max_must_be_mapped_handles_reported: 16,
            hot_resolving_lifetime: Duration::from_millis(1000),
            cold_resolving_retry_time: Duration::from_millis(200),
            max_object_batch_count_to_read: 8192,
            execute_reliable_attachments_before_state: true,
            cannot_send_warning_interval: 256,
        }
    }
}
