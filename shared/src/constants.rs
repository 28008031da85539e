// Wire layout of a replication packet segment

/// Width of the packet's batch count and destroy count fields.
pub const BATCH_COUNT_BIT_COUNT: u32 = 16;

/// Width of the per-entry destroy header.
pub const DESTROY_HEADER_BIT_COUNT: u32 = 3;
/// Replication ends without destroying the remote instance.
pub const DESTROY_HEADER_TEAR_OFF: u64 = 1 << 0;
pub const DESTROY_HEADER_END_REPLICATION: u64 = 1 << 1;
pub const DESTROY_HEADER_DESTROY_INSTANCE: u64 = 1 << 2;

/// Huge-object fragments in flight per connection. Bounds the out-of-band
/// reliable window well below the sequence wrap.
pub const MAX_HUGE_OBJECT_FRAGMENTS_IN_FLIGHT: u16 = 4096;
