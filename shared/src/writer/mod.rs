pub mod error;

mod baselines;
mod batch;
mod delivery;
mod huge_object;
mod record;
mod replication_info;
mod replication_writer;
mod scheduler;
mod state;

pub use baselines::{
    next_baseline_index, BaselineIndex, BASELINE_INDEX_BIT_COUNT, INVALID_BASELINE_INDEX, MAX_BASELINE_COUNT,
};
pub use error::{StateTransitionError, WriterError};
pub use huge_object::split_into_fragments;
pub use record::RecordInfo;
pub use replication_info::ReplicationInfo;
pub use replication_writer::ReplicationWriter;
pub use scheduler::{order_with_dependents, priority_above, select_candidates, SchedulingView};
pub use state::ReplicatedObjectState;
