pub mod error;

mod dispatch;
mod event;
mod huge_object;
mod object_info;
mod pending_batches;
mod reference_tracking;
mod replication_reader;

pub use dispatch::DispatchPlan;
pub use error::ReaderError;
pub use event::ReaderEvent;
pub use huge_object::HugeObjectAssembler;
pub use object_info::RemoteObjectInfo;
pub use pending_batches::{PendingBatchQueue, PendingBatches, PendingChunk};
pub use reference_tracking::ReferenceTracker;
pub use replication_reader::ReplicationReader;
