pub mod error;
mod net_attachment;
mod receive_queue;
mod send_queue;

pub use error::AttachmentError;
pub use net_attachment::NetAttachment;
pub use receive_queue::AttachmentReceiveQueue;
pub use send_queue::{AttachmentSendQueue, AttachmentWritePlan, MAX_QUEUED_RELIABLE_ATTACHMENTS};
