pub mod helpers;
pub mod local_link;
pub mod test_protocol;
pub mod test_world;

pub use helpers::*;
pub use local_link::{LinkConditions, LocalLink};
pub use test_protocol::protocol;
pub use test_world::{TestInstance, TestWorld, WorldCall};
