pub mod assertions;
pub mod test_peers;

pub use test_peers::{TestPeers, CLIENT_ID, SERVER_ID};
