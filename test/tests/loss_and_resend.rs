/// Scenarios where packets are lost and the writer resends what the peer
/// is missing.
///
/// Lost data is never resent as-is: the writer marks the lost members
/// dirty again, so the peer catches up on the latest value and skips the
/// intermediate ones.

use proptest::prelude::*;

use netrep_shared::{MemberValue, NetHandle, ReplicationConfig};
use netrep_test::{
    test_protocol::{CRATE, CRATE_LABEL, CRATE_OPEN, CRATE_WEIGHT},
    LinkConditions, TestPeers,
};

fn server_value(peers: &TestPeers, handle: NetHandle, member_index: usize) -> MemberValue {
    peers
        .server
        .registry()
        .object_by_handle(handle)
        .and_then(|data| data.state().get(member_index))
        .cloned()
        .expect("server holds the object")
}

#[test]
fn lost_creation_is_written_again() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);

    peers.link.drop_next(1);
    peers.tick();
    netrep_test::assert_not_replicated!(peers, handle);

    peers.tick();
    netrep_test::assert_replicated!(peers, handle);
    assert_eq!(peers.link.dropped_count(), 1);
}

#[test]
fn intermediate_value_is_skipped_after_loss() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.tick();

    peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(1));
    peers.link.drop_next(1);
    peers.tick();

    peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(2));
    peers.tick();

    assert_eq!(
        peers.world.history(handle, CRATE_WEIGHT),
        vec![MemberValue::Unsigned(0), MemberValue::Unsigned(2)]
    );
}

#[test]
fn lost_change_is_resent_without_a_new_one() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.tick();

    peers.set(handle, CRATE_LABEL, MemberValue::Bytes(b"fragile".to_vec()));
    peers.link.drop_next(1);
    peers.tick();
    assert_eq!(peers.world.value(handle, CRATE_LABEL), Some(&MemberValue::Bytes(Vec::new())));

    peers.settle(8);
    assert_eq!(
        peers.world.value(handle, CRATE_LABEL),
        Some(&MemberValue::Bytes(b"fragile".to_vec()))
    );
    // only the resend reached the peer
    assert_eq!(peers.world.applies_for(handle).len(), 2);
}

#[test]
fn delta_updates_survive_lost_baselines() {
    let mut peers = TestPeers::with(ReplicationConfig::default(), LinkConditions::drop_every(2));
    let handle = peers.create(CRATE);
    peers.settle(8);

    for weight in 1..=12u64 {
        peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(weight * 100));
        peers.set(handle, CRATE_OPEN, MemberValue::Bool(weight % 3 == 0));
        peers.tick();
    }
    peers.link.set_conditions(LinkConditions::perfect());
    peers.settle(16);

    assert_eq!(peers.world.value(handle, CRATE_WEIGHT), Some(&MemberValue::Unsigned(1200)));
    assert_eq!(peers.world.value(handle, CRATE_OPEN), Some(&MemberValue::Bool(true)));
    assert!(peers.take_events().is_empty());
}

#[derive(Clone, Debug)]
struct Change {
    object: usize,
    weight: u16,
    open: bool,
}

fn change_strategy() -> impl Strategy<Value = Change> {
    (0usize..3, any::<u16>(), any::<bool>()).prop_map(|(object, weight, open)| Change { object, weight, open })
}

/// Creates three crates, applies one change per tick, then lets the link
/// settle. Returns every crate's final members as seen by the peer.
fn run(changes: &[Change], conditions: LinkConditions) -> Vec<(Option<MemberValue>, Option<MemberValue>)> {
    let mut peers = TestPeers::with(ReplicationConfig::default(), conditions);
    let handles: Vec<NetHandle> = (0..3).map(|_| peers.create(CRATE)).collect();

    for change in changes {
        let handle = handles[change.object];
        peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(u64::from(change.weight)));
        peers.set(handle, CRATE_OPEN, MemberValue::Bool(change.open));
        peers.tick();
    }
    peers.settle(64);

    handles
        .iter()
        .map(|handle| {
            assert_eq!(
                peers.world.value(*handle, CRATE_WEIGHT),
                Some(&server_value(&peers, *handle, CRATE_WEIGHT))
            );
            (
                peers.world.value(*handle, CRATE_WEIGHT).cloned(),
                peers.world.value(*handle, CRATE_OPEN).cloned(),
            )
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Whatever gets lost, the peer ends up where a lossless link takes it
    #[test]
    fn prop_lossy_link_converges_like_a_lossless_one(
        changes in prop::collection::vec(change_strategy(), 1..12),
        losses in prop::collection::vec(any::<bool>(), 0..24),
    ) {
        let lossless = run(&changes, LinkConditions::perfect());
        let lossy = run(&changes, LinkConditions::scripted(losses));
        prop_assert_eq!(lossy, lossless);
    }
}
