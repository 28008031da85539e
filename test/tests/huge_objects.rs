/// Objects too large for one packet travel as out-of-band fragments and
/// are read once every fragment is in.

use netrep_shared::{MemberValue, NetHandle, ReplicationConfig};
use netrep_test::{
    test_protocol::{SCROLL, SCROLL_MAX_LEN, SCROLL_TEXT},
    LinkConditions, TestPeers,
};

fn text(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| (i as u8).wrapping_mul(31).wrapping_add(seed)).collect()
}

fn write_scroll(peers: &mut TestPeers, len: usize, seed: u8) -> NetHandle {
    let handle = peers.create(SCROLL);
    peers.set(handle, SCROLL_TEXT, MemberValue::Bytes(text(len, seed)));
    handle
}

#[test]
fn scroll_of_any_size_arrives_whole() {
    for len in [1, 300, 1100, 2500, usize::from(SCROLL_MAX_LEN)] {
        let mut peers = TestPeers::new();
        let handle = write_scroll(&mut peers, len, 7);

        peers.settle(32);

        netrep_test::assert_replicated!(peers, handle);
        assert_eq!(
            peers.world.value(handle, SCROLL_TEXT),
            Some(&MemberValue::Bytes(text(len, 7))),
            "scroll of {} bytes",
            len
        );
        assert_eq!(peers.server_writer().huge_objects_in_transit(), 0);
    }
}

#[test]
fn largest_scroll_needs_several_packets() {
    let mut peers = TestPeers::new();
    let handle = write_scroll(&mut peers, usize::from(SCROLL_MAX_LEN), 1);

    let written = peers.send();
    assert!(written > 1, "a {} byte object fits no single packet", SCROLL_MAX_LEN);
    peers.deliver();

    peers.settle(32);
    netrep_test::assert_replicated!(peers, handle);
    assert_eq!(peers.world.applies_for(handle).len(), 1);
}

#[test]
fn huge_object_survives_fragment_loss() {
    let mut peers = TestPeers::with(ReplicationConfig::default(), LinkConditions::drop_every(3));
    let handle = write_scroll(&mut peers, usize::from(SCROLL_MAX_LEN), 3);

    peers.settle(64);
    peers.link.set_conditions(LinkConditions::perfect());
    peers.settle(32);

    assert!(peers.link.dropped_count() > 0);
    assert_eq!(
        peers.world.value(handle, SCROLL_TEXT),
        Some(&MemberValue::Bytes(text(usize::from(SCROLL_MAX_LEN), 3)))
    );
    assert!(peers.take_events().is_empty());
}

#[test]
fn several_huge_objects_in_transit_at_once() {
    let mut peers = TestPeers::new();
    let handles: Vec<NetHandle> = (0..3u8).map(|seed| write_scroll(&mut peers, 3000, seed)).collect();

    peers.settle(64);

    for (seed, handle) in handles.iter().enumerate() {
        assert_eq!(
            peers.world.value(*handle, SCROLL_TEXT),
            Some(&MemberValue::Bytes(text(3000, seed as u8)))
        );
    }
    netrep_test::assert_no_violations!(peers);
}

#[test]
fn huge_update_follows_a_small_creation() {
    let mut peers = TestPeers::new();
    let handle = write_scroll(&mut peers, 10, 0);
    peers.settle(8);

    peers.set(handle, SCROLL_TEXT, MemberValue::Bytes(text(3500, 9)));
    peers.settle(32);

    assert_eq!(
        peers.world.history(handle, SCROLL_TEXT),
        vec![MemberValue::Bytes(text(10, 0)), MemberValue::Bytes(text(3500, 9))]
    );
}
