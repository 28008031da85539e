/// Destroying, tearing off and forgetting objects, and closing connections.

use std::sync::Arc;

use netrep_shared::{
    DestroyFlags, EndReplicationFlags, HandleKind, MemberValue, NetHandle, ReplicationConfig, SubObjectCondition,
};
use netrep_test::{
    test_protocol::{CRATE, CRATE_WEIGHT, TURRET},
    LinkConditions, TestPeers, WorldCall, CLIENT_ID, SERVER_ID,
};

fn end_flags(peers: &TestPeers, target: NetHandle) -> Option<EndReplicationFlags> {
    peers.world.calls.iter().find_map(|call| match call {
        WorldCall::End { handle, flags } if *handle == target => Some(*flags),
        _ => None,
    })
}

#[test]
fn destroyed_object_ends_on_the_peer_and_frees_its_index() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers.server.destroy_object(handle, DestroyFlags::default()).unwrap();
    peers.settle(8);

    netrep_test::assert_not_replicated!(peers, handle);
    assert_eq!(
        end_flags(&peers, handle),
        Some(EndReplicationFlags {
            tear_off: false,
            destroy_instance: true
        })
    );
    assert!(!peers.server.registry().contains(handle));
}

#[test]
fn released_index_comes_back_under_a_new_handle() {
    let mut peers = TestPeers::new();
    let first = peers.create(CRATE);
    let first_index = peers.server.registry().index_of(first).unwrap();
    peers.settle(8);
    peers.server.destroy_object(first, DestroyFlags::default()).unwrap();
    peers.settle(8);

    let second = peers.create(CRATE);
    assert_ne!(second, first);
    assert_eq!(peers.server.registry().index_of(second), Some(first_index));
    peers.settle(8);
    netrep_test::assert_replicated!(peers, second);
}

#[test]
fn static_object_keeps_its_instance_unless_asked() {
    let mut peers = TestPeers::new();
    let kept = peers.server.create_object(CRATE, None, HandleKind::Static).unwrap();
    let removed = peers.server.create_object(CRATE, None, HandleKind::Static).unwrap();
    peers.settle(8);

    peers.server.destroy_object(kept, DestroyFlags::default()).unwrap();
    peers
        .server
        .destroy_object(
            removed,
            DestroyFlags {
                tear_off: false,
                destroy_static_instance: true,
            },
        )
        .unwrap();
    peers.settle(8);

    assert_eq!(end_flags(&peers, kept).map(|flags| flags.destroy_instance), Some(false));
    assert_eq!(end_flags(&peers, removed).map(|flags| flags.destroy_instance), Some(true));
}

#[test]
fn torn_off_object_keeps_its_last_state() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(42));
    peers.server.tear_off(handle).unwrap();
    peers.settle(8);

    netrep_test::assert_not_replicated!(peers, handle);
    let instance = &peers.world.instances[&handle];
    assert!(instance.torn_off);
    assert_eq!(instance.values[CRATE_WEIGHT], MemberValue::Unsigned(42));
    assert_eq!(end_flags(&peers, handle).map(|flags| flags.tear_off), Some(true));
    assert!(!peers.server.registry().contains(handle));
}

#[test]
fn static_object_never_seen_by_the_peer_is_reported_destroyed() {
    let mut peers = TestPeers::new();
    let handle = peers.server.create_object(CRATE, None, HandleKind::Static).unwrap();
    // gone before the first send, as if unloaded with its level
    let info = peers
        .server
        .destroy_object(
            handle,
            DestroyFlags {
                tear_off: false,
                destroy_static_instance: true,
            },
        )
        .unwrap()
        .expect("destruction info created");
    assert_eq!(peers.server.registry().destruction_info_for(handle), Some(info));

    peers.settle(8);

    assert_eq!(peers.world.calls, vec![WorldCall::DestructionInfo { handle }]);
}

#[test]
fn closing_a_connection_releases_everything_it_held() {
    let mut peers = TestPeers::with(ReplicationConfig::default(), LinkConditions::drop_every(3));
    let root = peers.create(TURRET);
    let sub_object = peers.create(CRATE);
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::Always)
        .unwrap();
    let others: Vec<_> = (0..4).map(|_| peers.create(CRATE)).collect();
    let crate_protocol = Arc::clone(peers.client.protocols().get(CRATE).unwrap());
    let unused_count = Arc::strong_count(&crate_protocol);

    for weight in 1..5u64 {
        for handle in &others {
            peers.set(*handle, CRATE_WEIGHT, MemberValue::Unsigned(weight));
        }
        peers.tick();
    }
    // leave a packet in flight
    peers.set(others[1], CRATE_WEIGHT, MemberValue::Unsigned(99));
    peers.send();
    assert!(peers.server_writer().in_flight_packet_count() > 0);
    assert!(Arc::strong_count(&crate_protocol) > unused_count);

    peers.server.remove_connection(CLIENT_ID).unwrap();
    netrep_test::assert_refs_released!(peers.server);

    let forgotten = peers.client.remove_connection(SERVER_ID).unwrap();
    assert_eq!(forgotten.len(), 6);
    assert_eq!(Arc::strong_count(&crate_protocol), unused_count);

    // nothing holds the objects back any more
    peers.server.destroy_object(others[0], DestroyFlags::default()).unwrap();
    assert_eq!(peers.server.pre_send_update().unwrap(), vec![others[0]]);
}
