/// Attachments are opaque payloads queued per object and connection,
/// delivered through the bridge next to the object's state.

use netrep_shared::{MemberValue, NetAttachment, ReplicationConfig};
use netrep_test::{
    test_protocol::{CRATE, CRATE_WEIGHT},
    LinkConditions, TestPeers, WorldCall, CLIENT_ID,
};

fn payload(value: u8) -> NetAttachment {
    NetAttachment::from_bytes(vec![value, value.wrapping_add(1)])
}

#[test]
fn reliable_attachments_arrive_once_and_in_order_under_loss() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers.link.set_conditions(LinkConditions::drop_every(2));
    for value in 0..10u8 {
        peers
            .server
            .queue_attachment(CLIENT_ID, handle, true, payload(value))
            .unwrap();
        peers.tick();
    }
    peers.link.set_conditions(LinkConditions::perfect());
    peers.settle(32);

    let expected: Vec<Vec<u8>> = (0..10u8).map(|value| payload(value).payload().to_vec()).collect();
    assert_eq!(peers.world.attachments_for(handle), expected);
}

#[test]
fn lost_unreliable_attachment_is_not_resent() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers
        .server
        .queue_attachment(CLIENT_ID, handle, false, payload(1))
        .unwrap();
    peers.link.drop_next(1);
    peers.tick();
    peers.settle(8);
    assert!(peers.world.attachments_for(handle).is_empty());

    peers
        .server
        .queue_attachment(CLIENT_ID, handle, false, payload(2))
        .unwrap();
    peers.settle(8);
    assert_eq!(peers.world.attachments_for(handle), vec![vec![2, 3]]);
}

#[test]
fn reliable_attachment_runs_before_the_state_it_travels_with() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(12));
    peers
        .server
        .queue_attachment(CLIENT_ID, handle, true, payload(4))
        .unwrap();
    peers.tick();

    let attachment = peers
        .world
        .position(|call| matches!(call, WorldCall::Attachment { .. }))
        .expect("attachment delivered");
    let update = peers
        .world
        .position(|call| matches!(call, WorldCall::Apply { is_initial: false, .. }))
        .expect("state applied");
    assert!(attachment < update);
}

#[test]
fn attachments_can_follow_the_state_when_configured() {
    let config = ReplicationConfig {
        execute_reliable_attachments_before_state: false,
        ..ReplicationConfig::default()
    };
    let mut peers = TestPeers::with(config, LinkConditions::perfect());
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers.set(handle, CRATE_WEIGHT, MemberValue::Unsigned(12));
    peers
        .server
        .queue_attachment(CLIENT_ID, handle, true, payload(4))
        .unwrap();
    peers.tick();

    let attachment = peers
        .world
        .position(|call| matches!(call, WorldCall::Attachment { .. }))
        .expect("attachment delivered");
    let update = peers
        .world
        .position(|call| matches!(call, WorldCall::Apply { is_initial: false, .. }))
        .expect("state applied");
    assert!(update < attachment);
}

#[test]
fn object_leaving_scope_still_delivers_its_reliable_attachments() {
    let mut peers = TestPeers::new();
    let handle = peers.create(CRATE);
    peers.settle(8);

    peers
        .server
        .queue_attachment(CLIENT_ID, handle, true, payload(9))
        .unwrap();
    peers.server.set_in_scope(CLIENT_ID, handle, false).unwrap();
    peers.settle(8);

    assert_eq!(peers.world.attachments_for(handle), vec![vec![9, 10]]);
    let attachment = peers
        .world
        .position(|call| matches!(call, WorldCall::Attachment { .. }))
        .expect("attachment delivered");
    let end = peers
        .world
        .position(|call| matches!(call, WorldCall::End { .. }))
        .expect("replication ended");
    assert!(attachment < end);
    netrep_test::assert_not_replicated!(peers, handle);
}
