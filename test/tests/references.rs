/// Scenarios for reference members whose target is not known to the peer
/// when the owner arrives.

use std::time::Duration;

use netrep_shared::{MemberValue, NetHandle, ReaderEvent};
use netrep_test::{
    test_protocol::{CRATE, GATE, GATE_KEY, TURRET, TURRET_HEADING, TURRET_TARGET},
    TestPeers, CLIENT_ID,
};

#[test]
fn dynamic_reference_is_applied_once_its_target_arrives() {
    let mut peers = TestPeers::new();
    let target = peers.create(CRATE);
    let turret = peers.create(TURRET);
    peers.server.set_in_scope(CLIENT_ID, target, false).unwrap();
    peers.set(turret, TURRET_HEADING, MemberValue::Unsigned(90));
    peers.set(turret, TURRET_TARGET, MemberValue::Reference(target));

    peers.tick();
    netrep_test::assert_replicated!(peers, turret);
    netrep_test::assert_not_replicated!(peers, target);
    assert_eq!(peers.world.applies_for(turret), vec![(vec![TURRET_HEADING as u32], true)]);
    assert_eq!(
        peers.world.value(turret, TURRET_TARGET),
        Some(&MemberValue::Reference(NetHandle::INVALID))
    );
    assert!(peers.remote().has_unresolved_references());

    peers.server.set_in_scope(CLIENT_ID, target, true).unwrap();
    peers.tick();
    netrep_test::assert_replicated!(peers, target);

    // only the held back member is handed over, after its target exists
    assert_eq!(
        peers.world.applies_for(turret),
        vec![
            (vec![TURRET_HEADING as u32], true),
            (vec![TURRET_TARGET as u32], false)
        ]
    );
    assert_eq!(
        peers.world.value(turret, TURRET_TARGET),
        Some(&MemberValue::Reference(target))
    );
    assert!(!peers.remote().has_unresolved_references());
    netrep_test::assert_no_violations!(peers);
}

#[test]
fn reference_to_a_preloaded_object_resolves_immediately() {
    let mut peers = TestPeers::new();
    let target = peers.create(CRATE);
    let turret = peers.create(TURRET);
    peers.server.set_in_scope(CLIENT_ID, target, false).unwrap();
    peers.world.preloaded.insert(target);
    peers.set(turret, TURRET_TARGET, MemberValue::Reference(target));

    peers.tick();

    assert_eq!(
        peers.world.value(turret, TURRET_TARGET),
        Some(&MemberValue::Reference(target))
    );
    assert!(!peers.remote().has_unresolved_references());
}

#[test]
fn target_leaving_puts_the_reference_back_on_hold() {
    let mut peers = TestPeers::new();
    let target = peers.create(CRATE);
    let turret = peers.create(TURRET);
    peers.set(turret, TURRET_TARGET, MemberValue::Reference(target));
    peers.settle(8);
    assert!(!peers.remote().has_unresolved_references());

    peers.server.set_in_scope(CLIENT_ID, target, false).unwrap();
    peers.settle(8);
    netrep_test::assert_not_replicated!(peers, target);
    assert!(peers.remote().has_unresolved_references());
}

#[test]
fn must_be_mapped_reference_holds_back_its_owner() {
    let mut peers = TestPeers::new();
    let key = peers.create(CRATE);
    let gate = peers.create(GATE);
    peers.set(gate, GATE_KEY, MemberValue::Reference(key));
    peers.world.loading.insert(key);

    peers.tick();
    netrep_test::assert_replicated!(peers, key);
    assert!(!peers.world.has(gate));
    assert!(peers.remote().is_queued(gate));

    peers.world.loading.clear();
    peers.deliver();

    netrep_test::assert_replicated!(peers, gate);
    assert!(!peers.remote().is_queued(gate));
    assert_eq!(peers.world.value(gate, GATE_KEY), Some(&MemberValue::Reference(key)));
}

#[test]
fn held_back_updates_are_applied_together_once_released() {
    let mut peers = TestPeers::new();
    let key = peers.create(CRATE);
    let other_key = peers.create(CRATE);
    let gate = peers.create(GATE);
    peers.set(gate, GATE_KEY, MemberValue::Reference(key));
    peers.world.loading.insert(key);
    peers.tick();

    // queued behind the creation, even though its own export is loaded
    peers.set(gate, GATE_KEY, MemberValue::Reference(other_key));
    peers.tick();
    assert!(!peers.world.has(gate));

    peers.world.loading.clear();
    peers.deliver();

    assert_eq!(peers.world.applies_for(gate), vec![(vec![GATE_KEY as u32], true)]);
    assert_eq!(
        peers.world.value(gate, GATE_KEY),
        Some(&MemberValue::Reference(other_key))
    );
}

#[test]
fn stalled_owner_reports_a_timeout() {
    let mut peers = TestPeers::new();
    let key = peers.create(CRATE);
    let gate = peers.create(GATE);
    peers.set(gate, GATE_KEY, MemberValue::Reference(key));
    peers.world.loading.insert(key);
    peers.tick();
    assert!(peers.take_events().is_empty());

    peers.advance(Duration::from_secs(31));
    let mut events = Vec::new();
    for _ in 0..64 {
        peers.deliver();
        events = peers.take_events();
        if !events.is_empty() {
            break;
        }
    }

    assert_eq!(
        events,
        vec![ReaderEvent::QueuedBatchTimeout {
            handle: gate,
            pending: vec![key]
        }]
    );
    // still waiting, not dropped
    assert!(peers.remote().is_queued(gate));
}

#[test]
fn long_unresolved_reference_is_retried_less_often() {
    let mut peers = TestPeers::new();
    let target = peers.create(CRATE);
    let turret = peers.create(TURRET);
    peers.server.set_in_scope(CLIENT_ID, target, false).unwrap();
    peers.set(turret, TURRET_TARGET, MemberValue::Reference(target));
    peers.tick();
    assert!(peers.remote().has_unresolved_references());

    // past the hot lifetime the member is checked once more, then goes cold
    peers.advance(Duration::from_millis(1100));
    peers.deliver();
    peers.world.preloaded.insert(target);

    peers.advance(Duration::from_millis(100));
    peers.deliver();
    assert!(peers.remote().has_unresolved_references());
    assert_eq!(
        peers.world.value(turret, TURRET_TARGET),
        Some(&MemberValue::Reference(NetHandle::INVALID))
    );

    peers.advance(Duration::from_millis(100));
    peers.deliver();
    assert!(!peers.remote().has_unresolved_references());
    assert_eq!(
        peers.world.value(turret, TURRET_TARGET),
        Some(&MemberValue::Reference(target))
    );
}
