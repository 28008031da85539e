/// Subobjects travel with their root; dependent objects are scheduled
/// around their parent.

use netrep_shared::{
    BridgeError, DependentSchedulingHint, MemberValue, ReaderError, ReaderEvent, RegistryError, ReplicationConfig,
    ReplicationError, SubObjectCondition,
};
use netrep_test::{
    test_protocol::{CRATE, CRATE_WEIGHT, TURRET, TURRET_HEADING},
    LinkConditions, TestPeers, WorldCall,
};

#[test]
fn subobjects_never_arrive_before_their_root() {
    let mut peers = TestPeers::with(ReplicationConfig::default(), LinkConditions::drop_every(2));
    let root = peers.create(TURRET);
    let sub_objects: Vec<_> = (0..3).map(|_| peers.create(CRATE)).collect();
    for sub_object in &sub_objects {
        peers
            .server
            .add_sub_object(root, *sub_object, SubObjectCondition::Always)
            .unwrap();
    }

    for weight in 1..=6u64 {
        for sub_object in &sub_objects {
            peers.set(*sub_object, CRATE_WEIGHT, MemberValue::Unsigned(weight));
        }
        peers.tick();
    }
    peers.link.set_conditions(LinkConditions::perfect());
    peers.settle(16);

    netrep_test::assert_no_violations!(peers);
    netrep_test::assert_replicated!(peers, root);
    for sub_object in &sub_objects {
        netrep_test::assert_replicated!(peers, *sub_object);
        assert_eq!(peers.world.instances[sub_object].root, Some(root));
        assert_eq!(peers.world.value(*sub_object, CRATE_WEIGHT), Some(&MemberValue::Unsigned(6)));
    }
}

#[test]
fn subobject_added_later_joins_its_root() {
    let mut peers = TestPeers::new();
    let root = peers.create(TURRET);
    peers.settle(8);

    let sub_object = peers.create(CRATE);
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::Always)
        .unwrap();
    peers.settle(8);

    netrep_test::assert_replicated!(peers, sub_object);
    assert_eq!(peers.world.instances[&sub_object].root, Some(root));
    netrep_test::assert_no_violations!(peers);
}

#[test]
fn initial_only_subobject_ignores_later_changes() {
    let mut peers = TestPeers::new();
    let root = peers.create(TURRET);
    let sub_object = peers.create(CRATE);
    peers.set(sub_object, CRATE_WEIGHT, MemberValue::Unsigned(5));
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::InitialOnly)
        .unwrap();
    peers.settle(8);
    assert_eq!(peers.world.value(sub_object, CRATE_WEIGHT), Some(&MemberValue::Unsigned(5)));

    peers.set(sub_object, CRATE_WEIGHT, MemberValue::Unsigned(7));
    peers.settle(8);

    assert_eq!(peers.world.value(sub_object, CRATE_WEIGHT), Some(&MemberValue::Unsigned(5)));
}

#[test]
fn removed_subobject_ends_while_its_root_stays() {
    let mut peers = TestPeers::new();
    let root = peers.create(TURRET);
    let sub_object = peers.create(CRATE);
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::Always)
        .unwrap();
    peers.settle(8);

    peers.server.remove_sub_object(sub_object).unwrap();
    peers.settle(8);

    netrep_test::assert_replicated!(peers, root);
    netrep_test::assert_not_replicated!(peers, sub_object);
    assert!(!peers.world.has(sub_object));
    assert!(peers
        .world
        .position(|call| matches!(call, WorldCall::End { handle, .. } if *handle == sub_object))
        .is_some());
}

#[test]
fn root_leaving_ends_its_subobjects_first() {
    let mut peers = TestPeers::new();
    let root = peers.create(TURRET);
    let sub_object = peers.create(CRATE);
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::Always)
        .unwrap();
    peers.settle(8);

    peers.server.set_in_scope(netrep_test::CLIENT_ID, root, false).unwrap();
    peers.settle(8);

    let sub_end = peers
        .world
        .position(|call| matches!(call, WorldCall::End { handle, .. } if *handle == sub_object))
        .expect("subobject ended");
    let root_end = peers
        .world
        .position(|call| matches!(call, WorldCall::End { handle, .. } if *handle == root))
        .expect("root ended");
    assert!(sub_end < root_end);
    assert!(peers.world.instances.is_empty());
}

#[test]
fn dependent_scheduled_before_parent_is_instantiated_first() {
    let mut peers = TestPeers::new();
    let parent = peers.create(TURRET);
    let dependent = peers.create(CRATE);
    peers
        .server
        .add_dependent_object(parent, dependent, DependentSchedulingHint::ScheduleBeforeParent)
        .unwrap();

    peers.tick();

    assert_eq!(peers.world.instantiation_order(), vec![dependent, parent]);
}

#[test]
fn dependent_only_goes_first_while_it_is_being_created() {
    let mut peers = TestPeers::new();
    let parent = peers.create(TURRET);
    let dependent = peers.create(CRATE);
    peers
        .server
        .add_dependent_object(
            parent,
            dependent,
            DependentSchedulingHint::ScheduleBeforeParentIfInitialState,
        )
        .unwrap();
    peers.tick();
    assert_eq!(peers.world.instantiation_order(), vec![dependent, parent]);

    // once created, the dependent no longer holds its parent back
    peers.set(parent, TURRET_HEADING, MemberValue::Unsigned(45));
    peers.tick();
    assert_eq!(peers.world.value(parent, TURRET_HEADING), Some(&MemberValue::Unsigned(45)));
}

#[test]
fn cyclic_dependents_are_rejected() {
    let mut peers = TestPeers::new();
    let first = peers.create(CRATE);
    let second = peers.create(CRATE);
    let third = peers.create(CRATE);
    peers
        .server
        .add_dependent_object(first, second, DependentSchedulingHint::Default)
        .unwrap();
    peers
        .server
        .add_dependent_object(second, third, DependentSchedulingHint::Default)
        .unwrap();

    assert_eq!(
        peers
            .server
            .add_dependent_object(third, first, DependentSchedulingHint::Default),
        Err(ReplicationError::Registry(RegistryError::DependentObjectCycle {
            parent: third,
            dependent: first
        }))
    );

    // the links that were accepted still replicate
    peers.settle(8);
    for handle in [first, second, third] {
        netrep_test::assert_replicated!(peers, handle);
    }
}

#[test]
fn refused_subobject_keeps_its_root_from_being_applied() {
    let mut peers = TestPeers::new();
    let root = peers.create(TURRET);
    let sub_object = peers.create(CRATE);
    peers
        .server
        .add_sub_object(root, sub_object, SubObjectCondition::Always)
        .unwrap();
    peers.world.refused.insert(sub_object);

    peers.tick();

    assert!(peers.world.applies_for(root).is_empty());
    assert!(!peers.world.has(root));
    assert!(!peers.world.has(sub_object));
    assert!(peers
        .world
        .position(|call| matches!(call, WorldCall::End { handle, .. } if *handle == root))
        .is_some());
    netrep_test::assert_not_replicated!(peers, root);
    assert!(peers.remote().is_broken(root));
    let events = peers.take_events();
    assert!(matches!(
        events.as_slice(),
        [ReaderEvent::BrokenObject {
            handle,
            error: ReaderError::Bridge(BridgeError::InstantiationRefused { .. }),
        }] if *handle == root
    ));
    netrep_test::assert_no_violations!(peers);
}
