/// PROPERTY-BASED TESTS: serialization and handle bookkeeping
///
/// Key invariants:
/// 1. Every selected member survives the full form unchanged
/// 2. The delta form against a baseline reproduces the state
/// 3. A live handle keeps its internal index until it is released, and no
///    two live handles share one

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;

use netrep_shared::{
    BitReader, BitWriter, ChangeMask, DestroyFlags, HandleKind, InternalIndex, MemberValue, NetHandle, ObjectState,
    ReplicationConfig, ReplicationSystem,
};
use netrep_test::{
    protocol,
    test_protocol::{crate_protocol, turret_protocol, CRATE},
};

fn crate_state_strategy() -> impl Strategy<Value = ObjectState> {
    (any::<bool>(), any::<u16>(), prop::collection::vec(any::<u8>(), 0..=64)).prop_map(|(open, weight, label)| {
        ObjectState::new(vec![
            MemberValue::Bool(open),
            MemberValue::Unsigned(u64::from(weight)),
            MemberValue::Bytes(label),
        ])
    })
}

fn mask_strategy(bit_count: u32) -> impl Strategy<Value = ChangeMask> {
    prop::collection::vec(any::<bool>(), bit_count as usize).prop_map(move |bits| {
        let mut mask = ChangeMask::new(bit_count);
        for (bit, set) in bits.into_iter().enumerate() {
            mask.set_bit_value(bit as u32, set);
        }
        mask
    })
}

fn selected(state: &ObjectState, mask: &ChangeMask) -> Vec<Option<MemberValue>> {
    mask.iter_set_bits().map(|bit| state.get(bit as usize).cloned()).collect()
}

#[derive(Clone, Debug)]
enum Op {
    Create,
    Destroy(usize),
    Update,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::Create),
        2 => any::<usize>().prop_map(Op::Destroy),
        1 => Just(Op::Update),
    ]
}

proptest! {
    /// Test that the full form reproduces every selected member
    #[test]
    fn prop_full_state_round_trips(
        state in crate_state_strategy(),
        mask in mask_strategy(3),
    ) {
        let protocol = crate_protocol();
        let mut writer = BitWriter::new();
        protocol.write_state(&state, &mask, &mut writer);
        let bytes = writer.to_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut read = protocol.default_state();
        let read_mask = protocol.read_state(&mut reader, &mut read).unwrap();

        prop_assert_eq!(&read_mask, &mask);
        prop_assert_eq!(selected(&read, &mask), selected(&state, &mask));
    }

    /// Test that the delta form against any baseline reproduces the state
    #[test]
    fn prop_delta_round_trips(
        baseline in crate_state_strategy(),
        state in crate_state_strategy(),
        mask in mask_strategy(3),
    ) {
        let protocol = crate_protocol();
        let mut writer = BitWriter::new();
        protocol.write_delta(&state, &baseline, &mask, &mut writer);
        let bytes = writer.to_bytes();

        let mut reader = BitReader::new(&bytes);
        let mut read = baseline.clone();
        let read_mask = protocol.read_delta(&mut reader, &baseline, &mut read).unwrap();

        prop_assert_eq!(&read_mask, &mask);
        prop_assert_eq!(selected(&read, &mask), selected(&state, &mask));
        // members outside the mask keep the baseline
        for bit in 0..3u32 {
            if !mask.get_bit(bit) {
                prop_assert_eq!(read.get(bit as usize), baseline.get(bit as usize));
            }
        }
    }

    /// Test that references survive the full form, "none" included
    #[test]
    fn prop_reference_round_trips(id in 0u64..100_000, heading in 0u64..512) {
        let protocol = turret_protocol();
        let target = NetHandle::from_id(id);
        let state = ObjectState::new(vec![MemberValue::Unsigned(heading), MemberValue::Reference(target)]);
        let mask = ChangeMask::full(2);
        let mut writer = BitWriter::new();
        protocol.write_state(&state, &mask, &mut writer);
        let bytes = writer.to_bytes();

        let mut read = protocol.default_state();
        protocol.read_state(&mut BitReader::new(&bytes), &mut read).unwrap();
        prop_assert_eq!(read, state);
    }

    /// Test that handles map to stable, distinct indices while they live
    #[test]
    fn prop_handles_keep_their_index(ops in prop::collection::vec(op_strategy(), 1..64)) {
        let config = ReplicationConfig {
            internal_index_growth: 8,
            ..ReplicationConfig::default()
        };
        let mut system = ReplicationSystem::new(1, protocol(), config);
        let mut live: HashMap<NetHandle, InternalIndex> = HashMap::new();
        let mut doomed: Vec<NetHandle> = Vec::new();
        let mut issued: HashSet<NetHandle> = HashSet::new();

        for op in ops {
            match op {
                Op::Create => {
                    let handle = system.create_object(CRATE, None, HandleKind::Dynamic).unwrap();
                    prop_assert!(issued.insert(handle), "handle {} issued twice", handle);
                    let index = system.registry().index_of(handle).unwrap();
                    live.insert(handle, index);
                }
                Op::Destroy(pick) => {
                    if live.is_empty() {
                        continue;
                    }
                    let mut handles: Vec<NetHandle> = live.keys().copied().collect();
                    handles.sort();
                    let handle = handles[pick % handles.len()];
                    system.destroy_object(handle, DestroyFlags::default()).unwrap();
                    live.remove(&handle);
                    doomed.push(handle);
                }
                Op::Update => {
                    let released = system.pre_send_update().unwrap();
                    let mut released_sorted = released.clone();
                    released_sorted.sort();
                    doomed.sort();
                    // without connections nothing holds a destroyed index
                    prop_assert_eq!(released_sorted, std::mem::take(&mut doomed));
                    for handle in released {
                        prop_assert!(system.registry().index_of(handle).is_none());
                    }
                }
            }

            let mut seen = HashSet::new();
            for (handle, index) in &live {
                prop_assert_eq!(system.registry().index_of(*handle), Some(*index));
                prop_assert!(seen.insert(*index), "index {} shared by two live handles", index);
            }
        }
    }
}
