use std::{
    collections::{BTreeMap, HashMap, HashSet},
    time::{Duration, Instant},
};

use crate::{
    bit_array::ChangeMask,
    handle::NetHandle,
    protocol::{MemberKind, MemberValue, ObjectState, ReplicationProtocol},
};

#[derive(Clone, Copy)]
struct HeldBack {
    target: NetHandle,
    since: Instant,
}

type HeldBackMembers = HashMap<NetHandle, BTreeMap<u32, HeldBack>>;

/// Per-member bookkeeping of the references held by received objects.
///
/// A reference member whose target cannot be resolved is held back from the
/// bridge and delivered on its own once the target shows up. Held-back
/// members start hot and are retried after every dispatch; once they have
/// been waiting for the hot lifetime they go cold and are only retried on a
/// slower interval. References to dynamic objects are remembered after
/// resolving, so they can be held back again when their target stops
/// replicating.
pub struct ReferenceTracker {
    hot: HeldBackMembers,
    cold: HeldBackMembers,
    resolved_dynamic: HashMap<NetHandle, HashSet<(NetHandle, u32)>>,
    hot_lifetime: Duration,
    cold_retry_time: Duration,
    last_cold_retry: Option<Instant>,
}

impl ReferenceTracker {
    pub fn new(hot_lifetime: Duration, cold_retry_time: Duration) -> Self {
        Self {
            hot: HashMap::new(),
            cold: HashMap::new(),
            resolved_dynamic: HashMap::new(),
            hot_lifetime,
            cold_retry_time,
            last_cold_retry: None,
        }
    }

    /// Records the references `owner` received for the members in `mask`.
    /// Returns the members that cannot be applied yet.
    pub fn update(
        &mut self,
        owner: NetHandle,
        protocol: &ReplicationProtocol,
        state: &ObjectState,
        mask: &ChangeMask,
        now: Instant,
        is_resolved: impl Fn(NetHandle) -> bool,
    ) -> ChangeMask {
        let mut held_back = ChangeMask::new(mask.bit_count());
        for bit in mask.iter_set_bits() {
            let Some(member) = protocol.members().get(bit as usize) else {
                continue;
            };
            if !matches!(member.kind(), MemberKind::Reference { .. }) {
                continue;
            }
            self.forget(owner, bit);

            let Some(MemberValue::Reference(target)) = state.get(bit as usize) else {
                continue;
            };
            if !target.is_valid() {
                continue;
            }
            if is_resolved(*target) {
                if target.is_dynamic() {
                    self.resolved_dynamic
                        .entry(*target)
                        .or_default()
                        .insert((owner, bit));
                }
            } else {
                self.hold_back(owner, bit, *target, now);
                held_back.set_bit(bit);
            }
        }
        held_back
    }

    fn hold_back(&mut self, owner: NetHandle, bit: u32, target: NetHandle, since: Instant) {
        self.hot
            .entry(owner)
            .or_default()
            .insert(bit, HeldBack { target, since });
    }

    fn forget(&mut self, owner: NetHandle, bit: u32) {
        for held in [&mut self.hot, &mut self.cold] {
            if let Some(bits) = held.get_mut(&owner) {
                bits.remove(&bit);
                if bits.is_empty() {
                    held.remove(&owner);
                }
            }
        }
        // only the previous target of this member can hold the entry
        self.resolved_dynamic.retain(|_, owners| {
            owners.remove(&(owner, bit));
            !owners.is_empty()
        });
    }

    /// Members of `owner` currently held back.
    pub fn unresolved_bits(&self, owner: NetHandle, bit_count: u32) -> ChangeMask {
        let mut mask = ChangeMask::new(bit_count);
        for held in [&self.hot, &self.cold] {
            if let Some(bits) = held.get(&owner) {
                for bit in bits.keys() {
                    mask.set_bit(*bit);
                }
            }
        }
        mask
    }

    pub fn has_unresolved(&self) -> bool {
        !self.hot.is_empty() || !self.cold.is_empty()
    }

    /// Owners with members on the cold list.
    pub fn cold_owner_count(&self) -> usize {
        self.cold.len()
    }

    /// Takes every held-back member whose target now resolves, grouped by
    /// owner. Hot members are always checked, cold ones only once the cold
    /// retry time has passed since their last check.
    pub fn take_resolved(&mut self, now: Instant, is_resolved: impl Fn(NetHandle) -> bool) -> Vec<(NetHandle, Vec<u32>)> {
        self.cool_down(now);

        let mut output: BTreeMap<NetHandle, Vec<u32>> = BTreeMap::new();
        take_resolved_from(&mut self.hot, &mut self.resolved_dynamic, &is_resolved, &mut output);

        let retry_cold = self
            .last_cold_retry
            .map_or(true, |last| now.saturating_duration_since(last) >= self.cold_retry_time);
        if retry_cold && !self.cold.is_empty() {
            self.last_cold_retry = Some(now);
            take_resolved_from(&mut self.cold, &mut self.resolved_dynamic, &is_resolved, &mut output);
        }

        output
            .into_iter()
            .map(|(owner, mut bits)| {
                bits.sort_unstable();
                (owner, bits)
            })
            .collect()
    }

    /// Moves members held back for longer than the hot lifetime to the
    /// cold list.
    fn cool_down(&mut self, now: Instant) {
        let lifetime = self.hot_lifetime;
        for (owner, bits) in self.hot.iter_mut() {
            let stale: Vec<u32> = bits
                .iter()
                .filter(|(_, held)| now.saturating_duration_since(held.since) >= lifetime)
                .map(|(bit, _)| *bit)
                .collect();
            for bit in stale {
                if let Some(held) = bits.remove(&bit) {
                    self.cold.entry(*owner).or_default().insert(bit, held);
                }
            }
        }
        self.hot.retain(|_, bits| !bits.is_empty());
    }

    /// `target` stopped replicating: members that pointed at it are held
    /// back again until it returns.
    pub fn on_target_ended(&mut self, target: NetHandle, now: Instant) {
        let Some(owners) = self.resolved_dynamic.remove(&target) else {
            return;
        };
        for (owner, bit) in owners {
            self.hold_back(owner, bit, target, now);
        }
    }

    /// Drops everything recorded for `owner`.
    pub fn remove_owner(&mut self, owner: NetHandle) {
        self.hot.remove(&owner);
        self.cold.remove(&owner);
        self.resolved_dynamic.retain(|_, owners| {
            owners.retain(|(tracked, _)| *tracked != owner);
            !owners.is_empty()
        });
    }
}

fn take_resolved_from(
    held: &mut HeldBackMembers,
    resolved_dynamic: &mut HashMap<NetHandle, HashSet<(NetHandle, u32)>>,
    is_resolved: &impl Fn(NetHandle) -> bool,
    output: &mut BTreeMap<NetHandle, Vec<u32>>,
) {
    for (owner, bits) in held.iter_mut() {
        bits.retain(|bit, entry| {
            if !is_resolved(entry.target) {
                return true;
            }
            output.entry(*owner).or_default().push(*bit);
            if entry.target.is_dynamic() {
                resolved_dynamic
                    .entry(entry.target)
                    .or_default()
                    .insert((*owner, *bit));
            }
            false
        });
    }
    held.retain(|_, bits| !bits.is_empty());
}
