/// Receiving side of the scenarios: keeps a local copy of every replicated
/// object and records every call it receives.

use std::collections::{HashMap, HashSet};

use log::trace;
use netrep_shared::{
    BridgeError, EndReplicationFlags, MemberValue, NetAttachment, NetHandle, ProtocolId,
    ReplicationBridge, ReplicationProtocol, StateUpdate,
};

#[derive(Clone, Debug, PartialEq)]
pub enum WorldCall {
    Instantiate { handle: NetHandle, root: Option<NetHandle> },
    Apply {
        handle: NetHandle,
        changed: Vec<u32>,
        is_initial: bool,
    },
    Attachment { handle: NetHandle, payload: Vec<u8> },
    End { handle: NetHandle, flags: EndReplicationFlags },
    DestructionInfo { handle: NetHandle },
}

#[derive(Clone, Debug, PartialEq)]
pub struct TestInstance {
    pub protocol_id: ProtocolId,
    pub root: Option<NetHandle>,
    pub values: Vec<MemberValue>,
    /// Replication ended with tear-off; the instance stays around.
    pub torn_off: bool,
}

#[derive(Default)]
pub struct TestWorld {
    pub instances: HashMap<NetHandle, TestInstance>,
    pub calls: Vec<WorldCall>,
    /// Handles the world pretends it cannot instantiate.
    pub refused: HashSet<NetHandle>,
    /// Must-be-mapped references still loading.
    pub loading: HashSet<NetHandle>,
    /// Objects the world knows without them being replicated.
    pub preloaded: HashSet<NetHandle>,
    /// Calls that broke an ordering rule, e.g. state for a subobject whose
    /// root does not exist.
    pub violations: Vec<String>,
    value_log: Vec<(NetHandle, usize, MemberValue)>,
}

impl TestWorld {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has(&self, handle: NetHandle) -> bool {
        self.instances.contains_key(&handle)
    }

    pub fn value(&self, handle: NetHandle, member_index: usize) -> Option<&MemberValue> {
        self.instances
            .get(&handle)
            .and_then(|instance| instance.values.get(member_index))
    }

    /// Every value a member of `handle` was set to, in order.
    pub fn history(&self, handle: NetHandle, member_index: usize) -> Vec<MemberValue> {
        self.value_log
            .iter()
            .filter(|(logged, index, _)| *logged == handle && *index == member_index)
            .map(|(_, _, value)| value.clone())
            .collect()
    }

    pub fn applies_for(&self, handle: NetHandle) -> Vec<(Vec<u32>, bool)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WorldCall::Apply {
                    handle: applied,
                    changed,
                    is_initial,
                } if *applied == handle => Some((changed.clone(), *is_initial)),
                _ => None,
            })
            .collect()
    }

    pub fn attachments_for(&self, handle: NetHandle) -> Vec<Vec<u8>> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WorldCall::Attachment { handle: target, payload } if *target == handle => Some(payload.clone()),
                _ => None,
            })
            .collect()
    }

    /// Position of the first call matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&WorldCall) -> bool) -> Option<usize> {
        self.calls.iter().position(predicate)
    }

    pub fn instantiation_order(&self) -> Vec<NetHandle> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                WorldCall::Instantiate { handle, .. } => Some(*handle),
                _ => None,
            })
            .collect()
    }

    fn set_value(&mut self, handle: NetHandle, member_index: usize, value: MemberValue) {
        if let Some(instance) = self.instances.get_mut(&handle) {
            if let Some(slot) = instance.values.get_mut(member_index) {
                *slot = value.clone();
            }
        }
        self.value_log.push((handle, member_index, value));
    }
}

impl ReplicationBridge for TestWorld {
    fn instantiate(
        &mut self,
        handle: NetHandle,
        protocol: &ReplicationProtocol,
        root: Option<NetHandle>,
    ) -> Result<(), BridgeError> {
        if self.refused.contains(&handle) {
            return Err(BridgeError::InstantiationRefused {
                handle,
                reason: "refused by test world".to_string(),
            });
        }
        if let Some(root) = root {
            if !self.instances.contains_key(&root) {
                self.violations
                    .push(format!("subobject {} instantiated before its root {}", handle, root));
            }
        }
        trace!("instantiate {} ({})", handle, protocol.name());
        self.calls.push(WorldCall::Instantiate { handle, root });
        self.instances.insert(
            handle,
            TestInstance {
                protocol_id: protocol.id(),
                root,
                values: protocol.default_state().values().to_vec(),
                torn_off: false,
            },
        );
        Ok(())
    }

    fn apply_state(&mut self, update: StateUpdate<'_>) {
        let handle = update.handle;
        let Some(instance) = self.instances.get(&handle) else {
            self.violations
                .push(format!("state applied to {} which was never instantiated", handle));
            return;
        };
        if let Some(root) = instance.root {
            if !self.instances.contains_key(&root) {
                self.violations
                    .push(format!("state applied to subobject {} without its root {}", handle, root));
            }
        }
        let changed: Vec<u32> = update.changed.iter_set_bits().collect();
        for bit in &changed {
            if let Some(value) = update.state.get(*bit as usize) {
                self.set_value(handle, *bit as usize, value.clone());
            }
        }
        self.calls.push(WorldCall::Apply {
            handle,
            changed,
            is_initial: update.is_initial,
        });
    }

    fn on_attachment(&mut self, handle: NetHandle, attachment: NetAttachment) {
        self.calls.push(WorldCall::Attachment {
            handle,
            payload: attachment.payload().to_vec(),
        });
    }

    fn end_replication(&mut self, handle: NetHandle, flags: EndReplicationFlags) {
        self.calls.push(WorldCall::End { handle, flags });
        if flags.tear_off {
            if let Some(instance) = self.instances.get_mut(&handle) {
                instance.torn_off = true;
            }
        } else {
            self.instances.remove(&handle);
        }
    }

    fn on_destruction_info(&mut self, handle: NetHandle) {
        self.calls.push(WorldCall::DestructionInfo { handle });
        self.instances.remove(&handle);
    }

    fn is_reference_loaded(&self, handle: NetHandle) -> bool {
        !self.loading.contains(&handle)
    }

    fn resolve_reference(&self, handle: NetHandle) -> bool {
        self.preloaded.contains(&handle) || self.instances.contains_key(&handle)
    }
}
