// Synchronization groups.
//
// A group collects the nodes executed against one anchor, in registration order, with a wait
// flag per node. Every flag change and every drain bumps the group's version so waiters can
// re-check their predicate instead of polling. A drained group with nobody waiting on it is
// removed from the registry.

use crate::node::RequestNode;
use dashmap::DashMap;
use sprest_core::GroupId;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::watch;
use tracing::{debug, trace};

/// Position of a node inside one generation of a group.
///
/// `epoch` is unique across the registry; a slot from an older epoch no longer refers to
/// anything, even if its group was removed and created again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    pub group: GroupId,
    pub epoch: u64,
    pub index: usize,
}

#[derive(Debug)]
struct GroupState {
    epoch: u64,
    members: Vec<RequestNode>,
    wait_flags: Vec<bool>,
    version: watch::Sender<u64>,
}

impl GroupState {
    fn new(epoch: u64) -> Self {
        let (version, _) = watch::channel(0);
        Self {
            epoch,
            members: Vec::new(),
            wait_flags: Vec::new(),
            version,
        }
    }

    fn bump(&self) {
        self.version.send_modify(|v| *v = v.wrapping_add(1));
    }

    fn is_settled(&self, limit: Option<Slot>) -> bool {
        let upto = match limit {
            Some(slot) if slot.epoch != self.epoch => return true,
            Some(slot) => slot.index.min(self.members.len()),
            None => self.members.len(),
        };

        self.members[..upto]
            .iter()
            .zip(&self.wait_flags)
            .all(|(member, flag)| *flag && member.is_completed())
    }

    fn take_members(&mut self, next_epoch: u64) -> Vec<RequestNode> {
        self.epoch = next_epoch;
        self.wait_flags.clear();
        let members = mem::take(&mut self.members);
        self.bump();
        members
    }

    fn is_idle(&self) -> bool {
        self.members.is_empty() && self.version.receiver_count() == 0
    }
}

#[derive(Debug, Default)]
pub(crate) struct GroupRegistry {
    groups: DashMap<GroupId, GroupState>,
    epochs: AtomicU64,
}

impl GroupRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_epoch(&self) -> u64 {
        self.epochs.fetch_add(1, Ordering::Relaxed)
    }

    /// Append `node` to `group`, or hand back `previous` if it already holds a slot there.
    pub fn register(&self, group: GroupId, node: &RequestNode, previous: Option<Slot>) -> Slot {
        let mut state = self
            .groups
            .entry(group)
            .or_insert_with(|| GroupState::new(self.next_epoch()));
        if let Some(slot) = previous.filter(|s| s.group == group && s.epoch == state.epoch) {
            return slot;
        }

        let index = state.members.len();
        state.members.push(node.clone());
        state.wait_flags.push(false);
        trace!("Registered {} in {} at index {}", node.id(), group, index);

        Slot {
            group,
            epoch: state.epoch,
            index,
        }
    }

    /// Mark the node at `slot` as fully settled.
    pub fn set_wait_flag(&self, slot: Slot) {
        let Some(mut state) = self.groups.get_mut(&slot.group) else {
            return;
        };
        if state.epoch != slot.epoch {
            trace!("Ignoring wait flag for drained slot {:?}", slot);
            return;
        }
        if let Some(flag) = state.wait_flags.get_mut(slot.index) {
            *flag = true;
        }
        state.bump();
    }

    /// Members below `limit` (all members when `None`) have completed and set their flag.
    ///
    /// A group the registry does not track is settled.
    #[cfg(test)]
    fn is_settled(&self, group: GroupId, limit: Option<Slot>) -> bool {
        self.groups
            .get(&group)
            .map_or(true, |state| state.is_settled(limit))
    }

    /// Wait until `is_settled(group, limit)` holds.
    ///
    /// The last waiter on a group drained in the meantime removes it.
    pub async fn wait_settled(&self, group: GroupId, limit: Option<Slot>) {
        loop {
            let mut rx = {
                let Some(state) = self.groups.get(&group) else {
                    return;
                };
                if state.is_settled(limit) {
                    drop(state);
                    self.forget_if_idle(group);
                    return;
                }
                state.version.subscribe()
            };
            // A discarded group drops its sender; nothing is left to wait for.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }

    /// Wait until every member of `group` has settled, then drain it in the same critical
    /// section, so a node registering concurrently lands in the next generation.
    pub async fn drain_when_settled(&self, group: GroupId) -> Vec<RequestNode> {
        loop {
            let mut rx = {
                let Some(mut state) = self.groups.get_mut(&group) else {
                    return Vec::new();
                };
                if state.is_settled(None) {
                    let members = state.take_members(self.next_epoch());
                    drop(state);
                    debug!("Drained {} responses from {}", members.len(), group);
                    self.forget_if_idle(group);
                    return members;
                }
                state.version.subscribe()
            };
            if rx.changed().await.is_err() {
                return Vec::new();
            }
        }
    }

    /// Drop the group `slot` belongs to when `slot` is its only member and nobody waits on it.
    pub fn release(&self, slot: Slot) {
        let removed = self.groups.remove_if(&slot.group, |_, state| {
            state.epoch == slot.epoch
                && slot.index == 0
                && state.members.len() == 1
                && state.version.receiver_count() == 0
        });
        if removed.is_some() {
            trace!("Released {}", slot.group);
        }
    }

    fn forget_if_idle(&self, group: GroupId) {
        self.groups.remove_if(&group, |_, state| state.is_idle());
    }

    /// Forget `group` entirely.
    pub fn discard(&self, group: GroupId) {
        self.groups.remove(&group);
    }

    pub fn len(&self, group: GroupId) -> usize {
        self.groups.get(&group).map(|s| s.members.len()).unwrap_or(0)
    }

    /// Number of groups currently tracked.
    pub fn active(&self) -> usize {
        self.groups.len()
    }

    pub fn wait_flags(&self, group: GroupId) -> Vec<bool> {
        self.groups
            .get(&group)
            .map(|s| s.wait_flags.clone())
            .unwrap_or_default()
    }
}
