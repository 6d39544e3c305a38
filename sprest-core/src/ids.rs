use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identity of one request node in a call tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(u64);

/// Identity of a synchronization group.
///
/// A group is always led by exactly one node, so its id is the leader's node id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u64);

impl NodeId {
    pub fn new(value: u64) -> Self {
        NodeId(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl GroupId {
    pub fn new(value: u64) -> Self {
        GroupId(value)
    }

    /// The group a node leads when it acts as its own base.
    pub fn led_by(node: NodeId) -> Self {
        GroupId(node.as_u64())
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn leader(&self) -> NodeId {
        NodeId(self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.0)
    }
}

impl From<u64> for NodeId {
    fn from(value: u64) -> Self {
        NodeId::new(value)
    }
}

impl From<u64> for GroupId {
    fn from(value: u64) -> Self {
        GroupId::new(value)
    }
}

/// Hands out node ids. Zero is never allocated so it can mean "unset" in atomics.
#[derive(Debug)]
pub struct NodeIdAllocator {
    next: AtomicU64,
}

impl NodeIdAllocator {
    pub fn new() -> Self {
        NodeIdAllocator {
            next: AtomicU64::new(1),
        }
    }

    pub fn allocate(&self) -> NodeId {
        let id = self.next.fetch_add(1, Ordering::Relaxed);
        NodeId::new(id)
    }
}

impl Default for NodeIdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
