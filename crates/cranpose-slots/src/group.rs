use crate::slot::Slot;
use crate::{AnchorId, Key};

/// What a group stands for.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum GroupKind {
    /// One invocation of a composable function.
    Call,
    /// A plain keyed container of data slots.
    Data,
    /// An emitted node. Counts as exactly one node in its parent.
    Node,
}

/// Group record as stored in the group gap buffer.
#[derive(Clone, Debug)]
pub(crate) struct Group {
    pub(crate) key: Key,
    pub(crate) kind: GroupKind,
    pub(crate) anchor: AnchorId,
    /// Groups in the subtree, this one included.
    pub(crate) size: usize,
    pub(crate) node_count: usize,
    pub(crate) slot_count: usize,
    /// Own slots plus the slots of every descendant.
    pub(crate) subtree_slots: usize,
    /// The emitted node of a `Node` group, or the aux value of any other group.
    pub(crate) payload: Slot,
}

impl Group {
    pub(crate) fn new(key: Key, kind: GroupKind, anchor: AnchorId) -> Self {
        Self {
            key,
            kind,
            anchor,
            size: 1,
            node_count: 0,
            slot_count: 0,
            subtree_slots: 0,
            payload: Slot::Empty,
        }
    }

    /// Number of nodes this group adds to its parent.
    pub(crate) fn node_contribution(&self) -> usize {
        match self.kind {
            GroupKind::Node => 1,
            _ => self.node_count,
        }
    }

    pub(crate) fn matches(&self, key: Key, kind: GroupKind) -> bool {
        self.key == key && self.kind == kind
    }

    pub(crate) fn info(&self) -> GroupInfo {
        GroupInfo {
            key: self.key,
            kind: self.kind,
            anchor: self.anchor,
            size: self.size,
            node_count: self.node_count,
            slot_count: self.slot_count,
            subtree_slot_count: self.subtree_slots,
        }
    }
}

/// Read-only copy of a group's metadata.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct GroupInfo {
    pub key: Key,
    pub kind: GroupKind,
    pub anchor: AnchorId,
    pub size: usize,
    pub node_count: usize,
    pub slot_count: usize,
    pub subtree_slot_count: usize,
}

impl GroupInfo {
    pub fn is_node(&self) -> bool {
        self.kind == GroupKind::Node
    }
}
