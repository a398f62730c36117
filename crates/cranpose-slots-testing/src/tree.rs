//! Declarative group trees that drive a writer session.
//!
//! ```ignore
//! let tree = [call(1u64)
//!     .remember("state")
//!     .child(node(2u64).slot(Slot::value(10)))];
//! compose(&table, &tree)?;
//! ```

use cranpose_slots::{
    CommitReport, GroupKind, Key, Slot, SlotTable, SlotTableError, SlotWriter,
};
use log::trace;

/// How a slot of a [`TreeNode`] is written.
#[derive(Clone, Debug)]
pub enum SlotSpec {
    /// Recorded as given. Passing a clone of the same value keeps the slot.
    Value(Slot),
    /// A `String` kept across writes as long as the text stays the same.
    Remembered(String),
    /// Whatever the table holds is retained.
    Keep,
}

#[derive(Clone, Debug)]
pub struct TreeNode {
    pub key: Key,
    pub kind: GroupKind,
    pub slots: Vec<SlotSpec>,
    pub children: Vec<TreeNode>,
}

pub fn call(key: impl Into<Key>) -> TreeNode {
    TreeNode::new(key.into(), GroupKind::Call)
}

pub fn data(key: impl Into<Key>) -> TreeNode {
    TreeNode::new(key.into(), GroupKind::Data)
}

pub fn node(key: impl Into<Key>) -> TreeNode {
    TreeNode::new(key.into(), GroupKind::Node)
}

impl TreeNode {
    pub fn new(key: Key, kind: GroupKind) -> Self {
        Self {
            key,
            kind,
            slots: Vec::new(),
            children: Vec::new(),
        }
    }

    pub fn slot(mut self, value: impl Into<Slot>) -> Self {
        self.slots.push(SlotSpec::Value(value.into()));
        self
    }

    pub fn remember(mut self, text: impl Into<String>) -> Self {
        self.slots.push(SlotSpec::Remembered(text.into()));
        self
    }

    pub fn keep_slot(mut self) -> Self {
        self.slots.push(SlotSpec::Keep);
        self
    }

    pub fn child(mut self, child: TreeNode) -> Self {
        self.children.push(child);
        self
    }

    pub fn children(mut self, children: impl IntoIterator<Item = TreeNode>) -> Self {
        self.children.extend(children);
        self
    }

    /// Groups in this subtree, this one included.
    pub fn size(&self) -> usize {
        1 + self.children.iter().map(TreeNode::size).sum::<usize>()
    }

    /// Nodes this subtree contributes to its parent.
    pub fn node_contribution(&self) -> usize {
        match self.kind {
            GroupKind::Node => 1,
            _ => self
                .children
                .iter()
                .map(TreeNode::node_contribution)
                .sum(),
        }
    }
}

/// Writes `node` and its subtree at the writer's cursor.
pub fn emit(writer: &mut SlotWriter<'_>, node: &TreeNode) {
    writer.start(node.key, node.kind);
    writer.declare_slots(node.slots.len());
    for spec in &node.slots {
        match spec {
            SlotSpec::Value(value) => {
                writer.record_slot(value.clone());
            }
            SlotSpec::Remembered(text) => {
                if writer.peek_slot().downcast_ref::<String>() == Some(text) {
                    writer.skip_slot();
                } else {
                    writer.record_slot(Slot::value(text.clone()));
                }
            }
            SlotSpec::Keep => {
                writer.skip_slot();
            }
        }
    }
    for child in &node.children {
        emit(writer, child);
    }
    writer.end_group();
}

/// Runs one writer session that turns the table into `roots`.
pub fn compose(table: &SlotTable, roots: &[TreeNode]) -> Result<CommitReport, SlotTableError> {
    trace!("composing {} root group(s)", roots.len());
    table.write(|writer| {
        for root in roots {
            emit(writer, root);
        }
    })
}
