//! Snapshots of a committed table for comparisons in tests.

use crate::tree::{SlotSpec, TreeNode};
use cranpose_slots::{GroupKind, Key, Slot, SlotReader, SlotTable, SlotTableError};

/// One group of a [`TableShape`].
#[derive(Clone, Debug)]
pub struct GroupShape {
    pub depth: usize,
    pub key: Key,
    pub kind: GroupKind,
    pub node_count: usize,
    pub slots: Vec<Slot>,
}

impl PartialEq for GroupShape {
    /// Slots compare by identity, not by value.
    fn eq(&self, other: &Self) -> bool {
        self.depth == other.depth
            && self.key == other.key
            && self.kind == other.kind
            && self.node_count == other.node_count
            && self.slots.len() == other.slots.len()
            && self
                .slots
                .iter()
                .zip(&other.slots)
                .all(|(a, b)| a.same_as(b))
    }
}

/// Pre-order list of every group with its depth and own slots.
#[derive(Clone, Debug, PartialEq, Default)]
pub struct TableShape {
    pub groups: Vec<GroupShape>,
}

impl TableShape {
    pub fn capture(table: &SlotTable) -> Result<Self, SlotTableError> {
        table.read(|reader| Self::from_reader(reader))
    }

    pub fn from_reader(reader: &SlotReader<'_>) -> Self {
        let mut groups = Vec::with_capacity(reader.size());
        for index in 0..reader.size() {
            let info = reader.group_at(index);
            groups.push(GroupShape {
                depth: reader.group_path_to(index).len() - 1,
                key: info.key,
                kind: info.kind,
                node_count: info.node_count,
                slots: reader.slots_of(index).cloned().collect(),
            });
        }
        Self { groups }
    }

    pub fn keys(&self) -> Vec<Key> {
        self.groups.iter().map(|group| group.key).collect()
    }

    /// Keys of the top-level groups.
    pub fn root_keys(&self) -> Vec<Key> {
        self.groups
            .iter()
            .filter(|group| group.depth == 0)
            .map(|group| group.key)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Asserts that the table holds exactly `roots`: same keys, kinds and nesting,
/// same slot counts, and the very values given by [`SlotSpec::Value`] slots.
#[track_caller]
pub fn assert_table_matches(table: &SlotTable, roots: &[TreeNode]) {
    let shape = match TableShape::capture(table) {
        Ok(shape) => shape,
        Err(err) => panic!("cannot read slot table: {err}"),
    };
    let mut expected = Vec::new();
    for root in roots {
        flatten(root, 0, &mut expected);
    }
    assert_eq!(
        shape.len(),
        expected.len(),
        "group count differs\n{}",
        table.dump()
    );
    for (index, (actual, (depth, tree))) in shape.groups.iter().zip(&expected).enumerate() {
        assert_eq!(
            (actual.depth, actual.key, actual.kind),
            (*depth, tree.key, tree.kind),
            "group {} differs\n{}",
            index,
            table.dump()
        );
        assert_eq!(
            actual.slots.len(),
            tree.slots.len(),
            "slot count of group {} differs",
            index
        );
        for (n, (slot, spec)) in actual.slots.iter().zip(&tree.slots).enumerate() {
            let matches = match spec {
                SlotSpec::Value(value) => slot.same_as(value),
                SlotSpec::Remembered(text) => slot.downcast_ref::<String>() == Some(text),
                SlotSpec::Keep => true,
            };
            assert!(matches, "slot {} of group {} is {:?}", n, index, slot);
        }
    }
}

fn flatten<'t>(node: &'t TreeNode, depth: usize, out: &mut Vec<(usize, &'t TreeNode)>) {
    out.push((depth, node));
    for child in &node.children {
        flatten(child, depth + 1, out);
    }
}
