//! Reader session over a committed table.
//!
//! Offers random access by group index plus a sequential cursor that walks
//! the table the same way a writer does, so a caller can re-traverse the tree
//! without changing it.

use crate::gap_buffer::GapBuffer;
use crate::group::{Group, GroupInfo, GroupKind};
use crate::slot::{Slot, SlotValue};
use crate::slot_table::{SlotTable, TableState};
use crate::{AnchorId, Key};
use smallvec::SmallVec;
use std::cell::Ref;
use std::fmt;

/// A child group as returned by [`SlotReader::extract_keys`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct KeyInfo {
    pub key: Key,
    pub kind: GroupKind,
    /// Group index of the child.
    pub location: usize,
    /// Nodes the child contributes to its parent.
    pub nodes: usize,
    /// Index of the child's first node among the parent's nodes.
    pub index: usize,
}

/// Iterator over the direct children of a group, by group index.
pub struct Children<'r> {
    groups: &'r GapBuffer<Group>,
    next: usize,
    end: usize,
}

impl Iterator for Children<'_> {
    type Item = usize;

    fn next(&mut self) -> Option<usize> {
        if self.next >= self.end {
            return None;
        }
        let index = self.next;
        self.next += self.groups[index].size;
        Some(index)
    }
}

struct ReadFrame {
    group: Option<usize>,
    end: usize,
    slot_cursor: usize,
    slot_end: usize,
}

pub struct SlotReader<'a> {
    table: &'a SlotTable,
    state: Ref<'a, TableState>,
    current: usize,
    frames: SmallVec<[ReadFrame; 16]>,
}

impl<'a> SlotReader<'a> {
    pub(crate) fn new(table: &'a SlotTable, state: Ref<'a, TableState>) -> Self {
        let end = state.groups.len();
        let mut frames = SmallVec::new();
        frames.push(ReadFrame {
            group: None,
            end,
            slot_cursor: 0,
            slot_end: 0,
        });
        Self {
            table,
            state,
            current: 0,
            frames,
        }
    }

    /// Number of groups in the table.
    pub fn size(&self) -> usize {
        self.state.groups.len()
    }

    #[track_caller]
    fn group(&self, index: usize) -> &Group {
        let size = self.size();
        assert!(
            index < size,
            "group index {} out of range (size {})",
            index,
            size
        );
        &self.state.groups[index]
    }

    #[track_caller]
    pub fn group_at(&self, index: usize) -> GroupInfo {
        self.group(index).info()
    }

    #[track_caller]
    pub fn group_key(&self, index: usize) -> Key {
        self.group(index).key
    }

    #[track_caller]
    pub fn group_kind(&self, index: usize) -> GroupKind {
        self.group(index).kind
    }

    #[track_caller]
    pub fn group_size(&self, index: usize) -> usize {
        self.group(index).size
    }

    /// Index one past the last group of the subtree at `index`.
    #[track_caller]
    pub fn group_end(&self, index: usize) -> usize {
        index + self.group(index).size
    }

    #[track_caller]
    pub fn node_count(&self, index: usize) -> usize {
        self.group(index).node_count
    }

    #[track_caller]
    pub fn is_node(&self, index: usize) -> bool {
        self.group(index).kind == GroupKind::Node
    }

    #[track_caller]
    pub fn slot_count(&self, index: usize) -> usize {
        self.group(index).slot_count
    }

    #[track_caller]
    pub fn parent_of(&self, index: usize) -> Option<usize> {
        self.group(index);
        self.state.layout.parents[index]
    }

    #[track_caller]
    pub fn children_of(&self, index: usize) -> Children<'_> {
        let size = self.group(index).size;
        Children {
            groups: &self.state.groups,
            next: index + 1,
            end: index + size,
        }
    }

    /// Top-level groups of the table.
    pub fn root_groups(&self) -> Children<'_> {
        Children {
            groups: &self.state.groups,
            next: 0,
            end: self.size(),
        }
    }

    /// Own slots of the group at `index`, children's slots excluded.
    #[track_caller]
    pub fn slots_of(&self, index: usize) -> impl Iterator<Item = &Slot> + '_ {
        let count = self.group(index).slot_count;
        let start = self.state.layout.slot_starts[index];
        self.state.slots.range(start, start + count)
    }

    #[track_caller]
    pub fn slot(&self, index: usize, n: usize) -> &Slot {
        let count = self.group(index).slot_count;
        assert!(
            n < count,
            "slot {} out of range for group {} ({} slots)",
            n,
            index,
            count
        );
        &self.state.slots[self.state.layout.slot_starts[index] + n]
    }

    /// Node emitted by the group at `index`. `None` for groups that are not
    /// node groups or were started without a node.
    #[track_caller]
    pub fn node(&self, index: usize) -> Option<&SlotValue> {
        let group = self.group(index);
        match group.kind {
            GroupKind::Node => group.payload.as_value(),
            _ => None,
        }
    }

    /// Aux value of a call or data group.
    #[track_caller]
    pub fn group_aux(&self, index: usize) -> Option<&SlotValue> {
        let group = self.group(index);
        match group.kind {
            GroupKind::Node => None,
            _ => group.payload.as_value(),
        }
    }

    #[track_caller]
    pub fn anchor(&self, index: usize) -> AnchorId {
        self.group(index).anchor
    }

    /// Current index of the group behind `anchor`, `None` once it was removed.
    pub fn anchor_index(&self, anchor: AnchorId) -> Option<usize> {
        self.state.anchors.resolve(anchor)
    }

    pub fn owns_anchor(&self, anchor: AnchorId) -> bool {
        self.anchor_index(anchor).is_some()
    }

    /// True if `anchor` belongs to `group` or one of its descendants.
    #[track_caller]
    pub fn group_contains_anchor(&self, group: usize, anchor: AnchorId) -> bool {
        let end = self.group_end(group);
        self.anchor_index(anchor)
            .is_some_and(|position| position >= group && position < end)
    }

    /// Indices from the outermost ancestor down to `index` itself.
    #[track_caller]
    pub fn group_path_to(&self, index: usize) -> Vec<usize> {
        self.group(index);
        let mut path = vec![index];
        let mut cursor = self.state.layout.parents[index];
        while let Some(parent) = cursor {
            path.push(parent);
            cursor = self.state.layout.parents[parent];
        }
        path.reverse();
        path
    }

    /// Keys of the direct children of `parent`, or of the top-level groups.
    #[track_caller]
    pub fn extract_keys(&self, parent: Option<usize>) -> Vec<KeyInfo> {
        let children = match parent {
            Some(parent) => self.children_of(parent),
            None => self.root_groups(),
        };
        let mut node_index = 0;
        children
            .map(|location| {
                let group = &self.state.groups[location];
                let nodes = group.node_contribution();
                let info = KeyInfo {
                    key: group.key,
                    kind: group.kind,
                    location,
                    nodes,
                    index: node_index,
                };
                node_index += nodes;
                info
            })
            .collect()
    }

    // ── sequential cursor ───────────────────────────────────────────────────

    fn frame(&self) -> &ReadFrame {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("reader lost its root frame"),
        }
    }

    pub fn current_group(&self) -> usize {
        self.current
    }

    /// Innermost group entered with [`start_group`](Self::start_group).
    pub fn parent(&self) -> Option<usize> {
        self.frame().group
    }

    pub fn is_group_end(&self) -> bool {
        self.current >= self.frame().end
    }

    /// Key of the group under the cursor.
    pub fn cursor_key(&self) -> Option<Key> {
        (!self.is_group_end()).then(|| self.state.groups[self.current].key)
    }

    /// Enters the group under the cursor.
    #[track_caller]
    pub fn start_group(&mut self) -> GroupInfo {
        assert!(!self.is_group_end(), "start_group() at the end of a group");
        let index = self.current;
        let info = self.state.groups[index].info();
        let slot_cursor = self.state.layout.slot_starts[index];
        self.frames.push(ReadFrame {
            group: Some(index),
            end: index + info.size,
            slot_cursor,
            slot_end: slot_cursor + info.slot_count,
        });
        self.current += 1;
        info
    }

    /// Next own slot of the innermost group, `None` once all were read.
    pub fn next_slot(&mut self) -> Option<Slot> {
        let frame = match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("reader lost its root frame"),
        };
        if frame.slot_cursor >= frame.slot_end {
            return None;
        }
        let slot = self.state.slots[frame.slot_cursor].clone();
        frame.slot_cursor += 1;
        Some(slot)
    }

    /// Steps over the group under the cursor and returns its node contribution.
    #[track_caller]
    pub fn skip_group(&mut self) -> usize {
        assert!(!self.is_group_end(), "skip_group() at the end of a group");
        let group = &self.state.groups[self.current];
        let nodes = group.node_contribution();
        self.current += group.size;
        nodes
    }

    pub fn skip_to_group_end(&mut self) {
        self.current = self.frame().end;
    }

    /// Leaves the innermost group. Its children must all have been visited.
    #[track_caller]
    pub fn end_group(&mut self) {
        assert!(
            self.frames.len() > 1,
            "end_group() without a matching start_group()"
        );
        assert!(
            self.is_group_end(),
            "end_group() at {} before the group end {}",
            self.current,
            self.frame().end
        );
        self.frames.pop();
    }

    /// Moves the cursor to `index` and leaves every open group.
    #[track_caller]
    pub fn reposition(&mut self, index: usize) {
        let size = self.size();
        assert!(
            index <= size,
            "group index {} out of range (size {})",
            index,
            size
        );
        self.frames.truncate(1);
        self.current = index;
    }
}

impl Drop for SlotReader<'_> {
    fn drop(&mut self) {
        self.table.close_reader();
    }
}

impl fmt::Debug for SlotReader<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotReader")
            .field("current", &self.current)
            .field("depth", &(self.frames.len() - 1))
            .field("size", &self.size())
            .finish()
    }
}
