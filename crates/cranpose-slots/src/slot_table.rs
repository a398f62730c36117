//! Slot table: groups and slots in two gap buffers behind a session lock.
//!
//! Groups are stored in pre-order. A group's subtree is the contiguous run of
//! `size` groups starting at the group itself. Slots follow the same order:
//! each group's own slots come first, then the slots of its children.
//!
//! ```text
//!   groups: [ A(size 3) | B(size 1) | C(size 1) | D(size 1) ]
//!   slots:  [ a0 a1     | b0        |           | d0 d1     ]
//! ```
//!
//! Access goes through sessions. Any number of [`SlotReader`]s may be open at
//! once, or exactly one [`SlotWriter`], never both. A writer's edits become
//! visible when it commits; dropping it without committing restores the table
//! it started from.

use crate::anchor::AnchorTable;
use crate::collections::map::HashSet;
use crate::error::SlotTableError;
use crate::gap_buffer::GapBuffer;
use crate::group::Group;
use crate::reader::SlotReader;
use crate::slot::Slot;
use crate::writer::{CommitReport, SlotWriter};
use log::debug;
use smallvec::SmallVec;
use std::cell::{Cell, Ref, RefCell};
use std::fmt::{self, Write as _};

/// Positional data derived from the group sizes, rebuilt on every commit.
#[derive(Clone, Debug, Default)]
pub(crate) struct LayoutIndex {
    pub(crate) slot_starts: Vec<usize>,
    pub(crate) parents: Vec<Option<usize>>,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct TableState {
    pub(crate) groups: GapBuffer<Group>,
    pub(crate) slots: GapBuffer<Slot>,
    pub(crate) anchors: AnchorTable,
    pub(crate) layout: LayoutIndex,
}

impl TableState {
    pub(crate) fn rebuild_anchors(&mut self) {
        self.anchors.rebuild(
            self.groups
                .iter()
                .enumerate()
                .map(|(position, group)| (position, group.anchor)),
        );
    }

    /// Recomputes parents, slot offsets and anchor positions in one scan.
    pub(crate) fn rebuild_index(&mut self) {
        let count = self.groups.len();
        let mut slot_starts = Vec::with_capacity(count);
        let mut parents = Vec::with_capacity(count);
        let mut open: SmallVec<[(usize, usize); 32]> = SmallVec::new();
        let mut slot_cursor = 0usize;
        for (index, group) in self.groups.iter().enumerate() {
            while matches!(open.last(), Some(&(_, end)) if index >= end) {
                open.pop();
            }
            parents.push(open.last().map(|&(parent, _)| parent));
            slot_starts.push(slot_cursor);
            slot_cursor += group.slot_count;
            open.push((index, index + group.size));
        }
        self.layout = LayoutIndex {
            slot_starts,
            parents,
        };
        self.rebuild_anchors();
    }

    pub(crate) fn root_node_count(&self) -> usize {
        let mut index = 0;
        let mut nodes = 0;
        while index < self.groups.len() {
            let group = &self.groups[index];
            nodes += group.node_contribution();
            index += group.size.max(1);
        }
        nodes
    }

    pub(crate) fn verify(&self) -> Result<(), SlotTableError> {
        let count = self.groups.len();
        let mut slot_cursor = 0usize;
        let mut index = 0usize;
        while index < count {
            self.verify_group(index, count, &mut slot_cursor)?;
            index += self.groups[index].size;
        }
        if slot_cursor != self.slots.len() {
            return Err(SlotTableError::malformed(
                None,
                format!(
                    "groups account for {} slots but the table holds {}",
                    slot_cursor,
                    self.slots.len()
                ),
            ));
        }

        let mut seen = HashSet::default();
        for (position, group) in self.groups.iter().enumerate() {
            if !seen.insert(group.anchor) {
                return Err(SlotTableError::malformed(Some(position), "anchor shared by two groups"));
            }
            if !self.anchors.is_live(group.anchor) {
                return Err(SlotTableError::malformed(Some(position), "group holds a released anchor"));
            }
            if !self.anchors.is_dirty() && self.anchors.resolve(group.anchor) != Some(position) {
                return Err(SlotTableError::malformed(
                    Some(position),
                    "anchor does not resolve to its group",
                ));
            }
        }
        if self.anchors.live_count() != count {
            return Err(SlotTableError::malformed(
                None,
                format!(
                    "{} live anchors for {} groups",
                    self.anchors.live_count(),
                    count
                ),
            ));
        }
        Ok(())
    }

    fn verify_group(
        &self,
        index: usize,
        parent_end: usize,
        slot_cursor: &mut usize,
    ) -> Result<usize, SlotTableError> {
        let group = &self.groups[index];
        if group.size == 0 {
            return Err(SlotTableError::malformed(Some(index), "group has zero size"));
        }
        let end = index + group.size;
        if end > parent_end {
            return Err(SlotTableError::malformed(
                Some(index),
                "group extends past its parent",
            ));
        }
        let slot_start = *slot_cursor;
        *slot_cursor += group.slot_count;

        let mut nodes = 0;
        let mut child = index + 1;
        while child < end {
            nodes += self.verify_group(child, end, slot_cursor)?;
            child += self.groups[child].size;
        }
        if nodes != group.node_count {
            return Err(SlotTableError::malformed(
                Some(index),
                format!("expected {} nodes, children emit {}", group.node_count, nodes),
            ));
        }
        let subtree_slots = *slot_cursor - slot_start;
        if subtree_slots != group.subtree_slots {
            return Err(SlotTableError::malformed(
                Some(index),
                format!(
                    "expected {} subtree slots, found {}",
                    group.subtree_slots, subtree_slots
                ),
            ));
        }
        Ok(group.node_contribution())
    }

    fn dump_group(&self, out: &mut String, index: usize, level: usize, slot_start: usize) {
        let group = &self.groups[index];
        let _ = write!(
            out,
            "{:indent$}Group({}) key={} kind={:?} nodes={} size={}",
            "",
            index,
            group.key,
            group.kind,
            group.node_count,
            group.size,
            indent = level
        );
        if let Slot::Value(payload) = &group.payload {
            let _ = write!(out, ", payload={:?}", payload);
        }
        if group.slot_count > 0 {
            out.push_str(", slots=[");
            for (n, slot) in self
                .slots
                .range(slot_start, slot_start + group.slot_count)
                .enumerate()
            {
                if n > 0 {
                    out.push_str(", ");
                }
                let _ = write!(out, "{:?}", slot);
            }
            out.push(']');
        }
        out.push('\n');

        let mut child = index + 1;
        let mut child_slots = slot_start + group.slot_count;
        while child < index + group.size {
            self.dump_group(out, child, level + 1, child_slots);
            child_slots += self.groups[child].subtree_slots;
            child += self.groups[child].size;
        }
    }

    pub(crate) fn dump(&self) -> String {
        let mut out = String::new();
        if self.groups.is_empty() {
            out.push_str("<EMPTY>\n");
            return out;
        }
        let mut index = 0;
        let mut slots = 0;
        while index < self.groups.len() {
            self.dump_group(&mut out, index, 0, slots);
            slots += self.groups[index].subtree_slots;
            index += self.groups[index].size;
        }
        out
    }
}

#[derive(Default)]
pub struct SlotTable {
    state: RefCell<TableState>,
    readers: Cell<usize>,
    writer: Cell<bool>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table with room for `groups` groups and `slots` slots before
    /// either gap buffer has to grow.
    pub fn with_capacity(groups: usize, slots: usize) -> Self {
        Self {
            state: RefCell::new(TableState {
                groups: GapBuffer::with_capacity(groups),
                slots: GapBuffer::with_capacity(slots),
                ..TableState::default()
            }),
            ..Self::default()
        }
    }

    #[track_caller]
    fn state(&self) -> Ref<'_, TableState> {
        match self.state.try_borrow() {
            Ok(state) => state,
            Err(_) => panic!("slot table accessed while a writer session is open"),
        }
    }

    pub fn group_count(&self) -> usize {
        self.state().groups.len()
    }

    pub fn slot_count(&self) -> usize {
        self.state().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.group_count() == 0
    }

    pub fn is_writing(&self) -> bool {
        self.writer.get()
    }

    pub fn reader_count(&self) -> usize {
        self.readers.get()
    }

    /// Opens a read session on the committed table.
    pub fn open_reader(&self) -> Result<SlotReader<'_>, SlotTableError> {
        if self.writer.get() {
            return Err(SlotTableError::WriterActive);
        }
        let state = self
            .state
            .try_borrow()
            .map_err(|_| SlotTableError::WriterActive)?;
        self.readers.set(self.readers.get() + 1);
        Ok(SlotReader::new(self, state))
    }

    /// Opens the exclusive write session.
    pub fn open_writer(&self) -> Result<SlotWriter<'_>, SlotTableError> {
        if self.writer.get() {
            return Err(SlotTableError::WriterActive);
        }
        if self.readers.get() > 0 {
            return Err(SlotTableError::ReaderActive {
                readers: self.readers.get(),
            });
        }
        let state = self
            .state
            .try_borrow_mut()
            .map_err(|_| SlotTableError::ReaderActive {
                readers: self.readers.get(),
            })?;
        self.writer.set(true);
        debug!(
            "writer opened on {} groups / {} slots",
            state.groups.len(),
            state.slots.len()
        );
        Ok(SlotWriter::new(self, state))
    }

    pub(crate) fn close_reader(&self) {
        debug_assert!(self.readers.get() > 0, "unexpected reader close");
        self.readers.set(self.readers.get().saturating_sub(1));
    }

    pub(crate) fn close_writer(&self) {
        debug_assert!(self.writer.get(), "unexpected writer close");
        self.writer.set(false);
    }

    /// Runs `block` with a reader and closes it afterwards.
    pub fn read<R>(&self, block: impl FnOnce(&mut SlotReader<'_>) -> R) -> Result<R, SlotTableError> {
        let mut reader = self.open_reader()?;
        Ok(block(&mut reader))
    }

    /// Runs `block` with a writer and commits when it returns.
    ///
    /// If `block` panics the writer is dropped uncommitted and the table is
    /// left exactly as it was.
    pub fn write(
        &self,
        block: impl FnOnce(&mut SlotWriter<'_>),
    ) -> Result<CommitReport, SlotTableError> {
        let mut writer = self.open_writer()?;
        block(&mut writer);
        Ok(writer.commit())
    }

    /// Number of nodes emitted at the root of the table.
    ///
    /// Equals the number of node groups that have no node ancestor.
    pub fn root_node_count(&self) -> usize {
        self.state().root_node_count()
    }

    /// Checks the structural invariants of the committed table.
    pub fn verify_well_formed(&self) -> Result<(), SlotTableError> {
        let state = self
            .state
            .try_borrow()
            .map_err(|_| SlotTableError::WriterActive)?;
        state.verify()
    }

    /// Renders groups and their slots as indented text. Meant for debugging.
    pub fn dump(&self) -> String {
        match self.state.try_borrow() {
            Ok(state) => state.dump(),
            Err(_) => "<writer active>\n".to_string(),
        }
    }
}

impl fmt::Debug for SlotTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut debug = f.debug_struct("SlotTable");
        if let Ok(state) = self.state.try_borrow() {
            debug
                .field("groups", &state.groups.len())
                .field("slots", &state.slots.len());
        }
        debug
            .field("readers", &self.readers.get())
            .field("writer", &self.writer.get())
            .finish()
    }
}
