//! Writer session: rewrites the table from a stream of group and slot calls.
//!
//! The caller describes the new shape of the table in pre-order:
//!
//! ```text
//! start_group(a)
//!     record_slot(..)
//!     start_node(b) .. end_group()
//! end_group()
//! ```
//!
//! The writer keeps a cursor into the previous table at the same nesting depth
//! and, for every `start`, either retains the group under the cursor, moves a
//! later sibling with the same key and kind to the cursor (slots included), or
//! inserts a fresh group. Old children that were never matched are removed when
//! their parent ends, and reported in the [`CommitReport`] so their values can
//! be disposed of.
//!
//! Edits happen in place in the gap buffers. The first destructive edit of a
//! session snapshots the table, and that snapshot is restored if the writer is
//! dropped without [`SlotWriter::commit`].

use crate::collections::map::HashSet;
use crate::group::{Group, GroupKind};
use crate::slot::{Slot, SlotValue};
use crate::slot_table::{SlotTable, TableState};
use crate::{AnchorId, Key};
use log::{debug, log_enabled, trace, Level};
use smallvec::SmallVec;
use std::cell::RefMut;
use std::fmt;
use std::rc::Rc;

/// What happened during one writer session.
#[derive(Default, Debug)]
pub struct CommitReport {
    /// Groups created by this session.
    pub inserted: usize,
    /// Groups kept in place, skipped subtrees included.
    pub retained: usize,
    /// Subtrees relocated to an earlier position among their siblings.
    pub moved: usize,
    /// Every removed group, in pre-order, with the slots it owned.
    pub removed_groups: Vec<RemovedGroup>,
    /// Values that left the table by being overwritten or trimmed.
    pub released_slots: Vec<SlotValue>,
    /// Retained slots whose value was replaced by a different one.
    pub changed_slots: Vec<SlotChange>,
}

impl CommitReport {
    pub fn removed(&self) -> usize {
        self.removed_groups.len()
    }

    /// True when the session did not change the structure of the table.
    pub fn is_noop(&self) -> bool {
        self.inserted == 0 && self.moved == 0 && self.removed_groups.is_empty()
    }

    /// Every value the caller may need to dispose of: payloads and slots of
    /// removed groups followed by released slots.
    pub fn disposed_values(&self) -> impl Iterator<Item = &SlotValue> + '_ {
        self.removed_groups
            .iter()
            .flat_map(|group| {
                group
                    .payload
                    .as_value()
                    .into_iter()
                    .chain(group.slots.iter().filter_map(Slot::as_value))
            })
            .chain(self.released_slots.iter())
    }
}

#[derive(Clone, Debug)]
pub struct RemovedGroup {
    pub key: Key,
    pub kind: GroupKind,
    /// Stale by the time the report is returned.
    pub anchor: AnchorId,
    /// Node or aux payload the group carried.
    pub payload: Slot,
    pub slots: Vec<Slot>,
}

#[derive(Clone, Debug)]
pub struct SlotChange {
    /// Anchor of the group that owns the slot.
    pub anchor: AnchorId,
    /// Position of the slot among the group's own slots.
    pub index: usize,
    pub previous: Slot,
    pub current: Slot,
}

/// Result of writing one slot.
#[derive(Clone, Debug)]
pub struct SlotUpdate {
    /// What the slot held before. `Empty` for a freshly inserted slot.
    pub previous: Slot,
    pub current: Slot,
}

impl SlotUpdate {
    pub fn changed(&self) -> bool {
        !self.previous.same_as(&self.current)
    }
}

struct WriteFrame {
    /// `None` for the implicit root.
    group: Option<usize>,
    key: Option<Key>,
    /// Distance from the end of the group buffer to the end of this subtree.
    /// Stays valid across every edit made inside the subtree.
    end_from_back: usize,
    slot_start: usize,
    own_len: usize,
    own_written: usize,
    declared: Option<usize>,
    nodes: usize,
    /// Children started so far. Only filled while debug logging is enabled.
    seen: HashSet<(Key, GroupKind)>,
}

impl WriteFrame {
    fn root() -> Self {
        Self {
            group: None,
            key: None,
            end_from_back: 0,
            slot_start: 0,
            own_len: 0,
            own_written: 0,
            declared: None,
            nodes: 0,
            seen: HashSet::default(),
        }
    }
}

pub struct SlotWriter<'a> {
    table: &'a SlotTable,
    state: RefMut<'a, TableState>,
    shadow: Option<TableState>,
    current: usize,
    current_slot: usize,
    frames: SmallVec<[WriteFrame; 16]>,
    report: CommitReport,
    finished: bool,
}

impl<'a> SlotWriter<'a> {
    pub(crate) fn new(table: &'a SlotTable, state: RefMut<'a, TableState>) -> Self {
        let mut frames = SmallVec::new();
        frames.push(WriteFrame::root());
        Self {
            table,
            state,
            shadow: None,
            current: 0,
            current_slot: 0,
            frames,
            report: CommitReport::default(),
            finished: false,
        }
    }

    fn ensure_shadow(&mut self) {
        if self.shadow.is_none() {
            trace!("writer snapshot taken before first edit");
            self.shadow = Some(self.state.clone());
        }
    }

    fn frame(&self) -> &WriteFrame {
        match self.frames.last() {
            Some(frame) => frame,
            None => unreachable!("writer lost its root frame"),
        }
    }

    fn frame_mut(&mut self) -> &mut WriteFrame {
        match self.frames.last_mut() {
            Some(frame) => frame,
            None => unreachable!("writer lost its root frame"),
        }
    }

    #[track_caller]
    fn open_group_frame(&self, operation: &str) -> &WriteFrame {
        let frame = self.frame();
        assert!(
            frame.group.is_some(),
            "{} called outside of any group",
            operation
        );
        frame
    }

    /// Logical end of the innermost open group.
    fn frame_end(&self) -> usize {
        self.state.groups.len() - self.frame().end_from_back
    }

    // ── cursor ──────────────────────────────────────────────────────────────

    /// Index of the group under the cursor.
    pub fn current_group(&self) -> usize {
        self.current
    }

    /// Index of the innermost open group, `None` at the root.
    pub fn parent(&self) -> Option<usize> {
        self.frame().group
    }

    /// True when no previous sibling is left under the cursor.
    pub fn is_group_end(&self) -> bool {
        self.current >= self.frame_end()
    }

    pub fn group_key_at_cursor(&self) -> Option<Key> {
        if self.is_group_end() {
            return None;
        }
        Some(self.state.groups[self.current].key)
    }

    /// Number of groups currently open.
    pub fn depth(&self) -> usize {
        self.frames.len() - 1
    }

    // ── groups ──────────────────────────────────────────────────────────────

    pub fn start_group(&mut self, key: impl Into<Key>) -> usize {
        self.start(key.into(), GroupKind::Call)
    }

    pub fn start_data(&mut self, key: impl Into<Key>) -> usize {
        self.start(key.into(), GroupKind::Data)
    }

    pub fn start_node(&mut self, key: impl Into<Key>) -> usize {
        self.start(key.into(), GroupKind::Node)
    }

    /// Opens a node group carrying `node`.
    ///
    /// The node is stored only when the group is inserted. A retained or moved
    /// group keeps the node it already has; use [`update_node`](Self::update_node)
    /// to replace it.
    pub fn start_node_with(&mut self, key: impl Into<Key>, node: impl Into<Slot>) -> usize {
        self.open(key.into(), GroupKind::Node, node.into())
    }

    /// Opens a data group carrying `aux`, stored on insertion like
    /// [`start_node_with`](Self::start_node_with).
    pub fn start_data_with(&mut self, key: impl Into<Key>, aux: impl Into<Slot>) -> usize {
        self.open(key.into(), GroupKind::Data, aux.into())
    }

    /// Opens a group and returns its index.
    ///
    /// Matching is positional among the remaining old siblings: the group under
    /// the cursor is kept if it has the same key and kind, otherwise the first
    /// later sibling that does is moved here, otherwise a new group is inserted.
    /// Siblings should have distinct keys; duplicates are paired up in order.
    pub fn start(&mut self, key: Key, kind: GroupKind) -> usize {
        self.open(key, kind, Slot::Empty)
    }

    fn open(&mut self, key: Key, kind: GroupKind, payload: Slot) -> usize {
        if log_enabled!(Level::Debug) && !self.frame_mut().seen.insert((key, kind)) {
            debug!(
                "duplicate sibling key {} ({:?}) under {:?}; matching the first remaining one",
                key,
                kind,
                self.frame().group
            );
        }

        let end = self.frame_end();
        if self.current < end {
            if self.state.groups[self.current].matches(key, kind) {
                self.report.retained += 1;
                return self.enter_existing();
            }
            if let Some((found, found_slot)) = self.find_sibling(key, kind, end) {
                self.move_subtree(found, found_slot);
                self.report.moved += 1;
                return self.enter_existing();
            }
        }
        self.insert_group(key, kind, payload)
    }

    /// First old sibling after the cursor matching `key`/`kind`, with the
    /// logical position of its slots.
    fn find_sibling(&self, key: Key, kind: GroupKind, end: usize) -> Option<(usize, usize)> {
        let groups = &self.state.groups;
        let mut probe = self.current;
        let mut slot_probe = self.current_slot;
        while probe < end {
            let group = &groups[probe];
            if group.matches(key, kind) {
                return Some((probe, slot_probe));
            }
            slot_probe += group.subtree_slots;
            probe += group.size;
        }
        None
    }

    /// Relocates the subtree at `from` (slots at `slot_from`) to the cursor.
    fn move_subtree(&mut self, from: usize, slot_from: usize) {
        self.ensure_shadow();
        let current = self.current;
        let current_slot = self.current_slot;
        let state = &mut *self.state;
        let (size, slot_len) = {
            let group = &state.groups[from];
            (group.size, group.subtree_slots)
        };
        let moved = state.groups.remove_range(from, from + size);
        state.groups.insert(current, moved);
        let moved_slots = state.slots.remove_range(slot_from, slot_from + slot_len);
        state.slots.insert(current_slot, moved_slots);
        state.anchors.mark_dirty();
        trace!(
            "moved {} groups / {} slots from {} to {}",
            size,
            slot_len,
            from,
            current
        );
    }

    fn insert_group(&mut self, key: Key, kind: GroupKind, payload: Slot) -> usize {
        self.ensure_shadow();
        let anchor = self.state.anchors.allocate();
        let current = self.current;
        let group = Group {
            payload,
            ..Group::new(key, kind, anchor)
        };
        self.state.groups.insert_one(current, group);
        self.report.inserted += 1;
        self.enter_existing()
    }

    /// Pushes a frame for the group under the cursor and steps into it.
    fn enter_existing(&mut self) -> usize {
        let index = self.current;
        let group = &self.state.groups[index];
        let key = group.key;
        let own = group.slot_count;
        let end_from_back = self.state.groups.len() - (index + group.size);
        self.frames.push(WriteFrame {
            group: Some(index),
            key: Some(key),
            end_from_back,
            slot_start: self.current_slot,
            own_len: own,
            own_written: 0,
            declared: None,
            nodes: 0,
            seen: HashSet::default(),
        });
        self.current_slot += own;
        self.current += 1;
        index
    }

    /// Closes the innermost group.
    ///
    /// Old children that were not matched and own slots that were not visited
    /// are removed. Returns the number of nodes the group contributes to its
    /// parent.
    #[track_caller]
    pub fn end_group(&mut self) -> usize {
        assert!(
            self.frames.len() > 1,
            "end_group() without a matching start_group()"
        );
        let end = self.frame_end();
        if self.current < end {
            self.remove_range(self.current, end);
        }

        let frame = match self.frames.pop() {
            Some(frame) => frame,
            None => unreachable!("frame count checked above"),
        };
        if frame.own_written < frame.own_len {
            self.ensure_shadow();
            let start = frame.slot_start + frame.own_written;
            let stop = frame.slot_start + frame.own_len;
            let trimmed = self.state.slots.remove_range(start, stop);
            self.report
                .released_slots
                .extend(trimmed.into_iter().filter_map(Slot::into_value));
            self.current_slot -= stop - start;
        }

        let index = match frame.group {
            Some(index) => index,
            None => unreachable!("root frame is never popped"),
        };
        let size = self.current - index;
        let subtree_slots = self.current_slot - frame.slot_start;
        let unchanged = {
            let group = &self.state.groups[index];
            group.size == size
                && group.node_count == frame.nodes
                && group.slot_count == frame.own_written
                && group.subtree_slots == subtree_slots
        };
        if !unchanged {
            self.ensure_shadow();
            let group = &mut self.state.groups[index];
            group.size = size;
            group.node_count = frame.nodes;
            group.slot_count = frame.own_written;
            group.subtree_slots = subtree_slots;
        }

        let contribution = self.state.groups[index].node_contribution();
        self.frame_mut().nodes += contribution;
        contribution
    }

    /// Keeps the group under the cursor and its whole subtree untouched.
    ///
    /// Returns the number of nodes the group contributes.
    #[track_caller]
    pub fn skip_group(&mut self) -> usize {
        assert!(!self.is_group_end(), "skip_group() at the end of a group");
        let group = &self.state.groups[self.current];
        let (size, slots, nodes) = (group.size, group.subtree_slots, group.node_contribution());
        let key = group.key;
        let kind = group.kind;
        self.current += size;
        self.current_slot += slots;
        self.report.retained += size;
        let frame = self.frame_mut();
        frame.nodes += nodes;
        if log_enabled!(Level::Debug) {
            frame.seen.insert((key, kind));
        }
        nodes
    }

    /// Keeps every remaining old child of the innermost group.
    pub fn skip_to_group_end(&mut self) {
        while !self.is_group_end() {
            self.skip_group();
        }
    }

    /// Removes the group under the cursor together with its subtree.
    ///
    /// Returns the number of groups removed.
    #[track_caller]
    pub fn remove_group(&mut self) -> usize {
        assert!(!self.is_group_end(), "remove_group() at the end of a group");
        let size = self.state.groups[self.current].size;
        self.remove_range(self.current, self.current + size);
        size
    }

    /// Brings the `offset`-th sibling after the cursor to the cursor without
    /// entering it.
    #[track_caller]
    pub fn move_group(&mut self, offset: usize) {
        let end = self.frame_end();
        let mut probe = self.current;
        let mut slot_probe = self.current_slot;
        for _ in 0..offset {
            assert!(probe < end, "move_group({}) past the end of the group", offset);
            let group = &self.state.groups[probe];
            slot_probe += group.subtree_slots;
            probe += group.size;
        }
        assert!(probe < end, "move_group({}) past the end of the group", offset);
        if offset > 0 {
            self.move_subtree(probe, slot_probe);
            self.report.moved += 1;
        }
    }

    /// Removes the sibling run `start..end`, whose slots begin at the slot
    /// cursor, and records it for disposal.
    fn remove_range(&mut self, start: usize, end: usize) {
        debug_assert_eq!(start, self.current, "removal must start at the cursor");
        self.ensure_shadow();
        let slot_len: usize = {
            let groups = &self.state.groups;
            let mut probe = start;
            let mut slots = 0;
            while probe < end {
                slots += groups[probe].subtree_slots;
                probe += groups[probe].size;
            }
            slots
        };
        let state = &mut *self.state;
        let removed = state.groups.remove_range(start, end);
        let slots = state
            .slots
            .remove_range(self.current_slot, self.current_slot + slot_len);
        state.anchors.mark_dirty();

        let mut slots = slots.into_iter();
        for group in removed {
            state.anchors.release(group.anchor);
            self.report.removed_groups.push(RemovedGroup {
                key: group.key,
                kind: group.kind,
                anchor: group.anchor,
                payload: group.payload,
                slots: slots.by_ref().take(group.slot_count).collect(),
            });
        }
        debug_assert!(slots.next().is_none(), "removed slots outlived their groups");
        trace!("removed groups {}..{} ({} slots)", start, end, slot_len);
    }

    // ── slots ───────────────────────────────────────────────────────────────

    /// Limits the innermost group to `count` own slots.
    #[track_caller]
    pub fn declare_slots(&mut self, count: usize) {
        self.open_group_frame("declare_slots()");
        let frame = self.frame_mut();
        assert!(
            frame.own_written <= count,
            "declare_slots({}) after {} slots were already written",
            count,
            frame.own_written
        );
        frame.declared = Some(count);
    }

    /// Writes the next own slot of the innermost group.
    ///
    /// Overwriting a different value reports the old one as released and the
    /// pair as a [`SlotChange`]. Whether the change matters is up to the caller.
    #[track_caller]
    pub fn record_slot(&mut self, value: impl Into<Slot>) -> SlotUpdate {
        let value = value.into();
        let frame = self.open_group_frame("record_slot()");
        if let Some(limit) = frame.declared {
            assert!(
                frame.own_written < limit,
                "slot overrun: group {:?} declared {} slots",
                frame.key,
                limit
            );
        }
        let written = frame.own_written;
        let position = frame.slot_start + written;
        let group = frame.group;

        if written < frame.own_len {
            if self.state.slots[position].same_as(&value) {
                self.frame_mut().own_written += 1;
                return SlotUpdate {
                    previous: value.clone(),
                    current: value,
                };
            }
            self.ensure_shadow();
            let previous = self.state.slots.set(position, value.clone());
            self.frame_mut().own_written += 1;
            self.note_overwrite(group, written, &previous, &value);
            SlotUpdate {
                previous,
                current: value,
            }
        } else {
            self.ensure_shadow();
            self.state.slots.insert_one(position, value.clone());
            let frame = self.frame_mut();
            frame.own_len += 1;
            frame.own_written += 1;
            self.current_slot += 1;
            SlotUpdate {
                previous: Slot::Empty,
                current: value,
            }
        }
    }

    /// Records a retained slot whose value is not identical to the old one.
    fn note_overwrite(
        &mut self,
        group: Option<usize>,
        index: usize,
        previous: &Slot,
        current: &Slot,
    ) {
        if let Slot::Value(old) = previous {
            self.report.released_slots.push(old.clone());
        }
        let anchor = group
            .map(|group| self.state.groups[group].anchor)
            .unwrap_or(AnchorId::INVALID);
        self.report.changed_slots.push(SlotChange {
            anchor,
            index,
            previous: previous.clone(),
            current: current.clone(),
        });
    }

    /// The value the next [`record_slot`](Self::record_slot) would overwrite.
    pub fn peek_slot(&self) -> Slot {
        let frame = self.frame();
        if frame.group.is_some() && frame.own_written < frame.own_len {
            self.state.slots[frame.slot_start + frame.own_written].clone()
        } else {
            Slot::Empty
        }
    }

    /// Keeps the next own slot as it is. Past the old slots this appends an
    /// empty slot.
    #[track_caller]
    pub fn skip_slot(&mut self) -> Slot {
        let frame = self.open_group_frame("skip_slot()");
        if frame.own_written < frame.own_len
            && frame.declared.map_or(true, |limit| frame.own_written < limit)
        {
            let slot = self.state.slots[frame.slot_start + frame.own_written].clone();
            self.frame_mut().own_written += 1;
            slot
        } else {
            self.record_slot(Slot::Empty).current
        }
    }

    /// Returns the remembered `T` in the next slot, or stores `init()` there.
    #[track_caller]
    pub fn remember<T: 'static>(&mut self, init: impl FnOnce() -> T) -> Rc<T> {
        if let Some(existing) = self.peek_slot().downcast_rc::<T>() {
            self.skip_slot();
            return existing;
        }
        let value = Rc::new(init());
        self.record_slot(SlotValue::from_rc(Rc::clone(&value)));
        value
    }

    /// Replaces an own slot of the innermost group that was already visited.
    #[track_caller]
    pub fn set_slot(&mut self, index: usize, value: impl Into<Slot>) -> Slot {
        let value = value.into();
        let frame = self.open_group_frame("set_slot()");
        assert!(
            index < frame.own_written,
            "set_slot({}) out of range: {} slots visited",
            index,
            frame.own_written
        );
        let position = frame.slot_start + index;
        let group = frame.group;
        if self.state.slots[position].same_as(&value) {
            return value;
        }
        self.ensure_shadow();
        let previous = self.state.slots.set(position, value.clone());
        self.note_overwrite(group, index, &previous, &value);
        previous
    }

    // ── payloads ────────────────────────────────────────────────────────────

    /// Replaces the node of the innermost open group, which must be a node
    /// group. Returns the previous node.
    #[track_caller]
    pub fn update_node(&mut self, node: impl Into<Slot>) -> Slot {
        let index = self.payload_owner("update_node()");
        let kind = self.state.groups[index].kind;
        assert!(
            kind == GroupKind::Node,
            "update_node() on a {:?} group",
            kind
        );
        self.replace_payload(index, node.into())
    }

    /// Replaces the aux value of the innermost open group, which must not be a
    /// node group. Returns the previous value.
    #[track_caller]
    pub fn update_aux(&mut self, aux: impl Into<Slot>) -> Slot {
        let index = self.payload_owner("update_aux()");
        assert!(
            self.state.groups[index].kind != GroupKind::Node,
            "update_aux() on a node group, use update_node()"
        );
        self.replace_payload(index, aux.into())
    }

    /// Node or aux value of the innermost open group.
    #[track_caller]
    pub fn payload(&self) -> Slot {
        let index = self.payload_owner("payload()");
        self.state.groups[index].payload.clone()
    }

    #[track_caller]
    fn payload_owner(&self, operation: &str) -> usize {
        self.open_group_frame(operation).group.unwrap_or_default()
    }

    fn replace_payload(&mut self, index: usize, value: Slot) -> Slot {
        if self.state.groups[index].payload.same_as(&value) {
            return value;
        }
        self.ensure_shadow();
        let previous = std::mem::replace(&mut self.state.groups[index].payload, value);
        if let Slot::Value(old) = &previous {
            self.report.released_slots.push(old.clone());
        }
        previous
    }

    // ── anchors ─────────────────────────────────────────────────────────────

    /// Anchor of the group at `index`.
    #[track_caller]
    pub fn anchor_at(&self, index: usize) -> AnchorId {
        self.state.groups[index].anchor
    }

    /// Anchor of the innermost open group.
    #[track_caller]
    pub fn group_anchor(&self) -> AnchorId {
        let frame = self.open_group_frame("group_anchor()");
        let index = frame.group.unwrap_or_default();
        self.state.groups[index].anchor
    }

    /// Current position of the group behind `anchor`.
    pub fn anchor_index(&mut self, anchor: AnchorId) -> Option<usize> {
        if self.state.anchors.is_dirty() {
            self.state.rebuild_anchors();
        }
        self.state.anchors.resolve(anchor)
    }

    // ── lifecycle ───────────────────────────────────────────────────────────

    /// Publishes the new table.
    ///
    /// Old top-level groups that were not matched are removed first.
    #[track_caller]
    pub fn commit(mut self) -> CommitReport {
        assert!(
            self.frames.len() == 1,
            "commit() with {} group(s) still open",
            self.frames.len() - 1
        );
        let end = self.frame_end();
        if self.current < end {
            self.remove_range(self.current, end);
        }
        self.state.rebuild_index();

        #[cfg(feature = "verify-commit")]
        {
            if let Err(err) = self.state.verify() {
                panic!("slot table malformed after commit: {err}");
            }
        }

        self.finished = true;
        self.shadow = None;
        let report = std::mem::take(&mut self.report);
        debug!(
            "writer committed: {} inserted, {} retained, {} moved, {} removed",
            report.inserted,
            report.retained,
            report.moved,
            report.removed()
        );
        report
    }

    /// Drops every edit of this session.
    pub fn abandon(self) {
        drop(self);
    }
}

impl Drop for SlotWriter<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Some(shadow) = self.shadow.take() {
                *self.state = shadow;
            }
            debug!(
                "writer abandoned; table restored to {} groups",
                self.state.groups.len()
            );
        }
        self.table.close_writer();
    }
}

impl fmt::Debug for SlotWriter<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotWriter")
            .field("current", &self.current)
            .field("current_slot", &self.current_slot)
            .field("depth", &self.depth())
            .field("size", &self.state.groups.len())
            .field("gap", &(self.state.groups.gap_start(), self.state.groups.gap_len()))
            .finish()
    }
}
