//! Anchor bookkeeping.
//!
//! Each group owns one [`AnchorId`]. The table maps anchor indices to the
//! current logical position of their group. Positions are not patched on every
//! edit; a writer marks the table dirty and the map is rebuilt with a single
//! scan when the session commits (or when the writer resolves an anchor).

use crate::AnchorId;

const INVALID_POS: usize = usize::MAX;

#[derive(Clone, Copy, Debug)]
struct AnchorEntry {
    generation: u32,
    position: usize,
    live: bool,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct AnchorTable {
    entries: Vec<AnchorEntry>, // index 0 is reserved for AnchorId::INVALID
    free: Vec<u32>,
    dirty: bool,
}

impl AnchorTable {
    pub(crate) fn allocate(&mut self) -> AnchorId {
        if self.entries.is_empty() {
            self.entries.push(AnchorEntry {
                generation: 0,
                position: INVALID_POS,
                live: false,
            });
        }
        self.dirty = true;
        if let Some(index) = self.free.pop() {
            let entry = &mut self.entries[index as usize];
            entry.live = true;
            entry.position = INVALID_POS;
            return AnchorId::new(index, entry.generation);
        }
        let index = u32::try_from(self.entries.len()).unwrap_or_else(|_| {
            panic!("anchor space exhausted ({} anchors)", self.entries.len())
        });
        self.entries.push(AnchorEntry {
            generation: 1,
            position: INVALID_POS,
            live: true,
        });
        AnchorId::new(index, 1)
    }

    /// Invalidates `anchor` and recycles its index under a new generation.
    pub(crate) fn release(&mut self, anchor: AnchorId) {
        if !self.is_live(anchor) {
            return;
        }
        let entry = &mut self.entries[anchor.index()];
        entry.live = false;
        entry.position = INVALID_POS;
        entry.generation = entry.generation.wrapping_add(1).max(1);
        self.free.push(anchor.index() as u32);
    }

    pub(crate) fn is_live(&self, anchor: AnchorId) -> bool {
        anchor.is_valid()
            && self
                .entries
                .get(anchor.index())
                .is_some_and(|entry| entry.live && entry.generation == anchor.generation())
    }

    pub(crate) fn resolve(&self, anchor: AnchorId) -> Option<usize> {
        if !self.is_live(anchor) {
            return None;
        }
        let position = self.entries[anchor.index()].position;
        (position != INVALID_POS).then_some(position)
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub(crate) fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Re-records the position of every live anchor from a pre-order scan.
    pub(crate) fn rebuild(&mut self, positions: impl Iterator<Item = (usize, AnchorId)>) {
        for entry in &mut self.entries {
            entry.position = INVALID_POS;
        }
        for (position, anchor) in positions {
            if let Some(entry) = self.entries.get_mut(anchor.index()) {
                debug_assert!(entry.live, "group holds released anchor {:?}", anchor);
                entry.position = position;
            }
        }
        self.dirty = false;
    }

    pub(crate) fn live_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.live).count()
    }
}
