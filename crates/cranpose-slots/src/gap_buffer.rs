//! Gap buffer used for both the group and the slot storage of the table.
//!
//! Elements live in one `Vec` with an unused region (the gap) that sits at the
//! most recent edit position. Inserting or removing at the gap is O(1) per
//! element; editing somewhere else first relocates the gap, which costs time
//! proportional to the distance travelled.
//!
//! ```text
//!   logical:   a b c d e
//!   physical:  a b [_ _ _] c d e
//!                  ^gap_start
//! ```
//!
//! Gap cells hold `None`, so a removed element is moved out of the buffer
//! immediately and never kept alive by the gap.

use log::trace;
use std::fmt;
use std::ops::{Index, IndexMut};

/// Minimum number of cells added when the gap has to grow.
pub const MIN_GROWTH: usize = 32;

#[derive(Clone)]
pub struct GapBuffer<T> {
    buf: Vec<Option<T>>,
    gap_start: usize,
    gap_len: usize,
}

impl<T> Default for GapBuffer<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> GapBuffer<T> {
    pub fn new() -> Self {
        Self {
            buf: Vec::new(),
            gap_start: 0,
            gap_len: 0,
        }
    }

    /// Creates a buffer whose gap already spans `capacity` cells.
    pub fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        buf.resize_with(capacity, || None);
        Self {
            buf,
            gap_start: 0,
            gap_len: capacity,
        }
    }

    /// Number of live elements.
    pub fn len(&self) -> usize {
        self.buf.len() - self.gap_len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total number of cells, live elements plus gap.
    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn gap_start(&self) -> usize {
        self.gap_start
    }

    pub fn gap_len(&self) -> usize {
        self.gap_len
    }

    #[inline]
    fn physical(&self, index: usize) -> usize {
        if index < self.gap_start {
            index
        } else {
            index + self.gap_len
        }
    }

    #[track_caller]
    fn check_position(&self, index: usize) {
        let len = self.len();
        assert!(
            index <= len,
            "gap buffer position {} out of range (len {})",
            index,
            len
        );
    }

    #[track_caller]
    fn check_index(&self, index: usize) {
        let len = self.len();
        assert!(
            index < len,
            "gap buffer index {} out of range (len {})",
            index,
            len
        );
    }

    /// Relocates the gap so that it starts at logical position `index`.
    ///
    /// Only the elements between the old and the new gap position are moved,
    /// and their relative order is preserved.
    #[track_caller]
    pub fn move_gap_to(&mut self, index: usize) {
        self.check_position(index);
        if index == self.gap_start {
            return;
        }
        if self.gap_len > 0 {
            let gap_len = self.gap_len;
            if index < self.gap_start {
                for i in (index..self.gap_start).rev() {
                    self.buf.swap(i, i + gap_len);
                }
            } else {
                let gap_end = self.gap_start + gap_len;
                for i in gap_end..index + gap_len {
                    self.buf.swap(i, i - gap_len);
                }
            }
            trace!(
                "gap moved {} -> {} ({} cells)",
                self.gap_start,
                index,
                self.gap_start.abs_diff(index)
            );
        }
        self.gap_start = index;
    }

    /// Enlarges the gap so that at least `required` more elements fit.
    ///
    /// Capacity doubles, but never grows by less than [`MIN_GROWTH`] cells.
    fn grow(&mut self, required: usize) {
        let old_capacity = self.buf.len();
        let new_capacity = old_capacity
            .saturating_mul(2)
            .max(self.len() + required)
            .max(MIN_GROWTH);
        let extra = new_capacity - old_capacity;
        let gap_end = self.gap_start + self.gap_len;
        self.buf.reserve_exact(extra);
        self.buf
            .splice(gap_end..gap_end, std::iter::repeat_with(|| None).take(extra));
        self.gap_len += extra;
        trace!("gap buffer grew {} -> {}", old_capacity, new_capacity);
    }

    /// Inserts `values` so that the first of them ends up at `index`.
    #[track_caller]
    pub fn insert<I>(&mut self, index: usize, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        self.check_position(index);
        let values = values.into_iter();
        let (expected, _) = values.size_hint();
        self.move_gap_to(index);
        if self.gap_len < expected {
            self.grow(expected - self.gap_len);
        }
        for value in values {
            if self.gap_len == 0 {
                self.grow(1);
            }
            self.buf[self.gap_start] = Some(value);
            self.gap_start += 1;
            self.gap_len -= 1;
        }
    }

    #[track_caller]
    pub fn insert_one(&mut self, index: usize, value: T) {
        self.insert(index, std::iter::once(value));
    }

    /// Removes the logical range `start..end` and hands the elements back in order.
    ///
    /// The removed cells are absorbed into the gap.
    #[track_caller]
    pub fn remove_range(&mut self, start: usize, end: usize) -> Vec<T> {
        let len = self.len();
        assert!(
            start <= end && end <= len,
            "gap buffer range {}..{} out of range (len {})",
            start,
            end,
            len
        );
        if start == end {
            return Vec::new();
        }
        self.move_gap_to(end);
        let removed: Vec<T> = self.buf[start..end]
            .iter_mut()
            .filter_map(Option::take)
            .collect();
        debug_assert_eq!(removed.len(), end - start, "live cell was empty");
        self.gap_start = start;
        self.gap_len += end - start;
        removed
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        if index >= self.len() {
            return None;
        }
        self.buf[self.physical(index)].as_ref()
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        if index >= self.len() {
            return None;
        }
        let physical = self.physical(index);
        self.buf[physical].as_mut()
    }

    /// Replaces the element at `index`, returning the previous one.
    #[track_caller]
    pub fn set(&mut self, index: usize, value: T) -> T {
        self.check_index(index);
        std::mem::replace(&mut self[index], value)
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let gap_end = self.gap_start + self.gap_len;
        self.buf[..self.gap_start]
            .iter()
            .chain(self.buf[gap_end..].iter())
            .filter_map(Option::as_ref)
    }

    /// Iterates the logical range `start..end`.
    #[track_caller]
    pub fn range(&self, start: usize, end: usize) -> impl Iterator<Item = &T> + '_ {
        let len = self.len();
        assert!(
            start <= end && end <= len,
            "gap buffer range {}..{} out of range (len {})",
            start,
            end,
            len
        );
        (start..end).map(move |index| &self[index])
    }

    /// Drops every element and releases the gap.
    pub fn clear(&mut self) {
        self.buf.clear();
        self.gap_start = 0;
        self.gap_len = 0;
    }
}

impl<T: Clone> GapBuffer<T> {
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }
}

impl<T> FromIterator<T> for GapBuffer<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut buffer = GapBuffer::new();
        buffer.insert(0, iter);
        buffer
    }
}

impl<T> Index<usize> for GapBuffer<T> {
    type Output = T;

    #[track_caller]
    fn index(&self, index: usize) -> &T {
        self.check_index(index);
        match &self.buf[self.physical(index)] {
            Some(value) => value,
            None => unreachable!("live index {} mapped into the gap", index),
        }
    }
}

impl<T> IndexMut<usize> for GapBuffer<T> {
    #[track_caller]
    fn index_mut(&mut self, index: usize) -> &mut T {
        self.check_index(index);
        let physical = self.physical(index);
        match &mut self.buf[physical] {
            Some(value) => value,
            None => unreachable!("live index {} mapped into the gap", index),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for GapBuffer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
