#![doc = r"Gap-buffer slot table with keyed group diffing for the Cranpose runtime."]

mod anchor;
pub mod collections;
mod error;
pub mod gap_buffer;
mod group;
pub mod hash;
mod reader;
mod slot;
mod slot_table;
mod writer;

pub use error::SlotTableError;
pub use gap_buffer::GapBuffer;
pub use group::{GroupInfo, GroupKind};
pub use reader::{Children, KeyInfo, SlotReader};
pub use slot::{Slot, SlotValue};
pub use slot_table::SlotTable;
pub use writer::{CommitReport, RemovedGroup, SlotChange, SlotUpdate, SlotWriter};

use std::fmt;
use std::hash::Hash;
use std::panic::Location;

/// Identity of a group among its siblings.
///
/// A key is the hash of the call site that produced the group plus an optional
/// disambiguator supplied by the caller (for example the id of a list item).
/// Keys only need to be unique among siblings; when two siblings share a key
/// they are matched in positional order.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key {
    source: u64,
    data: Option<u64>,
}

impl Key {
    pub const fn new(source: u64) -> Self {
        Self { source, data: None }
    }

    /// Key for `source` disambiguated by an arbitrary hashable value.
    pub fn with_data<T: Hash + ?Sized>(source: u64, data: &T) -> Self {
        Self {
            source,
            data: Some(hash::hash_value(data)),
        }
    }

    /// Key derived from the location of the caller.
    ///
    /// Every distinct call site yields a distinct key, which is how groups are
    /// identified when no explicit key is available.
    #[track_caller]
    pub fn caller() -> Self {
        let location = Location::caller();
        location_key(location.file(), location.line(), location.column())
    }

    /// Returns this key with `data` mixed in as its disambiguator.
    pub fn and_data<T: Hash + ?Sized>(self, data: &T) -> Self {
        Self::with_data(self.source, data)
    }

    pub fn source(&self) -> u64 {
        self.source
    }

    pub fn data(&self) -> Option<u64> {
        self.data
    }
}

impl From<u64> for Key {
    fn from(source: u64) -> Self {
        Key::new(source)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.data {
            Some(data) => write!(f, "{:#x}/{:#x}", self.source, data),
            None => write!(f, "{:#x}", self.source),
        }
    }
}

/// Key for a source position.
pub fn location_key(file: &str, line: u32, column: u32) -> Key {
    let base = hash::hash_value(file);
    Key::new(
        base.wrapping_mul(0x9E37_79B9_7F4A_7C15) // cheap mix
            ^ ((line as u64) << 32)
            ^ (column as u64),
    )
}

/// Stable reference to a group.
///
/// Anchors follow their group through inserts, removals and moves anywhere in
/// the table. Once the group is removed the anchor goes stale and resolves to
/// nothing, even if its index is later recycled for another group.
#[derive(Copy, Clone, Debug, Hash, Eq, PartialEq, Default)]
pub struct AnchorId {
    index: u32,
    generation: u32,
}

impl AnchorId {
    /// Invalid anchor that represents no anchor.
    pub const INVALID: AnchorId = AnchorId {
        index: 0,
        generation: 0,
    };

    pub(crate) fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    pub(crate) fn index(&self) -> usize {
        self.index as usize
    }

    pub(crate) fn generation(&self) -> u32 {
        self.generation
    }

    /// Check if this anchor is valid (non-zero).
    pub fn is_valid(&self) -> bool {
        self.index != 0
    }
}

#[cfg(test)]
#[path = "tests/gap_buffer_tests.rs"]
mod gap_buffer_tests;

#[cfg(test)]
#[path = "tests/writer_tests.rs"]
mod writer_tests;

#[cfg(test)]
#[path = "tests/reader_tests.rs"]
mod reader_tests;

#[cfg(test)]
#[path = "tests/slot_table_tests.rs"]
mod slot_table_tests;
