//! Testing utilities and harness for the Cranpose slot table

pub mod inspect;
pub mod tree;

pub use inspect::{assert_table_matches, GroupShape, TableShape};
pub use tree::{call, compose, data, emit, node, SlotSpec, TreeNode};

/// Routes `log` output of the slot table through the test harness.
///
/// Safe to call from every test; only the first call installs the logger.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub mod prelude {
    pub use crate::inspect::*;
    pub use crate::tree::*;
    pub use crate::init_logging;
}

#[cfg(test)]
#[path = "tests/harness_tests.rs"]
mod harness_tests;
