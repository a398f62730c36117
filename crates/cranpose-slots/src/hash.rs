//! Hasher selection for key disambiguators.

use std::hash::{Hash, Hasher};

#[cfg(feature = "std-hash")]
pub mod default {
    pub use std::collections::hash_map::DefaultHasher as KeyHasher;

    #[inline]
    pub fn new() -> KeyHasher {
        KeyHasher::new()
    }
}

#[cfg(not(feature = "std-hash"))]
pub mod default {
    // ahash with its fixed default seeds so keys are stable within a process
    pub use ahash::AHasher as KeyHasher;

    #[inline]
    pub fn new() -> KeyHasher {
        KeyHasher::default()
    }
}

/// Hash an arbitrary disambiguator into the 64-bit data half of a key.
pub fn hash_value<T: Hash + ?Sized>(value: &T) -> u64 {
    let mut hasher = default::new();
    value.hash(&mut hasher);
    hasher.finish()
}
