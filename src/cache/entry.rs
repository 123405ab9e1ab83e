//! Cache Entry Module
//!
//! Defines stored entries and the payload contract keys and values must meet.

// == Cache Payload ==
/// Contract shared by cache keys and values.
///
/// `is_blank` identifies the empty sentinel that `put` rejects, and
/// `text_len` feeds the fallback size heuristic.
pub trait CachePayload {
    /// Returns true for the empty sentinel value.
    fn is_blank(&self) -> bool;

    /// Length of the payload's textual form, in characters or bytes.
    fn text_len(&self) -> usize;
}

impl CachePayload for String {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn text_len(&self) -> usize {
        self.chars().count()
    }
}

impl CachePayload for Vec<u8> {
    fn is_blank(&self) -> bool {
        self.is_empty()
    }

    fn text_len(&self) -> usize {
        self.len()
    }
}

// == Cache Entry ==
/// A live value together with its estimated cost.
///
/// Access frequency and recency live in the eviction policy, not here.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    /// The stored value
    pub value: V,
    /// Estimated size in bytes, fixed at insertion time
    pub size_bytes: u64,
}

impl<V> CacheEntry<V> {
    // == Constructor ==
    /// Creates a new cache entry with a precomputed size.
    pub fn new(value: V, size_bytes: u64) -> Self {
        Self { value, size_bytes }
    }

    // == Replace ==
    /// Swaps in a new value and size, returning the previous value.
    pub fn replace(&mut self, value: V, size_bytes: u64) -> V {
        self.size_bytes = size_bytes;
        std::mem::replace(&mut self.value, value)
    }
}
