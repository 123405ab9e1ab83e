//! LRU Policy Module
//!
//! Least Recently Used ordering over a single arena-backed list.

use std::collections::HashMap;
use std::hash::Hash;

use crate::cache::arena::{ListLinks, NodeArena, SlotId};
use crate::cache::EvictionPolicy;

// == LRU Policy ==
/// Tracks access order for LRU eviction.
///
/// - Head = most recently used
/// - Tail = least recently used, the next victim
///
/// Touch, insert, remove and eviction are all O(1).
#[derive(Debug)]
pub struct LruPolicy<K> {
    arena: NodeArena<K>,
    index: HashMap<K, SlotId>,
    order: ListLinks,
}

impl<K> LruPolicy<K>
where
    K: Hash + Eq + Clone,
{
    // == Constructor ==
    /// Creates a new empty LRU policy.
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            index: HashMap::new(),
            order: ListLinks::new(),
        }
    }

    // == Peek Oldest ==
    /// Returns the least recently used key without removing it.
    pub fn peek_oldest(&self) -> Option<&K> {
        self.order.tail().and_then(|id| self.arena.key(id))
    }
}

impl<K> Default for LruPolicy<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LruPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "lru"
    }

    fn insert(&mut self, key: K, frequency: u64) {
        self.remove(&key);
        let id = self.arena.insert(key.clone(), frequency.max(1));
        self.arena.push_front(&mut self.order, id);
        self.index.insert(key, id);
    }

    // == Touch ==
    /// Marks a key as recently used (moves to head).
    fn touch(&mut self, key: &K) -> bool {
        let Some(&id) = self.index.get(key) else {
            return false;
        };
        let freq = self.arena.freq(id).unwrap_or(0);
        self.arena.set_freq(id, freq.saturating_add(1));
        self.arena.move_to_front(&mut self.order, id)
    }

    fn remove(&mut self, key: &K) -> Option<u64> {
        let id = self.index.remove(key)?;
        self.arena.unlink(&mut self.order, id);
        self.arena.remove(id).map(|(_, freq)| freq)
    }

    // == Evict Oldest ==
    fn pop_victim(&mut self) -> Option<K> {
        let id = self.order.tail()?;
        self.arena.unlink(&mut self.order, id);
        let (key, _) = self.arena.remove(id)?;
        self.index.remove(&key);
        Some(key)
    }

    fn peek_victim(&self) -> Option<&K> {
        self.peek_oldest()
    }

    fn frequency(&self, key: &K) -> Option<u64> {
        self.index.get(key).and_then(|&id| self.arena.freq(id))
    }

    fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    fn len(&self) -> usize {
        self.index.len()
    }

    fn clear(&mut self) {
        self.arena.clear();
        self.index.clear();
        self.order = ListLinks::new();
    }

    fn eviction_order(&self) -> Vec<K> {
        let mut keys: Vec<K> = self
            .arena
            .iter_list(&self.order)
            .map(|(_, key)| key.clone())
            .collect();
        keys.reverse();
        keys
    }
}
