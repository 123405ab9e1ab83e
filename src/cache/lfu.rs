//! LFU Policy Module
//!
//! Least Frequently Used ordering with recency as the tie-break.
//!
//! Keys are grouped into frequency buckets. Each bucket is a list threaded
//! through one shared arena, head = most recently used at that frequency.
//! Buckets live in a `BTreeMap`, so the next non-empty frequency above a
//! vanished minimum is a forward range lookup even when frequencies are
//! sparse.

use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::ops::Bound::{Excluded, Unbounded};

use crate::cache::arena::{ListLinks, NodeArena, SlotId};
use crate::cache::EvictionPolicy;

// == LFU Policy ==
/// Frequency-bucketed LFU tracker.
///
/// The victim is the tail of the minimum-frequency bucket.
#[derive(Debug)]
pub struct LfuPolicy<K> {
    arena: NodeArena<K>,
    index: HashMap<K, SlotId>,
    buckets: BTreeMap<u64, ListLinks>,
    min_freq: Option<u64>,
}

impl<K> LfuPolicy<K>
where
    K: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            arena: NodeArena::new(),
            index: HashMap::new(),
            buckets: BTreeMap::new(),
            min_freq: None,
        }
    }

    /// Links `id` at the head of the bucket for `freq`, creating it if needed.
    fn link(&mut self, id: SlotId, freq: u64) {
        let bucket = self.buckets.entry(freq).or_default();
        self.arena.push_front(bucket, id);
    }

    /// Unlinks `id` from the bucket for `freq`, dropping the bucket when it
    /// empties. Returns true if the bucket was dropped.
    fn unlink(&mut self, id: SlotId, freq: u64) -> bool {
        let Some(bucket) = self.buckets.get_mut(&freq) else {
            return false;
        };
        self.arena.unlink(bucket, id);
        if bucket.is_empty() {
            self.buckets.remove(&freq);
            true
        } else {
            false
        }
    }

    /// Moves the minimum forward after the bucket for `freq` vanished.
    fn advance_min_past(&mut self, freq: u64) {
        if self.min_freq == Some(freq) {
            self.min_freq = self
                .buckets
                .range((Excluded(freq), Unbounded))
                .next()
                .map(|(&f, _)| f);
        }
    }

    /// Full structural check. Used by tests.
    pub fn validate(&self) -> Result<(), String> {
        let mut seen = 0usize;
        for (&freq, bucket) in &self.buckets {
            if bucket.is_empty() {
                return Err(format!("empty bucket left at frequency {}", freq));
            }
            let mut count = 0usize;
            for (id, key) in self.arena.iter_list(bucket) {
                count += 1;
                if self.arena.freq(id) != Some(freq) {
                    return Err(format!("node in bucket {} has another frequency", freq));
                }
                if self.index.get(key) != Some(&id) {
                    return Err("bucket node missing from index".to_string());
                }
            }
            if count != bucket.len() {
                return Err(format!("bucket {} length mismatch", freq));
            }
            seen += count;
        }
        if seen != self.index.len() || seen != self.arena.len() {
            return Err(format!(
                "{} bucketed nodes, {} indexed, {} allocated",
                seen,
                self.index.len(),
                self.arena.len()
            ));
        }
        let smallest = self.buckets.keys().next().copied();
        if smallest != self.min_freq {
            return Err(format!(
                "tracked minimum {:?} but smallest bucket {:?}",
                self.min_freq, smallest
            ));
        }
        Ok(())
    }
}

impl<K> Default for LfuPolicy<K>
where
    K: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K> EvictionPolicy<K> for LfuPolicy<K>
where
    K: Hash + Eq + Clone + Send,
{
    fn name(&self) -> &'static str {
        "lfu"
    }

    fn insert(&mut self, key: K, frequency: u64) {
        self.remove(&key);
        let freq = frequency.max(1);
        let id = self.arena.insert(key.clone(), freq);
        self.link(id, freq);
        self.index.insert(key, id);
        self.min_freq = Some(self.min_freq.map_or(freq, |min| min.min(freq)));
    }

    fn touch(&mut self, key: &K) -> bool {
        let Some(&id) = self.index.get(key) else {
            return false;
        };
        let Some(old) = self.arena.freq(id) else {
            return false;
        };
        let new = old.saturating_add(1);

        if self.unlink(id, old) && self.min_freq == Some(old) {
            // the touched node lands in `new`, which is now the smallest
            self.min_freq = Some(new);
        }
        self.arena.set_freq(id, new);
        self.link(id, new);
        true
    }

    fn remove(&mut self, key: &K) -> Option<u64> {
        let id = self.index.remove(key)?;
        let freq = self.arena.freq(id)?;
        if self.unlink(id, freq) {
            self.advance_min_past(freq);
        }
        self.arena.remove(id).map(|(_, freq)| freq)
    }

    fn pop_victim(&mut self) -> Option<K> {
        let freq = self.min_freq?;
        let id = self.buckets.get(&freq)?.tail()?;
        if self.unlink(id, freq) {
            self.advance_min_past(freq);
        }
        let (key, _) = self.arena.remove(id)?;
        self.index.remove(&key);
        Some(key)
    }

    fn peek_victim(&self) -> Option<&K> {
        let freq = self.min_freq?;
        let id = self.buckets.get(&freq)?.tail()?;
        self.arena.key(id)
    }

    fn frequency(&self, key: &K) -> Option<u64> {
        self.index.get(key).and_then(|&id| self.arena.freq(id))
    }

    fn min_frequency(&self) -> Option<u64> {
        self.min_freq
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
        self.buckets.clear();
        self.min_freq = None;
    }

    fn eviction_order(&self) -> Vec<K> {
        self.buckets
            .values()
            .flat_map(|bucket| {
                let mut keys: Vec<K> = self
                    .arena
                    .iter_list(bucket)
                    .map(|(_, key)| key.clone())
                    .collect();
                keys.reverse();
                keys
            })
            .collect()
    }
}
