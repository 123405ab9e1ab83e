//! Eviction Policy Module
//!
//! Common interface for the ordering bookkeeping behind eviction, plus the
//! configuration-facing policy selector.

use std::fmt;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::cache::{LfuPolicy, LruPolicy};

// == Eviction Policy ==
/// Tracks access order or frequency for every live key and picks victims.
///
/// The store calls these methods only while holding its lock, so
/// implementations need no internal synchronization.
pub trait EvictionPolicy<K>: Send {
    /// Short lowercase name, e.g. `"lru"`.
    fn name(&self) -> &'static str;

    /// Starts tracking `key` at the most-recent position with the given
    /// access frequency. A key that is already tracked is re-placed.
    fn insert(&mut self, key: K, frequency: u64);

    /// Records an access. Returns false if the key is not tracked.
    fn touch(&mut self, key: &K) -> bool;

    /// Stops tracking `key`, returning its access frequency.
    fn remove(&mut self, key: &K) -> Option<u64>;

    /// Removes and returns the next eviction victim.
    fn pop_victim(&mut self) -> Option<K>;

    /// Returns the next eviction victim without removing it.
    fn peek_victim(&self) -> Option<&K>;

    /// Access frequency recorded for `key`.
    fn frequency(&self, key: &K) -> Option<u64>;

    /// Smallest frequency among tracked keys, for frequency-ordered policies.
    fn min_frequency(&self) -> Option<u64> {
        None
    }

    fn contains(&self, key: &K) -> bool;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn clear(&mut self);

    /// Every tracked key, from next victim to most protected.
    fn eviction_order(&self) -> Vec<K>;
}

// == Policy Kind ==
/// Error type for parsing a policy name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsePolicyError(String);

impl fmt::Display for ParsePolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Invalid eviction policy: {}", self.0)
    }
}

impl std::error::Error for ParsePolicyError {}

/// Eviction policy selector
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PolicyKind {
    /// Least Recently Used - evict the entry untouched for longest
    #[default]
    Lru,
    /// Least Frequently Used - evict the least accessed entry, oldest first on ties
    Lfu,
}

impl PolicyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PolicyKind::Lru => "lru",
            PolicyKind::Lfu => "lfu",
        }
    }

    /// Creates an empty policy of this kind.
    pub fn build<K>(self) -> Box<dyn EvictionPolicy<K>>
    where
        K: Hash + Eq + Clone + Send + 'static,
    {
        match self {
            PolicyKind::Lru => Box::new(LruPolicy::new()),
            PolicyKind::Lfu => Box::new(LfuPolicy::new()),
        }
    }
}

impl FromStr for PolicyKind {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lru" => Ok(PolicyKind::Lru),
            "lfu" => Ok(PolicyKind::Lfu),
            _ => Err(ParsePolicyError(s.to_string())),
        }
    }
}

impl fmt::Display for PolicyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
