//! Cache Store Module
//!
//! Main cache engine combining HashMap storage with a pluggable eviction
//! policy under a byte budget.
//!
//! Every operation runs to completion inside one exclusive critical section
//! guarding the entry table, the policy and the size counter. Metrics are
//! atomic and events are published after the lock is released, so a slow
//! listener only stalls its own caller.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::debug;

use crate::cache::{
    CacheEntry, CacheEvent, CacheEventListener, CacheMetrics, CachePayload, CacheStats,
    EventBus, EvictionPolicy, ListenerId, PersistenceManager, PolicyKind, SizeEstimator,
    TextLengthEstimator,
};
use crate::error::{CacheError, Result};

/// Entry table, ordering bookkeeping and size counter, always mutated together.
pub(super) struct StoreState<K, V> {
    pub(super) entries: HashMap<K, CacheEntry<V>>,
    pub(super) policy: Box<dyn EvictionPolicy<K>>,
    pub(super) current_size: u64,
}

// == Cache Store ==
/// Size-bounded key/value store with LRU or LFU eviction.
///
/// Capacity is measured in bytes as reported by the configured
/// [`SizeEstimator`]. A value whose estimate alone exceeds the capacity is
/// rejected, so eviction always terminates with the store within budget.
pub struct CacheStore<K, V> {
    pub(super) state: Mutex<StoreState<K, V>>,
    capacity_bytes: u64,
    estimator: Box<dyn SizeEstimator<V>>,
    pub(super) metrics: CacheMetrics,
    pub(super) events: EventBus<K, V>,
    pub(super) persistence: Option<PersistenceManager>,
    len: AtomicUsize,
    size_bytes: AtomicU64,
}

impl<K, V> CacheStore<K, V>
where
    K: CachePayload + Hash + Eq + Clone + Debug + Send + 'static,
    V: CachePayload + Clone + Send + 'static,
{
    // == Constructor ==
    /// Creates a new CacheStore with a byte capacity and eviction policy.
    ///
    /// Sizes are estimated with [`TextLengthEstimator`] until
    /// [`with_estimator`](Self::with_estimator) says otherwise.
    pub fn new(capacity_bytes: u64, policy: PolicyKind) -> Self {
        debug!(
            "Creating cache store (capacity: {} bytes, policy: {})",
            capacity_bytes, policy
        );
        Self {
            state: Mutex::new(StoreState {
                entries: HashMap::new(),
                policy: policy.build(),
                current_size: 0,
            }),
            capacity_bytes,
            estimator: Box::new(TextLengthEstimator),
            metrics: CacheMetrics::new(),
            events: EventBus::new(),
            persistence: None,
            len: AtomicUsize::new(0),
            size_bytes: AtomicU64::new(0),
        }
    }

    /// Replaces the size estimator. Call before inserting anything.
    pub fn with_estimator(mut self, estimator: impl SizeEstimator<V> + 'static) -> Self {
        self.estimator = Box::new(estimator);
        self
    }

    /// Same as [`with_estimator`](Self::with_estimator) for an already boxed estimator.
    pub fn with_boxed_estimator(mut self, estimator: Box<dyn SizeEstimator<V>>) -> Self {
        self.estimator = estimator;
        self
    }

    /// Enables `shutdown`/`load_from_disk` against the given file.
    pub fn with_snapshot_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.persistence = Some(PersistenceManager::new(path));
        self
    }

    // == Get ==
    /// Retrieves a value by key, counting a hit or a miss.
    pub fn get(&self, key: &K) -> Option<V> {
        let found = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let value = state.entries.get(key).map(|entry| entry.value.clone());
            if value.is_some() {
                state.policy.touch(key);
            }
            value
        };

        let event = if found.is_some() {
            self.metrics.record_hit();
            CacheEvent::Hit(key.clone())
        } else {
            self.metrics.record_miss();
            CacheEvent::Miss(key.clone())
        };
        self.events.publish(&event);
        found
    }

    // == Put ==
    /// Stores a key-value pair, returning the previous value if any.
    ///
    /// Overwriting counts as an access. Entries are evicted until the new
    /// value fits; the key being written is never its own victim.
    ///
    /// # Errors
    /// `InvalidArgument` for a blank key or value, or a value whose
    /// estimated size exceeds the whole capacity. The store is unchanged.
    pub fn put(&self, key: K, value: V) -> Result<Option<V>> {
        let mut evicted = Vec::new();
        let previous = {
            let mut state = self.state.lock();
            let previous = self.put_locked(&mut state, key, value, &mut evicted)?;
            self.sync_gauges(&state);
            previous
        };
        self.events.publish_all(&evicted);
        Ok(previous)
    }

    pub(super) fn put_locked(
        &self,
        state: &mut StoreState<K, V>,
        key: K,
        value: V,
        evicted: &mut Vec<CacheEvent<K, V>>,
    ) -> Result<Option<V>> {
        if key.is_blank() {
            return Err(CacheError::InvalidArgument(
                "Key cannot be empty".to_string(),
            ));
        }
        if value.is_blank() {
            return Err(CacheError::InvalidArgument(
                "Value cannot be empty".to_string(),
            ));
        }

        let size = self.estimator.estimate(&value);
        if size > self.capacity_bytes {
            return Err(CacheError::InvalidArgument(format!(
                "Value of {} bytes exceeds cache capacity of {} bytes",
                size, self.capacity_bytes
            )));
        }

        // Detach an existing key so eviction cannot choose it.
        let frequency = state
            .policy
            .remove(&key)
            .map_or(1, |freq| freq.saturating_add(1));
        let old_size = state.entries.get(&key).map_or(0, |entry| entry.size_bytes);
        state.current_size -= old_size;

        self.evict_until_fits(state, size, evicted);

        state.current_size += size;
        let previous = match state.entries.get_mut(&key) {
            Some(entry) => Some(entry.replace(value, size)),
            None => {
                state
                    .entries
                    .insert(key.clone(), CacheEntry::new(value, size));
                None
            }
        };
        state.policy.insert(key, frequency);
        Ok(previous)
    }

    fn evict_until_fits(
        &self,
        state: &mut StoreState<K, V>,
        incoming: u64,
        evicted: &mut Vec<CacheEvent<K, V>>,
    ) {
        while state.current_size + incoming > self.capacity_bytes {
            let Some(victim) = state.policy.pop_victim() else {
                break;
            };
            if let Some(entry) = state.entries.remove(&victim) {
                state.current_size -= entry.size_bytes;
                self.metrics.record_eviction();
                debug!(
                    "Evicted key {:?} ({} bytes, policy: {})",
                    victim,
                    entry.size_bytes,
                    state.policy.name()
                );
                evicted.push(CacheEvent::Eviction(victim, entry.value));
            }
        }
    }

    // == Remove ==
    /// Deletes an entry, returning its value. Emits no event.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let entry = state.entries.remove(key)?;
        state.policy.remove(key);
        state.current_size -= entry.size_bytes;
        self.sync_gauges(state);
        Some(entry.value)
    }

    // == Clear ==
    /// Removes every entry. Emits no events and counts no evictions.
    pub fn clear(&self) {
        let mut state = self.state.lock();
        state.entries.clear();
        state.policy.clear();
        state.current_size = 0;
        self.sync_gauges(&state);
    }

    // == Length ==
    /// Number of live entries. Does not take the lock.
    pub fn size(&self) -> usize {
        self.len.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    /// Sum of estimated sizes of live entries. Does not take the lock.
    pub fn current_size_bytes(&self) -> u64 {
        self.size_bytes.load(Ordering::Acquire)
    }

    pub fn capacity_bytes(&self) -> u64 {
        self.capacity_bytes
    }

    pub fn policy_name(&self) -> &'static str {
        self.state.lock().policy.name()
    }

    /// Checks presence without counting a hit or miss or touching the entry.
    pub fn contains_key(&self, key: &K) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// Access frequency the policy holds for `key`.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        self.state.lock().policy.frequency(key)
    }

    /// Live keys from next eviction victim to most protected.
    pub fn eviction_order(&self) -> Vec<K> {
        self.state.lock().policy.eviction_order()
    }

    // == Metrics ==
    /// Snapshot of the hit/miss/eviction counters.
    pub fn metrics(&self) -> CacheStats {
        self.metrics.snapshot()
    }

    // == Listeners ==
    pub fn add_event_listener(&self, listener: Arc<dyn CacheEventListener<K, V>>) -> ListenerId {
        self.events.subscribe(listener)
    }

    pub fn remove_event_listener(&self, id: ListenerId) -> bool {
        self.events.unsubscribe(id)
    }

    pub(super) fn sync_gauges(&self, state: &StoreState<K, V>) {
        self.len.store(state.entries.len(), Ordering::Release);
        self.size_bytes.store(state.current_size, Ordering::Release);
    }

    /// Verifies table/policy agreement, size accounting, the capacity bound
    /// and the LFU minimum.
    #[cfg(test)]
    pub(crate) fn check_invariants(&self) -> std::result::Result<(), String> {
        let state = self.state.lock();

        if state.entries.len() != state.policy.len() {
            return Err(format!(
                "{} entries but policy tracks {}",
                state.entries.len(),
                state.policy.len()
            ));
        }
        if let Some(key) = state.entries.keys().find(|key| !state.policy.contains(key)) {
            return Err(format!("entry {:?} missing from policy", key));
        }

        let total: u64 = state.entries.values().map(|entry| entry.size_bytes).sum();
        if total != state.current_size {
            return Err(format!(
                "tracked size {} but entries sum to {}",
                state.current_size, total
            ));
        }
        if state.current_size > self.capacity_bytes {
            return Err(format!(
                "size {} over capacity {}",
                state.current_size, self.capacity_bytes
            ));
        }
        if self.size() != state.entries.len() || self.current_size_bytes() != state.current_size
        {
            return Err("lock-free gauges out of sync".to_string());
        }

        if state.policy.name() == "lfu" {
            let smallest = state
                .entries
                .keys()
                .filter_map(|key| state.policy.frequency(key))
                .min();
            if smallest != state.policy.min_frequency() {
                return Err(format!(
                    "minimum frequency {:?} but smallest live frequency {:?}",
                    state.policy.min_frequency(),
                    smallest
                ));
            }
        }
        Ok(())
    }
}
