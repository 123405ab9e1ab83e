//! Cache Events Module
//!
//! Observers notified on hit, miss and eviction.
//!
//! Listeners run synchronously on the caller's thread, after the store has
//! released its lock. They must not call back into the store that is
//! notifying them. Nothing detects such calls; a listener that issues a
//! `get` from `on_event` can recurse without bound.

use std::fmt::Debug;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

// == Cache Event ==
/// Outcome of a cache operation, delivered to every subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent<K, V> {
    /// Lookup found the key
    Hit(K),
    /// Lookup did not find the key
    Miss(K),
    /// Entry removed under capacity pressure
    Eviction(K, V),
}

impl<K, V> CacheEvent<K, V> {
    /// Key the event refers to.
    pub fn key(&self) -> &K {
        match self {
            CacheEvent::Hit(key) | CacheEvent::Miss(key) | CacheEvent::Eviction(key, _) => key,
        }
    }
}

// == Listener Trait ==
/// Observer of cache events.
pub trait CacheEventListener<K, V>: Send + Sync {
    fn on_event(&self, event: &CacheEvent<K, V>);
}

/// Handle returned by [`EventBus::subscribe`], used to unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type SharedListener<K, V> = Arc<dyn CacheEventListener<K, V>>;

// == Event Bus ==
/// Ordered registry of listeners.
pub struct EventBus<K, V> {
    listeners: RwLock<Vec<(ListenerId, SharedListener<K, V>)>>,
    next_id: AtomicU64,
}

impl<K, V> EventBus<K, V> {
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener after all existing ones.
    pub fn subscribe(&self, listener: SharedListener<K, V>) -> ListenerId {
        let id = ListenerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, listener));
        id
    }

    /// Removes a listener. Returns false if the id was not registered.
    pub fn unsubscribe(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(existing, _)| *existing != id);
        listeners.len() != before
    }

    pub fn len(&self) -> usize {
        self.listeners.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.read().is_empty()
    }

    /// Delivers one event to every current listener in subscription order.
    pub fn publish(&self, event: &CacheEvent<K, V>) {
        for listener in self.current() {
            listener.on_event(event);
        }
    }

    /// Delivers a batch of events, in order, to the listeners registered
    /// when the batch started.
    pub fn publish_all(&self, events: &[CacheEvent<K, V>]) {
        if events.is_empty() {
            return;
        }
        let listeners = self.current();
        for event in events {
            for listener in &listeners {
                listener.on_event(event);
            }
        }
    }

    // Copy of the list so delivery never holds the registry lock.
    fn current(&self) -> Vec<SharedListener<K, V>> {
        self.listeners
            .read()
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect()
    }
}

impl<K, V> Default for EventBus<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

// == Logging Listener ==
/// Logs every event through `tracing` and keeps per-kind counts.
#[derive(Debug, Default)]
pub struct LoggingListener {
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LoggingListener {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn eviction_count(&self) -> u64 {
        self.evictions.load(Ordering::Relaxed)
    }
}

impl<K: Debug, V: Debug> CacheEventListener<K, V> for LoggingListener {
    fn on_event(&self, event: &CacheEvent<K, V>) {
        match event {
            CacheEvent::Hit(key) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Cache hit for key: {:?}", key);
            }
            CacheEvent::Miss(key) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Cache miss for key: {:?}", key);
            }
            CacheEvent::Eviction(key, value) => {
                self.evictions.fetch_add(1, Ordering::Relaxed);
                info!("Eviction for key: {:?}, value: {:?}", key, value);
            }
        }
    }
}

// == Listener Registry ==
/// Names accepted by [`build_listener`].
pub const KNOWN_LISTENERS: &[&str] = &["logging"];

/// Constructs a built-in listener by configuration name.
pub fn build_listener<K, V>(name: &str) -> Option<SharedListener<K, V>>
where
    K: Debug + 'static,
    V: Debug + 'static,
{
    match name.trim().to_lowercase().as_str() {
        "logging" => Some(Arc::new(LoggingListener::new())),
        _ => None,
    }
}

/// Builds every named listener, skipping unknown names with a warning.
pub fn build_listeners<K, V>(names: &[String]) -> Vec<SharedListener<K, V>>
where
    K: Debug + 'static,
    V: Debug + 'static,
{
    names
        .iter()
        .filter_map(|name| {
            let listener = build_listener(name);
            if listener.is_none() {
                warn!(
                    "Unknown cache listener '{}', expected one of {:?}",
                    name, KNOWN_LISTENERS
                );
            }
            listener
        })
        .collect()
}
