//! Cache Module
//!
//! Size-bounded in-memory caching with LRU or LFU eviction, observable
//! events, and snapshot persistence.

mod arena;
mod entry;
mod events;
mod lfu;
mod lru;
mod metrics;
mod persistence;
mod policy;
mod size;
mod store;


// Re-export public types
pub use entry::{CacheEntry, CachePayload};
pub use events::{
    build_listener, build_listeners, CacheEvent, CacheEventListener, EventBus, ListenerId,
    LoggingListener, KNOWN_LISTENERS,
};
pub use lfu::LfuPolicy;
pub use lru::LruPolicy;
pub use metrics::{CacheMetrics, CacheStats};
pub use persistence::{
    decode_snapshot, encode_snapshot, PersistenceManager, Snapshot, SNAPSHOT_MAGIC,
    SNAPSHOT_VERSION,
};
pub use policy::{EvictionPolicy, ParsePolicyError, PolicyKind};
pub use size::{
    text_length_heuristic, EstimatorKind, FnEstimator, SerializedSizeEstimator, SizeEstimator,
    TextLengthEstimator,
};
pub use store::CacheStore;

/// Store type served by the protocol and admin front ends.
pub type StringCache = CacheStore<String, String>;
