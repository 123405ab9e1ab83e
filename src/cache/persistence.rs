//! Snapshot persistence for the cache store.
//!
//! Snapshots hold the key/value table only. Eviction bookkeeping is not
//! saved: a restored store is a cold cache, every entry starting at
//! frequency 1 with recency rebuilt from the snapshot order.
//!
//! Format:
//! - Header: magic `b"CMSN"`, version u8, created_at i64 LE (unix millis),
//!   entry_count u64 LE
//! - Body: bincode `Vec<(K, V)>`, listed from next eviction victim to most
//!   protected so that reinsertion roughly preserves recency
//!
//! Each write goes to its own temp file in the target directory, which is
//! then renamed into place. Concurrent writers never share a temp file, and
//! readers only ever see a complete snapshot. Crash consistency is not
//! attempted.

use std::ffi::OsString;
use std::fmt::Debug;
use std::fs;
use std::hash::Hash;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::{error, info, warn};

use crate::cache::{CachePayload, CacheStore};
use crate::error::{CacheError, Result};

pub const SNAPSHOT_MAGIC: [u8; 4] = *b"CMSN";
pub const SNAPSHOT_VERSION: u8 = 1;

// magic(4) + version(1) + created_at(8) + count(8)
const HEADER_LEN: usize = 21;

/// Decoded snapshot contents.
#[derive(Debug, Clone)]
pub struct Snapshot<K, V> {
    pub created_at: DateTime<Utc>,
    pub entries: Vec<(K, V)>,
}

/// Encodes borrowed pairs into the versioned snapshot format.
pub fn encode_snapshot<K, V>(entries: &[(&K, &V)]) -> Result<Vec<u8>>
where
    K: Serialize,
    V: Serialize,
{
    let body = bincode::serialize(entries)
        .map_err(|e| CacheError::persistence("Snapshot serialization failed", e))?;

    let mut data = Vec::with_capacity(HEADER_LEN + body.len());
    data.extend_from_slice(&SNAPSHOT_MAGIC);
    data.push(SNAPSHOT_VERSION);
    data.extend_from_slice(&Utc::now().timestamp_millis().to_le_bytes());
    data.extend_from_slice(&(entries.len() as u64).to_le_bytes());
    data.extend_from_slice(&body);
    Ok(data)
}

/// Decodes and validates a snapshot produced by [`encode_snapshot`].
pub fn decode_snapshot<K, V>(data: &[u8]) -> Result<Snapshot<K, V>>
where
    K: DeserializeOwned,
    V: DeserializeOwned,
{
    if data.len() < HEADER_LEN {
        return Err(CacheError::Persistence(format!(
            "Snapshot too small: {} bytes",
            data.len()
        )));
    }
    if data[0..4] != SNAPSHOT_MAGIC {
        return Err(CacheError::Persistence(
            "Invalid snapshot magic bytes".to_string(),
        ));
    }
    let version = data[4];
    if version != SNAPSHOT_VERSION {
        return Err(CacheError::Persistence(format!(
            "Unsupported snapshot version {} (expected {})",
            version, SNAPSHOT_VERSION
        )));
    }

    let created_millis = i64::from_le_bytes(read_array(&data[5..13])?);
    let created_at = DateTime::from_timestamp_millis(created_millis).ok_or_else(|| {
        CacheError::Persistence(format!("Invalid snapshot timestamp {}", created_millis))
    })?;
    let entry_count = u64::from_le_bytes(read_array(&data[13..21])?);

    let entries: Vec<(K, V)> = bincode::deserialize(&data[HEADER_LEN..])
        .map_err(|e| CacheError::persistence("Snapshot decoding failed", e))?;
    if entries.len() as u64 != entry_count {
        return Err(CacheError::Persistence(format!(
            "Snapshot entry count mismatch: header says {}, body has {}",
            entry_count,
            entries.len()
        )));
    }

    Ok(Snapshot {
        created_at,
        entries,
    })
}

fn read_array(bytes: &[u8]) -> Result<[u8; 8]> {
    bytes
        .try_into()
        .map_err(|_| CacheError::Persistence("Truncated snapshot header".to_string()))
}

// == Persistence Manager ==
/// Reads and writes snapshot files at one path.
#[derive(Debug, Clone)]
pub struct PersistenceManager {
    path: PathBuf,
}

impl PersistenceManager {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Writes `data` to a fresh temp file and renames it over the target.
    pub fn write(&self, data: &[u8]) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
            error!("Snapshot temp file in {} failed: {}", dir.display(), e);
            CacheError::persistence("Failed to create snapshot temp file", e)
        })?;
        temp.write_all(data).map_err(|e| {
            error!("Snapshot write to {} failed: {}", temp.path().display(), e);
            CacheError::persistence("Failed to write snapshot", e)
        })?;
        temp.persist(&self.path).map_err(|e| {
            error!("Snapshot rename to {} failed: {}", self.path.display(), e.error);
            CacheError::persistence("Failed to rename snapshot", e.error)
        })?;
        Ok(())
    }

    /// Renames the snapshot to `<path>.corrupt` and returns the new path.
    pub fn set_aside(&self) -> Result<PathBuf> {
        let mut name = OsString::from(self.path.as_os_str());
        name.push(".corrupt");
        let target = PathBuf::from(name);
        fs::rename(&self.path, &target).map_err(|e| {
            error!(
                "Moving snapshot {} aside failed: {}",
                self.path.display(),
                e
            );
            CacheError::persistence("Failed to move snapshot aside", e)
        })?;
        Ok(target)
    }

    pub fn read(&self) -> Result<Vec<u8>> {
        fs::read(&self.path).map_err(|e| {
            error!("Snapshot read from {} failed: {}", self.path.display(), e);
            CacheError::persistence("Failed to read snapshot", e)
        })
    }
}

impl<K, V> CacheStore<K, V>
where
    K: CachePayload + Hash + Eq + Clone + Debug + Send + Serialize + DeserializeOwned + 'static,
    V: CachePayload + Clone + Send + Serialize + DeserializeOwned + 'static,
{
    // == Snapshot ==
    /// Serializes the key/value table while holding the store lock.
    pub fn snapshot(&self) -> Result<Vec<u8>> {
        let state = self.state.lock();
        let order = state.policy.eviction_order();
        let pairs: Vec<(&K, &V)> = order
            .iter()
            .filter_map(|key| {
                state
                    .entries
                    .get_key_value(key)
                    .map(|(key, entry)| (key, &entry.value))
            })
            .collect();
        encode_snapshot(&pairs)
    }

    // == Restore ==
    /// Reinserts every entry of a snapshot through the normal put path.
    ///
    /// The snapshot is fully decoded before anything is touched, so a
    /// corrupt snapshot leaves the store as it was. Entries the store would
    /// reject (blank, or larger than this store's capacity) are skipped.
    /// Restoring into a non-empty store can evict, which is reported like any
    /// other eviction. A key that is already present is updated like any put,
    /// so it keeps its frequency plus one rather than restarting at 1.
    /// Returns the number of entries inserted.
    pub fn restore(&self, data: &[u8]) -> Result<usize> {
        let snapshot: Snapshot<K, V> = decode_snapshot(data)?;
        let total = snapshot.entries.len();

        let mut evicted = Vec::new();
        let mut restored = 0usize;
        {
            let mut state = self.state.lock();
            for (key, value) in snapshot.entries {
                match self.put_locked(&mut state, key, value, &mut evicted) {
                    Ok(_) => restored += 1,
                    Err(e) => warn!("Skipping snapshot entry: {}", e),
                }
            }
            self.sync_gauges(&state);
        }
        self.events.publish_all(&evicted);

        info!(
            "Restored {}/{} entries from snapshot taken at {}",
            restored,
            total,
            snapshot.created_at.to_rfc3339()
        );
        Ok(restored)
    }

    // == Shutdown ==
    /// Persists the current contents to the configured snapshot path.
    pub fn shutdown(&self) -> Result<()> {
        let manager = self.persistence_manager()?;
        let data = self.snapshot()?;
        manager.write(&data)?;
        info!(
            "Persisted {} entries ({} bytes) to {}",
            self.size(),
            data.len(),
            manager.path().display()
        );
        Ok(())
    }

    // == Load From Disk ==
    /// Restores from the configured snapshot path.
    pub fn load_from_disk(&self) -> Result<usize> {
        let manager = self.persistence_manager()?;
        let data = manager.read()?;
        self.restore(&data)
    }

    /// Moves an unreadable snapshot out of the way so the next write
    /// cannot replace it. Returns where the file went.
    pub fn quarantine_snapshot(&self) -> Result<PathBuf> {
        let moved = self.persistence_manager()?.set_aside()?;
        warn!("Unreadable snapshot moved to {}", moved.display());
        Ok(moved)
    }

    /// True when a snapshot path is configured and the file exists.
    pub fn has_snapshot_on_disk(&self) -> bool {
        self.persistence
            .as_ref()
            .map(|manager| manager.exists())
            .unwrap_or(false)
    }

    pub fn snapshot_path(&self) -> Option<&Path> {
        self.persistence.as_ref().map(|manager| manager.path())
    }

    fn persistence_manager(&self) -> Result<&PersistenceManager> {
        self.persistence.as_ref().ok_or_else(|| {
            CacheError::Persistence("No snapshot path configured".to_string())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PolicyKind;

    fn populated(policy: PolicyKind) -> CacheStore<String, String> {
        let store = CacheStore::new(1024, policy);
        for i in 0..10 {
            store.put(format!("key{}", i), format!("value{}", i)).unwrap();
        }
        store
    }

    #[test]
    fn test_round_trip_into_empty_store() {
        let source = populated(PolicyKind::Lfu);
        source.get(&"key3".to_string());
        let data = source.snapshot().unwrap();

        let target: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lfu);
        assert_eq!(target.restore(&data).unwrap(), 10);

        for i in 0..10 {
            assert_eq!(
                target.get(&format!("key{}", i)),
                Some(format!("value{}", i))
            );
        }
        target.check_invariants().unwrap();
    }

    #[test]
    fn test_restore_is_a_cold_cache() {
        let source = populated(PolicyKind::Lfu);
        for _ in 0..5 {
            source.get(&"key0".to_string());
        }
        let data = source.snapshot().unwrap();

        let target: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lfu);
        target.restore(&data).unwrap();

        assert_eq!(target.frequency(&"key0".to_string()), Some(1));
        assert_eq!(target.metrics().hits, 0);
    }

    #[test]
    fn test_snapshot_lists_victims_first() {
        let source = populated(PolicyKind::Lru);
        source.get(&"key0".to_string());
        let data = source.snapshot().unwrap();

        let snapshot: Snapshot<String, String> = decode_snapshot(&data).unwrap();
        assert_eq!(snapshot.entries.first().unwrap().0, "key1");
        assert_eq!(snapshot.entries.last().unwrap().0, "key0");
    }

    #[test]
    fn test_restore_rejects_garbage_and_leaves_store_untouched() {
        let store = populated(PolicyKind::Lru);

        let result = store.restore(b"definitely not a snapshot");
        assert!(matches!(result, Err(CacheError::Persistence(_))));
        assert_eq!(store.size(), 10);
    }

    #[test]
    fn test_restore_rejects_truncated_body() {
        let data = populated(PolicyKind::Lru).snapshot().unwrap();
        let store: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lru);
        store.put("keep".to_string(), "me".to_string()).unwrap();

        let result = store.restore(&data[..data.len() - 3]);
        assert!(matches!(result, Err(CacheError::Persistence(_))));
        assert_eq!(store.size(), 1);
    }

    #[test]
    fn test_restore_rejects_wrong_version() {
        let mut data = populated(PolicyKind::Lru).snapshot().unwrap();
        data[4] = SNAPSHOT_VERSION + 1;

        let store: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lru);
        let err = store.restore(&data).unwrap_err();
        assert!(err.to_string().contains("version"));
    }

    #[test]
    fn test_restore_rejects_count_mismatch() {
        let mut data = populated(PolicyKind::Lru).snapshot().unwrap();
        data[13..21].copy_from_slice(&11u64.to_le_bytes());

        let store: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lru);
        assert!(store.restore(&data).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_restore_skips_entries_too_large_for_target() {
        let source: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lru);
        source.put("small".to_string(), "ab".to_string()).unwrap();
        source.put("large".to_string(), "a".repeat(20)).unwrap();
        let data = source.snapshot().unwrap();

        let target: CacheStore<String, String> = CacheStore::new(16, PolicyKind::Lru);
        assert_eq!(target.restore(&data).unwrap(), 1);
        assert!(target.contains_key(&"small".to_string()));
    }

    #[test]
    fn test_shutdown_and_load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.dat");

        let source = populated(PolicyKind::Lru).with_snapshot_path(&path);
        source.shutdown().unwrap();
        assert!(source.has_snapshot_on_disk());
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);

        let target: CacheStore<String, String> =
            CacheStore::new(1024, PolicyKind::Lru).with_snapshot_path(&path);
        assert_eq!(target.load_from_disk().unwrap(), 10);
        assert_eq!(target.get(&"key7".to_string()), Some("value7".to_string()));
    }

    #[test]
    fn test_missing_path_or_file_is_persistence_error() {
        let store = populated(PolicyKind::Lru);
        assert!(matches!(store.shutdown(), Err(CacheError::Persistence(_))));

        let dir = tempfile::tempdir().unwrap();
        let store = populated(PolicyKind::Lru).with_snapshot_path(dir.path().join("absent.dat"));
        assert!(!store.has_snapshot_on_disk());
        assert!(matches!(
            store.load_from_disk(),
            Err(CacheError::Persistence(_))
        ));
        assert_eq!(store.size(), 10);
    }

    #[test]
    fn test_bytes_values_round_trip() {
        let source: CacheStore<String, Vec<u8>> = CacheStore::new(1024, PolicyKind::Lru);
        source.put("blob".to_string(), vec![0, 1, 2, 255]).unwrap();

        let target: CacheStore<String, Vec<u8>> = CacheStore::new(1024, PolicyKind::Lru);
        target.restore(&source.snapshot().unwrap()).unwrap();
        assert_eq!(target.get(&"blob".to_string()), Some(vec![0, 1, 2, 255]));
    }

    #[test]
    fn test_restore_merge_bumps_existing_frequency() {
        let source: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lfu);
        source.put("shared".to_string(), "new".to_string()).unwrap();
        source.put("fresh".to_string(), "value".to_string()).unwrap();
        let data = source.snapshot().unwrap();

        let target: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lfu);
        target.put("shared".to_string(), "old".to_string()).unwrap();
        target.get(&"shared".to_string());
        assert_eq!(target.frequency(&"shared".to_string()), Some(2));

        target.restore(&data).unwrap();
        assert_eq!(target.frequency(&"shared".to_string()), Some(3));
        assert_eq!(target.frequency(&"fresh".to_string()), Some(1));
        assert_eq!(target.get(&"shared".to_string()), Some("new".to_string()));
    }

    #[test]
    fn test_concurrent_writes_publish_whole_snapshots() {
        let dir = tempfile::tempdir().unwrap();
        let manager = PersistenceManager::new(dir.path().join("cache.dat"));

        let payloads: Vec<Vec<u8>> = (0..4)
            .map(|i| {
                let store: CacheStore<String, String> = CacheStore::new(1 << 20, PolicyKind::Lru);
                for n in 0..200 {
                    store.put(format!("w{}-{}", i, n), "x".repeat(64)).unwrap();
                }
                store.snapshot().unwrap()
            })
            .collect();

        std::thread::scope(|scope| {
            for data in &payloads {
                let manager = &manager;
                scope.spawn(move || {
                    for _ in 0..20 {
                        manager.write(data).unwrap();
                    }
                });
            }
        });

        let on_disk = manager.read().unwrap();
        assert!(payloads.contains(&on_disk));
        let snapshot: Snapshot<String, String> = decode_snapshot(&on_disk).unwrap();
        assert_eq!(snapshot.entries.len(), 200);
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_quarantine_keeps_unreadable_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.dat");
        fs::write(&path, b"not a snapshot").unwrap();

        let store: CacheStore<String, String> =
            CacheStore::new(1024, PolicyKind::Lru).with_snapshot_path(&path);
        assert!(store.load_from_disk().is_err());

        let moved = store.quarantine_snapshot().unwrap();
        assert_eq!(moved, dir.path().join("cache.dat.corrupt"));
        assert!(!store.has_snapshot_on_disk());

        store.put("after".to_string(), "restart".to_string()).unwrap();
        store.shutdown().unwrap();
        assert_eq!(fs::read(&moved).unwrap(), b"not a snapshot");
        assert_eq!(store.load_from_disk().unwrap(), 1);
    }

    #[test]
    fn test_quarantine_without_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let store: CacheStore<String, String> = CacheStore::new(1024, PolicyKind::Lru)
            .with_snapshot_path(dir.path().join("absent.dat"));
        assert!(matches!(
            store.quarantine_snapshot(),
            Err(CacheError::Persistence(_))
        ));
    }
}
