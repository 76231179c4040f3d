//! Compiled output keyed by logical path, with a per-key lock.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::SystemTime;

use dashmap::DashMap;
use sluice::FileStore;
use sluice::paths::{file_path_of, is_observable};
use tokio::sync::Mutex;

/// Compiled output plus everything needed to tell whether it is stale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub compiled: Arc<str>,
    pub content_type: &'static str,
    pub etag: String,
    /// File the output was compiled from; a different variant means stale.
    pub concrete_path: String,
    pub root_last_write: SystemTime,
    /// Newest write time among the root and its dependencies.
    pub last_modified: SystemTime,
    /// Write time of every observable dependency when compilation finished.
    /// `None` records a dependency that did not exist (optional imports).
    pub dependency_snapshot: HashMap<String, Option<SystemTime>>,
}

impl CacheEntry {
    /// Fresh iff the root and every dependency still carry the recorded
    /// write times.
    pub fn is_fresh(
        &self,
        store: &dyn FileStore,
        concrete_path: &str,
        root_last_write: SystemTime,
    ) -> bool {
        if self.concrete_path != concrete_path || self.root_last_write != root_last_write {
            return false;
        }
        self.dependency_snapshot
            .iter()
            .all(|(path, recorded)| store.last_write_time(path).ok() == *recorded)
    }

    /// Which dependency changed, for logging.
    pub fn first_changed(&self, store: &dyn FileStore) -> Option<&str> {
        self.dependency_snapshot
            .iter()
            .find(|(path, recorded)| store.last_write_time(path).ok() != **recorded)
            .map(|(path, _)| path.as_str())
    }
}

/// Capture the current write time of each observable path, keyed by the
/// file it names (query strings and fragments dropped).
pub fn snapshot<'a, I>(store: &dyn FileStore, paths: I) -> HashMap<String, Option<SystemTime>>
where
    I: IntoIterator<Item = &'a String>,
{
    paths
        .into_iter()
        .filter(|path| is_observable(path))
        .map(|path| file_path_of(path))
        .map(|file| (file.to_string(), store.last_write_time(file).ok()))
        .collect()
}

/// Newest of `root_last_write` and every recorded dependency write time.
pub fn newest_write(
    root_last_write: SystemTime,
    dependency_snapshot: &HashMap<String, Option<SystemTime>>,
) -> SystemTime {
    dependency_snapshot
        .values()
        .flatten()
        .copied()
        .fold(root_last_write, SystemTime::max)
}

pub type CacheSlot = Arc<Mutex<Option<CacheEntry>>>;

/// Holding a slot's lock covers freshness check, compile and store, so
/// only one compile per key is ever in flight.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: DashMap<String, CacheSlot>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The slot for `key`, created empty on first use.
    pub fn slot(&self, key: &str) -> CacheSlot {
        if let Some(slot) = self.entries.get(key) {
            return slot.value().clone();
        }
        self.entries.entry(key.to_string()).or_default().value().clone()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entry currently stored for `key`, if any. Waits for an in-flight
    /// compile of that key to finish.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        let slot = self.entries.get(key).map(|slot| slot.value().clone())?;
        let entry = slot.lock().await;
        entry.clone()
    }

    pub fn clear(&self) {
        self.entries.clear();
    }
}
