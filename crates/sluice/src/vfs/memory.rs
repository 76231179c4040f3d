//! In-memory file store.
//!
//! Used by tests and by embedders that compile assets which never touch the
//! disk. Modification times come from a logical clock so `touch` always
//! produces a strictly newer timestamp.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::{Duration, SystemTime};

use parking_lot::RwLock;

use super::{FileStore, FileStoreError, FileStoreResult};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    modified: SystemTime,
}

#[derive(Debug, Default)]
struct Inner {
    files: HashMap<String, MemoryFile>,
    clock: u64,
    reads: HashMap<String, usize>,
}

impl Inner {
    fn tick(&mut self) -> SystemTime {
        self.clock += 1;
        SystemTime::UNIX_EPOCH + Duration::from_secs(1_700_000_000 + self.clock)
    }
}

/// Thread-safe in-memory [`FileStore`].
#[derive(Debug, Default)]
pub struct MemoryFileStore {
    inner: RwLock<Inner>,
}

impl MemoryFileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with_file(self, path: &str, content: impl AsRef<[u8]>) -> Self {
        self.insert(path, content);
        self
    }

    /// Insert or replace a file; the modification time advances.
    pub fn insert(&self, path: &str, content: impl AsRef<[u8]>) {
        let mut inner = self.inner.write();
        let modified = inner.tick();
        inner.files.insert(
            path.to_string(),
            MemoryFile {
                content: content.as_ref().to_vec(),
                modified,
            },
        );
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.inner.write().files.remove(path).is_some()
    }

    /// Bump a file's modification time without changing its content.
    pub fn touch(&self, path: &str) -> FileStoreResult<SystemTime> {
        let mut inner = self.inner.write();
        let modified = inner.tick();
        let file = inner
            .files
            .get_mut(path)
            .ok_or_else(|| FileStoreError::not_found(path))?;
        file.modified = modified;
        Ok(modified)
    }

    /// Number of content reads (text or binary) served for `path`.
    pub fn read_count(&self, path: &str) -> usize {
        self.inner.read().reads.get(path).copied().unwrap_or(0)
    }

    fn read(&self, path: &str) -> FileStoreResult<Vec<u8>> {
        let mut inner = self.inner.write();
        let content = inner
            .files
            .get(path)
            .map(|f| f.content.clone())
            .ok_or_else(|| FileStoreError::not_found(path))?;
        *inner.reads.entry(path.to_string()).or_default() += 1;
        Ok(content)
    }
}

impl FileStore for MemoryFileStore {
    fn file_exists(&self, path: &str) -> bool {
        self.inner.read().files.contains_key(path)
    }

    fn read_text(&self, path: &str) -> FileStoreResult<String> {
        let bytes = self.read(path)?;
        String::from_utf8(bytes).map_err(|e| FileStoreError::io(path, e))
    }

    fn read_binary(&self, path: &str) -> FileStoreResult<Vec<u8>> {
        self.read(path)
    }

    fn last_write_time(&self, path: &str) -> FileStoreResult<SystemTime> {
        self.inner
            .read()
            .files
            .get(path)
            .map(|f| f.modified)
            .ok_or_else(|| FileStoreError::not_found(path))
    }

    fn to_absolute_path(&self, path: &str) -> PathBuf {
        PathBuf::from(path)
    }
}
