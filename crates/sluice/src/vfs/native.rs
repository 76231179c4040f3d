//! Native file store backed by a directory on disk.
//!
//! ```text
//! virtual path            physical path
//! /styles/site.less  ──▶  <root>/styles/site.less
//! ```

// NativeFileStore is the one place allowed to touch std::fs directly
#![allow(clippy::disallowed_methods)]

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use path_clean::PathClean;

use super::{FileStore, FileStoreError, FileStoreResult};

/// File store that serves virtual paths from a root directory.
///
/// Paths that would escape the root after `..` normalization are reported as
/// missing rather than read.
#[derive(Debug, Clone)]
pub struct NativeFileStore {
    root: PathBuf,
}

impl NativeFileStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into().clean(),
        }
    }

    /// Root directory of this store.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn physical(&self, path: &str) -> Option<PathBuf> {
        let relative = path.trim_start_matches(['/', '\\']).replace('\\', "/");
        let candidate = self.root.join(relative).clean();
        candidate.starts_with(&self.root).then_some(candidate)
    }

    fn map_io(path: &str, err: std::io::Error) -> FileStoreError {
        if err.kind() == std::io::ErrorKind::NotFound {
            FileStoreError::not_found(path)
        } else {
            FileStoreError::io(path, err)
        }
    }
}

impl FileStore for NativeFileStore {
    fn file_exists(&self, path: &str) -> bool {
        self.physical(path).is_some_and(|p| p.is_file())
    }

    fn read_text(&self, path: &str) -> FileStoreResult<String> {
        let physical = self
            .physical(path)
            .ok_or_else(|| FileStoreError::not_found(path))?;
        std::fs::read_to_string(&physical).map_err(|e| Self::map_io(path, e))
    }

    fn read_binary(&self, path: &str) -> FileStoreResult<Vec<u8>> {
        let physical = self
            .physical(path)
            .ok_or_else(|| FileStoreError::not_found(path))?;
        std::fs::read(&physical).map_err(|e| Self::map_io(path, e))
    }

    fn last_write_time(&self, path: &str) -> FileStoreResult<SystemTime> {
        let physical = self
            .physical(path)
            .ok_or_else(|| FileStoreError::not_found(path))?;
        let metadata = std::fs::metadata(&physical).map_err(|e| Self::map_io(path, e))?;
        if !metadata.is_file() {
            return Err(FileStoreError::not_found(path));
        }
        metadata.modified().map_err(|e| FileStoreError::io(path, e))
    }

    fn to_absolute_path(&self, path: &str) -> PathBuf {
        self.physical(path).unwrap_or_else(|| self.root.clone())
    }
}
