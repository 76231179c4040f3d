//! Virtual file store abstraction.
//!
//! Everything in the pipeline reads files through [`FileStore`] using
//! virtual paths: forward-slash separated, rooted at `/` (for example
//! `/styles/site.less`). Implementations map those paths onto whatever
//! storage they wrap.

mod memory;
mod native;

pub use memory::MemoryFileStore;
pub use native::NativeFileStore;

use std::path::PathBuf;
use std::time::SystemTime;

/// Result type for file store operations
pub type FileStoreResult<T> = Result<T, FileStoreError>;

/// Errors that can occur during file store operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FileStoreError {
    /// File not found
    #[error("File not found: {path}")]
    FileNotFound { path: String },

    /// I/O error
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },
}

impl FileStoreError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound { path: path.into() }
    }

    pub fn io(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Io {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Path the failed operation was about.
    pub fn path(&self) -> &str {
        match self {
            Self::FileNotFound { path } | Self::Io { path, .. } => path,
        }
    }
}

/// Read/stat contract consumed by the resolver, the pipeline and the server.
///
/// Reads are synchronous: dependency resolution walks many small files and
/// holds no locks, so implementations only need to be `Send + Sync`.
pub trait FileStore: Send + Sync + std::fmt::Debug {
    /// Check if a file exists at the virtual path
    fn file_exists(&self, path: &str) -> bool;

    /// Read a file as UTF-8 text
    fn read_text(&self, path: &str) -> FileStoreResult<String>;

    /// Read a file as raw bytes
    fn read_binary(&self, path: &str) -> FileStoreResult<Vec<u8>>;

    /// Last modification time of a file
    fn last_write_time(&self, path: &str) -> FileStoreResult<SystemTime>;

    /// Physical location of a virtual path, for tools that need a real path
    fn to_absolute_path(&self, path: &str) -> PathBuf;
}
