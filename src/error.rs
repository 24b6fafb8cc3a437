//! Error types for the part mirror.
//!
//! `StorageError` covers the cache directory and the container file on disk,
//! `CodecError` covers archive decode/encode, and `ApiError` is what every
//! public operation returns.

use std::path::PathBuf;
use thiserror::Error;

/// Cache and container file errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("I/O error on {path}: {source}")]
    PathIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Entry path escapes the cache root: {0}")]
    UnsafeEntryPath(String),

    #[error("Path is outside the cache root: {0}")]
    OutsideCacheRoot(PathBuf),
}

impl StorageError {
    pub(crate) fn at(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StorageError::PathIo {
            path: path.into(),
            source,
        }
    }

    /// Underlying I/O error, if any.
    pub fn io_error(&self) -> Option<&std::io::Error> {
        match self {
            StorageError::IoError(e) | StorageError::PathIo { source: e, .. } => Some(e),
            _ => None,
        }
    }
}

/// Archive decode/encode errors
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("Malformed container: {0}")]
    Malformed(String),

    #[error("Failed to read entry {path}: {reason}")]
    EntryRead { path: String, reason: String },

    #[error("Failed to write entry {path}: {reason}")]
    EntryWrite { path: String, reason: String },

    #[error("Failed to finish container: {0}")]
    Finish(String),
}

/// Errors returned by session, reconciler, and edit writer operations
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Storage error: {0}")]
    StorageError(#[from] StorageError),

    #[error("Codec error: {0}")]
    CodecError(#[from] CodecError),

    #[error("Container {0} is locked by another process; save again to retry")]
    ContainerLocked(PathBuf),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("No container loaded")]
    NotLoaded,

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Watch error: {0}")]
    WatchError(String),

    #[error("Failed to format output: {0}")]
    OutputError(String),
}

impl From<config::ConfigError> for ApiError {
    fn from(err: config::ConfigError) -> Self {
        ApiError::ConfigError(err.to_string())
    }
}

impl From<notify::Error> for ApiError {
    fn from(err: notify::Error) -> Self {
        ApiError::WatchError(err.to_string())
    }
}

/// True when the error means another process holds the file open.
pub(crate) fn is_lock_error(err: &std::io::Error) -> bool {
    if err.kind() == std::io::ErrorKind::PermissionDenied {
        return true;
    }
    // ERROR_SHARING_VIOLATION / ERROR_LOCK_VIOLATION on Windows, EBUSY / ETXTBSY on Unix
    #[cfg(windows)]
    let codes: &[i32] = &[32, 33];
    #[cfg(not(windows))]
    let codes: &[i32] = &[16, 26];
    err.raw_os_error().is_some_and(|code| codes.contains(&code))
}
