//! Error types for cache operations.

use std::path::PathBuf;

/// Errors that can occur during cache operations.
///
/// Reads of existing cache entries are fail-safe and never produce these:
/// a missing or corrupt entry is a cache miss. These errors cover source
/// file I/O, cache writes, and the strictness of frozen caches.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading a source file or writing the cache.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A serialization or deserialization error occurred.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },

    /// A frozen fingerprint cache was asked about a path it has never seen.
    #[error("{path} is not in the fingerprint snapshot; was it precompiled?")]
    NotInSnapshot {
        /// The requested path.
        path: PathBuf,
    },

    /// A read-only artifact cache has no entry for the requested file.
    #[error("asked to compile {path} in read-only mode, but it was not precompiled")]
    NotPrecompiled {
        /// The requested path.
        path: PathBuf,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CacheError::Io { path, source }
    }
}
