//! Errors reported by the compiler host.

use std::path::PathBuf;

use recast_cache::CacheError;
use recast_compiler::CompileError;

/// Errors returned by [`CompilerHost`](crate::CompilerHost) operations.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// A compiler rejected its input.
    #[error(transparent)]
    Compile(CompileError),

    /// No compiler is registered for the file's type and no fallback is configured.
    #[error("no compiler found for {path} (type {})", .mime_type.as_deref().unwrap_or("unknown"))]
    NoCompilerFound {
        /// The file being compiled.
        path: PathBuf,
        /// The type inferred from the file's extension, if any.
        mime_type: Option<String>,
    },

    /// A compiler produced an intermediate format nothing else accepts.
    #[error("compiling {path} produced {mime_type}, which no compiler accepts")]
    UnhandledIntermediateFormat {
        /// The file being compiled.
        path: PathBuf,
        /// The intermediate MIME type.
        mime_type: String,
    },

    /// The translation chain did not reach a terminal format in time.
    #[error("compiling {path} did not reach a terminal format after {depth} steps")]
    TranslationCycle {
        /// The file being compiled.
        path: PathBuf,
        /// The configured chain bound.
        depth: usize,
    },

    /// A read-only stand-in compiler was asked to compile.
    #[error("compiler '{compiler}' is read-only and cannot compile {path}")]
    ReadOnlyViolation {
        /// Name of the stand-in compiler.
        compiler: String,
        /// The file being compiled.
        path: PathBuf,
    },

    /// A read-only host has no cached result for the file.
    #[error("asked to compile {path} in read-only mode, but it was not precompiled")]
    NotPrecompiled {
        /// The requested path.
        path: PathBuf,
    },

    /// The source changed between fingerprinting and compiling.
    #[error("{path} changed while it was being compiled")]
    SourceChanged {
        /// The file being compiled.
        path: PathBuf,
    },

    /// A cache operation failed.
    #[error(transparent)]
    Cache(CacheError),

    /// An I/O error outside the caches.
    #[error("I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The saved configuration could not be decoded.
    #[error("invalid saved compiler configuration: {reason}")]
    Snapshot {
        /// Description of the decoding failure.
        reason: String,
    },
}

impl HostError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| HostError::Io { path, source }
    }
}

impl From<CacheError> for HostError {
    fn from(err: CacheError) -> Self {
        match err {
            CacheError::NotPrecompiled { path } | CacheError::NotInSnapshot { path } => {
                HostError::NotPrecompiled { path }
            }
            other => HostError::Cache(other),
        }
    }
}

impl From<CompileError> for HostError {
    fn from(err: CompileError) -> Self {
        match err {
            CompileError::ReadOnlyViolation { compiler, path } => {
                HostError::ReadOnlyViolation { compiler, path }
            }
            other => HostError::Compile(other),
        }
    }
}
