//! Errors reported by compilers.

use std::path::PathBuf;

/// A translation failure reported by a compiler.
///
/// Failures are never cached: the next request for the same file runs the
/// compiler again.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CompileError {
    /// The translator rejected the input; `diagnostic` is its own message.
    #[error("{compiler} failed to compile {path}: {diagnostic}")]
    Failed {
        /// Name of the compiler.
        compiler: String,
        /// The file being compiled.
        path: PathBuf,
        /// Diagnostic text from the translator, passed through unchanged.
        diagnostic: String,
    },

    /// A read-only stand-in was asked to do real work.
    #[error("compiler '{compiler}' is read-only and cannot compile {path}")]
    ReadOnlyViolation {
        /// Name of the compiler.
        compiler: String,
        /// The file being compiled.
        path: PathBuf,
    },
}

impl CompileError {
    /// Creates a [`CompileError::Failed`].
    pub fn failed(
        compiler: impl Into<String>,
        path: impl Into<PathBuf>,
        diagnostic: impl Into<String>,
    ) -> Self {
        Self::Failed {
            compiler: compiler.into(),
            path: path.into(),
            diagnostic: diagnostic.into(),
        }
    }
}
