//! Compiled output of a single source file.

use std::path::PathBuf;

/// The body of an artifact: text code or an opaque binary payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    /// UTF-8 text output.
    Code(String),
    /// Raw bytes that are never translated.
    Binary(Vec<u8>),
}

/// Compiled output plus the metadata the cache stores alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    /// The compiled code or binary data.
    pub payload: Payload,

    /// MIME type of the payload. `None` means the producer did not declare one,
    /// which the host treats as pass-through output.
    pub mime_type: Option<String>,

    /// Auxiliary files that fed into this output (e.g. `@import` targets).
    /// Informational only; they never invalidate a cache entry.
    pub dependent_files: Vec<PathBuf>,
}

impl Artifact {
    /// Creates a text artifact with no dependent files.
    pub fn code(code: impl Into<String>, mime_type: Option<String>) -> Self {
        Self {
            payload: Payload::Code(code.into()),
            mime_type,
            dependent_files: Vec::new(),
        }
    }

    /// Creates a binary artifact with no dependent files.
    pub fn binary(data: Vec<u8>, mime_type: Option<String>) -> Self {
        Self {
            payload: Payload::Binary(data),
            mime_type,
            dependent_files: Vec::new(),
        }
    }

    /// Replaces the dependent file list.
    pub fn with_dependent_files(mut self, dependent_files: Vec<PathBuf>) -> Self {
        self.dependent_files = dependent_files;
        self
    }

    /// Returns the text payload, or `None` for binary artifacts.
    pub fn code_str(&self) -> Option<&str> {
        match &self.payload {
            Payload::Code(code) => Some(code),
            Payload::Binary(_) => None,
        }
    }

    /// Returns the payload as bytes regardless of kind.
    pub fn as_bytes(&self) -> &[u8] {
        match &self.payload {
            Payload::Code(code) => code.as_bytes(),
            Payload::Binary(data) => data,
        }
    }

    /// Returns `true` if the payload is binary.
    pub fn is_binary(&self) -> bool {
        matches!(self.payload, Payload::Binary(_))
    }
}
