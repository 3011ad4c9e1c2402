//! Compiler identities that name cache partitions.

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::digest::digest;

/// The `{name, version, options}` triple of one compiler instance.
///
/// Two compilers with equal identities must produce byte-identical output for
/// equal input; the artifact cache relies on this to share results across
/// processes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerIdentity {
    /// Stable identifier declared by the compiler.
    pub name: String,

    /// Version of the underlying translator.
    pub version: String,

    /// Options that affect the translator's output.
    pub options: Value,
}

impl CompilerIdentity {
    /// Creates an identity from its parts.
    pub fn new(name: impl Into<String>, version: impl Into<String>, options: Value) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            options,
        }
    }

    /// Returns the stable digest naming this identity's cache partition.
    pub fn digest(&self) -> String {
        digest(&json!({
            "name": self.name,
            "version": self.version,
            "options": self.options,
        }))
    }
}
