//! Saved host configuration.
//!
//! The snapshot is the hand-off between a development pass and a later
//! read-only pass in another process. It lives at
//! `<cache_root>/compiler-info.json.gz` and holds the fingerprint table plus
//! the identity of every routed compiler, which is all a read-only host needs
//! to find the cached results.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use recast_cache::codec::{gunzip, gzip, write_atomic};
use recast_cache::FingerprintSnapshot;
use recast_common::{block_on, CompilerIdentity};
use recast_compiler::{Compiler, ReadOnlyCompiler};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::HostError;

/// Name of the snapshot file within the cache root.
pub const SNAPSHOT_FILE: &str = "compiler-info.json.gz";

/// Identity of one saved compiler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilerSnapshot {
    /// Stable compiler name.
    pub name: String,
    /// Every MIME type the compiler declared.
    pub input_mime_types: Vec<String>,
    /// Options that affect output.
    pub compiler_options: Value,
    /// Translator version.
    pub compiler_version: String,
}

impl CompilerSnapshot {
    /// Captures the identity of a live compiler.
    pub fn from_compiler(compiler: &dyn Compiler) -> Self {
        let identity = compiler.identity();
        Self {
            name: identity.name,
            input_mime_types: compiler.input_mime_types(),
            compiler_options: identity.options,
            compiler_version: identity.version,
        }
    }

    /// Returns the identity naming this compiler's cache partition.
    pub fn identity(&self) -> CompilerIdentity {
        CompilerIdentity::new(
            self.name.clone(),
            self.compiler_version.clone(),
            self.compiler_options.clone(),
        )
    }

    /// Builds a stand-in that carries this identity and refuses to compile.
    pub fn to_read_only(&self) -> ReadOnlyCompiler {
        ReadOnlyCompiler::new(
            self.name.clone(),
            self.compiler_version.clone(),
            self.compiler_options.clone(),
            self.input_mime_types.clone(),
        )
    }
}

/// Everything a host needs to replay earlier results.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostSnapshot {
    /// The fingerprint table.
    pub file_change_cache: FingerprintSnapshot,
    /// Routed compilers keyed by the MIME type they were routed under.
    pub compilers: BTreeMap<String, CompilerSnapshot>,
    /// The pass-through identity.
    pub passthrough: CompilerSnapshot,
}

impl HostSnapshot {
    /// Returns the snapshot location under `cache_root`.
    pub fn path(cache_root: &Path) -> PathBuf {
        cache_root.join(SNAPSHOT_FILE)
    }

    /// Reads the snapshot saved under `cache_root`.
    pub async fn load(cache_root: &Path) -> Result<Self, HostError> {
        let path = Self::path(cache_root);
        let raw = tokio::fs::read(&path).await.map_err(HostError::io(&path))?;
        let json = gunzip(&raw).map_err(HostError::io(&path))?;
        serde_json::from_slice(&json).map_err(|e| HostError::Snapshot {
            reason: format!("{}: {e}", path.display()),
        })
    }

    /// Blocking form of [`HostSnapshot::load`].
    pub fn load_blocking(cache_root: &Path) -> Result<Self, HostError> {
        block_on(Self::load(cache_root)).map_err(HostError::io(cache_root))?
    }

    /// Writes the snapshot under `cache_root`, replacing any previous one.
    ///
    /// Returns the path written.
    pub async fn save(&self, cache_root: &Path) -> Result<PathBuf, HostError> {
        let path = Self::path(cache_root);
        let json = serde_json::to_vec(self).map_err(|e| HostError::Snapshot {
            reason: e.to_string(),
        })?;
        let compressed = gzip(&json).map_err(HostError::io(&path))?;
        write_atomic(&path, &compressed)
            .await
            .map_err(HostError::io(&path))?;
        Ok(path)
    }
}
