//! Content-addressed storage of compiled artifacts.
//!
//! Each compiler identity owns a partition `<cache_root>/<identity digest>/`.
//! Inside it, the artifact for a source file is stored under the file's
//! content hash:
//!
//! - text output: `<hash>` holds gzip-compressed JSON
//!   `{"code", "mimeType", "dependentFiles"}`;
//! - binary output: `<hash>` holds the gzip-compressed raw bytes and
//!   `<hash>.info` holds plain JSON `{"mimeType", "dependentFiles"}`.
//!
//! Reads are fail-safe: a missing, truncated, or otherwise unreadable entry is
//! a cache miss, and the next successful compile overwrites it.

use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use recast_common::{block_on, Artifact, CompilerIdentity, ContentHash, Payload};
use serde::{Deserialize, Serialize};
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::codec::{gunzip, gzip, write_atomic};
use crate::error::CacheError;
use crate::fingerprint::{FileFingerprint, FingerprintCache};

/// Extension of the metadata sidecar written next to binary entries.
const INFO_EXT: &str = "info";

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TextEntry {
    code: String,
    mime_type: Option<String>,
    #[serde(default)]
    dependent_files: Vec<PathBuf>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct BinaryInfo {
    mime_type: Option<String>,
    #[serde(default)]
    dependent_files: Vec<PathBuf>,
}

type InFlight = Mutex<HashMap<ContentHash, Arc<OnceCell<Artifact>>>>;

/// Persistent artifact store for one compiler identity.
///
/// Concurrent [`ArtifactCache::get_or_fetch`] calls for the same content hash
/// share a single computation: the first caller compiles, the others await
/// its result. A failed computation is not remembered, so the next caller
/// retries.
pub struct ArtifactCache {
    root: PathBuf,
    identity: CompilerIdentity,
    fingerprints: Arc<FingerprintCache>,
    read_only: bool,
    in_flight: InFlight,
}

impl ArtifactCache {
    /// Creates the cache partition for `identity` under `cache_root`.
    ///
    /// No directories are created until the first write.
    pub fn new(
        cache_root: &Path,
        identity: CompilerIdentity,
        fingerprints: Arc<FingerprintCache>,
        read_only: bool,
    ) -> Self {
        Self {
            root: cache_root.join(identity.digest()),
            identity,
            fingerprints,
            read_only,
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the partition directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the compiler identity this partition belongs to.
    pub fn identity(&self) -> &CompilerIdentity {
        &self.identity
    }

    /// Returns `true` if misses are errors instead of compilations.
    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    /// Returns the path of the entry stored for `hash`.
    pub fn entry_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(hash.to_string())
    }

    fn info_path(&self, hash: &ContentHash) -> PathBuf {
        self.root.join(format!("{hash}.{INFO_EXT}"))
    }

    /// Looks up the fingerprint of `path` and the artifact cached for it.
    ///
    /// Fingerprint errors (unreadable source, unknown path in a frozen cache)
    /// propagate; problems reading the cache entry itself are a miss.
    pub async fn get(
        &self,
        path: &Path,
    ) -> Result<(FileFingerprint, Option<Artifact>), CacheError> {
        let fingerprint = self.fingerprints.get_fingerprint(path).await?;
        let artifact = self.lookup(path, &fingerprint.hash).await;
        Ok((fingerprint, artifact))
    }

    /// Blocking form of [`ArtifactCache::get`].
    pub fn get_blocking(
        &self,
        path: &Path,
    ) -> Result<(FileFingerprint, Option<Artifact>), CacheError> {
        block_on(self.get(path)).map_err(CacheError::io(path))?
    }

    async fn lookup(&self, path: &Path, hash: &ContentHash) -> Option<Artifact> {
        match self.load(hash).await {
            Ok(found) => found,
            Err(reason) => {
                warn!(
                    path = %path.display(),
                    entry = %self.entry_path(hash).display(),
                    %reason,
                    "discarding unreadable cache entry"
                );
                None
            }
        }
    }

    async fn load(&self, hash: &ContentHash) -> Result<Option<Artifact>, String> {
        let entry = self.entry_path(hash);
        let info = match tokio::fs::read(self.info_path(hash)).await {
            Ok(bytes) => Some(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(format!("reading metadata: {e}")),
        };
        let raw = match tokio::fs::read(&entry).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound && info.is_none() => {
                return Ok(None)
            }
            Err(e) => return Err(format!("reading entry: {e}")),
        };
        let body = gunzip(&raw).map_err(|e| format!("decompressing entry: {e}"))?;

        let artifact = match info {
            Some(info) => {
                let info: BinaryInfo = serde_json::from_slice(&info)
                    .map_err(|e| format!("decoding metadata: {e}"))?;
                Artifact {
                    payload: Payload::Binary(body),
                    mime_type: info.mime_type,
                    dependent_files: info.dependent_files,
                }
            }
            None => {
                let entry: TextEntry = serde_json::from_slice(&body)
                    .map_err(|e| format!("decoding entry: {e}"))?;
                Artifact {
                    payload: Payload::Code(entry.code),
                    mime_type: entry.mime_type,
                    dependent_files: entry.dependent_files,
                }
            }
        };
        Ok(Some(artifact))
    }

    /// Writes `artifact` as the entry for `fingerprint`'s content hash.
    pub async fn save(
        &self,
        fingerprint: &FileFingerprint,
        artifact: &Artifact,
    ) -> Result<(), CacheError> {
        let hash = &fingerprint.hash;
        let entry = self.entry_path(hash);
        match &artifact.payload {
            Payload::Code(code) => {
                let json = serde_json::to_vec(&TextEntry {
                    code: code.clone(),
                    mime_type: artifact.mime_type.clone(),
                    dependent_files: artifact.dependent_files.clone(),
                })
                .map_err(|e| CacheError::Serialization {
                    reason: e.to_string(),
                })?;
                let compressed = gzip(&json).map_err(CacheError::io(&entry))?;
                write_atomic(&entry, &compressed)
                    .await
                    .map_err(CacheError::io(&entry))?;
            }
            Payload::Binary(data) => {
                let compressed = gzip(data).map_err(CacheError::io(&entry))?;
                write_atomic(&entry, &compressed)
                    .await
                    .map_err(CacheError::io(&entry))?;
                let info_path = self.info_path(hash);
                let info = serde_json::to_vec(&BinaryInfo {
                    mime_type: artifact.mime_type.clone(),
                    dependent_files: artifact.dependent_files.clone(),
                })
                .map_err(|e| CacheError::Serialization {
                    reason: e.to_string(),
                })?;
                write_atomic(&info_path, &info)
                    .await
                    .map_err(CacheError::io(&info_path))?;
            }
        }
        debug!(entry = %entry.display(), compiler = %self.identity.name, "stored artifact");
        Ok(())
    }

    /// Blocking form of [`ArtifactCache::save`].
    pub fn save_blocking(
        &self,
        fingerprint: &FileFingerprint,
        artifact: &Artifact,
    ) -> Result<(), CacheError> {
        block_on(self.save(fingerprint, artifact)).map_err(CacheError::io(&self.root))?
    }

    /// Returns the cached artifact for `path`, computing it with `fetch` on a miss.
    ///
    /// `fetch` receives the absolute path and its fingerprint. Its result is
    /// persisted unless the file lies in the excluded tree. A read-only cache
    /// never calls `fetch` and fails with [`CacheError::NotPrecompiled`].
    pub async fn get_or_fetch<F, Fut, E>(&self, path: &Path, fetch: F) -> Result<Artifact, E>
    where
        F: FnOnce(PathBuf, FileFingerprint) -> Fut,
        Fut: Future<Output = Result<Artifact, E>>,
        E: From<CacheError>,
    {
        let fingerprint = self.fingerprints.get_fingerprint(path).await?;
        self.get_or_fetch_with(path, fingerprint, fetch).await
    }

    /// [`ArtifactCache::get_or_fetch`] for a fingerprint the caller already holds.
    ///
    /// `fetch` receives `fingerprint` as given, including any contents the
    /// lookup attached, and its result is stored under `fingerprint.hash`.
    pub async fn get_or_fetch_with<F, Fut, E>(
        &self,
        path: &Path,
        fingerprint: FileFingerprint,
        fetch: F,
    ) -> Result<Artifact, E>
    where
        F: FnOnce(PathBuf, FileFingerprint) -> Fut,
        Fut: Future<Output = Result<Artifact, E>>,
        E: From<CacheError>,
    {
        if let Some(artifact) = self.lookup(path, &fingerprint.hash).await {
            debug!(path = %path.display(), compiler = %self.identity.name, "cache hit");
            return Ok(artifact);
        }
        if self.read_only {
            return Err(CacheError::NotPrecompiled {
                path: path.to_path_buf(),
            }
            .into());
        }

        let hash = fingerprint.hash;
        let record = fingerprint.without_contents();
        let cell = self.in_flight_cell(hash);
        let result = cell
            .get_or_try_init(|| async move {
                debug!(path = %path.display(), compiler = %self.identity.name, "cache miss");
                let artifact = fetch(path.to_path_buf(), fingerprint).await?;
                if !record.is_in_excluded_tree {
                    self.save(&record, &artifact).await?;
                }
                Ok::<_, E>(artifact)
            })
            .await
            .cloned();
        self.release_cell(hash, &cell);
        result
    }

    /// Blocking form of [`ArtifactCache::get_or_fetch`].
    pub fn get_or_fetch_blocking<F, Fut, E>(&self, path: &Path, fetch: F) -> Result<Artifact, E>
    where
        F: FnOnce(PathBuf, FileFingerprint) -> Fut,
        Fut: Future<Output = Result<Artifact, E>>,
        E: From<CacheError>,
    {
        block_on(self.get_or_fetch(path, fetch))
            .map_err(|e| E::from(CacheError::io(path)(e)))?
    }

    fn in_flight(&self) -> MutexGuard<'_, HashMap<ContentHash, Arc<OnceCell<Artifact>>>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn in_flight_cell(&self, hash: ContentHash) -> Arc<OnceCell<Artifact>> {
        self.in_flight()
            .entry(hash)
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    fn release_cell(&self, hash: ContentHash, cell: &Arc<OnceCell<Artifact>>) {
        let mut in_flight = self.in_flight();
        if in_flight.get(&hash).is_some_and(|c| Arc::ptr_eq(c, cell)) {
            in_flight.remove(&hash);
        }
    }
}
