//! Per-file fingerprints and change detection.
//!
//! A [`FileFingerprint`] records the content hash of a source file together
//! with the classification flags that decide whether it is compiled or passed
//! through verbatim. The [`FingerprintCache`] keeps one record per path,
//! recomputing it only when the file's modification time or size changes.
//! A frozen cache never touches the filesystem and treats unknown paths as
//! errors, which is how a production process replays a development snapshot.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::UNIX_EPOCH;

use recast_common::{block_on, ContentHash, MimeTable};
use recast_config::FingerprintSettings;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::codec::{gunzip, gzip, write_atomic};
use crate::error::CacheError;

/// Classification record for one source file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileFingerprint {
    /// Hash of the file's raw bytes.
    pub hash: ContentHash,

    /// Modification time in nanoseconds since the Unix epoch.
    pub modified_ns: u64,

    /// File size in bytes.
    pub size: u64,

    /// Content is not text in the expected encoding.
    pub is_file_binary: bool,

    /// Content looks minified.
    pub is_minified: bool,

    /// Path lies under a vendored-dependency directory.
    pub is_in_excluded_tree: bool,

    /// Content ends with a source map reference to another file.
    pub has_external_source_map: bool,

    /// Text content, attached when the lookup had to read the file.
    #[serde(skip)]
    pub source_code: Option<String>,

    /// Binary content, attached when the lookup had to read the file.
    #[serde(skip)]
    pub binary_data: Option<Vec<u8>>,
}

impl FileFingerprint {
    /// Returns `true` if the file is cached verbatim and never compiled.
    pub fn is_passthrough(&self) -> bool {
        self.is_minified
            || self.is_in_excluded_tree
            || self.has_external_source_map
            || self.is_file_binary
    }

    pub(crate) fn without_contents(&self) -> Self {
        Self {
            source_code: None,
            binary_data: None,
            ..self.clone()
        }
    }
}

/// Rules used to classify files, derived from `[fingerprint]` settings.
#[derive(Debug, Clone)]
pub struct FingerprintPolicy {
    /// Directory names marking vendored trees.
    pub excluded_dirs: Vec<String>,
    /// Leading bytes sampled by the minification heuristic.
    pub minified_sample_bytes: usize,
    /// Average line length above which a sample is minified.
    pub minified_line_length: usize,
    /// Extension table used to spot inherently binary files.
    pub mime_table: MimeTable,
}

impl Default for FingerprintPolicy {
    fn default() -> Self {
        Self::from_settings(&FingerprintSettings::default(), MimeTable::default())
    }
}

impl FingerprintPolicy {
    /// Builds a policy from configuration.
    pub fn from_settings(settings: &FingerprintSettings, mime_table: MimeTable) -> Self {
        Self {
            excluded_dirs: settings.excluded_dirs.clone(),
            minified_sample_bytes: settings.minified_sample_bytes,
            minified_line_length: settings.minified_line_length,
            mime_table,
        }
    }

    /// Returns `true` if any component of `path` is an excluded directory.
    pub fn is_in_excluded_tree(&self, path: &Path) -> bool {
        path.components().any(|c| {
            let name = c.as_os_str().to_string_lossy();
            self.excluded_dirs
                .iter()
                .any(|dir| dir.eq_ignore_ascii_case(&name))
        })
    }

    /// Minification heuristic over the first `minified_sample_bytes` bytes.
    pub fn is_minified(&self, source: &str) -> bool {
        let sample = &source.as_bytes()[..source.len().min(self.minified_sample_bytes)];
        let newlines = sample.iter().filter(|&&b| b == b'\n').count();
        if newlines == 0 {
            return sample.len() > self.minified_line_length;
        }
        sample.len() > self.minified_line_length * newlines
    }
}

/// Returns `true` if the last non-blank line is a `sourceMappingURL` comment
/// pointing at another file rather than an inline `data:` URI.
pub fn has_external_source_map(source: &str) -> bool {
    let Some(last) = source.lines().rev().find(|l| !l.trim().is_empty()) else {
        return false;
    };
    let line = last.trim();
    let body = ["//#", "//@", "/*#", "/*@"]
        .iter()
        .find_map(|prefix| line.strip_prefix(prefix));
    let Some(body) = body else {
        return false;
    };
    let Some(url) = body.trim_start().strip_prefix("sourceMappingURL=") else {
        return false;
    };
    let url = url.trim_end_matches("*/").trim();
    !url.is_empty() && !url.starts_with("data:")
}

/// Serialized form of a fingerprint table.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FingerprintSnapshot {
    /// Application root the relative keys were computed against.
    pub app_root: PathBuf,
    /// Records keyed by app-root-relative path (absolute outside the root).
    pub entries: BTreeMap<String, FileFingerprint>,
}

/// Per-path fingerprint table shared by every artifact cache of one host.
pub struct FingerprintCache {
    app_root: PathBuf,
    policy: FingerprintPolicy,
    frozen: bool,
    entries: Mutex<HashMap<String, FileFingerprint>>,
}

impl FingerprintCache {
    /// Creates an empty, mutable fingerprint cache.
    pub fn new(app_root: &Path, policy: FingerprintPolicy) -> Self {
        Self {
            app_root: absolute(app_root),
            policy,
            frozen: false,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Restores a cache from a snapshot.
    ///
    /// Keys are interpreted relative to `app_root`, which may differ from the
    /// root the snapshot was taken under. A `frozen` cache never computes new
    /// records.
    pub fn from_snapshot(
        snapshot: FingerprintSnapshot,
        app_root: &Path,
        policy: FingerprintPolicy,
        frozen: bool,
    ) -> Self {
        Self {
            app_root: absolute(app_root),
            policy,
            frozen,
            entries: Mutex::new(snapshot.entries.into_iter().collect()),
        }
    }

    /// Loads a cache previously written by [`FingerprintCache::save`].
    pub async fn load_from_file(
        path: &Path,
        app_root: &Path,
        policy: FingerprintPolicy,
        frozen: bool,
    ) -> Result<Self, CacheError> {
        let raw = tokio::fs::read(path).await.map_err(CacheError::io(path))?;
        let json = gunzip(&raw).map_err(CacheError::io(path))?;
        let snapshot: FingerprintSnapshot =
            serde_json::from_slice(&json).map_err(|e| CacheError::Serialization {
                reason: e.to_string(),
            })?;
        Ok(Self::from_snapshot(snapshot, app_root, policy, frozen))
    }

    /// Returns `true` if this cache refuses to compute new records.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Returns the application root keys are relative to.
    pub fn app_root(&self) -> &Path {
        &self.app_root
    }

    /// Returns the classification policy.
    pub fn policy(&self) -> &FingerprintPolicy {
        &self.policy
    }

    /// Returns the number of known paths.
    pub fn len(&self) -> usize {
        self.table().len()
    }

    /// Returns `true` if no path has been fingerprinted.
    pub fn is_empty(&self) -> bool {
        self.table().is_empty()
    }

    /// Returns `true` if `path` lies under a vendored-dependency directory.
    pub fn is_in_excluded_tree(&self, path: &Path) -> bool {
        let abs = absolute(path);
        let scoped = abs.strip_prefix(&self.app_root).unwrap_or(&abs);
        self.policy.is_in_excluded_tree(scoped)
    }

    /// Returns the fingerprint for `path`, computing it if needed.
    ///
    /// A fresh computation attaches the file's contents so callers can avoid
    /// a second read. A frozen cache returns the stored record or fails with
    /// [`CacheError::NotInSnapshot`].
    pub async fn get_fingerprint(&self, path: &Path) -> Result<FileFingerprint, CacheError> {
        let abs = absolute(path);
        let key = self.key_for(&abs);

        if self.frozen {
            return self
                .table()
                .get(&key)
                .cloned()
                .ok_or(CacheError::NotInSnapshot { path: abs });
        }

        let meta = tokio::fs::metadata(&abs)
            .await
            .map_err(CacheError::io(&abs))?;
        let modified_ns = meta
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_nanos() as u64)
            .unwrap_or(0);

        if let Some(existing) = self.table().get(&key) {
            if existing.modified_ns == modified_ns && existing.size == meta.len() {
                return Ok(existing.clone());
            }
        }

        let bytes = tokio::fs::read(&abs).await.map_err(CacheError::io(&abs))?;
        let fingerprint = self.classify(&abs, bytes, modified_ns);
        debug!(
            path = %abs.display(),
            hash = %fingerprint.hash,
            passthrough = fingerprint.is_passthrough(),
            "fingerprinted"
        );
        self.table().insert(key, fingerprint.without_contents());
        Ok(fingerprint)
    }

    /// Blocking form of [`FingerprintCache::get_fingerprint`].
    pub fn get_fingerprint_blocking(&self, path: &Path) -> Result<FileFingerprint, CacheError> {
        block_on(self.get_fingerprint(path)).map_err(CacheError::io(path))?
    }

    /// Returns a serializable copy of the table.
    pub fn snapshot(&self) -> FingerprintSnapshot {
        FingerprintSnapshot {
            app_root: self.app_root.clone(),
            entries: self
                .table()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    /// Writes the table to `target` as gzip-compressed JSON.
    pub async fn save(&self, target: &Path) -> Result<(), CacheError> {
        let json = serde_json::to_vec(&self.snapshot()).map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;
        let compressed = gzip(&json).map_err(CacheError::io(target))?;
        write_atomic(target, &compressed)
            .await
            .map_err(CacheError::io(target))
    }

    fn table(&self) -> MutexGuard<'_, HashMap<String, FileFingerprint>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn key_for(&self, abs: &Path) -> String {
        match abs.strip_prefix(&self.app_root) {
            Ok(rel) => rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/"),
            Err(_) => abs.to_string_lossy().into_owned(),
        }
    }

    fn classify(&self, abs: &Path, bytes: Vec<u8>, modified_ns: u64) -> FileFingerprint {
        let hash = ContentHash::from_bytes(&bytes);
        let size = bytes.len() as u64;
        let is_in_excluded_tree = self.is_in_excluded_tree(abs);
        let binary_by_type = self
            .policy
            .mime_table
            .lookup(abs)
            .is_some_and(|m| MimeTable::is_binary_mime(&m));

        let (source_code, binary_data) = if binary_by_type {
            (None, Some(bytes))
        } else {
            match String::from_utf8(bytes) {
                Ok(text) => (Some(text), None),
                Err(e) => (None, Some(e.into_bytes())),
            }
        };

        let (is_minified, has_external_source_map) = match &source_code {
            Some(text) => (self.policy.is_minified(text), has_external_source_map(text)),
            None => (false, false),
        };

        FileFingerprint {
            hash,
            modified_ns,
            size,
            is_file_binary: binary_data.is_some(),
            is_minified,
            is_in_excluded_tree,
            has_external_source_map,
            source_code,
            binary_data,
        }
    }
}

fn absolute(path: &Path) -> PathBuf {
    recast_common::path::resolve(path).unwrap_or_else(|_| recast_common::path::normalize(path))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_cache(root: &Path) -> FingerprintCache {
        FingerprintCache::new(root, FingerprintPolicy::default())
    }

    #[test]
    fn minified_heuristic() {
        let policy = FingerprintPolicy::default();
        assert!(!policy.is_minified("function a() {\n  return 1;\n}\n"));
        assert!(!policy.is_minified("short"));
        assert!(policy.is_minified(&"x".repeat(81)));
        let long_lines = format!("{}\n{}\n", "a".repeat(120), "b".repeat(120));
        assert!(policy.is_minified(&long_lines));
    }

    #[test]
    fn minified_only_samples_prefix() {
        let policy = FingerprintPolicy::default();
        let source = format!("{}{}", "ok\n".repeat(400), "z".repeat(5000));
        assert!(!policy.is_minified(&source));
    }

    #[test]
    fn source_map_detection() {
        assert!(has_external_source_map("a();\n//# sourceMappingURL=a.js.map\n"));
        assert!(has_external_source_map("a();\n//@ sourceMappingURL=a.js.map"));
        assert!(has_external_source_map(".a{}\n/*# sourceMappingURL=a.css.map */\n"));
        assert!(!has_external_source_map(
            "a();\n//# sourceMappingURL=data:application/json;base64,e30=\n"
        ));
        assert!(!has_external_source_map("a();\n"));
        assert!(!has_external_source_map("//# sourceMappingURL=a.map\nmore();\n"));
    }

    #[test]
    fn excluded_tree_detection() {
        let policy = FingerprintPolicy::default();
        assert!(policy.is_in_excluded_tree(Path::new("/app/node_modules/lodash/index.js")));
        assert!(!policy.is_in_excluded_tree(Path::new("/app/src/node_modules.js")));
    }

    #[tokio::test]
    async fn text_file_fingerprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("main.js");
        std::fs::write(&path, "let a = 1;\n").unwrap();

        let cache = make_cache(dir.path());
        let fp = cache.get_fingerprint(&path).await.unwrap();
        assert_eq!(fp.hash, ContentHash::from_bytes(b"let a = 1;\n"));
        assert_eq!(fp.source_code.as_deref(), Some("let a = 1;\n"));
        assert!(!fp.is_passthrough());
        assert_eq!(fp.size, 11);
    }

    #[tokio::test]
    async fn binary_by_content_and_by_type() {
        let dir = tempfile::tempdir().unwrap();
        let invalid_utf8 = dir.path().join("blob.dat");
        std::fs::write(&invalid_utf8, [0xff, 0xfe, 0x00, 0x80]).unwrap();
        let png = dir.path().join("icon.png");
        std::fs::write(&png, b"not really a png").unwrap();

        let cache = make_cache(dir.path());
        let a = cache.get_fingerprint(&invalid_utf8).await.unwrap();
        assert!(a.is_file_binary);
        assert_eq!(a.binary_data.as_deref(), Some(&[0xff, 0xfe, 0x00, 0x80][..]));
        let b = cache.get_fingerprint(&png).await.unwrap();
        assert!(b.is_file_binary);
        assert!(b.is_passthrough());
    }

    #[tokio::test]
    async fn excluded_tree_relative_to_app_root() {
        let dir = tempfile::tempdir().unwrap();
        let vendored = dir.path().join("node_modules").join("dep");
        std::fs::create_dir_all(&vendored).unwrap();
        let path = vendored.join("index.js");
        std::fs::write(&path, "module.exports = 1;\n").unwrap();

        let cache = make_cache(dir.path());
        assert!(cache.is_in_excluded_tree(&path));
        let fp = cache.get_fingerprint(&path).await.unwrap();
        assert!(fp.is_in_excluded_tree);
    }

    #[tokio::test]
    async fn parent_components_resolve_to_one_entry() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("node_modules")).unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        let plain = dir.path().join("a.js");
        std::fs::write(&plain, "a();\n").unwrap();
        let through_vendor = dir.path().join("node_modules").join("..").join("a.js");
        let through_src = dir.path().join("src").join(".").join("..").join("a.js");

        let cache = make_cache(dir.path());
        assert!(!cache.is_in_excluded_tree(&through_vendor));
        let fp = cache.get_fingerprint(&through_vendor).await.unwrap();
        assert!(!fp.is_in_excluded_tree);
        cache.get_fingerprint(&through_src).await.unwrap();
        cache.get_fingerprint(&plain).await.unwrap();
        assert_eq!(cache.len(), 1);
        assert!(cache.snapshot().entries.contains_key("a.js"));
    }

    #[tokio::test]
    async fn unchanged_file_reuses_record_without_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a();\n").unwrap();

        let cache = make_cache(dir.path());
        let first = cache.get_fingerprint(&path).await.unwrap();
        let second = cache.get_fingerprint(&path).await.unwrap();
        assert_eq!(first.hash, second.hash);
        assert!(second.source_code.is_none());
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn changed_file_is_rehashed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a();\n").unwrap();

        let cache = make_cache(dir.path());
        let before = cache.get_fingerprint(&path).await.unwrap();
        std::fs::write(&path, "a(); b();\n").unwrap();
        let after = cache.get_fingerprint(&path).await.unwrap();
        assert_ne!(before.hash, after.hash);
        assert_eq!(after.source_code.as_deref(), Some("a(); b();\n"));
    }

    #[tokio::test]
    async fn missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let cache = make_cache(dir.path());
        let err = cache
            .get_fingerprint(&dir.path().join("nope.js"))
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Io { .. }));
    }

    #[tokio::test]
    async fn frozen_cache_rejects_unknown_paths() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a();\n").unwrap();

        let cache = FingerprintCache::from_snapshot(
            FingerprintSnapshot::default(),
            dir.path(),
            FingerprintPolicy::default(),
            true,
        );
        let err = cache.get_fingerprint(&path).await.unwrap_err();
        assert!(matches!(err, CacheError::NotInSnapshot { .. }));
    }

    #[tokio::test]
    async fn frozen_cache_serves_snapshot_without_filesystem() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a();\n").unwrap();
        let live = make_cache(dir.path());
        let original = live.get_fingerprint(&path).await.unwrap();

        std::fs::remove_file(&path).unwrap();
        let frozen = FingerprintCache::from_snapshot(
            live.snapshot(),
            dir.path(),
            FingerprintPolicy::default(),
            true,
        );
        let restored = frozen.get_fingerprint(&path).await.unwrap();
        assert_eq!(restored.hash, original.hash);
    }

    #[tokio::test]
    async fn snapshot_keys_are_relative_and_relocatable() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(first.path().join("src")).unwrap();
        std::fs::write(first.path().join("src").join("a.js"), "a();\n").unwrap();

        let live = make_cache(first.path());
        live.get_fingerprint(&first.path().join("src").join("a.js"))
            .await
            .unwrap();
        let snapshot = live.snapshot();
        assert!(snapshot.entries.contains_key("src/a.js"));

        let moved = FingerprintCache::from_snapshot(
            snapshot,
            second.path(),
            FingerprintPolicy::default(),
            true,
        );
        assert!(moved
            .get_fingerprint(&second.path().join("src").join("a.js"))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.css");
        std::fs::write(&path, ".a { color: red; }\n").unwrap();
        let cache = make_cache(dir.path());
        let fp = cache.get_fingerprint(&path).await.unwrap();

        let target = dir.path().join("cache").join("fingerprints.json.gz");
        cache.save(&target).await.unwrap();
        let loaded = FingerprintCache::load_from_file(
            &target,
            dir.path(),
            FingerprintPolicy::default(),
            true,
        )
        .await
        .unwrap();
        assert!(loaded.is_frozen());
        assert_eq!(loaded.get_fingerprint(&path).await.unwrap().hash, fp.hash);
    }

    #[test]
    fn blocking_form_matches_async() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.js");
        std::fs::write(&path, "a();\n").unwrap();
        let cache = make_cache(dir.path());
        let fp = cache.get_fingerprint_blocking(&path).unwrap();
        assert_eq!(fp.hash, ContentHash::from_bytes(b"a();\n"));
    }
}
