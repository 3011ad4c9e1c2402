//! Configuration types deserialized from `recast.toml`.

use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// The top-level configuration parsed from `recast.toml`.
///
/// Every section is optional; a missing file or an empty one yields the
/// defaults described on each field.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RecastConfig {
    /// Where the cache lives and which directory is the application root.
    pub cache: CacheSettings,
    /// File classification thresholds.
    pub fingerprint: FingerprintSettings,
    /// Compiler routing and chaining policy.
    pub dispatch: DispatchSettings,
    /// Extension to MIME type overrides (e.g. `"less" = "text/less"`).
    pub mime_types: BTreeMap<String, String>,
}

/// Cache location settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Cache root directory, relative to the project directory unless absolute.
    pub root: PathBuf,
    /// Application root that fingerprint keys are made relative to.
    pub app_root: PathBuf,
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self {
            root: PathBuf::from(".recast-cache"),
            app_root: PathBuf::from("."),
        }
    }
}

/// Thresholds and rules for classifying source files.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FingerprintSettings {
    /// Directory names whose contents are vendored and never compiled.
    pub excluded_dirs: Vec<String>,
    /// Number of leading bytes sampled for the minification heuristic.
    pub minified_sample_bytes: usize,
    /// Average line length above which a sample counts as minified.
    pub minified_line_length: usize,
}

impl Default for FingerprintSettings {
    fn default() -> Self {
        Self {
            excluded_dirs: vec!["node_modules".to_string()],
            minified_sample_bytes: 1024,
            minified_line_length: 80,
        }
    }
}

/// Compiler dispatch policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchSettings {
    /// MIME types that are directly loadable and end a translation chain.
    pub terminal_mime_types: Vec<String>,
    /// The host platform's markup MIME type.
    pub markup_mime_type: String,
    /// Whether markup generated from non-markup input is fed back through the
    /// markup compiler so embedded blocks get compiled.
    pub rechain_generated_markup: bool,
    /// Whether files with no registered compiler fall back to pass-through.
    pub fallback_to_passthrough: bool,
    /// Maximum number of translation steps for one file.
    pub max_chain_depth: usize,
    /// Maximum number of files compiled concurrently by a bulk pass.
    pub concurrency: usize,
}

impl Default for DispatchSettings {
    fn default() -> Self {
        Self {
            terminal_mime_types: [
                "application/javascript",
                "text/html",
                "text/css",
                "image/svg+xml",
                "application/json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            markup_mime_type: "text/html".to_string(),
            rechain_generated_markup: true,
            fallback_to_passthrough: true,
            max_chain_depth: 16,
            concurrency: 16,
        }
    }
}

impl RecastConfig {
    /// Resolves relative cache and app roots against `project_dir`.
    pub fn resolve_paths(mut self, project_dir: &Path) -> Self {
        if self.cache.root.is_relative() {
            self.cache.root = project_dir.join(&self.cache.root);
        }
        if self.cache.app_root.is_relative() {
            self.cache.app_root = project_dir.join(&self.cache.app_root);
        }
        self
    }
}
