//! Host settings derived from `recast.toml`.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use recast_cache::FingerprintPolicy;
use recast_common::MimeTable;
use recast_config::{DispatchSettings, RecastConfig};

/// Rules deciding where a translation chain ends.
#[derive(Debug, Clone)]
pub struct DispatchPolicy {
    /// Directly loadable output types.
    pub terminal_mime_types: BTreeSet<String>,
    /// The platform's markup type.
    pub markup_mime_type: String,
    /// Whether markup generated from non-markup input goes through the markup
    /// compiler once more.
    pub rechain_generated_markup: bool,
    /// Whether files of unregistered types are passed through unchanged.
    pub fallback_to_passthrough: bool,
    /// Maximum number of translation steps for one file.
    pub max_chain_depth: usize,
    /// Maximum number of files compiled at once by a bulk pass.
    pub concurrency: usize,
}

impl Default for DispatchPolicy {
    fn default() -> Self {
        Self::from_settings(&DispatchSettings::default())
    }
}

impl DispatchPolicy {
    /// Builds the policy from its configuration section.
    pub fn from_settings(settings: &DispatchSettings) -> Self {
        Self {
            terminal_mime_types: settings.terminal_mime_types.iter().cloned().collect(),
            markup_mime_type: settings.markup_mime_type.clone(),
            rechain_generated_markup: settings.rechain_generated_markup,
            fallback_to_passthrough: settings.fallback_to_passthrough,
            max_chain_depth: settings.max_chain_depth,
            concurrency: settings.concurrency,
        }
    }

    /// Returns `true` if a step that turned `input` into `output` ends the chain.
    ///
    /// Untyped and plain-text output always ends it. Freshly generated markup
    /// is re-entered when `markup_compiler_registered`, so embedded blocks
    /// get compiled.
    pub fn is_terminal(
        &self,
        input: Option<&str>,
        output: &str,
        markup_compiler_registered: bool,
    ) -> bool {
        if output.is_empty() || output == "text/plain" {
            return true;
        }
        if !self.terminal_mime_types.contains(output) {
            return false;
        }
        let generated_markup =
            output == self.markup_mime_type && input != Some(self.markup_mime_type.as_str());
        !(generated_markup && self.rechain_generated_markup && markup_compiler_registered)
    }
}

/// Everything a [`CompilerHost`](crate::CompilerHost) needs besides compilers.
#[derive(Debug, Clone)]
pub struct HostSettings {
    /// Directory holding the snapshot and every cache partition.
    pub cache_root: PathBuf,
    /// Root that fingerprint keys are relative to.
    pub app_root: PathBuf,
    /// File classification rules, including the MIME table.
    pub fingerprint_policy: FingerprintPolicy,
    /// Chain termination and bulk compilation rules.
    pub dispatch: DispatchPolicy,
}

impl HostSettings {
    /// Creates settings with default policies.
    pub fn new(cache_root: impl Into<PathBuf>, app_root: impl Into<PathBuf>) -> Self {
        Self {
            cache_root: cache_root.into(),
            app_root: app_root.into(),
            fingerprint_policy: FingerprintPolicy::default(),
            dispatch: DispatchPolicy::default(),
        }
    }

    /// Builds settings from a loaded configuration.
    ///
    /// Paths are taken as they are; call
    /// [`RecastConfig::resolve_paths`] first to anchor relative ones.
    pub fn from_config(config: &RecastConfig) -> Self {
        let mime_table = MimeTable::with_overrides(
            config
                .mime_types
                .iter()
                .map(|(ext, mime)| (ext.as_str(), mime.as_str())),
        );
        Self {
            cache_root: config.cache.root.clone(),
            app_root: config.cache.app_root.clone(),
            fingerprint_policy: FingerprintPolicy::from_settings(&config.fingerprint, mime_table),
            dispatch: DispatchPolicy::from_settings(&config.dispatch),
        }
    }

    /// Returns the extension table.
    pub fn mime_table(&self) -> &MimeTable {
        &self.fingerprint_policy.mime_table
    }

    /// Returns the cache root.
    pub fn cache_root(&self) -> &Path {
        &self.cache_root
    }
}
