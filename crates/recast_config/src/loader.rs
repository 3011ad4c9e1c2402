//! Configuration file loading and validation.

use crate::error::ConfigError;
use crate::types::RecastConfig;
use std::path::Path;

/// Name of the configuration file at the project root.
pub const CONFIG_FILE: &str = "recast.toml";

/// Loads and validates `recast.toml` from a project directory.
///
/// The file must exist. Relative paths inside it are resolved against
/// `project_dir`.
pub fn load_config(project_dir: &Path) -> Result<RecastConfig, ConfigError> {
    let content = std::fs::read_to_string(project_dir.join(CONFIG_FILE))?;
    Ok(load_config_from_str(&content)?.resolve_paths(project_dir))
}

/// Loads `recast.toml` if present, otherwise returns the defaults.
pub fn load_config_or_default(project_dir: &Path) -> Result<RecastConfig, ConfigError> {
    if project_dir.join(CONFIG_FILE).is_file() {
        load_config(project_dir)
    } else {
        Ok(RecastConfig::default().resolve_paths(project_dir))
    }
}

/// Parses and validates a `recast.toml` configuration from a string.
///
/// Paths are left as written; see [`RecastConfig::resolve_paths`].
pub fn load_config_from_str(content: &str) -> Result<RecastConfig, ConfigError> {
    let config: RecastConfig =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &RecastConfig) -> Result<(), ConfigError> {
    let fp = &config.fingerprint;
    if fp.minified_sample_bytes == 0 {
        return Err(ConfigError::ValidationError(
            "fingerprint.minified_sample_bytes must be positive".to_string(),
        ));
    }
    if fp.minified_line_length == 0 {
        return Err(ConfigError::ValidationError(
            "fingerprint.minified_line_length must be positive".to_string(),
        ));
    }
    let dispatch = &config.dispatch;
    if dispatch.max_chain_depth == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.max_chain_depth must be at least 1".to_string(),
        ));
    }
    if dispatch.concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "dispatch.concurrency must be at least 1".to_string(),
        ));
    }
    if dispatch.terminal_mime_types.is_empty() {
        return Err(ConfigError::ValidationError(
            "dispatch.terminal_mime_types must not be empty".to_string(),
        ));
    }
    for (ext, mime) in &config.mime_types {
        let bare = ext.trim_start_matches('.');
        if bare.is_empty() || bare.contains(['/', '\\']) {
            return Err(ConfigError::ValidationError(format!(
                "mime_types key '{ext}' is not a file extension"
            )));
        }
        if !mime.contains('/') {
            return Err(ConfigError::ValidationError(format!(
                "mime_types value '{mime}' for '{ext}' is not a MIME type"
            )));
        }
    }
    Ok(())
}
