//! Project discovery and host settings shared by the commands.

use std::path::{Path, PathBuf};

use recast_config::{load_config_from_str, load_config_or_default, CONFIG_FILE};
use recast_host::HostSettings;

use crate::GlobalArgs;

/// Walks up from `start` looking for `recast.toml`.
///
/// Falls back to `start` itself when no ancestor has one; the configuration
/// file is optional.
pub fn find_project_root(start: &Path) -> PathBuf {
    start
        .ancestors()
        .find(|dir| dir.join(CONFIG_FILE).is_file())
        .unwrap_or(start)
        .to_path_buf()
}

/// Determines the project directory from the global flags.
///
/// `--project` wins, then the directory of `--config`, then the nearest
/// ancestor of the working directory holding `recast.toml`.
pub fn resolve_project_dir(global: &GlobalArgs) -> Result<PathBuf, Box<dyn std::error::Error>> {
    if let Some(ref dir) = global.project {
        return Ok(dir.clone());
    }
    if let Some(ref config) = global.config {
        return Ok(config
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from(".")));
    }
    Ok(find_project_root(&std::env::current_dir()?))
}

/// Loads the configuration and turns it into host settings.
pub fn load_settings(global: &GlobalArgs) -> Result<HostSettings, Box<dyn std::error::Error>> {
    let project_dir = resolve_project_dir(global)?;
    let config = match global.config {
        Some(ref path) => {
            let content = std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read {}: {e}", path.display()))?;
            load_config_from_str(&content)?.resolve_paths(&project_dir)
        }
        None => load_config_or_default(&project_dir)?,
    };
    let mut settings = HostSettings::from_config(&config);
    if let Some(ref cache_dir) = global.cache_dir {
        settings.cache_root = cache_dir.clone();
    }
    Ok(settings)
}
