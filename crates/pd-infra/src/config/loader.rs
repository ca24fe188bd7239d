//! # Settings Loader / 配置加载器
//!
//! Reads [`DestinationSettings`] from a TOML file. Keys missing from the file
//! keep their defaults; a missing file yields the default settings.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use pd_core::DestinationSettings;
use tracing::info;

const APP_DIR: &str = "printdest";

/// Load settings from `path`.
///
/// # Errors / 错误
///
/// Returns error if the file exists but cannot be read or is not valid TOML
/// for the settings shape.
pub fn load_settings(path: &Path) -> Result<DestinationSettings> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!(path = %path.display(), "config file not found, using defaults");
            return Ok(DestinationSettings::default());
        }
        Err(e) => {
            return Err(e)
                .with_context(|| format!("Failed to read config file: {}", path.display()))
        }
    };
    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config as TOML: {}", path.display()))
}

/// `<config dir>/printdest/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
}

/// `<local data dir>/printdest/selection.json`
pub fn default_state_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|dir| dir.join(APP_DIR).join("selection.json"))
}
