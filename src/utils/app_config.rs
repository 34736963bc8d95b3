/// Application configuration management
/// Stores user defaults in ~/.config/volume-backup/config.toml
///
/// Every field is optional; command-line flags take precedence over the file
/// and the file over built-in defaults.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::utils::constants::{CONFIG_DIR_NAME, CONFIG_FILE_NAME};

#[derive(Debug, Default, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    pub backup_dir: Option<PathBuf>,
    pub log_dir: Option<PathBuf>,
    pub helper_image: Option<String>,
    pub stop_timeout_secs: Option<u64>,
    pub stop_containers: Option<bool>,
}

impl AppConfig {
    /// Get config file path
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow!("Could not determine the user config directory"))?;
        Ok(config_dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load configuration. An explicit path must exist; the default path is
    /// optional and falls back to built-in defaults.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::load_from(path),
            None => {
                let path = match Self::config_path() {
                    Ok(path) => path,
                    Err(_) => return Ok(Self::default()),
                };
                if path.exists() {
                    Self::load_from(&path)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let config: Self = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        Ok(config)
    }
}
