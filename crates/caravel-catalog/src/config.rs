use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::ConfigError;

pub const CONFIG_ENV: &str = "CARAVEL_CONFIG";

/// Client-side catalog configuration.
///
/// `source` is either an HTTP(S) GraphQL endpoint or a path/`file://` URL to
/// a JSON snapshot of the installation list.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CatalogConfig {
    pub source: String,
    #[serde(default)]
    pub token: Option<String>,
}

impl CatalogConfig {
    /// Load the configuration from `CARAVEL_CONFIG` or the default location
    /// under the user's configuration directory.
    ///
    /// # Errors
    ///
    /// Returns an error when no configuration file exists or it cannot be
    /// read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        let path = match std::env::var_os(CONFIG_ENV) {
            Some(value) => PathBuf::from(value),
            None => default_config_path()?,
        };
        Self::from_path(&path)
    }

    /// Load the configuration from an explicit path.
    ///
    /// # Errors
    ///
    /// Returns an error when the file is missing, unreadable, or not valid
    /// JSON.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::Missing {
                path: path.to_path_buf(),
            });
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Decode {
            path: path.to_path_buf(),
            source,
        })
    }
}

fn default_config_path() -> Result<PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("caravel").join("config.json"))
        .ok_or(ConfigError::NoConfigDir)
}
