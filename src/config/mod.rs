//! Configuration management for Hoard

pub mod schema;

pub use schema::{CacheConfig, ComponentConfig, Config, GeneralConfig, OriginConfig};

use crate::error::{HoardError, HoardResult};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

/// Name of the project configuration file
pub const CONFIG_FILE: &str = "hoard.toml";

/// Configuration manager
pub struct ConfigManager {
    config_path: PathBuf,
    explicit: bool,
}

impl ConfigManager {
    /// Discover `hoard.toml` from `start` upwards, falling back to
    /// `start/hoard.toml`
    pub fn discover(start: &Path) -> Self {
        let config_path =
            Self::find_local_config(start).unwrap_or_else(|| start.join(CONFIG_FILE));
        Self {
            config_path,
            explicit: false,
        }
    }

    /// Create a config manager with a custom path; the file must exist
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            config_path: path,
            explicit: true,
        }
    }

    /// Walk up from `start` looking for `hoard.toml`
    pub fn find_local_config(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.is_file())
    }

    /// Load configuration, using defaults if a discovered file is absent
    pub async fn load(&self) -> HoardResult<Config> {
        if !self.config_path.exists() {
            if self.explicit {
                return Err(HoardError::ConfigNotFound(self.config_path.clone()));
            }
            debug!("Config file not found, using defaults");
            return Ok(Config::default());
        }

        self.load_from_file(&self.config_path).await
    }

    /// Load configuration from a specific file
    pub async fn load_from_file(&self, path: &Path) -> HoardResult<Config> {
        let content = fs::read_to_string(path)
            .await
            .map_err(|e| HoardError::io(format!("reading config from {}", path.display()), e))?;

        let mut config: Config =
            toml::from_str(&content).map_err(|e| HoardError::ConfigInvalid {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_paths(base);
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Get the config file path
    pub fn path(&self) -> &Path {
        &self.config_path
    }
}
