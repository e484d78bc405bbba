// TOML config adapter - Reads and writes the framecut configuration file

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::config_initialization::AppConfig;
use crate::domain::errors::ConfigError;

/// Configuration file on disk
#[derive(Debug, Clone)]
pub struct TomlConfigStore {
    path: PathBuf,
}

impl TomlConfigStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `path`, or at the per-user default location
    pub fn at(path: Option<PathBuf>) -> Self {
        Self::new(path.unwrap_or_else(Self::default_path))
    }

    /// `<config dir>/framecut/config.toml`, falling back to the current directory
    pub fn default_path() -> PathBuf {
        match dirs::config_dir() {
            Some(dir) => dir.join("framecut").join("config.toml"),
            None => PathBuf::from("framecut.toml"),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the file; a missing file is not an error
    pub fn load(&self) -> Result<Option<AppConfig>, ConfigError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No config file");
            return Ok(None);
        }

        let content = std::fs::read_to_string(&self.path).map_err(|e| {
            ConfigError::File(format!("cannot read {}: {}", self.path.display(), e))
        })?;
        let config = toml::from_str(&content).map_err(|e| {
            ConfigError::File(format!("cannot parse {}: {}", self.path.display(), e))
        })?;

        info!(path = %self.path.display(), "Loaded configuration file");
        Ok(Some(config))
    }

    pub fn save(&self, config: &AppConfig) -> Result<(), ConfigError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                ConfigError::File(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }

        let content = config.to_toml()?;
        std::fs::write(&self.path, content).map_err(|e| {
            ConfigError::File(format!("cannot write {}: {}", self.path.display(), e))
        })?;

        info!(path = %self.path.display(), "Saved configuration file");
        Ok(())
    }
}
