use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::error::ConfigError;
use crate::playback::OpenFailurePolicy;

/// Filter offered by the file chooser when nothing else is configured
pub const DEFAULT_FILE_FILTER: &str = "*.wav; *.mp3";

/// Player configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Output device name; `None` uses the host default
    pub preferred_device: Option<String>,
    /// Requested frames per device callback; `None` lets the device decide
    pub block_size: Option<u32>,
    /// Loop newly opened files
    pub loop_playback: bool,
    /// Surface open failures instead of silently ignoring them
    pub report_open_failures: bool,
    pub file_filter: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            preferred_device: None,
            block_size: None,
            loop_playback: true,
            report_open_failures: false,
            file_filter: DEFAULT_FILE_FILTER.to_string(),
        }
    }
}

impl PlayerConfig {
    pub fn open_failure_policy(&self) -> OpenFailurePolicy {
        if self.report_open_failures {
            OpenFailurePolicy::Report
        } else {
            OpenFailurePolicy::Silent
        }
    }
}

/// Configuration manager for loading and saving settings
pub struct ConfigManager {
    config: PlayerConfig,
    config_path: PathBuf,
}

impl ConfigManager {
    /// Load the configuration from the default location.
    ///
    /// A missing file yields defaults; a corrupt one is an error so the
    /// caller can decide whether to fall back.
    pub fn new() -> Result<Self, ConfigError> {
        let config_path = Self::get_config_path()?;
        let config = Self::load_config(&config_path)?;

        Ok(Self {
            config,
            config_path,
        })
    }

    /// Use defaults, remembering where the configuration would live
    pub fn with_defaults() -> Self {
        let config_path = Self::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("config.toml");

        Self {
            config: PlayerConfig::default(),
            config_path,
        }
    }

    pub fn get_config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn update_config<F>(&mut self, updater: F) -> Result<(), ConfigError>
    where
        F: FnOnce(&mut PlayerConfig),
    {
        updater(&mut self.config);
        self.save_config()
    }

    pub fn set_preferred_device(&mut self, device: Option<String>) -> Result<(), ConfigError> {
        self.config.preferred_device = device;
        self.save_config()
    }

    pub fn set_block_size(&mut self, block_size: Option<u32>) -> Result<(), ConfigError> {
        self.config.block_size = block_size.filter(|&size| size > 0);
        self.save_config()
    }

    pub fn reset_to_defaults(&mut self) -> Result<(), ConfigError> {
        self.config = PlayerConfig::default();
        self.save_config()
    }

    /// `transport-player` under the platform configuration directory
    fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("transport-player"))
    }

    fn get_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = Self::config_dir().ok_or(ConfigError::ConfigDirNotFound)?;

        std::fs::create_dir_all(&config_dir)?;

        Ok(config_dir.join("config.toml"))
    }

    fn load_config(path: &Path) -> Result<PlayerConfig, ConfigError> {
        if !path.exists() {
            return Ok(PlayerConfig::default());
        }

        let config_content = std::fs::read_to_string(path)?;
        let config: PlayerConfig = toml::from_str(&config_content)?;

        Ok(config)
    }

    fn save_config(&self) -> Result<(), ConfigError> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let config_content = toml::to_string_pretty(&self.config)?;
        std::fs::write(&self.config_path, config_content)?;

        Ok(())
    }
}
