//! Configuration management for callring
//!
//! Handles loading, saving, and resetting the ring policy and popup settings.

use anyhow::Result;
use log::{info, warn, LevelFilter};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::ring::RingPolicy;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Config {
    /// General application settings
    pub general: GeneralConfig,
    /// When incoming calls raise the popup
    pub ring: RingPolicy,
    /// Popup window settings
    pub popup: PopupConfig,
}

impl Config {
    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("callring")
            .join("config.toml")
    }

    /// Load configuration from file or create default
    pub fn load_or_default() -> Result<Self> {
        Self::load_or_default_from(&Self::config_path())
    }

    /// Load from `path`, writing the defaults there when the file is missing
    pub fn load_or_default_from(path: &Path) -> Result<Self> {
        if path.exists() {
            info!("Loading configuration from: {:?}", path);
            let content = std::fs::read_to_string(path)?;
            match toml::from_str(&content) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    // Keep the user's file; just run with defaults
                    warn!("Failed to parse config, using defaults: {}", e);
                    return Ok(Self::default());
                }
            }
        }

        let config = Self::default();
        config.save_to(path)?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to: {:?}", path);
        Ok(())
    }

    /// Delete the config file so the next load starts from defaults
    pub fn reset_at(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)?;
            info!("Removed configuration file: {:?}", path);
        }
        Ok(())
    }
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level (error, warn, info, debug, trace); `RUST_LOG` still wins
    pub log_level: String,
}

impl GeneralConfig {
    pub fn level_filter(&self) -> LevelFilter {
        LevelFilter::from_str(&self.log_level).unwrap_or(LevelFilter::Info)
    }
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Popup window configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PopupConfig {
    /// Popup width in pixels
    pub width: u32,
    /// Height before the page asks for extra room
    pub base_height: u32,
    /// Which popup implementation to use
    pub backend: PopupBackend,
}

impl Default for PopupConfig {
    fn default() -> Self {
        Self {
            width: 232,
            base_height: 276,
            backend: PopupBackend::Auto,
        }
    }
}

/// Popup implementation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PopupBackend {
    /// Native window where available, headless otherwise
    Auto,
    /// Native Win32 window
    Win32,
    /// Let the host render the popup from stdout commands
    Headless,
}
