//! Application configuration
//!
//! Loaded from a TOML file in the platform config directory. Every field
//! has a default, so a missing or partial file is fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::constants::{CAPTURE_BUFFER_MS, RING_SECONDS};
use crate::error::{Error, Result};

/// Top-level application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub devices: DeviceConfig,
    pub capture: CaptureConfig,
}

/// Output device selection policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Case-insensitive substrings identifying a virtual-cable endpoint.
    /// Name matching is a heuristic; there is no stable hardware id for
    /// virtual cables, so the markers stay configurable.
    pub cable_markers: Vec<String>,
}

/// Microphone capture tuning
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Target buffering interval in milliseconds
    pub buffer_ms: u32,

    /// Seconds of audio the capture ring retains before dropping oldest
    pub ring_seconds: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            devices: DeviceConfig::default(),
            capture: CaptureConfig::default(),
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            cable_markers: vec!["cable input".to_string()],
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            buffer_ms: CAPTURE_BUFFER_MS,
            ring_seconds: RING_SECONDS,
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform config directory, falling back
    /// to defaults when no file exists.
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) if path.exists() => match Self::load_from(&path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", path.display(), e);
                    Self::default()
                }
            },
            _ => Self::default(),
        }
    }

    /// Load configuration from an explicit TOML file
    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| Error::Config(e.to_string()))
    }

    /// Number of ring buffer slots implied by the capture settings
    pub fn ring_capacity(&self) -> usize {
        let chunks = self.capture.ring_seconds * 1000 / self.capture.buffer_ms.max(1);
        chunks.max(1) as usize
    }

    fn config_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "soundboard")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }
}
