// SPDX-License-Identifier: GPL-3.0-only

//! Persistent user configuration
//!
//! Stored as JSON under the platform config directory. Every field has a
//! default, so older or hand-trimmed files keep loading.

use crate::backends::camera::CameraBackendType;
use crate::constants::{capture, scanning};
use crate::errors::{AppError, AppResult};
use crate::scanner::DecoderKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

const CONFIG_DIR_NAME: &str = "barcode-scanner";
const CONFIG_FILE_NAME: &str = "config.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stop scanning after the first detection
    pub pause_on_detect: bool,
    /// Camera backend to use
    pub backend: CameraBackendType,
    /// Device to open instead of the platform default
    pub preferred_device: Option<String>,
    /// Image directory for the file-source backend
    pub image_directory: Option<PathBuf>,
    /// Requested capture width
    pub capture_width: u32,
    /// Requested capture height
    pub capture_height: u32,
    /// Milliseconds between decode attempts
    pub attempt_interval_ms: u64,
    /// Milliseconds to wait after a detection in continuous mode
    pub success_interval_ms: u64,
    /// Barcode formats to decode
    pub decoder: DecoderKind,
    /// Frames are downscaled to this size before decoding
    pub max_decode_dimension: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            pause_on_detect: true,
            backend: CameraBackendType::default(),
            preferred_device: None,
            image_directory: None,
            capture_width: capture::DEFAULT_WIDTH,
            capture_height: capture::DEFAULT_HEIGHT,
            attempt_interval_ms: scanning::ATTEMPT_INTERVAL.as_millis() as u64,
            success_interval_ms: scanning::SUCCESS_INTERVAL.as_millis() as u64,
            decoder: DecoderKind::default(),
            max_decode_dimension: scanning::MAX_DECODE_DIMENSION,
        }
    }
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> AppResult<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No config directory on this platform, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Load from `path`; a missing file yields defaults
    pub fn load_from(path: &Path) -> AppResult<Self> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "Config file not found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&contents)
            .map_err(|e| AppError::Config(format!("{}: {}", path.display(), e)))
    }

    /// Write to `path`, creating parent directories
    pub fn save_to(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        info!(path = %path.display(), "Saved configuration");
        Ok(())
    }

    pub fn attempt_interval(&self) -> Duration {
        Duration::from_millis(self.attempt_interval_ms)
    }

    pub fn success_interval(&self) -> Duration {
        Duration::from_millis(self.success_interval_ms)
    }

    /// Image directory, defaulting to the user's pictures folder
    pub fn image_directory(&self) -> Option<PathBuf> {
        self.image_directory.clone().or_else(dirs::picture_dir)
    }
}
