//! Application configuration loaded from YAML.
//!
//! ```yaml
//! listen: 0.0.0.0:8080
//! hostname: plate01
//! data_dir: ./data
//! settings_file: ./data/config.json
//! firmware:
//!   image: ./data/firmware.bin
//!   capacity: 1966080
//! screen:
//!   width: 480
//!   height: 320
//! upload_chunk_size: 1436
//! restart_grace_ms: 250
//! logging:
//!   dir: ./logs
//!   json: false
//! ```
//!
//! Every key is optional; missing keys take the defaults above.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Upload buffer size of the device HTTP stack.
pub const DEFAULT_UPLOAD_CHUNK_SIZE: usize = 1436;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FirmwareConfig {
    /// Where an accepted image is committed.
    pub image: PathBuf,
    /// Program space available to a new image, in bytes.
    pub capacity: u64,
}

impl Default for FirmwareConfig {
    fn default() -> Self {
        Self {
            image: PathBuf::from("./data/firmware.bin"),
            capacity: 0x1E_0000,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScreenConfig {
    pub width: u16,
    pub height: u16,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            width: 480,
            height: 320,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Directory for a daily rolling log file; stdout only when unset.
    pub dir: Option<PathBuf>,
    pub json: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub listen: String,
    pub hostname: String,
    /// Root of the file store served as static files and written by uploads.
    pub data_dir: PathBuf,
    pub settings_file: PathBuf,
    pub firmware: FirmwareConfig,
    pub screen: ScreenConfig,
    pub upload_chunk_size: usize,
    pub restart_grace_ms: u64,
    pub logging: LoggingConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            listen: "0.0.0.0:8080".to_string(),
            hostname: "plate01".to_string(),
            data_dir: PathBuf::from("./data"),
            settings_file: PathBuf::from("./data/config.json"),
            firmware: FirmwareConfig::default(),
            screen: ScreenConfig::default(),
            upload_chunk_size: DEFAULT_UPLOAD_CHUNK_SIZE,
            restart_grace_ms: 250,
            logging: LoggingConfig::default(),
        }
    }
}

impl AppConfig {
    /// Read and validate a YAML configuration file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Read`] or [`ConfigError::Parse`]; a zero chunk size or
    /// an empty hostname is reported as a parse error.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&text).map_err(|detail| ConfigError::Parse {
            path: path.display().to_string(),
            detail,
        })?;
        info!(path = %path.display(), listen = %config.listen, "configuration loaded");
        Ok(config)
    }

    /// Parse YAML text.
    ///
    /// # Errors
    ///
    /// A description of the first problem found.
    pub fn from_yaml(text: &str) -> Result<Self, String> {
        let config: AppConfig = serde_yaml::from_str(text).map_err(|e| e.to_string())?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), String> {
        if self.upload_chunk_size == 0 {
            return Err("upload_chunk_size must be greater than zero".to_string());
        }
        if self.hostname.trim().is_empty() {
            return Err("hostname must not be empty".to_string());
        }
        if self.screen.width == 0 || self.screen.height == 0 {
            return Err("screen dimensions must be non-zero".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let cfg = AppConfig::from_yaml("hostname: kitchen\nscreen:\n  width: 320\n").unwrap();
        assert_eq!(cfg.hostname, "kitchen");
        assert_eq!(cfg.screen.width, 320);
        assert_eq!(cfg.screen.height, 320);
        assert_eq!(cfg.upload_chunk_size, DEFAULT_UPLOAD_CHUNK_SIZE);
    }

    #[test]
    fn test_zero_chunk_size_is_rejected() {
        let err = AppConfig::from_yaml("upload_chunk_size: 0\n").unwrap_err();
        assert!(err.contains("upload_chunk_size"));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let err = AppConfig::load(Path::new("/nonexistent/panelweb.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }
}
