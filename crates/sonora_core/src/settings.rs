//! Persistent Settings Management
//!
//! Handles saving/loading the preferred stream setup to disk.
//!
//! # Storage Locations
//! - Linux: `~/.config/sonora/settings.json`
//! - Windows: `%APPDATA%\sonora\config\settings.json`
//! - macOS: `~/Library/Application Support/com.sonora.sonora/settings.json`

use std::fs;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use tracing::{error, info};

use crate::config::{DEFAULT_FRAMES_PER_BUFFER, DEFAULT_SAMPLE_RATE};
use crate::error::{AudioError, AudioResult};

/// Default tracing filter for binaries
pub const DEFAULT_LOG_FILTER: &str = "sonora=info";

fn default_log_filter() -> String {
    DEFAULT_LOG_FILTER.to_string()
}

/// Root settings structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Preferred output device, matched by name against the enumeration
    #[serde(default)]
    pub output_device: Option<String>,
    pub sample_rate: u32,
    pub channel_count: i32,
    pub frames_per_buffer: u32,
    /// Suggested latency in seconds; `None` keeps the device default
    #[serde(default)]
    pub latency: Option<f64>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_device: None,
            sample_rate: DEFAULT_SAMPLE_RATE,
            channel_count: 2,
            frames_per_buffer: DEFAULT_FRAMES_PER_BUFFER,
            latency: None,
            log_filter: default_log_filter(),
        }
    }
}

impl Settings {
    /// Load settings from disk, or return default if missing/corrupt
    pub fn load() -> Self {
        match Self::config_path() {
            Some(path) => Self::load_from(&path),
            None => {
                info!("No config directory available, using default settings");
                Self::default()
            }
        }
    }

    /// Load settings from `path`, or return default if missing/corrupt
    pub fn load_from(path: &Path) -> Self {
        if path.exists() {
            match fs::File::open(path) {
                Ok(file) => match serde_json::from_reader(file) {
                    Ok(settings) => {
                        info!("Settings loaded from {:?}", path);
                        return settings;
                    }
                    Err(e) => {
                        error!("Failed to parse settings file: {}", e);
                    }
                },
                Err(e) => {
                    error!("Failed to open settings file: {}", e);
                }
            }
        }

        info!("Using default settings");
        Self::default()
    }

    /// Save settings to disk
    pub fn save(&self) -> AudioResult<()> {
        let path = Self::config_path()
            .ok_or_else(|| AudioError::Settings("Could not determine config path".into()))?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> AudioResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| AudioError::Settings(e.to_string()))?;
        }

        let file = fs::File::create(path).map_err(|e| AudioError::Settings(e.to_string()))?;
        serde_json::to_writer_pretty(file, self).map_err(|e| AudioError::Settings(e.to_string()))?;

        info!("Settings saved to {:?}", path);
        Ok(())
    }

    /// Get the platform-specific configuration file path
    pub fn config_path() -> Option<PathBuf> {
        ProjectDirs::from("com", "sonora", "sonora")
            .map(|proj| proj.config_dir().join("settings.json"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.output_device, None);
        assert_eq!(settings.sample_rate, 44100);
        assert_eq!(settings.channel_count, 2);
        assert_eq!(settings.frames_per_buffer, 65536);
        assert_eq!(settings.latency, None);
        assert_eq!(settings.log_filter, "sonora=info");
    }

    #[test]
    fn test_settings_serialization_roundtrip() {
        let settings = Settings {
            output_device: Some("USB DAC".to_string()),
            sample_rate: 96000,
            latency: Some(0.02),
            ..Default::default()
        };

        let json = serde_json::to_string_pretty(&settings).unwrap();
        let deserialized: Settings = serde_json::from_str(&json).unwrap();
        assert_eq!(deserialized, settings);
    }

    #[test]
    fn test_settings_backward_compat_missing_fields() {
        let old_json = r#"{
            "sample_rate": 48000,
            "channel_count": 1,
            "frames_per_buffer": 256
        }"#;

        let settings: Settings = serde_json::from_str(old_json).unwrap();
        assert_eq!(settings.sample_rate, 48000);
        assert!(settings.output_device.is_none());
        assert!(settings.latency.is_none());
        assert_eq!(settings.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let settings = Settings {
            frames_per_buffer: 0,
            ..Default::default()
        };
        settings.save_to(&path).unwrap();
        assert_eq!(Settings::load_from(&path), settings);
    }

    #[test]
    fn test_load_corrupt_or_missing_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.json");
        assert_eq!(Settings::load_from(&missing), Settings::default());

        let corrupt = dir.path().join("corrupt.json");
        fs::write(&corrupt, "{ not json").unwrap();
        assert_eq!(Settings::load_from(&corrupt), Settings::default());
    }
}
