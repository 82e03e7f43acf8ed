//! Configuration file management for auscult.
//!
//! This module handles loading and saving application configuration from TOML files.
//! Configuration is stored in the user's config directory.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

/// Capture source selection.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// Audio input device (system microphone or attached stethoscope mic)
    #[default]
    Mic,
    /// External BLE acoustic sensor
    Ble,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Mic => write!(f, "mic"),
            Self::Ble => write!(f, "ble"),
        }
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "mic" => Ok(Self::Mic),
            "ble" => Ok(Self::Ble),
            other => Err(anyhow::anyhow!("unknown source '{other}' (mic or ble)")),
        }
    }
}

/// Audio capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    /// Audio device to use. Options:
    /// - "default" for system default device
    /// - numeric index (0, 1, 2, etc.) from `auscult list-devices`
    /// - device name from `auscult list-devices`
    pub device: String,
    /// Which capture source new sessions start from
    #[serde(default)]
    pub source: SourceKind,
}

/// Chart rendering configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChartConfig {
    /// Seconds of audio the live chart window retains
    #[serde(default = "default_live_window_secs")]
    pub live_window_secs: f64,
    /// Downsample point budget for the review chart
    #[serde(default = "default_target_points")]
    pub target_points: usize,
    /// Fixed y range of the live chart, in Pascal
    #[serde(default = "default_live_y_max")]
    pub live_y_max: f64,
    /// Minimum y range of the review chart, in Pascal, so quiet recordings
    /// don't render as flat lines
    #[serde(default = "default_min_review_y_max")]
    pub min_review_y_max: f64,
}

fn default_live_window_secs() -> f64 {
    1.0
}

fn default_target_points() -> usize {
    5000
}

fn default_live_y_max() -> f64 {
    1.5
}

fn default_min_review_y_max() -> f64 {
    0.1
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            live_window_secs: default_live_window_secs(),
            target_points: default_target_points(),
            live_y_max: default_live_y_max(),
            min_review_y_max: default_min_review_y_max(),
        }
    }
}

/// BLE acoustic sensor configuration. The transport itself is provided by
/// the platform integration; these values describe the stream it delivers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleConfig {
    /// Sample rate of the sensor's notification stream in Hz
    #[serde(default = "default_ble_sample_rate")]
    pub sample_rate: u32,
    /// Advertised device name to connect to
    #[serde(default)]
    pub device_name: String,
}

fn default_ble_sample_rate() -> u32 {
    20000
}

impl Default for BleConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_ble_sample_rate(),
            device_name: String::new(),
        }
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuscultConfig {
    pub audio: AudioConfig,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub ble: BleConfig,
}

impl AuscultConfig {
    /// Loads configuration from the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined
    /// - If the config file cannot be read
    /// - If the TOML is malformed
    pub fn load() -> anyhow::Result<Self> {
        let config_path = get_config_path()?;
        let config_content = fs::read_to_string(&config_path)?;
        let config: AuscultConfig = toml::from_str(&config_content)?;
        Ok(config)
    }

    /// Saves configuration to the user's config directory.
    ///
    /// # Errors
    /// - If the config directory cannot be determined or created
    /// - If the file cannot be written
    pub fn save(&self) -> anyhow::Result<()> {
        let config_path = get_config_path()?;
        let config_content = toml::to_string_pretty(self)?;
        fs::write(&config_path, config_content)?;
        tracing::info!("Configuration saved");
        Ok(())
    }
}

impl Default for AuscultConfig {
    fn default() -> Self {
        AuscultConfig {
            audio: AudioConfig {
                device: "default".to_string(),
                source: SourceKind::default(),
            },
            chart: ChartConfig::default(),
            ble: BleConfig::default(),
        }
    }
}

/// Retrieves the path to the config file.
///
/// Assumes the config file exists (created by setup if needed).
///
/// # Errors
/// - If the config directory cannot be determined
/// - If the config directory cannot be created
pub fn get_config_path() -> anyhow::Result<PathBuf> {
    let config_dir = dirs::home_dir()
        .ok_or_else(|| anyhow::anyhow!("Could not find home directory"))?;
    let config_path = config_dir
        .join(".config")
        .join("auscult")
        .join("auscult.toml");

    std::fs::create_dir_all(config_path.parent().unwrap())?;

    Ok(config_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_fill_missing_sections() {
        let config: AuscultConfig = toml::from_str(
            r#"
            [audio]
            device = "default"
            "#,
        )
        .unwrap();
        assert_eq!(config.audio.source, SourceKind::Mic);
        assert_eq!(config.chart.target_points, 5000);
        assert_eq!(config.chart.live_window_secs, 1.0);
        assert_eq!(config.ble.sample_rate, 20000);
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = AuscultConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let back: AuscultConfig = toml::from_str(&text).unwrap();
        assert_eq!(back.audio.device, "default");
        assert_eq!(back.chart.live_y_max, 1.5);
        assert_eq!(back.chart.min_review_y_max, 0.1);
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("mic".parse::<SourceKind>().unwrap(), SourceKind::Mic);
        assert_eq!("ble".parse::<SourceKind>().unwrap(), SourceKind::Ble);
        assert!("usb".parse::<SourceKind>().is_err());
    }
}
