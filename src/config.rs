//! Configuration loaded from `tide-panel.toml`.
//!
//! Every field has a default, so a missing or partial file still yields a
//! complete configuration. `validate` catches values that would make the
//! drive loop misbehave (empty rotation, zero-sized raster, bad hours).

use crate::PanelConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "tide-panel.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("reading {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("parsing {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Application configuration.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub panel: PanelConfig,
    pub hardware: HardwareConfig,
    /// NOAA station ids, in rotation order.
    pub stations: Vec<u32>,
    pub rotation_interval_secs: u64,
    pub brightness: BrightnessConfig,
    pub assets: AssetConfig,
    pub noaa: NoaaConfig,
    /// Coalescing window for renders triggered by fetch completions.
    /// Zero renders on every completion.
    pub render_debounce_ms: u64,
    /// Apply results that arrive after the station has already rotated.
    pub accept_stale_results: bool,
    /// Bind address for the read-only status API, e.g. "0.0.0.0:8080".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_addr: Option<String>,
    /// Simulated driver only: write each committed frame here as PNG.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

/// Options passed through to the rpi-rgb-led-matrix library.
#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct HardwareConfig {
    pub mapping: String,
    pub rgb_sequence: String,
    pub multiplexing: u32,
    pub row_addr_type: u32,
    pub pwm_bits: u8,
    pub pwm_lsb_nanoseconds: u32,
    pub gpio_slowdown: u32,
    /// Brightness used until the first render picks a scheduled level.
    pub initial_brightness: u8,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct BrightnessConfig {
    pub bright: u8,
    pub dim: u8,
    /// First hour of the awake window (inclusive).
    pub awake_start_hour: u32,
    /// End of the awake window (exclusive).
    pub awake_end_hour: u32,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct AssetConfig {
    pub background_image: PathBuf,
    /// Directory holding `phase_0.png` .. `phase_7.png`.
    pub moon_dir: PathBuf,
}

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NoaaConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            panel: PanelConfig::default(),
            hardware: HardwareConfig::default(),
            stations: vec![9410230, 9410170, 9410660, 9414290],
            rotation_interval_secs: 30,
            brightness: BrightnessConfig::default(),
            assets: AssetConfig::default(),
            noaa: NoaaConfig::default(),
            render_debounce_ms: 50,
            accept_stale_results: false,
            status_addr: None,
            snapshot_path: None,
        }
    }
}

impl Default for HardwareConfig {
    fn default() -> Self {
        Self {
            mapping: "adafruit-hat-pwm".to_string(),
            rgb_sequence: "RGB".to_string(),
            multiplexing: 0,
            row_addr_type: 4,
            pwm_bits: 11,
            pwm_lsb_nanoseconds: 130,
            gpio_slowdown: 2,
            initial_brightness: 100,
        }
    }
}

impl Default for BrightnessConfig {
    fn default() -> Self {
        Self {
            bright: 100,
            dim: 15,
            awake_start_hour: 7,
            awake_end_hour: 22,
        }
    }
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            background_image: PathBuf::from("led-background.jpg"),
            moon_dir: PathBuf::from("moon"),
        }
    }
}

impl Default for NoaaConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.tidesandcurrents.noaa.gov/api/prod/datagetter".to_string(),
            timeout_secs: 20,
        }
    }
}

impl Config {
    /// Load configuration from `path`.
    ///
    /// A missing file yields defaults only when `required` is false; the
    /// default path is optional, a path given on the command line is not.
    pub fn load(path: &Path, required: bool) -> Result<Self, ConfigError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if !required && e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No config file at {}, using defaults", path.display());
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let config: Config = toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.stations.is_empty() {
            return Err(ConfigError::Invalid("station list is empty".into()));
        }
        if self.panel.rows == 0 || self.panel.cols == 0 || self.panel.sub_panels == 0 {
            return Err(ConfigError::Invalid("panel dimensions must be non-zero".into()));
        }
        if self.rotation_interval_secs == 0 {
            return Err(ConfigError::Invalid("rotation interval must be non-zero".into()));
        }
        let b = &self.brightness;
        if b.awake_start_hour > 23 || b.awake_end_hour > 24 {
            return Err(ConfigError::Invalid(format!(
                "awake window {}..{} is not a valid hour range",
                b.awake_start_hour, b.awake_end_hour
            )));
        }
        if b.bright > 100 || b.dim > 100 || self.hardware.initial_brightness > 100 {
            return Err(ConfigError::Invalid("brightness levels must be 0-100".into()));
        }
        Ok(())
    }

    pub fn rotation_interval(&self) -> Duration {
        Duration::from_secs(self.rotation_interval_secs)
    }

    pub fn render_debounce(&self) -> Duration {
        Duration::from_millis(self.render_debounce_ms)
    }

    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}
