//! Configuration management for Vinyl GW
//!
//! Handles loading, parsing, and hot-reloading of YAML configuration files.
//! Every section is optional; a missing file yields the built-in defaults.

pub mod watcher;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

pub use watcher::ConfigWatcher;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub serial: SerialConfig,
    pub volume: VolumeConfig,
    pub stream: StreamConfig,
    pub debounce: DebounceConfig,
    pub hooks: HooksConfig,
    pub media: MediaConfig,
    pub display: DisplayConfig,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingConfig>,
}

/// Serial link to the turntable controller
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    pub baud: u32,
    pub read_timeout_ms: u64,
    pub reconnect_delay_ms: u64,
}

/// Volume domain of the knob
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum VolumeRange {
    /// Knob reports 0-100
    #[default]
    Standard,
    /// Knob reports 0-150
    Overdrive,
}

impl VolumeRange {
    /// Highest percentage the knob can report in this domain
    pub fn max_percent(self) -> u16 {
        match self {
            VolumeRange::Standard => 100,
            VolumeRange::Overdrive => 150,
        }
    }
}

/// Knob-to-mixer volume mapping and dispatch limits
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct VolumeConfig {
    pub range: VolumeRange,
    /// Mixer fraction sent for 0%
    pub min: f64,
    /// Mixer fraction sent for the top of the range
    pub max: f64,
    pub deadband: u16,
    pub min_interval_ms: u64,
    /// Set the default sink when no target stream is active
    pub fallback_to_default_sink: bool,
}

/// Target application stream lookup
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StreamConfig {
    /// Case-insensitive substrings matched against stream names
    pub targets: Vec<String>,
    pub refresh_ms: u64,
}

/// Per-category debounce windows for discrete actions
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DebounceConfig {
    pub transport_ms: u64,
    pub button_ms: u64,
}

/// External helper scripts
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HooksConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub short_press: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub long_press: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub play_pause: Option<String>,
}

/// Media player discovery and polling
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct MediaConfig {
    pub preferred_players: Vec<String>,
    pub player_check_ms: u64,
    pub poll_ms: u64,
    pub command_timeout_ms: u64,
}

/// Now-playing window
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DisplayConfig {
    pub size: u32,
    pub fullscreen: bool,
    pub fps: u32,
    /// Vinyl rotation in degrees per frame while playing
    pub angle_speed: f32,
    pub volume_poll_ms: u64,
    pub artwork_timeout_ms: u64,
    pub overlay: OverlayConfig,
}

/// Volume overlay envelope
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OverlayConfig {
    pub deadband: u16,
    pub fade_in_ms: u64,
    pub hold_ms: u64,
    pub fade_out_ms: u64,
    pub min_retrigger_ms: u64,
    pub smooth_speed: f64,
}

/// Optional file logging
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Directory receiving daily-rolled log files
    pub file: PathBuf,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud: 115_200,
            read_timeout_ms: 1000,
            reconnect_delay_ms: 1000,
        }
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            range: VolumeRange::Standard,
            min: 0.05,
            max: 0.95,
            deadband: 2,
            min_interval_ms: 80,
            fallback_to_default_sink: false,
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            targets: default_chromium_names(),
            refresh_ms: 3000,
        }
    }
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            transport_ms: 300,
            button_ms: 500,
        }
    }
}

impl Default for HooksConfig {
    fn default() -> Self {
        Self {
            short_press: Some("~/bin/cycle_vinyl_skin.sh".to_string()),
            long_press: Some("~/bin/enter_setup_mode.sh".to_string()),
            play_pause: Some("~/bin/spotify_cmd.sh".to_string()),
        }
    }
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            preferred_players: default_chromium_names(),
            player_check_ms: 1000,
            poll_ms: 250,
            command_timeout_ms: 1500,
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            size: 1080,
            fullscreen: true,
            fps: 60,
            angle_speed: -0.5,
            volume_poll_ms: 120,
            artwork_timeout_ms: 5000,
            overlay: OverlayConfig::default(),
        }
    }
}

impl Default for OverlayConfig {
    fn default() -> Self {
        Self {
            deadband: 1,
            fade_in_ms: 180,
            hold_ms: 900,
            fade_out_ms: 350,
            min_retrigger_ms: 350,
            smooth_speed: 10.0,
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

impl MediaConfig {
    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }
}

impl AppConfig {
    /// Load configuration from file with validation
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_yaml(&contents)
            .with_context(|| format!("Failed to parse YAML config: {}", path.display()))
    }

    /// Load the file if it exists, otherwise fall back to defaults
    pub async fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if fs::try_exists(path).await.unwrap_or(false) {
            Self::load(path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Parse and validate a YAML document
    pub fn from_yaml(contents: &str) -> Result<Self> {
        // An empty document deserializes to unit, not to an empty mapping
        let config: AppConfig = if contents.trim().is_empty() {
            AppConfig::default()
        } else {
            serde_yaml::from_str(contents)?
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate configuration for correctness and consistency
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            anyhow::bail!("serial.port cannot be empty");
        }
        if self.serial.baud == 0 {
            anyhow::bail!("serial.baud must be greater than zero");
        }

        let volume = &self.volume;
        for (name, value) in [("min", volume.min), ("max", volume.max)] {
            if !(0.0..=1.5).contains(&value) {
                anyhow::bail!("volume.{} = {} is out of range (must be 0.0-1.5)", name, value);
            }
        }
        if volume.min >= volume.max {
            anyhow::bail!(
                "volume.min ({}) must be lower than volume.max ({})",
                volume.min,
                volume.max
            );
        }

        if self.stream.targets.iter().all(|t| t.trim().is_empty()) {
            anyhow::bail!("stream.targets must name at least one application");
        }

        if self.display.fps == 0 {
            anyhow::bail!("display.fps must be greater than zero");
        }
        if self.display.overlay.smooth_speed < 0.0 {
            anyhow::bail!("display.overlay.smooth_speed cannot be negative");
        }

        Ok(())
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .map(|home| home.join(rest))
            .unwrap_or_else(|| PathBuf::from(path)),
        None => PathBuf::from(path),
    }
}

// Default value functions
fn default_serial_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_chromium_names() -> Vec<String> {
    vec!["chromium".to_string(), "chrome".to_string()]
}
