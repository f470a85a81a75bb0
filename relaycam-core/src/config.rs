//! Device configuration
//!
//! Loads user configuration from `~/.config/relaycam/config.toml`. The
//! frame format is fixed for the device's lifetime; the config decides what
//! that fixed format is, plus the scheduling and pool knobs.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{RelaycamError, Result};
use crate::pattern::STRIPE_HEIGHT;
use crate::pool::DEFAULT_HIGH_WATER;
use crate::types::{FrameFormat, PixelLayout, DEFAULT_FRAME_RATE, DEFAULT_HEIGHT, DEFAULT_WIDTH};

/// Default device name
pub const DEFAULT_DEVICE_NAME: &str = "Relaycam";

/// Complete device configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// Device name (shows up in logs and status output)
    #[serde(default = "default_name")]
    pub name: String,

    /// Frame width in pixels
    #[serde(default = "default_width")]
    pub width: u32,

    /// Frame height in pixels
    #[serde(default = "default_height")]
    pub height: u32,

    /// Frame rate in frames per second
    #[serde(default = "default_fps")]
    pub fps: u32,

    /// Outstanding-buffer high-water mark for the frame pool
    #[serde(default = "default_high_water")]
    pub pool_high_water: u32,

    /// Sink poll rate as a multiple of the frame rate
    #[serde(default = "default_poll_multiplier")]
    pub sink_poll_multiplier: u32,

    /// Sink tick scheduling slack in milliseconds
    #[serde(default = "default_sink_leeway_ms")]
    pub sink_leeway_ms: u64,
}

fn default_name() -> String {
    DEFAULT_DEVICE_NAME.to_string()
}

fn default_width() -> u32 {
    DEFAULT_WIDTH
}

fn default_height() -> u32 {
    DEFAULT_HEIGHT
}

fn default_fps() -> u32 {
    DEFAULT_FRAME_RATE
}

fn default_high_water() -> u32 {
    DEFAULT_HIGH_WATER
}

fn default_poll_multiplier() -> u32 {
    3
}

fn default_sink_leeway_ms() -> u64 {
    10
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            pool_high_water: default_high_water(),
            sink_poll_multiplier: default_poll_multiplier(),
            sink_leeway_ms: default_sink_leeway_ms(),
        }
    }
}

impl DeviceConfig {
    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(RelaycamError::config(format!(
                "invalid resolution {}x{}",
                self.width, self.height
            )));
        }
        if self.height <= STRIPE_HEIGHT {
            return Err(RelaycamError::config(format!(
                "height {} must exceed the stripe height {}",
                self.height, STRIPE_HEIGHT
            )));
        }
        if self.fps == 0 {
            return Err(RelaycamError::config("frame rate must be non-zero"));
        }
        if self.pool_high_water == 0 {
            return Err(RelaycamError::config("pool high-water mark must be non-zero"));
        }
        if self.sink_poll_multiplier == 0 {
            return Err(RelaycamError::config("sink poll multiplier must be non-zero"));
        }
        Ok(())
    }

    /// The fixed frame format this config describes
    pub fn format(&self) -> FrameFormat {
        FrameFormat {
            width: self.width,
            height: self.height,
            layout: PixelLayout::Bgra32,
            fps_num: self.fps,
            fps_den: 1,
        }
    }

    /// Source tick period (one frame interval)
    pub fn frame_interval(&self) -> Duration {
        self.format().frame_interval()
    }

    /// Sink tick period (frame interval divided by the poll multiplier)
    pub fn sink_poll_interval(&self) -> Duration {
        self.frame_interval() / self.sink_poll_multiplier
    }

    /// Sink tick scheduling slack
    pub fn sink_leeway(&self) -> Duration {
        Duration::from_millis(self.sink_leeway_ms)
    }
}

/// Path to the user configuration file
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("relaycam")
        .join("config.toml")
}

/// Load configuration from the default path, falling back to defaults
pub fn load() -> Result<DeviceConfig> {
    load_from(&config_path())
}

/// Load configuration from a specific path
///
/// A missing file is not an error; defaults apply.
pub fn load_from(path: &std::path::Path) -> Result<DeviceConfig> {
    if !path.exists() {
        debug!("no config file at {:?}, using defaults", path);
        return Ok(DeviceConfig::default());
    }

    let contents = std::fs::read_to_string(path)?;
    let config: DeviceConfig = toml::from_str(&contents)
        .map_err(|e| RelaycamError::config(format!("failed to parse {:?}: {}", path, e)))?;
    config.validate()?;
    info!("loaded config from {:?}", path);
    Ok(config)
}

/// Save configuration to a specific path, creating parent directories
pub fn save_to(config: &DeviceConfig, path: &std::path::Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let contents = toml::to_string_pretty(config)
        .map_err(|e| RelaycamError::config(format!("failed to serialize config: {}", e)))?;
    std::fs::write(path, contents)?;
    Ok(())
}

/// Generate a commented sample configuration
pub fn sample_config() -> String {
    let defaults = DeviceConfig::default();
    format!(
        r#"# Relaycam configuration
# Location: {path:?}

# Device name shown in logs and status output
name = "{name}"

# Fixed frame format (single format, no negotiation)
width = {width}
height = {height}
fps = {fps}

# Frame pool: acquisitions beyond this many outstanding buffers are refused
pool_high_water = {high_water}

# Sink polling runs at fps * multiplier to drain producer frames promptly
sink_poll_multiplier = {multiplier}
sink_leeway_ms = {leeway}
"#,
        path = config_path(),
        name = defaults.name,
        width = defaults.width,
        height = defaults.height,
        fps = defaults.fps,
        high_water = defaults.pool_high_water,
        multiplier = defaults.sink_poll_multiplier,
        leeway = defaults.sink_leeway_ms,
    )
}
