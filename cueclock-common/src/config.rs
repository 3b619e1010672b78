//! Configuration loading for the CueClock services
//!
//! Configuration resolution follows this priority order:
//! 1. Explicit path (command-line argument, highest priority)
//! 2. `CUECLOCK_CONFIG` environment variable
//! 3. Platform config directory (`<config dir>/cueclock/config.toml`)
//! 4. Compiled defaults (fallback)
//!
//! Missing files fall through to the next source; a file that exists but
//! fails to parse or validate is an error, not a silent fallback.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Default tick period: ≈60 Hz
pub const DEFAULT_TICK_INTERVAL_US: u64 = 16_667;

/// Default decimation: every 15th tick also feeds the low-frequency cadence
pub const DEFAULT_LOW_RESOLUTION_EVERY: u32 = 15;

/// Default display duration for parts with no usable planned duration
pub const DEFAULT_PART_DURATION_MS: i64 = 3_000;

/// Timing service configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Tick period in microseconds
    pub tick_interval_us: u64,

    /// Every Nth tick is flagged low-resolution and fed to the low cadence
    pub low_resolution_every: u32,

    /// Fallback display duration in ms
    pub default_part_duration_ms: i64,

    /// HTTP bind address of the timing daemon
    pub bind_address: String,

    /// Broadcast buffer size for snapshot and notification channels
    pub event_buffer: usize,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            tick_interval_us: DEFAULT_TICK_INTERVAL_US,
            low_resolution_every: DEFAULT_LOW_RESOLUTION_EVERY,
            default_part_duration_ms: DEFAULT_PART_DURATION_MS,
            bind_address: "0.0.0.0:5750".to_string(),
            event_buffer: 100,
        }
    }
}

impl TimingConfig {
    /// Load configuration following the priority order above
    pub fn load(cli_path: Option<&Path>) -> Result<Self> {
        // Priority 1: command-line argument
        if let Some(path) = cli_path {
            info!("Loading configuration from {}", path.display());
            return Self::from_file(path);
        }

        // Priority 2: environment variable
        if let Ok(path) = std::env::var("CUECLOCK_CONFIG") {
            info!("Loading configuration from CUECLOCK_CONFIG={}", path);
            return Self::from_file(Path::new(&path));
        }

        // Priority 3: platform config directory
        if let Some(path) = default_config_path() {
            if path.exists() {
                info!("Loading configuration from {}", path.display());
                return Self::from_file(&path);
            }
        }

        // Priority 4: compiled defaults
        debug!("No configuration file found, using defaults");
        let config = Self::default();
        config.validate()?;
        Ok(config)
    }

    /// Parse and validate a TOML configuration file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("Cannot read {}: {}", path.display(), e))
        })?;
        let config: TimingConfig = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.tick_interval_us == 0 {
            return Err(Error::Config("tick_interval_us must be > 0".to_string()));
        }
        if self.low_resolution_every == 0 {
            return Err(Error::Config("low_resolution_every must be > 0".to_string()));
        }
        if self.default_part_duration_ms < 0 {
            return Err(Error::Config(
                "default_part_duration_ms must be >= 0".to_string(),
            ));
        }
        if self.event_buffer == 0 {
            return Err(Error::Config("event_buffer must be > 0".to_string()));
        }
        Ok(())
    }

    /// Tick period as a `Duration`
    pub fn tick_interval(&self) -> std::time::Duration {
        std::time::Duration::from_micros(self.tick_interval_us)
    }
}

/// Platform default config file path (`<config dir>/cueclock/config.toml`)
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("cueclock").join("config.toml"))
}
