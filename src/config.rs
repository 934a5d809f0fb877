//! System configuration parameters
//!
//! All tunable parameters of the ventilation controller.  Loaded from a JSON
//! file; every field has a default, so a partial file only overrides what it
//! names.

use core::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::average::DEFAULT_CAPACITY;
use crate::drivers::devices::DeviceSettings;

/// Core system configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemConfig {
    // --- Logging ---
    /// `error`, `warn`, `info`, `debug` or `trace`; `RUST_LOG` overrides it.
    pub log_level: String,
    /// Log file, rolled over daily as `<logfile>.YYYY-MM-DD`.  `null`:
    /// log to stderr only.
    pub logfile: Option<PathBuf>,

    // --- Timing ---
    /// Control loop tick (milliseconds)
    pub tick_interval_ms: u32,
    /// Measurement interval (seconds)
    pub measure_interval_secs: u64,

    // --- History ---
    /// Retained measurements (24 h at 10 s)
    pub history_capacity: usize,

    // --- Ventilation ---
    /// Length of one forced on/off ventilation period (seconds)
    pub ventilation_period_secs: f64,
    /// Full window travel time (seconds)
    pub window_travel_secs: f64,
    pub close_window_on_start: bool,
    pub close_window_on_exit: bool,

    // --- Shutdown ---
    /// Command run after a user-requested shutdown, e.g. `["sudo", "poweroff"]`.
    /// Empty: do nothing.
    pub shutdown_command: Vec<String>,

    // --- Simulation ---
    pub simulation: SimulationConfig,
}

/// Base values for the simulated sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    pub indoor_temperature: f64,
    pub indoor_humidity: f64,
    pub outdoor_temperature: f64,
    pub outdoor_humidity: f64,
}

impl Default for SystemConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            logfile: Some(PathBuf::from("log/fancontrol.log")),

            tick_interval_ms: 1000,   // 1 Hz
            measure_interval_secs: 10,

            history_capacity: DEFAULT_CAPACITY,

            ventilation_period_secs: 1200.0, // 20 min
            window_travel_secs: 10.0,
            close_window_on_start: true,
            close_window_on_exit: true,

            shutdown_command: Vec::new(),

            simulation: SimulationConfig::default(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            indoor_temperature: 19.0,
            indoor_humidity: 65.0,
            outdoor_temperature: 8.0,
            outdoor_humidity: 80.0,
        }
    }
}

impl SystemConfig {
    /// Read and validate a JSON configuration file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(ConfigError::Io)?;
        let config: Self = serde_json::from_str(&text).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::ValidationFailed("tick_interval_ms must be > 0"));
        }
        if self.measure_interval_secs < 1 {
            return Err(ConfigError::ValidationFailed(
                "measure_interval_secs must be >= 1",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::ValidationFailed("history_capacity must be > 0"));
        }
        if !(self.window_travel_secs >= 0.0 && self.window_travel_secs.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "window_travel_secs must be a finite value >= 0",
            ));
        }
        if !(self.ventilation_period_secs >= 0.0 && self.ventilation_period_secs.is_finite()) {
            return Err(ConfigError::ValidationFailed(
                "ventilation_period_secs must be a finite value >= 0",
            ));
        }
        if self.log_level.parse::<log::LevelFilter>().is_err() {
            return Err(ConfigError::ValidationFailed(
                "log_level must be off, error, warn, info, debug or trace",
            ));
        }
        if matches!(&self.logfile, Some(path) if path.file_name().is_none()) {
            return Err(ConfigError::ValidationFailed("logfile must name a file"));
        }
        Ok(())
    }

    pub fn tick_secs(&self) -> f64 {
        f64::from(self.tick_interval_ms) / 1000.0
    }

    pub fn device_settings(&self) -> DeviceSettings {
        DeviceSettings {
            window_travel_secs: self.window_travel_secs,
            close_window_on_start: self.close_window_on_start,
            close_window_on_exit: self.close_window_on_exit,
        }
    }
}

/// Errors from loading configuration.
#[derive(Debug)]
pub enum ConfigError {
    /// The file could not be read.
    Io(std::io::Error),
    /// The file is not valid JSON for [`SystemConfig`].
    Parse(serde_json::Error),
    /// A config field failed range validation.
    /// The `&'static str` describes which field and why.
    ValidationFailed(&'static str),
}

impl ConfigError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::NotFound)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e) => write!(f, "cannot read config: {e}"),
            Self::Parse(e) => write!(f, "invalid config: {e}"),
            Self::ValidationFailed(why) => write!(f, "invalid config: {why}"),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Parse(e) => Some(e),
            Self::ValidationFailed(_) => None,
        }
    }
}
