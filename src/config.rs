//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use serde::de::Error;
use std::fs;
use std::path::Path;

use crate::error::{GroundStationError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub display: DisplayConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Telemetry ingestion and persistence configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_log_file")]
    pub log_file: String,

    #[serde(default = "default_persist")]
    pub persist: bool,

    /// Only frames whose team field matches are ingested. Empty accepts all.
    #[serde(default)]
    pub team_id: String,

    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

/// Display refresh configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DisplayConfig {
    #[serde(default = "default_refresh_interval_ms")]
    pub refresh_interval_ms: u64,

    #[serde(default = "default_window_size")]
    pub window_size: usize,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files. Empty logs to stderr only.
    #[serde(default)]
    pub dir: String,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyUSB0".to_string() }
fn default_baud_rate() -> u32 { 9600 }
fn default_timeout_ms() -> u64 { 4000 }

fn default_log_file() -> String { "taternauts.csv".to_string() }
fn default_persist() -> bool { true }
fn default_queue_capacity() -> usize { 64 }

fn default_refresh_interval_ms() -> u64 { 1000 }
fn default_window_size() -> usize { 20 }

fn default_log_level() -> String { "info".to_string() }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_file: default_log_file(),
            persist: default_persist(),
            team_id: String::new(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            refresh_interval_ms: default_refresh_interval_ms(),
            window_size: default_window_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            dir: String::new(),
        }
    }
}

/// Baud rates accepted for the telemetry radio link
const SUPPORTED_BAUD_RATES: &[u32] = &[
    1200, 2400, 4800, 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600,
];

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use taternauts_gs::config::Config;
    ///
    /// let config = Config::load("config/ground-station.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Team filter, if one is configured
    pub fn team_filter(&self) -> Option<&str> {
        let team = self.telemetry.team_id.trim();
        if team.is_empty() {
            None
        } else {
            Some(team)
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if !SUPPORTED_BAUD_RATES.contains(&self.serial.baud_rate) {
            return Err(invalid(format!(
                "baud_rate {} is not a standard rate",
                self.serial.baud_rate
            )));
        }

        if self.serial.timeout_ms == 0 || self.serial.timeout_ms > 60000 {
            return Err(invalid("timeout_ms must be between 1 and 60000"));
        }

        if self.telemetry.persist && self.telemetry.log_file.is_empty() {
            return Err(invalid("telemetry log_file cannot be empty when persist is enabled"));
        }

        if self.telemetry.queue_capacity == 0 || self.telemetry.queue_capacity > 4096 {
            return Err(invalid("queue_capacity must be between 1 and 4096"));
        }

        if self.display.refresh_interval_ms < 10 || self.display.refresh_interval_ms > 60000 {
            return Err(invalid("refresh_interval_ms must be between 10 and 60000"));
        }

        if self.display.window_size == 0 || self.display.window_size > 1000 {
            return Err(invalid("window_size must be between 1 and 1000"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("log level must be one of: trace, debug, info, warn, error"));
        }

        Ok(())
    }
}

fn invalid(msg: impl std::fmt::Display) -> GroundStationError {
    GroundStationError::Config(toml::de::Error::custom(msg))
}
