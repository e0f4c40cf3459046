//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GyroRelayError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,

    #[serde(default)]
    pub udp: UdpConfig,

    #[serde(default)]
    pub discovery: DiscoveryConfig,

    #[serde(default)]
    pub stats: StatsConfig,
}

/// Serial channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    /// Whether the serial channel should be started at all.
    /// Disable for WiFi-only setups where the sensor streams over UDP.
    #[serde(default = "default_serial_enabled")]
    pub enabled: bool,

    /// Explicit device path (e.g. "/dev/ttyUSB0"). When unset, port
    /// discovery runs once at startup and auto-selects a candidate.
    #[serde(default)]
    pub device: Option<String>,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

/// UDP channel configuration
#[derive(Debug, Deserialize, Clone)]
pub struct UdpConfig {
    #[serde(default = "default_udp_port")]
    pub port: u16,

    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,

    #[serde(default = "default_error_delay_ms")]
    pub error_delay_ms: u64,
}

/// Serial port discovery configuration
#[derive(Debug, Deserialize, Clone)]
pub struct DiscoveryConfig {
    /// Candidates whose path contains any of these substrings are dropped.
    /// Defaults cover macOS system ports that are never sensor devices.
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,

    /// Exact device paths to restrict discovery to. An empty list accepts
    /// every non-ignored candidate.
    #[serde(default)]
    pub allow: Vec<String>,
}

/// Stats summary logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StatsConfig {
    #[serde(default = "default_stats_interval_ms")]
    pub log_interval_ms: u64,
}

// Default value functions
fn default_serial_enabled() -> bool { true }
fn default_baud_rate() -> u32 { 921_600 }
fn default_read_timeout_ms() -> u64 { 100 }
fn default_reconnect_delay_ms() -> u64 { 2000 }

fn default_udp_port() -> u16 { 4210 }
fn default_recv_timeout_ms() -> u64 { 1000 }
fn default_error_delay_ms() -> u64 { 500 }

fn default_ignore() -> Vec<String> {
    vec![
        "wlan-debug".to_string(),
        "Bluetooth".to_string(),
        "debug-console".to_string(),
    ]
}

fn default_stats_interval_ms() -> u64 { 5000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            enabled: default_serial_enabled(),
            device: None,
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            port: default_udp_port(),
            recv_timeout_ms: default_recv_timeout_ms(),
            error_delay_ms: default_error_delay_ms(),
        }
    }
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            ignore: default_ignore(),
            allow: Vec::new(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            log_interval_ms: default_stats_interval_ms(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            serial: SerialConfig::default(),
            udp: UdpConfig::default(),
            discovery: DiscoveryConfig::default(),
            stats: StatsConfig::default(),
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

impl UdpConfig {
    pub fn recv_timeout(&self) -> Duration {
        Duration::from_millis(self.recv_timeout_ms)
    }

    pub fn error_delay(&self) -> Duration {
        Duration::from_millis(self.error_delay_ms)
    }
}

impl StatsConfig {
    pub fn log_interval(&self) -> Duration {
        Duration::from_millis(self.log_interval_ms)
    }
}

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
    /// use gyro_relay::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults when
    /// the file does not exist. A file that exists but fails to parse or
    /// validate is still an error.
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if let Some(device) = &self.serial.device {
            if device.is_empty() {
                return Err(GyroRelayError::InvalidConfig(
                    "serial device path cannot be empty (omit it for auto-discovery)".to_string(),
                ));
            }
        }

        if self.serial.baud_rate == 0 {
            return Err(GyroRelayError::InvalidConfig(
                "baud_rate must be greater than 0".to_string(),
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 10_000 {
            return Err(GyroRelayError::InvalidConfig(
                "read_timeout_ms must be between 1 and 10000".to_string(),
            ));
        }

        if self.serial.reconnect_delay_ms == 0 || self.serial.reconnect_delay_ms > 60_000 {
            return Err(GyroRelayError::InvalidConfig(
                "reconnect_delay_ms must be between 1 and 60000".to_string(),
            ));
        }

        if self.udp.port == 0 {
            return Err(GyroRelayError::InvalidConfig(
                "udp port must be greater than 0".to_string(),
            ));
        }

        if self.udp.recv_timeout_ms == 0 || self.udp.recv_timeout_ms > 10_000 {
            return Err(GyroRelayError::InvalidConfig(
                "recv_timeout_ms must be between 1 and 10000".to_string(),
            ));
        }

        if self.udp.error_delay_ms == 0 || self.udp.error_delay_ms > 60_000 {
            return Err(GyroRelayError::InvalidConfig(
                "error_delay_ms must be between 1 and 60000".to_string(),
            ));
        }

        if self.stats.log_interval_ms == 0 || self.stats.log_interval_ms > 600_000 {
            return Err(GyroRelayError::InvalidConfig(
                "log_interval_ms must be between 1 and 600000".to_string(),
            ));
        }

        Ok(())
    }
}
