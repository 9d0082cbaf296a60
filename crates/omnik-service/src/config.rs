//! Service configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use omnik_core::{InverterInfo, PollerOptions, SERVICE_PORT, SessionOptions};

/// Service configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Inverter to poll.
    pub inverter: InverterConfig,
    /// Polling cadence.
    pub polling: PollingConfig,
    /// Storage settings.
    pub storage: StorageConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self, ConfigError> {
        let path = default_config_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Read {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Save configuration to a file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;

        // Create parent directories if needed
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent).map_err(|e| ConfigError::Write {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        std::fs::write(path.as_ref(), content).map_err(|e| ConfigError::Write {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Validate the configuration and return any errors.
    ///
    /// This checks:
    /// - The inverter address is set and the serial is non-zero
    /// - The port and both timeouts are non-zero
    /// - The poll interval is within bounds (5s - 1 hour)
    /// - The storage path is not empty and the keep-alive interval is non-zero
    ///
    /// Every failing field is reported, not just the first.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut errors = Vec::new();
        errors.extend(self.inverter.validate());
        errors.extend(self.polling.validate());
        errors.extend(self.storage.validate());

        if errors.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Validation(errors))
        }
    }

    /// Load and validate configuration from a file.
    pub fn load_validated<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Inverter connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InverterConfig {
    /// Host name or IP address of the inverter's Wi-Fi module.
    pub address: String,
    /// Serial number of the Wi-Fi module (decimal).
    pub serial: u64,
    /// TCP port.
    pub port: u16,
    /// Connect timeout in seconds.
    pub connect_timeout: u64,
    /// Reply timeout in seconds.
    pub read_timeout: u64,
}

impl Default for InverterConfig {
    fn default() -> Self {
        Self {
            address: String::new(),
            serial: 0,
            port: SERVICE_PORT,
            connect_timeout: 10,
            read_timeout: 10,
        }
    }
}

impl InverterConfig {
    /// Validate inverter configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.address.trim().is_empty() {
            errors.push(ValidationError::new(
                "inverter.address",
                "inverter address cannot be empty",
            ));
        }
        if self.serial == 0 {
            errors.push(ValidationError::new(
                "inverter.serial",
                "serial number must be set",
            ));
        }
        if self.port == 0 {
            errors.push(ValidationError::new("inverter.port", "port cannot be 0"));
        }
        if self.connect_timeout == 0 {
            errors.push(ValidationError::new(
                "inverter.connect_timeout",
                "connect timeout must be at least 1 second",
            ));
        }
        if self.read_timeout == 0 {
            errors.push(ValidationError::new(
                "inverter.read_timeout",
                "read timeout must be at least 1 second",
            ));
        }

        errors
    }

    /// Identity of the configured inverter.
    pub fn info(&self) -> InverterInfo {
        InverterInfo::new(self.address.clone(), self.serial)
    }

    /// Socket options for sessions with the configured inverter.
    pub fn session_options(&self) -> SessionOptions {
        SessionOptions::default()
            .port(self.port)
            .connect_timeout(Duration::from_secs(self.connect_timeout))
            .read_timeout(Duration::from_secs(self.read_timeout))
    }
}

/// Minimum poll interval in seconds.
pub const MIN_POLL_INTERVAL: u64 = 5;
/// Maximum poll interval in seconds (1 hour).
pub const MAX_POLL_INTERVAL: u64 = 3600;

/// Polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between reads.
    pub interval: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self { interval: 60 }
    }
}

impl PollingConfig {
    /// Validate polling configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.interval < MIN_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "polling.interval",
                format!(
                    "poll interval {} is too short (minimum {} seconds)",
                    self.interval, MIN_POLL_INTERVAL
                ),
            ));
        } else if self.interval > MAX_POLL_INTERVAL {
            errors.push(ValidationError::new(
                "polling.interval",
                format!(
                    "poll interval {} is too long (maximum {} seconds / 1 hour)",
                    self.interval, MAX_POLL_INTERVAL
                ),
            ));
        }

        errors
    }

    /// Poller options for this cadence.
    pub fn poller_options(&self) -> PollerOptions {
        PollerOptions::with_interval(Duration::from_secs(self.interval))
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Database file path.
    pub path: PathBuf,
    /// Seconds between keep-alive pings.
    pub keepalive_interval: u64,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            path: omnik_store::default_db_path(),
            keepalive_interval: 30,
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration.
    pub fn validate(&self) -> Vec<ValidationError> {
        let mut errors = Vec::new();

        if self.path.as_os_str().is_empty() {
            errors.push(ValidationError::new(
                "storage.path",
                "database path cannot be empty",
            ));
        }
        if self.keepalive_interval == 0 {
            errors.push(ValidationError::new(
                "storage.keepalive_interval",
                "keep-alive interval must be at least 1 second",
            ));
        }

        errors
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Failed to serialize config: {0}")]
    Serialize(toml::ser::Error),
    #[error("Failed to write config file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),
}

/// A single validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// The field path (e.g., `inverter.address` or `polling.interval`).
    pub field: String,
    /// Description of the validation failure.
    pub message: String,
}

impl ValidationError {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(|e| format!("  - {}", e))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("omnik")
        .join("service.toml")
}
