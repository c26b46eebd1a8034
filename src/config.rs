//! Tool configuration.
//!
//! Configuration is loaded in the following order (later overrides earlier):
//! 1. Default values
//! 2. YAML config file (if specified via --config or OTPKEY_CONFIG)
//! 3. Environment variables
//! 4. Command-line flags (applied by `main`)

use otpkey_client::{ConnectionConfig, RetryPolicy};
use otpkey_protocol::{BAUD_RATE, DEFAULT_OPEN_RETRY_INTERVAL, DEFAULT_SETTLE_DELAY};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable naming a config file.
pub const CONFIG_ENV: &str = "OTPKEY_CONFIG";

/// Tool configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Serial device settings.
    pub device: DeviceConfig,
    /// Port open retry settings.
    pub retry: RetryConfig,
}

impl Config {
    /// Loads configuration from `path` (or `OTPKEY_CONFIG`), then applies
    /// environment variable overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = path
            .map(Path::to_path_buf)
            .or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from));

        let mut config = match path {
            Some(path) => {
                let config = Self::from_file(&path)?;
                tracing::debug!("Loaded config from {}", path.display());
                config
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Loads configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::IoError(path.to_path_buf(), e))?;
        let config: Config = serde_yaml::from_str(&content)
            .map_err(|e| ConfigError::ParseError(path.to_path_buf(), e.to_string()))?;
        Ok(config)
    }

    /// Applies overrides looked up by variable name.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        self.device.apply_overrides(&lookup);
        self.retry.apply_overrides(&lookup);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.device.baud_rate == 0 {
            return Err(ConfigError::ValidationError(
                "device.baud_rate must be greater than 0".to_string(),
            ));
        }
        if self.device.read_timeout_ms == 0 {
            return Err(ConfigError::ValidationError(
                "device.read_timeout_ms must be greater than 0".to_string(),
            ));
        }
        if matches!(&self.device.port, Some(port) if port.trim().is_empty()) {
            return Err(ConfigError::ValidationError(
                "device.port must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Builds the connection settings for `port`.
    pub fn connection_config(&self, port: &str) -> ConnectionConfig {
        ConnectionConfig::new(port)
            .with_baud_rate(self.device.baud_rate)
            .with_read_timeout(self.device.read_timeout())
            .with_settle_delay(self.device.settle_delay())
            .with_retry(self.retry.policy())
    }
}

/// Serial device configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Port to use; asked interactively when unset.
    pub port: Option<String>,
    /// Line speed.
    pub baud_rate: u32,
    /// Maximum wait for a reply line, in milliseconds.
    pub read_timeout_ms: u64,
    /// Pause after opening the port, in milliseconds.
    pub settle_ms: u64,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            port: None,
            baud_rate: BAUD_RATE,
            read_timeout_ms: otpkey_client::connection::DEFAULT_READ_TIMEOUT.as_millis() as u64,
            settle_ms: DEFAULT_SETTLE_DELAY.as_millis() as u64,
        }
    }
}

impl DeviceConfig {
    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(port) = lookup("OTPKEY_PORT") {
            if !port.is_empty() {
                self.port = Some(port);
            }
        }

        if let Some(baud) = lookup("OTPKEY_BAUD") {
            if let Ok(n) = baud.parse() {
                self.baud_rate = n;
            }
        }

        if let Some(timeout) = lookup("OTPKEY_READ_TIMEOUT_MS") {
            if let Ok(ms) = timeout.parse() {
                self.read_timeout_ms = ms;
            }
        }

        if let Some(settle) = lookup("OTPKEY_SETTLE_MS") {
            if let Ok(ms) = settle.parse() {
                self.settle_ms = ms;
            }
        }
    }

    /// Returns read timeout as Duration.
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    /// Returns settle delay as Duration.
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
}

/// Port open retry configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Open attempts before giving up (0 = retry forever).
    pub max_attempts: u32,
    /// Pause between attempts, in milliseconds.
    pub interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: otpkey_client::retry::DEFAULT_MAX_ATTEMPTS,
            interval_ms: DEFAULT_OPEN_RETRY_INTERVAL.as_millis() as u64,
        }
    }
}

impl RetryConfig {
    fn apply_overrides(&mut self, lookup: &dyn Fn(&str) -> Option<String>) {
        if let Some(attempts) = lookup("OTPKEY_RETRY_ATTEMPTS") {
            if let Ok(n) = attempts.parse() {
                self.max_attempts = n;
            }
        }

        if let Some(interval) = lookup("OTPKEY_RETRY_INTERVAL_MS") {
            if let Ok(ms) = interval.parse() {
                self.interval_ms = ms;
            }
        }
    }

    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_interval(Duration::from_millis(self.interval_ms))
            .with_max_attempts(self.max_attempts)
    }
}

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    IoError(PathBuf, std::io::Error),
    ParseError(PathBuf, String),
    ValidationError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::IoError(path, e) => {
                write!(f, "failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::ValidationError(msg) => {
                write!(f, "configuration validation failed: {}", msg)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.device.port, None);
        assert_eq!(config.device.baud_rate, 115_200);
        assert_eq!(config.device.settle_delay(), Duration::from_secs(2));
        assert_eq!(config.retry.interval_ms, 2000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_connection_config() {
        let mut config = Config::default();
        config.retry.max_attempts = 0;
        config.device.read_timeout_ms = 750;

        let conn = config.connection_config("/dev/ttyACM0");
        assert_eq!(conn.port, "/dev/ttyACM0");
        assert_eq!(conn.baud_rate, 115_200);
        assert_eq!(conn.read_timeout, Duration::from_millis(750));
        assert_eq!(conn.retry.max_attempts, None);
        assert_eq!(conn.retry.interval, Duration::from_secs(2));
    }

    #[test]
    fn test_overrides() {
        let env: HashMap<&str, &str> = [
            ("OTPKEY_PORT", "/dev/ttyUSB1"),
            ("OTPKEY_BAUD", "9600"),
            ("OTPKEY_RETRY_ATTEMPTS", "5"),
            ("OTPKEY_RETRY_INTERVAL_MS", "not-a-number"),
        ]
        .into_iter()
        .collect();

        let mut config = Config::default();
        config.apply_overrides(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyUSB1"));
        assert_eq!(config.device.baud_rate, 9600);
        assert_eq!(config.retry.max_attempts, 5);
        // Unparseable values are ignored.
        assert_eq!(config.retry.interval_ms, 2000);
    }

    #[test]
    fn test_yaml_roundtrip() {
        let mut config = Config::default();
        config.device.port = Some("COM4".to_string());
        let yaml = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_from_file_partial() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device:\n  port: /dev/ttyACM1\nretry:\n  max_attempts: 0").unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.device.port.as_deref(), Some("/dev/ttyACM1"));
        assert_eq!(config.device.baud_rate, 115_200);
        assert_eq!(config.retry.max_attempts, 0);
        assert_eq!(config.retry.policy().max_attempts, None);
    }

    #[test]
    fn test_from_file_errors() {
        let err = Config::from_file("/nonexistent/otpkey.yaml").unwrap_err();
        assert!(matches!(err, ConfigError::IoError(..)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "device: [not, a, map]").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(..)));
        assert!(err.to_string().contains("failed to parse"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        config.device.baud_rate = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.read_timeout_ms = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.device.port = Some("  ".to_string());
        assert!(config.validate().is_err());
    }
}
