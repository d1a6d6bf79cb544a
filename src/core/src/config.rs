use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, WardenError};
use crate::{DEFAULT_FETCH_INTERVAL, DEFAULT_RETENTION};

const SECS_PER_HOUR: u64 = 60 * 60;
const SECS_PER_DAY: u64 = 24 * SECS_PER_HOUR;

/// Upper bound on report and node retention (100 years).
pub const MAX_RETENTION_DAYS: u64 = 36_500;

/// Upper bound on the report and cleaner intervals (one week).
pub const MAX_INTERVAL_SECS: u64 = 7 * SECS_PER_DAY;

/// Controller configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ControllerConfig {
    /// SQLite store file
    pub store_file: PathBuf,

    /// YAML file holding the ordered rule list
    pub rules_file: PathBuf,

    /// Expected agent reporting interval in seconds.
    /// Keep it the same as the agent fetch interval.
    pub report_interval_secs: u64,

    /// How long image and filesystem reports are kept, in days (0 = forever)
    pub retention_days: u64,

    /// How long a silent node is kept, in hours
    pub node_retention_hours: u64,

    /// Stale record cleaner tick, in seconds
    pub cleaner_interval_secs: u64,

    /// Upper bound for a single registry digest lookup, in seconds
    pub inspect_timeout_secs: u64,

    /// Bounded wait for graceful shutdown, in seconds
    pub shutdown_timeout_secs: u64,

    /// Log level
    pub log_level: LogLevel,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            store_file: PathBuf::from("store.db"),
            rules_file: PathBuf::from("config").join("rules.yaml"),
            report_interval_secs: DEFAULT_FETCH_INTERVAL,
            retention_days: DEFAULT_RETENTION,
            node_retention_hours: 24,
            cleaner_interval_secs: 60,
            inspect_timeout_secs: 10,
            shutdown_timeout_secs: 5,
            log_level: LogLevel::Info,
        }
    }
}

impl ControllerConfig {
    /// Load configuration from a YAML file. Missing keys fall back to defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            WardenError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        let config: Self = serde_yaml::from_str(&raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make the controller spin or never answer.
    pub fn validate(&self) -> Result<()> {
        if self.report_interval_secs == 0 {
            return Err(WardenError::Config(
                "report interval must be greater than 0".to_string(),
            ));
        }
        if self.cleaner_interval_secs == 0 {
            return Err(WardenError::Config(
                "cleaner interval must be greater than 0".to_string(),
            ));
        }
        if self.inspect_timeout_secs == 0 {
            return Err(WardenError::Config(
                "inspect timeout must be greater than 0".to_string(),
            ));
        }
        if self.retention_days > MAX_RETENTION_DAYS {
            return Err(WardenError::Config(format!(
                "retention must be at most {} days, got {}",
                MAX_RETENTION_DAYS, self.retention_days
            )));
        }
        if self.node_retention_hours > MAX_RETENTION_DAYS * 24 {
            return Err(WardenError::Config(format!(
                "node retention must be at most {} hours, got {}",
                MAX_RETENTION_DAYS * 24,
                self.node_retention_hours
            )));
        }
        if self.report_interval_secs > MAX_INTERVAL_SECS
            || self.cleaner_interval_secs > MAX_INTERVAL_SECS
        {
            return Err(WardenError::Config(format!(
                "intervals must be at most {} seconds",
                MAX_INTERVAL_SECS
            )));
        }
        Ok(())
    }

    pub fn report_interval(&self) -> Duration {
        Duration::from_secs(self.report_interval_secs)
    }

    /// Report retention. `Duration::ZERO` disables purging.
    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_days.saturating_mul(SECS_PER_DAY))
    }

    pub fn node_retention(&self) -> Duration {
        Duration::from_secs(self.node_retention_hours.saturating_mul(SECS_PER_HOUR))
    }

    pub fn cleaner_interval(&self) -> Duration {
        Duration::from_secs(self.cleaner_interval_secs)
    }

    pub fn inspect_timeout(&self) -> Duration {
        Duration::from_secs(self.inspect_timeout_secs)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }
}

/// Log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for tracing::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Error => tracing::Level::ERROR,
        }
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Self::Debug),
            "info" => Ok(Self::Info),
            "warn" => Ok(Self::Warn),
            "error" => Ok(Self::Error),
            _ => Err(format!(
                "unknown log level: '{}' (supported: debug, info, warn, error)",
                s
            )),
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Debug => write!(f, "debug"),
            Self::Info => write!(f, "info"),
            Self::Warn => write!(f, "warn"),
            Self::Error => write!(f, "error"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ControllerConfig::default();
        assert_eq!(config.store_file, PathBuf::from("store.db"));
        assert_eq!(config.report_interval(), Duration::from_secs(60));
        assert_eq!(config.retention(), Duration::from_secs(30 * 24 * 60 * 60));
        assert_eq!(config.node_retention(), Duration::from_secs(24 * 60 * 60));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_retention_disables_purge() {
        let config = ControllerConfig {
            retention_days: 0,
            ..Default::default()
        };
        assert_eq!(config.retention(), Duration::ZERO);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_interval() {
        let config = ControllerConfig {
            report_interval_secs: 0,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WardenError::Config(_))));

        let config = ControllerConfig {
            cleaner_interval_secs: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_huge_retention() {
        let config = ControllerConfig {
            retention_days: 300_000_000_000_000,
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(WardenError::Config(_))));
        assert_eq!(config.retention(), Duration::from_secs(u64::MAX));

        let config = ControllerConfig {
            node_retention_hours: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());
        assert_eq!(config.node_retention(), Duration::from_secs(u64::MAX));

        let config = ControllerConfig {
            report_interval_secs: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ControllerConfig {
            retention_days: MAX_RETENTION_DAYS,
            node_retention_hours: MAX_RETENTION_DAYS * 24,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_file_partial_yaml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("controller.yaml");
        std::fs::write(&path, "storeFile: /var/lib/warden/store.db\nretentionDays: 7\n").unwrap();

        let config = ControllerConfig::from_file(&path).unwrap();
        assert_eq!(config.store_file, PathBuf::from("/var/lib/warden/store.db"));
        assert_eq!(config.retention_days, 7);
        assert_eq!(config.cleaner_interval_secs, 60);
    }

    #[test]
    fn test_from_file_missing() {
        let result = ControllerConfig::from_file(Path::new("/nonexistent/controller.yaml"));
        assert!(matches!(result, Err(WardenError::Config(_))));
    }

    #[test]
    fn test_log_level_from_str() {
        assert_eq!("debug".parse::<LogLevel>().unwrap(), LogLevel::Debug);
        assert_eq!("WARN".parse::<LogLevel>().unwrap(), LogLevel::Warn);
        assert!("verbose".parse::<LogLevel>().is_err());
        assert_eq!(tracing::Level::from(LogLevel::Error), tracing::Level::ERROR);
    }
}
