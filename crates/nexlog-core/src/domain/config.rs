//! Logging configuration
//!
//! Read once at process start from the environment. Runtime reconfiguration
//! is not supported.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::Level;

/// Active file for size-based rotation
pub const APP_LOG_FILE: &str = "app.log";
/// Active file for time-based rotation
pub const TIMED_LOG_FILE: &str = "app_timed.log";
/// Active file for ERROR and above
pub const ERROR_LOG_FILE: &str = "error.log";

/// Environment variable names
pub mod env_keys {
    pub const ENV: &str = "ENV";
    pub const DEBUG: &str = "DEBUG";
    pub const LOG_LEVEL: &str = "LOG_LEVEL";
    pub const LOG_DIR: &str = "LOG_DIR";
    pub const LOG_MAX_FILE_SIZE_MB: &str = "LOG_MAX_FILE_SIZE_MB";
    pub const LOG_MAX_FILE_SIZE_BYTES: &str = "LOG_MAX_FILE_SIZE_BYTES";
    pub const LOG_MAX_BACKUP_COUNT: &str = "LOG_MAX_BACKUP_COUNT";
    pub const LOG_ROTATION_INTERVAL_HOURS: &str = "LOG_ROTATION_INTERVAL_HOURS";
    pub const LOG_TIMED_BACKUP_COUNT: &str = "LOG_TIMED_BACKUP_COUNT";
    pub const LOG_BUFFERED: &str = "LOG_BUFFERED";
    pub const LOG_CONSOLE: &str = "LOG_CONSOLE";
    pub const LOG_FILES: &str = "LOG_FILES";
}

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {var}: {reason}")]
    InvalidValue {
        var: &'static str,
        value: String,
        reason: &'static str,
    },
}

/// Deployment environment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    Local,
    Production,
}

impl Environment {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "local" | "development" | "dev" | "test" => Some(Self::Local),
            "production" | "prod" => Some(Self::Production),
            _ => None,
        }
    }

    /// Minimum level used when `LOG_LEVEL` is not set
    pub fn default_level(&self) -> Level {
        match self {
            Self::Local => Level::Debug,
            Self::Production => Level::Info,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Local => "local",
            Self::Production => "production",
        }
    }
}

/// Size-triggered rotation: `app.log` -> `app.log.1` -> `app.log.2` ...
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SizePolicy {
    /// Maximum bytes in the active file before rotation
    pub max_bytes: u64,
    /// Number of numbered backups to keep
    pub backup_count: usize,
}

impl Default for SizePolicy {
    fn default() -> Self {
        Self {
            max_bytes: 10 * 1024 * 1024, // 10MB
            backup_count: 5,
        }
    }
}

/// Time-triggered rotation with timestamp-suffixed backups
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimePolicy {
    /// Interval length in hours
    pub interval_hours: u32,
    /// Number of most recent intervals to keep
    pub backup_count: usize,
}

impl Default for TimePolicy {
    fn default() -> Self {
        Self {
            interval_hours: 24,
            backup_count: 7,
        }
    }
}

/// Size and time rotation settings
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationPolicy {
    pub size: SizePolicy,
    pub time: TimePolicy,
}

/// Minimum level override for a dotted logger prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggerOverride {
    pub prefix: String,
    pub level: Level,
}

impl LoggerOverride {
    pub fn new(prefix: impl Into<String>, level: Level) -> Self {
        Self {
            prefix: prefix.into(),
            level,
        }
    }
}

/// Records dropped as noise before formatting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoiseFilterConfig {
    /// Dotted logger prefixes whose records are dropped
    pub logger_prefixes: Vec<String>,
    /// Case-insensitive message fragments whose records are dropped
    pub message_fragments: Vec<String>,
}

impl Default for NoiseFilterConfig {
    fn default() -> Self {
        Self {
            logger_prefixes: vec!["watchfiles".to_string()],
            message_fragments: vec!["change detected".to_string(), "watchdog".to_string()],
        }
    }
}

/// Process-wide logging configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    pub environment: Environment,
    /// Include exception details in error responses
    pub debug: bool,
    /// Minimum level for all loggers without an override
    pub level: Level,
    /// Directory holding `app.log`, `app_timed.log` and `error.log`
    pub log_dir: PathBuf,
    pub rotation: RotationPolicy,
    /// Run file sinks behind a background writer thread
    pub buffered: bool,
    /// Write records to stdout
    pub console: bool,
    /// Write records to the log files
    pub file_sinks: bool,
    pub overrides: Vec<LoggerOverride>,
    pub noise: NoiseFilterConfig,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let environment = Environment::Local;
        Self {
            environment,
            debug: true,
            level: environment.default_level(),
            log_dir: PathBuf::from("logs"),
            rotation: RotationPolicy::default(),
            buffered: true,
            console: true,
            file_sinks: true,
            overrides: default_overrides(),
            noise: NoiseFilterConfig::default(),
        }
    }
}

fn default_overrides() -> Vec<LoggerOverride> {
    vec![
        LoggerOverride::new("hyper", Level::Warning),
        LoggerOverride::new("h2", Level::Warning),
        LoggerOverride::new("tower_http", Level::Warning),
        LoggerOverride::new("watchfiles", Level::Warning),
    ]
}

impl LoggingConfig {
    /// Build from the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_env_map(&std::env::vars().collect())
    }

    /// Build from a provided variable map (useful for testing)
    pub fn from_env_map(env: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let lookup = |key: &str| env.get(key).map(|v| v.trim()).filter(|v| !v.is_empty());
        let mut config = Self::default();

        if let Some(value) = lookup(env_keys::ENV) {
            config.environment = Environment::parse(value).ok_or_else(|| ConfigError::InvalidValue {
                var: env_keys::ENV,
                value: value.to_string(),
                reason: "expected local or production",
            })?;
        }
        config.debug = !config.environment.is_production();
        config.level = config.environment.default_level();

        if let Some(value) = lookup(env_keys::DEBUG) {
            config.debug = parse_bool(env_keys::DEBUG, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_LEVEL) {
            config.level = Level::parse(value).ok_or_else(|| ConfigError::InvalidValue {
                var: env_keys::LOG_LEVEL,
                value: value.to_string(),
                reason: "expected DEBUG, INFO, WARNING, ERROR or CRITICAL",
            })?;
        }
        if let Some(value) = lookup(env_keys::LOG_DIR) {
            config.log_dir = PathBuf::from(value);
        }
        if let Some(value) = lookup(env_keys::LOG_MAX_FILE_SIZE_MB) {
            let mb: u64 = parse_number(env_keys::LOG_MAX_FILE_SIZE_MB, value)?;
            config.rotation.size.max_bytes = mb.saturating_mul(1024 * 1024);
        }
        if let Some(value) = lookup(env_keys::LOG_MAX_FILE_SIZE_BYTES) {
            config.rotation.size.max_bytes = parse_number(env_keys::LOG_MAX_FILE_SIZE_BYTES, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_MAX_BACKUP_COUNT) {
            config.rotation.size.backup_count = parse_number(env_keys::LOG_MAX_BACKUP_COUNT, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_ROTATION_INTERVAL_HOURS) {
            let hours: u32 = parse_number(env_keys::LOG_ROTATION_INTERVAL_HOURS, value)?;
            if hours == 0 {
                return Err(ConfigError::InvalidValue {
                    var: env_keys::LOG_ROTATION_INTERVAL_HOURS,
                    value: value.to_string(),
                    reason: "interval must be at least one hour",
                });
            }
            config.rotation.time.interval_hours = hours;
        }
        if let Some(value) = lookup(env_keys::LOG_TIMED_BACKUP_COUNT) {
            config.rotation.time.backup_count = parse_number(env_keys::LOG_TIMED_BACKUP_COUNT, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_BUFFERED) {
            config.buffered = parse_bool(env_keys::LOG_BUFFERED, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_CONSOLE) {
            config.console = parse_bool(env_keys::LOG_CONSOLE, value)?;
        }
        if let Some(value) = lookup(env_keys::LOG_FILES) {
            config.file_sinks = parse_bool(env_keys::LOG_FILES, value)?;
        }

        Ok(config)
    }

    /// Configuration writing only to files under `log_dir`, unbuffered
    pub fn files_only(log_dir: impl AsRef<Path>) -> Self {
        Self {
            log_dir: log_dir.as_ref().to_path_buf(),
            buffered: false,
            console: false,
            ..Self::default()
        }
    }

    pub fn app_log_path(&self) -> PathBuf {
        self.log_dir.join(APP_LOG_FILE)
    }

    pub fn timed_log_path(&self) -> PathBuf {
        self.log_dir.join(TIMED_LOG_FILE)
    }

    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir.join(ERROR_LOG_FILE)
    }
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            var,
            value: value.to_string(),
            reason: "expected a boolean",
        }),
    }
}

fn parse_number<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::InvalidValue {
        var,
        value: value.to_string(),
        reason: "expected a non-negative integer",
    })
}
