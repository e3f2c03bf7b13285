//! Configuration module for gatekeep.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::{GatekeepError, Result};

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Process-local sharded map. Contents are lost on exit.
    #[default]
    Memory,
    /// SQLite file via sqlx.
    Sqlite,
}

/// Storage configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Which backend to open.
    #[serde(default)]
    pub backend: BackendKind,
    /// Path to the SQLite database file (`:memory:` for a private in-memory database).
    #[serde(default = "default_storage_path")]
    pub path: String,
    /// Maximum pooled connections (SQLite only).
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Upper bound for a single storage operation, in milliseconds.
    #[serde(default = "default_op_timeout")]
    pub op_timeout_ms: u64,
}

fn default_storage_path() -> String {
    "data/gatekeep.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

fn default_op_timeout() -> u64 {
    5000
}

impl StorageConfig {
    /// The per-operation timeout as a `Duration`.
    pub fn op_timeout(&self) -> Duration {
        Duration::from_millis(self.op_timeout_ms)
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_storage_path(),
            max_connections: default_max_connections(),
            op_timeout_ms: default_op_timeout(),
        }
    }
}

/// Argon2id parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Time cost (iterations).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Degree of parallelism (lanes).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
    /// Digest length in bytes.
    #[serde(default = "default_output_len")]
    pub output_len: usize,
    /// Salt length in bytes.
    #[serde(default = "default_salt_len")]
    pub salt_len: usize,
    /// Hashes allowed to run at once (0 means one per CPU).
    #[serde(default)]
    pub max_concurrent: usize,
}

fn default_memory_kib() -> u32 {
    65536 // 64 MB
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

fn default_output_len() -> usize {
    32
}

fn default_salt_len() -> usize {
    16
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
            output_len: default_output_len(),
            salt_len: default_salt_len(),
            max_concurrent: 0,
        }
    }
}

impl HashingConfig {
    /// Effective hashing concurrency, resolving 0 to the CPU count.
    pub fn concurrency_limit(&self) -> usize {
        if self.max_concurrent > 0 {
            return self.max_concurrent;
        }
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    }
}

/// Session lifetime configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    /// Session time-to-live in seconds.
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    /// Interval between eager purges of expired sessions, in seconds.
    #[serde(default = "default_cleanup_interval")]
    pub cleanup_interval_secs: u64,
}

/// Longest accepted session lifetime (10 years).
pub const MAX_SESSION_TTL_SECS: u64 = 10 * 365 * 24 * 60 * 60;

fn default_session_ttl() -> u64 {
    24 * 60 * 60
}

fn default_cleanup_interval() -> u64 {
    300
}

impl SessionConfig {
    /// The session TTL as a `Duration`.
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cleanup_interval_secs: default_cleanup_interval(),
        }
    }
}

/// Failed-login limiter configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoginConfig {
    /// Failures tolerated inside the window before lockout (0 disables the limiter).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Window over which failures are counted, in seconds.
    #[serde(default = "default_window")]
    pub window_secs: u64,
    /// Lockout duration, in seconds.
    #[serde(default = "default_lockout")]
    pub lockout_secs: u64,
}

fn default_max_attempts() -> u32 {
    5
}

fn default_window() -> u64 {
    300
}

fn default_lockout() -> u64 {
    300
}

impl Default for LoginConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            window_secs: default_window(),
            lockout_secs: default_lockout(),
        }
    }
}

/// Input validation limits for registration.
#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    /// Minimum username length.
    #[serde(default = "default_min_username")]
    pub min_username_length: usize,
    /// Maximum username length.
    #[serde(default = "default_max_username")]
    pub max_username_length: usize,
    /// Minimum password length.
    #[serde(default = "default_min_password")]
    pub min_password_length: usize,
    /// Maximum password length.
    #[serde(default = "default_max_password")]
    pub max_password_length: usize,
}

fn default_min_username() -> usize {
    3
}

fn default_max_username() -> usize {
    32
}

fn default_min_password() -> usize {
    6
}

fn default_max_password() -> usize {
    128
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_username_length: default_min_username(),
            max_username_length: default_max_username(),
            min_password_length: default_min_password(),
            max_password_length: default_max_password(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file. Empty means console only.
    #[serde(default)]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: String::new(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// Storage configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Password hashing parameters.
    #[serde(default)]
    pub hashing: HashingConfig,
    /// Session configuration.
    #[serde(default)]
    pub session: SessionConfig,
    /// Failed-login limiter.
    #[serde(default)]
    pub login: LoginConfig,
    /// Registration input limits.
    #[serde(default)]
    pub validation: ValidationConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(GatekeepError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| GatekeepError::Config(format!("parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `GATEKEEP_STORAGE_PATH`: Override the SQLite database path
    /// - `GATEKEEP_LOG_LEVEL`: Override the log level
    pub fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("GATEKEEP_STORAGE_PATH") {
            if !path.is_empty() {
                self.storage.path = path;
            }
        }
        if let Ok(level) = std::env::var("GATEKEEP_LOG_LEVEL") {
            if !level.is_empty() {
                self.logging.level = level;
            }
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.session.ttl_secs == 0 {
            return Err(GatekeepError::Config(
                "session.ttl_secs must be positive".to_string(),
            ));
        }
        if self.session.ttl_secs > MAX_SESSION_TTL_SECS {
            return Err(GatekeepError::Config(format!(
                "session.ttl_secs must be at most {MAX_SESSION_TTL_SECS}"
            )));
        }
        if self.storage.op_timeout_ms == 0 {
            return Err(GatekeepError::Config(
                "storage.op_timeout_ms must be positive".to_string(),
            ));
        }
        if !(16..=64).contains(&self.hashing.output_len) {
            return Err(GatekeepError::Config(
                "hashing.output_len must be between 16 and 64 bytes".to_string(),
            ));
        }
        if !(8..=64).contains(&self.hashing.salt_len) {
            return Err(GatekeepError::Config(
                "hashing.salt_len must be between 8 and 64 bytes".to_string(),
            ));
        }
        if self.hashing.iterations == 0 || self.hashing.parallelism == 0 {
            return Err(GatekeepError::Config(
                "hashing.iterations and hashing.parallelism must be positive".to_string(),
            ));
        }
        if self.hashing.memory_kib < 8 * self.hashing.parallelism {
            return Err(GatekeepError::Config(
                "hashing.memory_kib must be at least 8 KiB per lane".to_string(),
            ));
        }
        let v = &self.validation;
        if v.min_username_length == 0 || v.min_username_length > v.max_username_length {
            return Err(GatekeepError::Config(
                "validation username length bounds are inconsistent".to_string(),
            ));
        }
        if v.min_password_length == 0 || v.min_password_length > v.max_password_length {
            return Err(GatekeepError::Config(
                "validation password length bounds are inconsistent".to_string(),
            ));
        }
        Ok(())
    }
}
