//! Configuration types for the mindnoscape core.
//!
//! The [`Config`] struct controls where durable state lives, which log files
//! the driver should write, the bootstrap default user, and the two runtime
//! knobs of the core (undo history depth, session idle timeout).
//!
//! # Example
//! ```rust
//! use mindnoscape::Config;
//!
//! // Use defaults
//! let config = Config::default();
//!
//! // Customize for a test fixture
//! let config = Config {
//!     database_dir: "/tmp/mind".into(),
//!     history_limit: 10,
//!     ..Default::default()
//! };
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Error, Result};

/// Core configuration options.
///
/// All fields have sensible defaults. Use struct update syntax to override
/// specific settings:
///
/// ```rust
/// use mindnoscape::Config;
///
/// let config = Config {
///     history_limit: 50,
///     ..Default::default()
/// };
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the database file. Created if missing.
    pub database_dir: PathBuf,

    /// Database file name inside [`database_dir`](Self::database_dir).
    pub database_file: String,

    /// Directory the driver writes log files into.
    pub log_dir: PathBuf,

    /// Command log file name (one line per executed command).
    pub command_log: String,

    /// Error log file name.
    pub error_log: String,

    /// Username of the bootstrap default user, created on first start.
    pub default_user: String,

    /// Whether the default user starts active.
    pub default_user_active: bool,

    /// Bootstrap password for the default user.
    ///
    /// Plaintext in the configuration file; hashed on first create and
    /// never stored in plaintext anywhere else.
    pub default_user_password: String,

    /// Maximum number of operation records kept per mind-map history.
    ///
    /// Older records are evicted from the bottom of the undo stack.
    /// Default: 100
    pub history_limit: usize,

    /// Seconds of inactivity after which a session is evicted by the
    /// periodic sweep. Default: 300
    pub session_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_dir: PathBuf::from("data"),
            database_file: "mindnoscape.db".to_string(),
            log_dir: PathBuf::from("log"),
            command_log: "commands.log".to_string(),
            error_log: "errors.log".to_string(),
            // "admin" mirrors what a fresh install expects to log in as
            default_user: "admin".to_string(),
            default_user_active: true,
            default_user_password: "admin".to_string(),
            history_limit: 100,
            session_timeout_secs: 300,
        }
    }
}

impl Config {
    /// Creates a new Config with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the configuration from a JSON file, writing the defaults
    /// first if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read, written, or
    /// parsed, or if the loaded configuration fails [`validate`](Self::validate).
    pub fn load_or_create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            let config = Config::default();
            config.write_to(path)?;
            info!(path = %path.display(), "Wrote default configuration");
            return Ok(config);
        }

        let raw = fs::read_to_string(path)
            .map_err(|e| Error::config(format!("cannot read {}: {}", path.display(), e)))?;
        let config: Config = serde_json::from_str(&raw)
            .map_err(|e| Error::config(format!("cannot parse {}: {}", path.display(), e)))?;
        config.validate()?;

        info!(path = %path.display(), "Configuration loaded");
        Ok(config)
    }

    /// Serializes this configuration as pretty JSON to the given path,
    /// creating parent directories as needed.
    pub fn write_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)
                    .map_err(|e| Error::config(format!("cannot create {}: {}", parent.display(), e)))?;
            }
        }
        let raw = serde_json::to_string_pretty(self)
            .map_err(|e| Error::config(format!("cannot serialize configuration: {}", e)))?;
        fs::write(path, raw)
            .map_err(|e| Error::config(format!("cannot write {}: {}", path.display(), e)))?;
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// Called automatically by [`load_or_create`](Self::load_or_create) and
    /// by `Manager::new()`. You can also call this explicitly.
    ///
    /// # Errors
    /// Returns `Error::Config` if:
    /// - any file name is empty
    /// - the default username is empty
    /// - `history_limit` is 0
    pub fn validate(&self) -> Result<()> {
        if self.database_file.is_empty() {
            return Err(Error::config("database_file must not be empty"));
        }
        if self.command_log.is_empty() {
            return Err(Error::config("command_log must not be empty"));
        }
        if self.error_log.is_empty() {
            return Err(Error::config("error_log must not be empty"));
        }
        if self.default_user.is_empty() {
            return Err(Error::config("default_user must not be empty"));
        }
        if self.history_limit == 0 {
            return Err(Error::config("history_limit must be greater than 0"));
        }
        Ok(())
    }

    /// Returns the full path of the database file.
    pub fn database_path(&self) -> PathBuf {
        self.database_dir.join(&self.database_file)
    }

    /// Returns the full path of the command log file.
    pub fn command_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.command_log)
    }

    /// Returns the full path of the error log file.
    pub fn error_log_path(&self) -> PathBuf {
        self.log_dir.join(&self.error_log)
    }
}
