//! Error types for the mindnoscape core.
//!
//! All services return the same taxonomy of error kinds, augmented by a
//! message. Store-level failures are mapped into these kinds with context
//! attached but the kind preserved, so callers can match on what went wrong
//! without caring which layer noticed it.
//!
//! # Error Handling Pattern
//! ```rust,ignore
//! use mindnoscape::{Manager, Config, Result};
//!
//! fn example() -> Result<()> {
//!     let manager = Manager::new(Config::default())?;
//!     // ... operations that may fail ...
//!     manager.close()?;
//!     Ok(())
//! }
//! ```

use thiserror::Error;

/// Result type alias for mindnoscape operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level error enum for all core operations.
///
/// This is the only error type returned by public APIs.
/// Use pattern matching to handle specific error cases.
#[derive(Debug, Error)]
pub enum Error {
    /// Referenced user, mind-map, node, or session does not exist.
    #[error("{0}")]
    NotFound(#[from] NotFoundError),

    /// Uniqueness violation: duplicate username, duplicate mind-map name
    /// for an owner, or an attempt to re-add a forced node id.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Caller lacks the required permission level on the mind-map.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// Bad index string, missing required selection, illegal operation on
    /// the root node, cycle in a move, or malformed command.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Invariant violated in persistent state.
    #[error("Corruption: {0}")]
    Corruption(String),

    /// Storage or file-system failure.
    #[error("I/O error: {0}")]
    Io(String),

    /// Deadline elapsed or explicit cancellation.
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// Configuration error (load-time only).
    #[error("Configuration error: {reason}")]
    Config {
        /// Description of what's wrong with the configuration.
        reason: String,
    },
}

impl Error {
    /// Creates a conflict error with the given message.
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    /// Creates a permission-denied error with the given message.
    pub fn permission(msg: impl Into<String>) -> Self {
        Self::PermissionDenied(msg.into())
    }

    /// Creates an invalid-argument error with the given message.
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    /// Creates an invalid-argument error for a named field.
    pub fn invalid_field(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidArgument(format!("invalid field '{}': {}", field.into(), reason.into()))
    }

    /// Creates a corruption error with the given message.
    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::Corruption(msg.into())
    }

    /// Creates an I/O error with the given message.
    pub fn io(msg: impl Into<String>) -> Self {
        Self::Io(msg.into())
    }

    /// Creates a cancelled error with the given message.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Creates a configuration error with the given reason.
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }

    /// Returns true if this is a "not found" error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Returns true if this is a conflict error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Returns true if this is a permission-denied error.
    pub fn is_permission_denied(&self) -> bool {
        matches!(self, Self::PermissionDenied(_))
    }

    /// Returns true if this is an invalid-argument error.
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_))
    }

    /// Returns true if this is a corruption error.
    pub fn is_corruption(&self) -> bool {
        matches!(self, Self::Corruption(_))
    }

    /// Returns true if this is an I/O error.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Io(_))
    }

    /// Returns true if this is a cancelled error.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled(_))
    }
}

/// Not found errors for specific entity types.
#[derive(Debug, Error)]
pub enum NotFoundError {
    /// User with the given username or id not found.
    #[error("User not found: {0}")]
    User(String),

    /// Mind-map with the given name or id not found.
    #[error("Mindmap not found: {0}")]
    Mindmap(String),

    /// Node with the given id or index not found.
    #[error("Node not found: {0}")]
    Node(String),

    /// Session with the given id not found.
    #[error("Session not found: {0}")]
    Session(String),
}

impl NotFoundError {
    /// Creates a user not found error.
    pub fn user(id: impl ToString) -> Self {
        Self::User(id.to_string())
    }

    /// Creates a mind-map not found error.
    pub fn mindmap(id: impl ToString) -> Self {
        Self::Mindmap(id.to_string())
    }

    /// Creates a node not found error.
    pub fn node(id: impl ToString) -> Self {
        Self::Node(id.to_string())
    }

    /// Creates a session not found error.
    pub fn session(id: impl ToString) -> Self {
        Self::Session(id.to_string())
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

/// Maps SQLite errors into the core taxonomy.
///
/// Constraint violations become `Conflict` (unique usernames, unique
/// (name, owner) pairs, forced node ids); type/decoding failures become
/// `Corruption`; everything else is `Io`.
impl From<rusqlite::Error> for Error {
    fn from(err: rusqlite::Error) -> Self {
        use rusqlite::ffi::ErrorCode;
        match &err {
            rusqlite::Error::SqliteFailure(e, msg) => match e.code {
                ErrorCode::ConstraintViolation => {
                    Error::Conflict(msg.clone().unwrap_or_else(|| e.to_string()))
                }
                ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase => {
                    Error::Corruption(msg.clone().unwrap_or_else(|| e.to_string()))
                }
                _ => Error::Io(err.to_string()),
            },
            rusqlite::Error::FromSqlConversionFailure(..)
            | rusqlite::Error::IntegralValueOutOfRange(..)
            | rusqlite::Error::InvalidColumnType(..) => Error::Corruption(err.to_string()),
            _ => Error::Io(err.to_string()),
        }
    }
}
