//! User data types.

use serde::{Deserialize, Serialize};

use crate::types::{Timestamp, UserId};

/// A user account.
///
/// The password hash is an opaque PHC-format string produced by the
/// password hashing function with a per-user salt. It never leaves the
/// core except through the store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    /// Store-assigned id, stable for the lifetime of the account.
    pub id: UserId,
    /// Unique, non-empty username.
    pub username: String,
    /// Opaque password hash (PHC string).
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// Whether the account may be selected by sessions.
    pub active: bool,
    /// Creation time.
    pub created: Timestamp,
    /// Last modification time.
    pub updated: Timestamp,
}

/// Input for creating a user.
#[derive(Clone, Debug, Default)]
pub struct NewUser {
    /// Username (unique, non-empty).
    pub username: String,
    /// Plaintext password; hashed before it reaches the store.
    pub password: String,
    /// Whether the account starts active.
    pub active: bool,
}

/// Service-level update to a user. `None` fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct UserUpdate {
    /// New username.
    pub username: Option<String>,
    /// New plaintext password (re-hashed before storage).
    pub password: Option<String>,
}

impl UserUpdate {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password.is_none()
    }
}

/// Store-level patch to a user row. `None` fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct UserPatch {
    /// New username.
    pub username: Option<String>,
    /// New password hash.
    pub password_hash: Option<String>,
    /// New active flag.
    pub active: Option<bool>,
}

impl UserPatch {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.username.is_none() && self.password_hash.is_none() && self.active.is_none()
    }
}

/// Attribute filter for user queries. Set fields must all match.
#[derive(Clone, Debug, Default)]
pub struct UserFilter {
    /// Match by id.
    pub id: Option<UserId>,
    /// Match by exact username.
    pub username: Option<String>,
    /// Match by active flag.
    pub active: Option<bool>,
}

impl UserFilter {
    /// Filter matching a single username.
    pub fn by_username(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Default::default()
        }
    }

    /// Filter matching a single id.
    pub fn by_id(id: UserId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}
