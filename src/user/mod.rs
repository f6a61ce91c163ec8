//! User management.
//!
//! A thin policy wrapper over the store: usernames are validated, passwords
//! are salted and hashed (argon2id, PHC string format) before they reach
//! the store, and authentication verifies against the stored hash with the
//! constant-time comparison the hashing crate provides. Deleting a user
//! triggers the store cascade over their owned mind-maps, then emits a
//! `UserDeleted` event for anyone listening.

pub mod types;

use std::sync::Arc;

use argon2::password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use tracing::{info, instrument};

use crate::error::{Error, NotFoundError, Result};
use crate::events::{EventBus, UserEvent};
use crate::store::schema::MAX_USERNAME_LEN;
use crate::store::SqliteStore;

use self::types::{NewUser, User, UserFilter, UserPatch, UserUpdate};

/// The user service.
pub struct UserService {
    store: Arc<SqliteStore>,
    bus: Arc<EventBus>,
    default_user: String,
}

impl UserService {
    /// Creates a user service. `default_user` is the bootstrap account
    /// whose password may not be changed through [`update`](Self::update).
    pub fn new(store: Arc<SqliteStore>, bus: Arc<EventBus>, default_user: String) -> Self {
        Self {
            store,
            bus,
            default_user,
        }
    }

    /// Creates a user, hashing the password before it is stored.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for an empty or oversized username; `Conflict`
    /// for a duplicate.
    #[instrument(skip(self, info), fields(username = %info.username))]
    pub fn create(&self, info: NewUser) -> Result<User> {
        validate_username(&info.username)?;

        let hash = hash_password(&info.password)?;
        let id = self.store.add_user(&info.username, &hash, info.active)?;

        info!(id = %id, "User created");
        self.get(&info.username)
    }

    /// Returns the user with the given username.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such user exists.
    pub fn get(&self, username: &str) -> Result<User> {
        self.store
            .get_users(&UserFilter::by_username(username))?
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::user(username).into())
    }

    /// Returns every user matching the filter.
    pub fn find(&self, filter: &UserFilter) -> Result<Vec<User>> {
        self.store.get_users(filter)
    }

    /// Returns true if a user with the given username exists.
    pub fn exists(&self, username: &str) -> Result<bool> {
        Ok(!self
            .store
            .get_users(&UserFilter::by_username(username))?
            .is_empty())
    }

    /// Verifies a password against the stored hash.
    ///
    /// Returns `false` for unknown users rather than revealing whether the
    /// account exists. The hash comparison itself is constant-time.
    #[instrument(skip(self, password))]
    pub fn authenticate(&self, username: &str, password: &str) -> Result<bool> {
        let users = self.store.get_users(&UserFilter::by_username(username))?;
        let user = match users.into_iter().next() {
            Some(user) => user,
            None => return Ok(false),
        };
        verify_password(password, &user.password_hash)
    }

    /// Renames a user and/or changes their password.
    ///
    /// # Errors
    ///
    /// `PermissionDenied` when changing the configured default user's
    /// password; `Conflict` on a rename collision; `NotFound` for an
    /// unknown user.
    #[instrument(skip(self, update))]
    pub fn update(&self, username: &str, update: UserUpdate) -> Result<User> {
        if update.is_empty() {
            return self.get(username);
        }
        let user = self.get(username)?;

        if update.password.is_some() && username == self.default_user {
            return Err(Error::permission(
                "the default user's password cannot be changed",
            ));
        }
        if let Some(new_username) = &update.username {
            validate_username(new_username)?;
        }

        let patch = UserPatch {
            username: update.username.clone(),
            password_hash: update
                .password
                .as_deref()
                .map(hash_password)
                .transpose()?,
            active: None,
        };
        self.store.update_user(user.id, &patch)?;

        let current = update.username.as_deref().unwrap_or(username);
        info!(username = %current, "User updated");
        self.get(current)
    }

    /// Deletes a user. The store cascades over their owned mind-maps
    /// (dropping the per-mind-map tables), after which a `UserDeleted`
    /// event carrying the deleted user is emitted.
    ///
    /// # Errors
    ///
    /// `NotFound` for an unknown user.
    #[instrument(skip(self))]
    pub fn delete(&self, username: &str) -> Result<User> {
        let user = self.get(username)?;
        self.store.delete_user(user.id)?;

        self.bus.publish_user(UserEvent::UserDeleted { user: user.clone() });
        info!(username = %username, "User deleted");
        Ok(user)
    }
}

fn validate_username(username: &str) -> Result<()> {
    if username.is_empty() {
        return Err(Error::invalid_field("username", "must not be empty"));
    }
    if username.chars().count() > MAX_USERNAME_LEN {
        return Err(Error::invalid_field(
            "username",
            format!("must not exceed {} characters", MAX_USERNAME_LEN),
        ));
    }
    Ok(())
}

/// Hashes a password into a PHC string with a fresh per-user salt.
fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| Error::io(format!("password hashing failed: {}", e)))
}

/// Verifies a password against a stored PHC string.
fn verify_password(password: &str, stored: &str) -> Result<bool> {
    let parsed = PasswordHash::new(stored)
        .map_err(|e| Error::corruption(format!("stored password hash is invalid: {}", e)))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
