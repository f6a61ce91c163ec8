//! Construction, wiring, and cross-service lifecycle.
//!
//! The [`Manager`] owns the store, the three services, the undo engine,
//! the registry of loaded mind-maps, and the session table. It wires the
//! rename bridge at construction, bootstraps the configured default user,
//! and runs the idle-session sweep.

use std::collections::HashSet;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{info, instrument};

use crate::config::Config;
use crate::error::{NotFoundError, Result};
use crate::events::EventBus;
use crate::history::HistoryService;
use crate::mindmap::state::MapRegistry;
use crate::mindmap::types::{Mindmap, MindmapFilter};
use crate::mindmap::MindmapService;
use crate::node::NodeService;
use crate::session::command::{Command, Reply};
use crate::session::{self, Session, SessionHandle};
use crate::store::SqliteStore;
use crate::types::{MindmapId, SessionId, Timestamp};
use crate::user::types::{NewUser, User};
use crate::user::UserService;

/// The shared core: one per process, used through [`SessionHandle`]s.
pub struct Manager {
    config: Config,
    store: Arc<SqliteStore>,
    bus: Arc<EventBus>,
    registry: Arc<MapRegistry>,
    users: UserService,
    mindmaps: MindmapService,
    nodes: Arc<NodeService>,
    history: HistoryService,
    sessions: DashMap<SessionId, Session>,
}

impl std::fmt::Debug for Manager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manager")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("loaded_mindmaps", &self.registry.loaded_count())
            .finish_non_exhaustive()
    }
}

impl Manager {
    /// Opens the store, wires the services and the rename bridge, and
    /// bootstraps the configured default user if it does not exist.
    ///
    /// # Errors
    ///
    /// Configuration, store-open, and bootstrap failures surface here;
    /// a driver treats them as fatal init failures.
    #[instrument(skip(config))]
    pub fn new(config: Config) -> Result<Arc<Self>> {
        config.validate()?;

        let store = Arc::new(SqliteStore::open(config.database_path())?);
        let bus = Arc::new(EventBus::new());
        bus.subscribe_rename(Box::new(crate::mindmap::handle_root_renamed));
        bus.subscribe_rename(Box::new(crate::node::handle_mindmap_renamed));

        let registry = Arc::new(MapRegistry::new(config.history_limit));
        let users = UserService::new(
            Arc::clone(&store),
            Arc::clone(&bus),
            config.default_user.clone(),
        );
        let mindmaps = MindmapService::new(
            Arc::clone(&store),
            Arc::clone(&registry),
            Arc::clone(&bus),
        );
        let nodes = Arc::new(NodeService::new(Arc::clone(&store), Arc::clone(&bus)));
        let history = HistoryService::new(Arc::clone(&nodes));

        let manager = Arc::new(Self {
            config,
            store,
            bus,
            registry,
            users,
            mindmaps,
            nodes,
            history,
            sessions: DashMap::new(),
        });
        manager.bootstrap_default_user()?;

        info!("Manager ready");
        Ok(manager)
    }

    fn bootstrap_default_user(&self) -> Result<()> {
        if self.users.exists(&self.config.default_user)? {
            return Ok(());
        }
        self.users.create(NewUser {
            username: self.config.default_user.clone(),
            password: self.config.default_user_password.clone(),
            active: self.config.default_user_active,
        })?;
        info!(username = %self.config.default_user, "Default user created");
        Ok(())
    }

    // =========================================================================
    // Sessions
    // =========================================================================

    /// Connects a new session and returns its handle.
    pub fn connect(self: &Arc<Self>) -> SessionHandle {
        let session = Session::new();
        let id = session.id;
        self.sessions.insert(id, session);
        info!(session = %id, "Session connected");
        SessionHandle::new(id, Arc::clone(self))
    }

    /// Removes a session. Returns true if it existed.
    pub fn disconnect(&self, id: SessionId) -> bool {
        let existed = self.sessions.remove(&id).is_some();
        if existed {
            info!(session = %id, "Session disconnected");
        }
        existed
    }

    /// Number of connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Returns a snapshot of a session's state.
    pub fn session(&self, id: SessionId) -> Result<Session> {
        self.sessions
            .get(&id)
            .map(|entry| entry.value().clone())
            .ok_or_else(|| NotFoundError::session(id).into())
    }

    /// Evicts sessions idle longer than the configured threshold.
    /// Returns the number evicted. Drivers call this periodically.
    pub fn sweep_idle(&self) -> usize {
        let timeout_ms = self.config.session_timeout_secs as i64 * 1000;
        let now = Timestamp::now();
        let before = self.sessions.len();
        self.sessions
            .retain(|_, session| now.millis_since(session.last_active) < timeout_ms);
        let evicted = before - self.sessions.len();
        if evicted > 0 {
            info!(evicted, "Idle sessions evicted");
        }
        evicted
    }

    /// Executes one command under a session's identity.
    ///
    /// The session entry is snapshotted before dispatch (so handlers can
    /// walk the whole table without deadlocking) and its selection and
    /// last-activity timestamp are written back after success.
    pub fn execute(&self, id: SessionId, command: Command) -> Result<Reply> {
        let snapshot = self.session(id)?;

        let (reply, change) = session::dispatch(self, &snapshot, &command)?;

        if let Some(mut entry) = self.sessions.get_mut(&id) {
            if let Some(user) = change.user {
                entry.user = user;
            }
            if let Some(mindmap) = change.mindmap {
                entry.mindmap = mindmap;
            }
            entry.last_active = Timestamp::now();
        }
        Ok(reply)
    }

    // =========================================================================
    // Cross-service cascades
    // =========================================================================

    /// Deletes a user and cleans up everything that referenced them:
    /// loaded states of their mind-maps, and every session that selected
    /// the user or one of their mind-maps.
    pub(crate) fn delete_user_cascade(&self, username: &str) -> Result<User> {
        let owned = self.store.get_mindmaps(&MindmapFilter {
            owner: Some(username.to_string()),
            ..Default::default()
        })?;

        let user = self.users.delete(username)?;

        self.registry.evict_owned_by(username);
        let owned_ids: HashSet<MindmapId> = owned.iter().map(|m| m.id).collect();
        for mut entry in self.sessions.iter_mut() {
            let selected_deleted_user = entry
                .user
                .as_ref()
                .map(|u| u.username == username)
                .unwrap_or(false);
            if selected_deleted_user {
                entry.user = None;
                entry.mindmap = None;
            } else if entry.mindmap.map(|m| owned_ids.contains(&m)).unwrap_or(false) {
                entry.mindmap = None;
            }
        }
        Ok(user)
    }

    /// Deletes a mind-map and deselects it in every session.
    pub(crate) fn delete_mindmap_cascade(&self, username: &str, map: &Mindmap) -> Result<()> {
        self.mindmaps.delete(username, map)?;
        for mut entry in self.sessions.iter_mut() {
            if entry.mindmap == Some(map.id) {
                entry.mindmap = None;
            }
        }
        Ok(())
    }

    // =========================================================================
    // Service access
    // =========================================================================

    /// The user service.
    pub fn users(&self) -> &UserService {
        &self.users
    }

    /// The mind-map service.
    pub fn mindmaps(&self) -> &MindmapService {
        &self.mindmaps
    }

    /// The node service.
    pub fn nodes(&self) -> &NodeService {
        &self.nodes
    }

    /// The undo/redo engine.
    pub fn history(&self) -> &HistoryService {
        &self.history
    }

    /// The event bus (for subscribing to user lifecycle events).
    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Returns a reference to the store for integration testing.
    ///
    /// Production code goes through the services; tests use this to
    /// verify what actually reached disk.
    #[doc(hidden)]
    pub fn store_for_test(&self) -> &SqliteStore {
        &self.store
    }

    /// Drops all sessions and loaded mind-maps. The store itself closes
    /// when the last reference to the manager is dropped.
    pub fn shutdown(&self) {
        self.sessions.clear();
        self.registry.clear();
        info!("Manager shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn test_config(dir: &std::path::Path) -> Config {
        Config {
            database_dir: dir.to_path_buf(),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_bootstraps_default_user() {
        let dir = tempdir().unwrap();
        let manager = Manager::new(test_config(dir.path())).unwrap();
        assert!(manager.users().exists("admin").unwrap());
        // Bootstrap password authenticates
        assert!(manager.users().authenticate("admin", "admin").unwrap());
    }

    #[test]
    fn test_bootstrap_is_idempotent() {
        let dir = tempdir().unwrap();
        let manager = Manager::new(test_config(dir.path())).unwrap();
        manager.shutdown();
        drop(manager);
        // Second start finds the user already present
        let manager = Manager::new(test_config(dir.path())).unwrap();
        assert!(manager.users().exists("admin").unwrap());
    }

    #[test]
    fn test_connect_and_disconnect() {
        let dir = tempdir().unwrap();
        let manager = Manager::new(test_config(dir.path())).unwrap();

        let handle = manager.connect();
        assert_eq!(manager.session_count(), 1);
        assert!(manager.session(handle.id()).is_ok());

        assert!(manager.disconnect(handle.id()));
        assert_eq!(manager.session_count(), 0);
        assert!(!manager.disconnect(handle.id()));
    }

    #[test]
    fn test_sweep_idle_evicts_stale_sessions() {
        let dir = tempdir().unwrap();
        let config = Config {
            database_dir: dir.path().to_path_buf(),
            session_timeout_secs: 0,
            ..Default::default()
        };
        let manager = Manager::new(config).unwrap();
        let _handle = manager.connect();

        std::thread::sleep(std::time::Duration::from_millis(5));
        assert_eq!(manager.sweep_idle(), 1);
        assert_eq!(manager.session_count(), 0);
    }

    #[test]
    fn test_execute_unknown_session() {
        let dir = tempdir().unwrap();
        let manager = Manager::new(test_config(dir.path())).unwrap();
        let err = manager
            .execute(
                SessionId::new(),
                Command::new(crate::session::command::SystemCommand::Undo),
            )
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
