//! Per-connection sessions and command dispatch.
//!
//! A session holds the currently selected user and mind-map plus a
//! last-activity timestamp. Its single entry point is
//! [`SessionHandle::run`]: the handler table below enforces (a) required
//! selections, (b) argument validity, and (c) permission via the mind-map
//! service — level 2 for any mutation, level ≥ 1 for reads — before
//! touching a service. Mutating node and history commands take the
//! selected mind-map's write lock for their whole duration, which is what
//! serializes operations per mind-map.

pub mod command;

use std::fs;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, instrument};

use crate::error::{Error, Result};
use crate::manager::Manager;
use crate::mindmap::snapshot::MindmapSnapshot;
use crate::mindmap::state::MindmapState;
use crate::mindmap::types::{Mindmap, NewMindmap, PermissionLevel};
use crate::node::types::{Content, FindFields, NodeChange, NodeRef};
use crate::types::{Deadline, MindmapId, SessionId, Timestamp};
use crate::user::types::{NewUser, User, UserUpdate};

use self::command::{
    Command, CommandOp, MindmapCommand, NodeCommand, Reply, SystemCommand, UserCommand, Visibility,
};

/// The only snapshot format wired into the core.
const SNAPSHOT_FORMAT_JSON: &str = "json";

/// Per-connection state.
#[derive(Clone, Debug)]
pub struct Session {
    /// Session id.
    pub id: SessionId,
    /// Currently selected user, if any.
    pub user: Option<User>,
    /// Currently selected mind-map, if any.
    pub mindmap: Option<MindmapId>,
    /// Updated after every successful command; the manager's sweep evicts
    /// sessions idle past the configured threshold.
    pub last_active: Timestamp,
}

impl Session {
    /// Creates a fresh session with nothing selected.
    pub fn new() -> Self {
        Self {
            id: SessionId::new(),
            user: None,
            mindmap: None,
            last_active: Timestamp::now(),
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

/// A caller's handle to a connected session.
///
/// Obtained from [`Manager::connect`]; commands run against the shared
/// manager under this session's identity.
#[derive(Clone)]
pub struct SessionHandle {
    id: SessionId,
    manager: Arc<Manager>,
}

impl SessionHandle {
    pub(crate) fn new(id: SessionId, manager: Arc<Manager>) -> Self {
        Self { id, manager }
    }

    /// This session's id.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Runs one command and returns its typed result.
    pub fn run(&self, command: Command) -> Result<Reply> {
        self.manager.execute(self.id, command)
    }
}

/// Selection changes a handler wants applied to the session table.
#[derive(Debug, Default)]
pub(crate) struct SelectionChange {
    /// `Some(new)` replaces the selected user.
    pub user: Option<Option<User>>,
    /// `Some(new)` replaces the selected mind-map.
    pub mindmap: Option<Option<MindmapId>>,
}

/// Resolves a command against a session snapshot.
///
/// The snapshot is taken by the manager before dispatch so no session
/// table guard is held while handlers run (handlers may walk the whole
/// table, e.g. to deselect a deleted mind-map everywhere).
#[instrument(skip_all, fields(session = %session.id, scope = command.op.scope()))]
pub(crate) fn dispatch(
    manager: &Manager,
    session: &Session,
    command: &Command,
) -> Result<(Reply, SelectionChange)> {
    command.deadline.check()?;
    debug!("Dispatching command");
    match &command.op {
        CommandOp::User(cmd) => dispatch_user(manager, session, cmd),
        CommandOp::Mindmap(cmd) => dispatch_mindmap(manager, session, cmd, command.deadline),
        CommandOp::Node(cmd) => dispatch_node(manager, session, cmd, command.deadline),
        CommandOp::System(cmd) => dispatch_system(manager, session, *cmd, command.deadline),
    }
}

fn dispatch_user(
    manager: &Manager,
    session: &Session,
    cmd: &UserCommand,
) -> Result<(Reply, SelectionChange)> {
    match cmd {
        UserCommand::Add { username, password } => {
            let user = manager.users().create(NewUser {
                username: username.clone(),
                password: password.clone().unwrap_or_default(),
                active: true,
            })?;
            Ok((Reply::User(user), SelectionChange::default()))
        }
        UserCommand::Update {
            username,
            new_username,
            new_password,
        } => {
            let user = manager.users().update(
                username,
                UserUpdate {
                    username: new_username.clone(),
                    password: new_password.clone(),
                },
            )?;
            // Keep this session's snapshot fresh if it acts as that user
            let change = if selected_username(session) == Some(username.as_str()) {
                SelectionChange {
                    user: Some(Some(user.clone())),
                    mindmap: None,
                }
            } else {
                SelectionChange::default()
            };
            Ok((Reply::User(user), change))
        }
        UserCommand::Delete { username } => {
            manager.delete_user_cascade(username)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        UserCommand::Select { username } => {
            let user = manager.users().get(username)?;
            if !user.active {
                return Err(Error::permission(format!(
                    "user '{}' is not active",
                    username
                )));
            }
            Ok((
                Reply::User(user.clone()),
                SelectionChange {
                    user: Some(Some(user)),
                    mindmap: Some(None),
                },
            ))
        }
    }
}

fn dispatch_mindmap(
    manager: &Manager,
    session: &Session,
    cmd: &MindmapCommand,
    deadline: Deadline,
) -> Result<(Reply, SelectionChange)> {
    let user = require_user(session)?;
    match cmd {
        MindmapCommand::Add { name, is_public } => {
            let map = manager.mindmaps().create(
                &user.username,
                &NewMindmap {
                    name: name.clone(),
                    is_public: *is_public,
                },
            )?;
            Ok((Reply::Mindmap(map), SelectionChange::default()))
        }
        MindmapCommand::Delete { name } => {
            let map = manager.mindmaps().resolve_visible(&user.username, name)?;
            manager.delete_mindmap_cascade(&user.username, &map)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        MindmapCommand::Permission { name, set } => {
            let map = manager.mindmaps().resolve_visible(&user.username, name)?;
            match set {
                None => Ok((
                    Reply::Permission {
                        is_public: map.is_public,
                        level: PermissionLevel::of(&map, &user.username),
                    },
                    SelectionChange::default(),
                )),
                Some(visibility) => {
                    require_full(&map, user)?;
                    manager
                        .mindmaps()
                        .set_visibility(map.id, *visibility == Visibility::Public)?;
                    Ok((Reply::Ack, SelectionChange::default()))
                }
            }
        }
        MindmapCommand::Import { path, format } => {
            require_snapshot_format(format)?;
            deadline.check()?;
            let raw = fs::read_to_string(path)?;
            let snapshot = MindmapSnapshot::from_json(&raw)?;
            let map = manager.mindmaps().import(&user.username, &snapshot)?;
            Ok((Reply::Mindmap(map), SelectionChange::default()))
        }
        MindmapCommand::Export { path, format } => {
            require_snapshot_format(format)?;
            let state_arc = selected_state(manager, session)?;
            let state = read_lock(&state_arc)?;
            require_read(&state.map, user)?;
            let snapshot = manager.mindmaps().export(&state)?;
            drop(state);
            deadline.check()?;
            fs::write(path, snapshot.to_json()?)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        MindmapCommand::Select { name } => {
            if name.is_empty() {
                return Ok((
                    Reply::Ack,
                    SelectionChange {
                        user: None,
                        mindmap: Some(None),
                    },
                ));
            }
            let map = manager.mindmaps().resolve_visible(&user.username, name)?;
            manager.mindmaps().load(map.id)?;
            Ok((
                Reply::Mindmap(map.clone()),
                SelectionChange {
                    user: None,
                    mindmap: Some(Some(map.id)),
                },
            ))
        }
        MindmapCommand::List => {
            let maps = manager.mindmaps().list(&user.username)?;
            Ok((Reply::Mindmaps(maps), SelectionChange::default()))
        }
        MindmapCommand::View { index, .. } => {
            let state_arc = selected_state(manager, session)?;
            let state = read_lock(&state_arc)?;
            require_read(&state.map, user)?;
            let start = if index.is_empty() {
                NodeRef::root()
            } else {
                NodeRef::parse(index, false)?
            };
            let rows = manager.nodes().outline(&state, &start)?;
            Ok((Reply::Rows(rows), SelectionChange::default()))
        }
    }
}

fn dispatch_node(
    manager: &Manager,
    session: &Session,
    cmd: &NodeCommand,
    deadline: Deadline,
) -> Result<(Reply, SelectionChange)> {
    let user = require_user(session)?;
    let state_arc = selected_state(manager, session)?;
    match cmd {
        NodeCommand::Add {
            parent,
            name,
            content,
            by_id,
        } => {
            let parent_ref = NodeRef::parse(parent, *by_id)?;
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            let id = manager.nodes().add(
                &mut state,
                &parent_ref,
                name,
                merge_content(content),
                None,
                deadline,
            )?;
            Ok((Reply::NodeId(id), SelectionChange::default()))
        }
        NodeCommand::Update {
            node,
            name,
            content,
            by_id,
        } => {
            let node_ref = NodeRef::parse(node, *by_id)?;
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            manager.nodes().update(
                &mut state,
                &node_ref,
                &NodeChange {
                    name: name.clone(),
                    content: content.clone(),
                    parent: None,
                },
                deadline,
            )?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        NodeCommand::Move {
            source,
            target,
            by_id,
        } => {
            let source_ref = NodeRef::parse(source, *by_id)?;
            let target_ref = NodeRef::parse(target, *by_id)?;
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            manager
                .nodes()
                .move_node(&mut state, &source_ref, &target_ref, deadline)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        NodeCommand::Delete { node, by_id } => {
            let node_ref = NodeRef::parse(node, *by_id)?;
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            manager.nodes().delete(&mut state, &node_ref, deadline)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
        NodeCommand::Find { query, .. } => {
            let state = read_lock(&state_arc)?;
            require_read(&state.map, user)?;
            let rows = manager
                .nodes()
                .find(&state, query, FindFields::default());
            Ok((Reply::Rows(rows), SelectionChange::default()))
        }
        NodeCommand::Sort {
            parent,
            field,
            reverse,
            by_id,
        } => {
            let parent_ref = if parent.is_empty() {
                NodeRef::root()
            } else {
                NodeRef::parse(parent, *by_id)?
            };
            let field = if field.is_empty() {
                None
            } else {
                Some(field.as_str())
            };
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            manager
                .nodes()
                .sort(&mut state, &parent_ref, field, *reverse, deadline)?;
            Ok((Reply::Ack, SelectionChange::default()))
        }
    }
}

fn dispatch_system(
    manager: &Manager,
    session: &Session,
    cmd: SystemCommand,
    deadline: Deadline,
) -> Result<(Reply, SelectionChange)> {
    match cmd {
        SystemCommand::Undo | SystemCommand::Redo => {
            let user = require_user(session)?;
            let state_arc = selected_state(manager, session)?;
            let mut state = write_lock(&state_arc)?;
            require_full(&state.map, user)?;
            match cmd {
                SystemCommand::Undo => manager.history().undo(&mut state, deadline)?,
                _ => manager.history().redo(&mut state, deadline)?,
            }
            Ok((Reply::Ack, SelectionChange::default()))
        }
        SystemCommand::Exit | SystemCommand::Quit => {
            manager.disconnect(session.id);
            Ok((Reply::Exited, SelectionChange::default()))
        }
    }
}

// =============================================================================
// Gate helpers
// =============================================================================

fn require_user(session: &Session) -> Result<&User> {
    session
        .user
        .as_ref()
        .ok_or_else(|| Error::invalid("no user selected"))
}

fn selected_username(session: &Session) -> Option<&str> {
    session.user.as_ref().map(|u| u.username.as_str())
}

fn selected_state(
    manager: &Manager,
    session: &Session,
) -> Result<Arc<RwLock<MindmapState>>> {
    let id = session
        .mindmap
        .ok_or_else(|| Error::invalid("no mindmap selected"))?;
    manager.mindmaps().load(id)
}

fn require_read(map: &Mindmap, user: &User) -> Result<()> {
    if PermissionLevel::of(map, &user.username).allows_read() {
        Ok(())
    } else {
        Err(Error::permission(format!(
            "user '{}' may not read mindmap '{}'",
            user.username, map.name
        )))
    }
}

fn require_full(map: &Mindmap, user: &User) -> Result<()> {
    if PermissionLevel::of(map, &user.username).allows_write() {
        Ok(())
    } else {
        Err(Error::permission(format!(
            "user '{}' may not modify mindmap '{}'",
            user.username, map.name
        )))
    }
}

fn require_snapshot_format(format: &str) -> Result<()> {
    if format.eq_ignore_ascii_case(SNAPSHOT_FORMAT_JSON) {
        Ok(())
    } else {
        Err(Error::invalid(format!(
            "unsupported snapshot format '{}'",
            format
        )))
    }
}

fn write_lock(arc: &Arc<RwLock<MindmapState>>) -> Result<RwLockWriteGuard<'_, MindmapState>> {
    arc.write()
        .map_err(|_| Error::io("mindmap state lock poisoned"))
}

fn read_lock(arc: &Arc<RwLock<MindmapState>>) -> Result<RwLockReadGuard<'_, MindmapState>> {
    arc.read()
        .map_err(|_| Error::io("mindmap state lock poisoned"))
}

/// Builds a content map from command pairs; entries with empty values are
/// dropped (there is nothing to delete on a fresh node).
fn merge_content(pairs: &[(String, String)]) -> Content {
    let mut content = Content::new();
    for (key, value) in pairs {
        if !value.is_empty() {
            content.insert(key.clone(), value.clone());
        }
    }
    content
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_session_has_no_selection() {
        let session = Session::new();
        assert!(session.user.is_none());
        assert!(session.mindmap.is_none());
    }

    #[test]
    fn test_require_user_fails_without_selection() {
        let session = Session::new();
        let err = require_user(&session).unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_merge_content_drops_empty_values() {
        let pairs = vec![
            ("keep".to_string(), "v".to_string()),
            ("drop".to_string(), String::new()),
        ];
        let content = merge_content(&pairs);
        assert_eq!(content.len(), 1);
        assert_eq!(content.get("keep").map(String::as_str), Some("v"));
    }

    #[test]
    fn test_snapshot_format_gate() {
        assert!(require_snapshot_format("json").is_ok());
        assert!(require_snapshot_format("JSON").is_ok());
        assert!(require_snapshot_format("xml").is_err());
    }
}
