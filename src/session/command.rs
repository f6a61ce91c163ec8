//! The abstract command record and its typed results.
//!
//! A command is a tagged record `{scope, operation, args}` plus an
//! optional deadline. How commands are parsed from a terminal line is the
//! driver's business; the core consumes only this shape and returns a
//! typed [`Reply`] or an error kind.

use std::path::PathBuf;

use crate::mindmap::types::{Mindmap, PermissionLevel};
use crate::node::types::OutlineRow;
use crate::types::{Deadline, NodeId};
use crate::user::types::User;

/// A command submitted to a session.
#[derive(Clone, Debug)]
pub struct Command {
    /// The operation to perform.
    pub op: CommandOp,
    /// Optional deadline; checked at dispatch and before store
    /// transactions.
    pub deadline: Deadline,
}

impl Command {
    /// Wraps an operation with no deadline.
    pub fn new(op: impl Into<CommandOp>) -> Self {
        Self {
            op: op.into(),
            deadline: Deadline::none(),
        }
    }

    /// Wraps an operation with a deadline.
    pub fn with_deadline(op: impl Into<CommandOp>, deadline: Deadline) -> Self {
        Self {
            op: op.into(),
            deadline,
        }
    }
}

/// A scoped operation.
#[derive(Clone, Debug)]
pub enum CommandOp {
    /// User-scope operations.
    User(UserCommand),
    /// Mindmap-scope operations.
    Mindmap(MindmapCommand),
    /// Node-scope operations.
    Node(NodeCommand),
    /// System-scope operations.
    System(SystemCommand),
}

impl CommandOp {
    /// The scope tag, for logging.
    pub fn scope(&self) -> &'static str {
        match self {
            CommandOp::User(_) => "user",
            CommandOp::Mindmap(_) => "mindmap",
            CommandOp::Node(_) => "node",
            CommandOp::System(_) => "system",
        }
    }
}

impl From<UserCommand> for CommandOp {
    fn from(cmd: UserCommand) -> Self {
        CommandOp::User(cmd)
    }
}

impl From<MindmapCommand> for CommandOp {
    fn from(cmd: MindmapCommand) -> Self {
        CommandOp::Mindmap(cmd)
    }
}

impl From<NodeCommand> for CommandOp {
    fn from(cmd: NodeCommand) -> Self {
        CommandOp::Node(cmd)
    }
}

impl From<SystemCommand> for CommandOp {
    fn from(cmd: SystemCommand) -> Self {
        CommandOp::System(cmd)
    }
}

/// User-scope commands.
#[derive(Clone, Debug)]
pub enum UserCommand {
    /// Create a user.
    Add {
        /// Username (unique, non-empty).
        username: String,
        /// Password; empty when omitted.
        password: Option<String>,
    },
    /// Rename a user and/or change their password.
    Update {
        /// The user to update.
        username: String,
        /// New username, if renaming.
        new_username: Option<String>,
        /// New password, if changing.
        new_password: Option<String>,
    },
    /// Delete a user and every mind-map they own.
    Delete {
        /// The user to delete.
        username: String,
    },
    /// Select the user this session acts as.
    Select {
        /// The user to select.
        username: String,
    },
}

/// Requested visibility for a mind-map.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Visibility {
    /// Readable by every user.
    Public,
    /// Readable by the owner only.
    Private,
}

/// Mindmap-scope commands.
#[derive(Clone, Debug)]
pub enum MindmapCommand {
    /// Create a mind-map owned by the current user.
    Add {
        /// Mind-map name (unique per owner).
        name: String,
        /// Whether non-owners may read it.
        is_public: bool,
    },
    /// Delete a mind-map (owner only).
    Delete {
        /// The mind-map's name.
        name: String,
    },
    /// Query or set a mind-map's visibility.
    Permission {
        /// The mind-map's name.
        name: String,
        /// `None` queries; `Some` sets.
        set: Option<Visibility>,
    },
    /// Import a snapshot file as a new mind-map.
    Import {
        /// File to read.
        path: PathBuf,
        /// Snapshot format; only `"json"` is wired.
        format: String,
    },
    /// Export the selected mind-map to a snapshot file.
    Export {
        /// File to write.
        path: PathBuf,
        /// Snapshot format; only `"json"` is wired.
        format: String,
    },
    /// Select a mind-map; an empty name deselects.
    Select {
        /// Name of the mind-map, or `""`.
        name: String,
    },
    /// List the mind-maps the current user may see.
    List,
    /// Outline the selected mind-map (or a subtree of it).
    View {
        /// Positional index of the subtree root; `""` for the whole map.
        index: String,
        /// Whether the driver intends to render ids (display-level flag;
        /// outline rows always carry ids).
        show_ids: bool,
    },
}

/// Node-scope commands. `by_id` switches the reference interpretation
/// from positional index to numeric id.
#[derive(Clone, Debug)]
pub enum NodeCommand {
    /// Add a node under a parent.
    Add {
        /// Parent reference.
        parent: String,
        /// New node's name.
        name: String,
        /// Initial content entries.
        content: Vec<(String, String)>,
        /// Interpret `parent` as a numeric id.
        by_id: bool,
    },
    /// Update a node's name and/or content.
    Update {
        /// Node reference.
        node: String,
        /// New name, if renaming.
        name: Option<String>,
        /// Content merge entries (empty value deletes the key).
        content: Vec<(String, String)>,
        /// Interpret `node` as a numeric id.
        by_id: bool,
    },
    /// Move a node under a new parent.
    Move {
        /// Node to move.
        source: String,
        /// New parent.
        target: String,
        /// Interpret the references as numeric ids.
        by_id: bool,
    },
    /// Delete a subtree.
    Delete {
        /// Node reference.
        node: String,
        /// Interpret `node` as a numeric id.
        by_id: bool,
    },
    /// Case-insensitive substring search.
    Find {
        /// The query text.
        query: String,
        /// Display-level flag: the driver intends to render ids.
        by_id: bool,
    },
    /// Sort the subtree under a parent.
    Sort {
        /// Subtree root reference; `""` for the root.
        parent: String,
        /// Content key to sort by; `""` sorts by name.
        field: String,
        /// Invert the order.
        reverse: bool,
        /// Interpret `parent` as a numeric id.
        by_id: bool,
    },
}

/// System-scope commands.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SystemCommand {
    /// Undo the selected mind-map's most recent operation.
    Undo,
    /// Redo the selected mind-map's most recently undone operation.
    Redo,
    /// End the session.
    Exit,
    /// End the session (alias of Exit).
    Quit,
}

/// Typed result of a command.
#[derive(Clone, Debug)]
pub enum Reply {
    /// Acknowledgement with no payload.
    Ack,
    /// A single user.
    User(User),
    /// A list of users.
    Users(Vec<User>),
    /// A single mind-map.
    Mindmap(Mindmap),
    /// A list of mind-maps.
    Mindmaps(Vec<Mindmap>),
    /// A mind-map's visibility and the caller's permission level on it.
    Permission {
        /// Whether the mind-map is public.
        is_public: bool,
        /// The caller's level.
        level: PermissionLevel,
    },
    /// The id of a newly created node.
    NodeId(NodeId),
    /// Outline or search rows, in pre-order.
    Rows(Vec<OutlineRow>),
    /// The session ended; no further commands will be accepted.
    Exited,
}
