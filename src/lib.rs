//! # Mindnoscape data core
//!
//! The data core of a local, multi-user mind-map editor: in-memory
//! mind-map trees, SQL-backed persistence that mirrors them, per-mind-map
//! permissions, and a bounded undo/redo engine. The command-line driver
//! (parsing, readline, rendering) lives outside this crate and talks to
//! the core through sessions.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use mindnoscape::{Config, Manager};
//! use mindnoscape::session::command::{Command, MindmapCommand, NodeCommand, UserCommand};
//!
//! let manager = Manager::new(Config::default())?;
//! let session = manager.connect();
//!
//! session.run(Command::new(UserCommand::Select { username: "admin".into() }))?;
//! session.run(Command::new(MindmapCommand::Add { name: "plan".into(), is_public: false }))?;
//! session.run(Command::new(MindmapCommand::Select { name: "plan".into() }))?;
//! session.run(Command::new(NodeCommand::Add {
//!     parent: "0".into(),
//!     name: "first idea".into(),
//!     content: vec![],
//!     by_id: false,
//! }))?;
//! ```
//!
//! ## Key Concepts
//!
//! ### Mind-map
//!
//! A named, rooted tree of nodes owned by a user, optionally public.
//! Exactly one root (id 0, index `"0"`) exists at all times; its name
//! mirrors the mind-map's name.
//!
//! ### Positional index
//!
//! A dotted, 1-based path string (`"2.1"`) describing a node's current
//! position. Indices are recomputed on every structural mutation; durable
//! references use node ids.
//!
//! ### History
//!
//! Every mutation records an operation sufficient to invert and reapply
//! it. Undo and redo walk the per-mind-map log through a cursor; new work
//! truncates the redo tail.
//!
//! ## Thread Safety
//!
//! `Manager` is `Send + Sync` behind its `Arc`. Operations are serialized
//! per mind-map: one writer at a time, readers in parallel. Cross-mind-map
//! operations are independent.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

// ============================================================================
// Module declarations
// ============================================================================

mod config;
mod error;
mod manager;
mod types;

pub mod events;
pub mod store;

// Domain modules
pub mod history;
pub mod mindmap;
pub mod node;
pub mod session;
pub mod user;

// ============================================================================
// Public API re-exports
// ============================================================================

// Main entry points
pub use manager::Manager;
pub use session::{Session, SessionHandle};

// Configuration
pub use config::Config;

// Error handling
pub use error::{Error, NotFoundError, Result};

// Core types
pub use types::{Deadline, MindmapId, NodeId, SessionId, Timestamp, UserId};

// Domain types
pub use mindmap::types::{Mindmap, NewMindmap, PermissionLevel};
pub use node::index::NodeIndex;
pub use node::types::{Content, NodeRef, OutlineRow};
pub use user::types::{NewUser, User};

// ============================================================================
// Prelude module for convenient imports
// ============================================================================

/// Convenient imports for common usage.
///
/// ```rust
/// use mindnoscape::prelude::*;
/// ```
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::error::{Error, Result};
    pub use crate::manager::Manager;
    pub use crate::session::command::{
        Command, MindmapCommand, NodeCommand, Reply, SystemCommand, UserCommand,
    };
    pub use crate::session::SessionHandle;
    pub use crate::types::{MindmapId, NodeId, SessionId, Timestamp};
}
