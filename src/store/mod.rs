//! Persistence layer.
//!
//! The store is the single source of truth for users, mind-maps, and
//! nodes. Services borrow in-memory copies on demand and write back through
//! the store's narrow contract; the store itself never interprets
//! permissions, never computes positional indices, and never cascades
//! deletes across a node subtree.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      Manager                          │
//! │        │            │             │                   │
//! │        ▼            ▼             ▼                   │
//! │   UserService  MindmapService  NodeService            │
//! │        │            │             │                   │
//! │        └────────────┼─────────────┘                   │
//! │                     ▼                                 │
//! │               SqliteStore                             │
//! │     users / mindmaps / nodes_<id> / node_content_<id> │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod schema;
pub mod sqlite;

pub use schema::SCHEMA_VERSION;
pub use sqlite::SqliteStore;

use std::path::Path;

use crate::error::Result;

/// Opens a store at the given path.
///
/// This is a convenience function; for more control use
/// [`SqliteStore::open`] directly.
pub fn open_store(path: impl AsRef<Path>) -> Result<SqliteStore> {
    SqliteStore::open(path)
}
