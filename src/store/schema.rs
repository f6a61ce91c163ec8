//! Database schema definitions and versioning.
//!
//! Two global tables hold users and mind-maps. Nodes live in **per-mind-map**
//! tables (`nodes_<id>` and `node_content_<id>`) created when a mind-map is
//! created and dropped when it is deleted. This isolates node id namespaces
//! per mind-map and keeps node queries small.
//!
//! # Schema Versioning
//!
//! The schema version is stored in `PRAGMA user_version`. When opening an
//! existing database we check the version and fail with `Corruption` if it
//! doesn't match. Migration support is deliberately absent.
//!
//! # Table Layout
//!
//! ```text
//! users(id, username UNIQUE, password_hash, active, created, updated)
//! mindmaps(id, name, owner -> users.username, is_public, created, updated,
//!          UNIQUE(name, owner))
//! nodes_<id>(id, mindmap_id, parent_id NULL for root, node_name,
//!            index_value, created, updated)
//! node_content_<id>(node_id -> nodes_<id>.id, key, value,
//!                   PRIMARY KEY(node_id, key))
//! ```

use crate::types::MindmapId;

/// Current schema version.
///
/// Increment this when making breaking changes to the schema.
/// The database will refuse to open if versions don't match.
pub const SCHEMA_VERSION: i32 = 1;

/// Maximum username length in characters.
pub const MAX_USERNAME_LEN: usize = 64;

/// Maximum mind-map and node name length in characters.
pub const MAX_NAME_LEN: usize = 255;

/// Maximum content key length in characters.
pub const MAX_CONTENT_KEY_LEN: usize = 255;

// ============================================================================
// Global table DDL
// ============================================================================

/// Users table.
///
/// `username` is globally unique; `password_hash` is an opaque PHC string.
pub const CREATE_USERS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    username      TEXT    NOT NULL UNIQUE,
    password_hash TEXT    NOT NULL,
    active        INTEGER NOT NULL DEFAULT 1,
    created       INTEGER NOT NULL,
    updated       INTEGER NOT NULL
)";

/// Mind-maps table.
///
/// `(name, owner)` is unique; renaming a user follows through to `owner`.
/// Owned mind-maps are cascade-deleted explicitly (their node tables have
/// to be dropped first), not through the foreign key.
pub const CREATE_MINDMAPS_TABLE: &str = "\
CREATE TABLE IF NOT EXISTS mindmaps (
    id        INTEGER PRIMARY KEY AUTOINCREMENT,
    name      TEXT    NOT NULL,
    owner     TEXT    NOT NULL REFERENCES users(username) ON UPDATE CASCADE,
    is_public INTEGER NOT NULL DEFAULT 0,
    created   INTEGER NOT NULL,
    updated   INTEGER NOT NULL,
    UNIQUE (name, owner)
)";

// ============================================================================
// Per-mind-map table naming and DDL
// ============================================================================

/// Returns the node table name for a mind-map.
#[inline]
pub fn nodes_table(id: MindmapId) -> String {
    format!("nodes_{}", id.get())
}

/// Returns the node content table name for a mind-map.
#[inline]
pub fn content_table(id: MindmapId) -> String {
    format!("node_content_{}", id.get())
}

/// DDL for a mind-map's node table.
///
/// `parent_id` is NULL only for the root row; in memory the root carries
/// the `-1` sentinel. The self-referencing foreign key means children must
/// be deleted before their parents.
pub fn create_nodes_table(id: MindmapId) -> String {
    let table = nodes_table(id);
    format!(
        "CREATE TABLE {table} (
    id          INTEGER PRIMARY KEY,
    mindmap_id  INTEGER NOT NULL,
    parent_id   INTEGER REFERENCES {table}(id),
    node_name   TEXT    NOT NULL,
    index_value TEXT    NOT NULL,
    created     INTEGER NOT NULL,
    updated     INTEGER NOT NULL
)"
    )
}

/// DDL for a mind-map's node content table.
pub fn create_content_table(id: MindmapId) -> String {
    format!(
        "CREATE TABLE {content} (
    node_id INTEGER NOT NULL REFERENCES {nodes}(id) ON DELETE CASCADE,
    key     TEXT    NOT NULL,
    value   TEXT    NOT NULL,
    PRIMARY KEY (node_id, key)
)",
        content = content_table(id),
        nodes = nodes_table(id),
    )
}

/// DROP statements for a mind-map's tables, content table first so the
/// foreign key into the node table never dangles.
pub fn drop_node_tables(id: MindmapId) -> [String; 2] {
    [
        format!("DROP TABLE IF EXISTS {}", content_table(id)),
        format!("DROP TABLE IF EXISTS {}", nodes_table(id)),
    ]
}
