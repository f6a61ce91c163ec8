//! SQLite storage backend.
//!
//! [`SqliteStore`] is the single source of truth for all durable state.
//! Every public operation runs in its own scoped transaction: the
//! `rusqlite::Transaction` guard rolls back on drop unless explicitly
//! committed, so every exit path (error, panic, cancellation) releases the
//! transaction cleanly.
//!
//! The store never interprets permissions, never computes positional
//! indices, and never cascades deletes across a node subtree. Those are the
//! services' jobs; the store only keeps rows.
//!
//! # File Layout
//!
//! When you open a store at `./data/mindnoscape.db`, it creates:
//! - `./data/mindnoscape.db` - SQLite database (WAL mode)
//! - `./data/mindnoscape.db.lock` - advisory lock for single-process use

use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use fs2::FileExt;
use rusqlite::{Connection, OptionalExtension, ToSql, Transaction};
use tracing::{debug, info, instrument};

use super::schema::{
    content_table, create_content_table, create_nodes_table, drop_node_tables, nodes_table,
    CREATE_MINDMAPS_TABLE, CREATE_USERS_TABLE, SCHEMA_VERSION,
};
use crate::error::{Error, NotFoundError, Result};
use crate::mindmap::types::{Mindmap, MindmapFilter, MindmapPatch, NewMindmap};
use crate::node::types::{NewNodeRecord, NodeFilter, NodePatch, NodeRow};
use crate::types::{MindmapId, NodeId, Timestamp, UserId};
use crate::user::types::{User, UserFilter, UserPatch};

/// SQLite storage backend.
///
/// The connection is shared behind a mutex; individual transactions are
/// not, so each operation locks the connection for its whole transaction.
///
/// # Thread Safety
///
/// `SqliteStore` is `Send + Sync`; the mutex serializes access to the
/// single connection.
#[derive(Debug)]
pub struct SqliteStore {
    /// The SQLite connection handle.
    conn: Mutex<Connection>,

    /// Path to the database file.
    path: PathBuf,

    /// Advisory lock held for the lifetime of the store.
    _lock: File,
}

impl SqliteStore {
    /// Opens or creates a database at the given path.
    ///
    /// Parent directories are created as needed. An advisory lock next to
    /// the database file rejects a second process with `Conflict` instead
    /// of letting two writers interleave.
    ///
    /// # Errors
    ///
    /// - `Conflict` if another process holds the database
    /// - `Corruption` if the schema version doesn't match
    /// - `Io` for file-system or SQLite failures
    #[instrument(fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let lock = Self::acquire_lock(&path)?;

        let conn = Connection::open(&path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", true)?;
        // journal_mode returns the resulting mode as a row
        let _mode: String =
            conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;

        Self::init_schema(&conn)?;

        info!("Store opened");
        Ok(Self {
            conn: Mutex::new(conn),
            path,
            _lock: lock,
        })
    }

    /// Closes the store, releasing the advisory lock.
    ///
    /// This method consumes the store. SQLite flushes WAL content on drop;
    /// close exists so callers get a deterministic release point.
    #[instrument(skip(self))]
    pub fn close(self) -> Result<()> {
        info!("Closing store");
        drop(self.conn);
        Ok(())
    }

    /// Returns the path to the database file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn acquire_lock(path: &Path) -> Result<File> {
        let mut lock_path = path.as_os_str().to_owned();
        lock_path.push(".lock");
        let lock = OpenOptions::new()
            .create(true)
            .write(true)
            .open(PathBuf::from(lock_path))?;
        lock.try_lock_exclusive()
            .map_err(|_| Error::conflict("database is locked by another process"))?;
        Ok(lock)
    }

    /// Creates the global tables on first open; verifies the schema
    /// version afterwards.
    fn init_schema(conn: &Connection) -> Result<()> {
        let version: i32 = conn.query_row("PRAGMA user_version", [], |row| row.get(0))?;

        if version == 0 {
            debug!("Initializing schema");
            conn.execute(CREATE_USERS_TABLE, [])?;
            conn.execute(CREATE_MINDMAPS_TABLE, [])?;
            conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
            return Ok(());
        }

        if version != SCHEMA_VERSION {
            return Err(Error::corruption(format!(
                "schema version mismatch: expected {}, found {}",
                SCHEMA_VERSION, version
            )));
        }
        Ok(())
    }

    fn lock_conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::io("store connection lock poisoned"))
    }

    // =========================================================================
    // Users
    // =========================================================================

    /// Inserts a user row and returns the new id.
    ///
    /// # Errors
    ///
    /// `Conflict` if the username already exists.
    #[instrument(skip(self, password_hash))]
    pub fn add_user(&self, username: &str, password_hash: &str, active: bool) -> Result<UserId> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM users WHERE username = ?1",
                [username],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Error::conflict(format!(
                "username '{}' already exists",
                username
            )));
        }

        let now = Timestamp::now().as_millis();
        tx.execute(
            "INSERT INTO users (username, password_hash, active, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![username, password_hash, active, now],
        )?;
        let id = UserId(tx.last_insert_rowid());
        tx.commit()?;

        debug!(id = %id, "User row inserted");
        Ok(id)
    }

    /// Returns every user matching the filter (possibly none).
    pub fn get_users(&self, filter: &UserFilter) -> Result<Vec<User>> {
        let conn = self.lock_conn()?;

        let mut sql = String::from(
            "SELECT id, username, password_hash, active, created, updated FROM users",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = filter.id {
            clauses.push("id = ?");
            params.push(Box::new(id.get()));
        }
        if let Some(username) = &filter.username {
            clauses.push("username = ?");
            params.push(Box::new(username.clone()));
        }
        if let Some(active) = filter.active {
            clauses.push("active = ?");
            params.push(Box::new(active));
        }
        append_where(&mut sql, &clauses);
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(User {
                    id: UserId(row.get(0)?),
                    username: row.get(1)?,
                    password_hash: row.get(2)?,
                    active: row.get(3)?,
                    created: Timestamp::from_millis(row.get(4)?),
                    updated: Timestamp::from_millis(row.get(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(users)
    }

    /// Applies a patch to a user row. Only set fields change.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user doesn't exist; `Conflict` if a rename
    /// collides with an existing username.
    #[instrument(skip(self, patch))]
    pub fn update_user(&self, id: UserId, patch: &UserPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let exists: Option<i64> = tx
            .query_row("SELECT 1 FROM users WHERE id = ?1", [id.get()], |row| {
                row.get(0)
            })
            .optional()?;
        if exists.is_none() {
            return Err(NotFoundError::user(id).into());
        }

        if let Some(username) = &patch.username {
            let taken: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM users WHERE username = ?1 AND id <> ?2",
                    rusqlite::params![username, id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(Error::conflict(format!(
                    "username '{}' already exists",
                    username
                )));
            }
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(username) = &patch.username {
            sets.push("username = ?");
            params.push(Box::new(username.clone()));
        }
        if let Some(hash) = &patch.password_hash {
            sets.push("password_hash = ?");
            params.push(Box::new(hash.clone()));
        }
        if let Some(active) = patch.active {
            sets.push("active = ?");
            params.push(Box::new(active));
        }
        sets.push("updated = ?");
        params.push(Box::new(Timestamp::now().as_millis()));
        params.push(Box::new(id.get()));

        let sql = format!("UPDATE users SET {} WHERE id = ?", sets.join(", "));
        tx.execute(&sql, rusqlite::params_from_iter(params))?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes a user, cascading to every owned mind-map: each owned
    /// mind-map's node tables are dropped and its row removed, then the
    /// user row itself.
    ///
    /// # Errors
    ///
    /// `NotFound` if the user doesn't exist.
    #[instrument(skip(self))]
    pub fn delete_user(&self, id: UserId) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let username: Option<String> = tx
            .query_row(
                "SELECT username FROM users WHERE id = ?1",
                [id.get()],
                |row| row.get(0),
            )
            .optional()?;
        let username = username.ok_or_else(|| NotFoundError::user(id))?;

        let owned: Vec<i64> = {
            let mut stmt = tx.prepare("SELECT id FROM mindmaps WHERE owner = ?1")?;
            let ids = stmt
                .query_map([&username], |row| row.get(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            ids
        };
        for map_id in &owned {
            for ddl in drop_node_tables(MindmapId(*map_id)) {
                tx.execute_batch(&ddl)?;
            }
        }
        tx.execute("DELETE FROM mindmaps WHERE owner = ?1", [&username])?;
        tx.execute("DELETE FROM users WHERE id = ?1", [id.get()])?;
        tx.commit()?;

        info!(user = %username, mindmaps = owned.len(), "User deleted with cascade");
        Ok(())
    }

    // =========================================================================
    // Mind-maps
    // =========================================================================

    /// Inserts a mind-map row and allocates its per-mind-map node tables,
    /// all in one transaction.
    ///
    /// # Errors
    ///
    /// `Conflict` on a duplicate (name, owner) pair.
    #[instrument(skip(self, info), fields(name = %info.name))]
    pub fn add_mindmap(&self, owner: &str, info: &NewMindmap) -> Result<MindmapId> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let taken: Option<i64> = tx
            .query_row(
                "SELECT 1 FROM mindmaps WHERE name = ?1 AND owner = ?2",
                rusqlite::params![info.name, owner],
                |row| row.get(0),
            )
            .optional()?;
        if taken.is_some() {
            return Err(Error::conflict(format!(
                "mindmap '{}' already exists for owner '{}'",
                info.name, owner
            )));
        }

        let now = Timestamp::now().as_millis();
        tx.execute(
            "INSERT INTO mindmaps (name, owner, is_public, created, updated)
             VALUES (?1, ?2, ?3, ?4, ?4)",
            rusqlite::params![info.name, owner, info.is_public, now],
        )?;
        let id = MindmapId(tx.last_insert_rowid());

        tx.execute_batch(&create_nodes_table(id))?;
        tx.execute_batch(&create_content_table(id))?;
        tx.commit()?;

        debug!(id = %id, "Mindmap row and node tables created");
        Ok(id)
    }

    /// Returns every mind-map matching the filter (possibly none).
    ///
    /// The caller must enforce visibility; the store returns whatever
    /// matches.
    pub fn get_mindmaps(&self, filter: &MindmapFilter) -> Result<Vec<Mindmap>> {
        let conn = self.lock_conn()?;

        let mut sql = String::from(
            "SELECT id, name, owner, is_public, created, updated FROM mindmaps",
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = filter.id {
            clauses.push("id = ?");
            params.push(Box::new(id.get()));
        }
        if let Some(name) = &filter.name {
            clauses.push("name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(owner) = &filter.owner {
            clauses.push("owner = ?");
            params.push(Box::new(owner.clone()));
        }
        if let Some(is_public) = filter.is_public {
            clauses.push("is_public = ?");
            params.push(Box::new(is_public));
        }
        append_where(&mut sql, &clauses);
        sql.push_str(" ORDER BY id");

        let mut stmt = conn.prepare(&sql)?;
        let maps = stmt
            .query_map(rusqlite::params_from_iter(params), |row| {
                Ok(Mindmap {
                    id: MindmapId(row.get(0)?),
                    name: row.get(1)?,
                    owner: row.get(2)?,
                    is_public: row.get(3)?,
                    created: Timestamp::from_millis(row.get(4)?),
                    updated: Timestamp::from_millis(row.get(5)?),
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(maps)
    }

    /// Applies a patch to a mind-map row (rename and/or visibility).
    ///
    /// # Errors
    ///
    /// `NotFound` if the mind-map doesn't exist; `Conflict` if a rename
    /// collides within the owner's namespace.
    #[instrument(skip(self, patch))]
    pub fn update_mindmap(&self, id: MindmapId, patch: &MindmapPatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        let owner: Option<String> = tx
            .query_row(
                "SELECT owner FROM mindmaps WHERE id = ?1",
                [id.get()],
                |row| row.get(0),
            )
            .optional()?;
        let owner = owner.ok_or_else(|| NotFoundError::mindmap(id))?;

        if let Some(name) = &patch.name {
            let taken: Option<i64> = tx
                .query_row(
                    "SELECT 1 FROM mindmaps WHERE name = ?1 AND owner = ?2 AND id <> ?3",
                    rusqlite::params![name, owner, id.get()],
                    |row| row.get(0),
                )
                .optional()?;
            if taken.is_some() {
                return Err(Error::conflict(format!(
                    "mindmap '{}' already exists for owner '{}'",
                    name, owner
                )));
            }
        }

        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(name) = &patch.name {
            sets.push("name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(is_public) = patch.is_public {
            sets.push("is_public = ?");
            params.push(Box::new(is_public));
        }
        sets.push("updated = ?");
        params.push(Box::new(Timestamp::now().as_millis()));
        params.push(Box::new(id.get()));

        let sql = format!("UPDATE mindmaps SET {} WHERE id = ?", sets.join(", "));
        tx.execute(&sql, rusqlite::params_from_iter(params))?;
        tx.commit()?;
        Ok(())
    }

    /// Deletes a mind-map: drops its node tables, then removes the row.
    ///
    /// # Errors
    ///
    /// `NotFound` if the mind-map doesn't exist.
    #[instrument(skip(self))]
    pub fn delete_mindmap(&self, id: MindmapId) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;

        mindmap_exists(&tx, id)?;
        for ddl in drop_node_tables(id) {
            tx.execute_batch(&ddl)?;
        }
        tx.execute("DELETE FROM mindmaps WHERE id = ?1", [id.get()])?;
        tx.commit()?;

        info!(id = %id, "Mindmap deleted");
        Ok(())
    }

    // =========================================================================
    // Nodes
    // =========================================================================

    /// Inserts a node row (and its content rows) into a mind-map's tables.
    ///
    /// With `forced` the supplied id is used — required for the root
    /// (id 0) and for history replay. Otherwise the id is auto-assigned as
    /// max(id)+1 within the transaction.
    ///
    /// # Errors
    ///
    /// `NotFound` if the mind-map doesn't exist; `Conflict` if a forced id
    /// is already taken.
    #[instrument(skip(self, record), fields(parent = %record.parent))]
    pub fn add_node(
        &self,
        map: MindmapId,
        record: &NewNodeRecord,
        forced: Option<NodeId>,
    ) -> Result<NodeId> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        mindmap_exists(&tx, map)?;

        let table = nodes_table(map);
        let id = match forced {
            Some(forced_id) => {
                let taken: Option<i64> = tx
                    .query_row(
                        &format!("SELECT 1 FROM {} WHERE id = ?1", table),
                        [forced_id.get()],
                        |row| row.get(0),
                    )
                    .optional()?;
                if taken.is_some() {
                    return Err(Error::conflict(format!(
                        "node id {} already exists in mindmap {}",
                        forced_id, map
                    )));
                }
                forced_id
            }
            None => {
                let next: i64 = tx.query_row(
                    &format!("SELECT COALESCE(MAX(id), 0) + 1 FROM {}", table),
                    [],
                    |row| row.get(0),
                )?;
                NodeId(next)
            }
        };

        let now = Timestamp::now().as_millis();
        let parent: Option<i64> = parent_to_sql(record.parent);
        tx.execute(
            &format!(
                "INSERT INTO {} (id, mindmap_id, parent_id, node_name, index_value, created, updated)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                table
            ),
            rusqlite::params![id.get(), map.get(), parent, record.name, record.index, now],
        )?;

        if !record.content.is_empty() {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (node_id, key, value) VALUES (?1, ?2, ?3)",
                content_table(map)
            ))?;
            for (key, value) in &record.content {
                stmt.execute(rusqlite::params![id.get(), key, value])?;
            }
        }
        tx.commit()?;

        debug!(id = %id, "Node row inserted");
        Ok(id)
    }

    /// Returns every node matching the filter, with content attached,
    /// ordered by id.
    pub fn get_nodes(&self, map: MindmapId, filter: &NodeFilter) -> Result<Vec<NodeRow>> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        mindmap_exists(&tx, map)?;

        let mut sql = format!(
            "SELECT id, parent_id, node_name, index_value, created, updated FROM {}",
            nodes_table(map)
        );
        let mut clauses: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(id) = filter.id {
            clauses.push("id = ?");
            params.push(Box::new(id.get()));
        }
        if let Some(name) = &filter.name {
            clauses.push("node_name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(parent) = filter.parent {
            clauses.push("parent_id = ?");
            params.push(Box::new(parent.get()));
        }
        append_where(&mut sql, &clauses);
        sql.push_str(" ORDER BY id");

        let mut nodes = {
            let mut stmt = tx.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params_from_iter(params), |row| {
                    let parent: Option<i64> = row.get(1)?;
                    Ok(NodeRow {
                        id: NodeId(row.get(0)?),
                        parent: parent.map(NodeId).unwrap_or(NodeId::NONE),
                        name: row.get(2)?,
                        index: row.get(3)?,
                        content: Default::default(),
                        created: Timestamp::from_millis(row.get(4)?),
                        updated: Timestamp::from_millis(row.get(5)?),
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        // Attach content in one pass
        {
            let by_id: std::collections::HashMap<i64, usize> = nodes
                .iter()
                .enumerate()
                .map(|(i, n)| (n.id.get(), i))
                .collect();
            let mut stmt = tx.prepare(&format!(
                "SELECT node_id, key, value FROM {}",
                content_table(map)
            ))?;
            let mut rows = stmt.query([])?;
            while let Some(row) = rows.next()? {
                let node_id: i64 = row.get(0)?;
                if let Some(&i) = by_id.get(&node_id) {
                    let key: String = row.get(1)?;
                    let value: String = row.get(2)?;
                    nodes[i].content.insert(key, value);
                }
            }
        }

        tx.commit()?;
        Ok(nodes)
    }

    /// Applies a patch to a node row. Only set fields change; a `content`
    /// patch replaces the whole attribute map.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node doesn't exist.
    #[instrument(skip(self, patch))]
    pub fn update_node(&self, map: MindmapId, id: NodeId, patch: &NodePatch) -> Result<()> {
        if patch.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        mindmap_exists(&tx, map)?;

        let mut sets: Vec<&str> = Vec::new();
        let mut params: Vec<Box<dyn ToSql>> = Vec::new();
        if let Some(name) = &patch.name {
            sets.push("node_name = ?");
            params.push(Box::new(name.clone()));
        }
        if let Some(index) = &patch.index {
            sets.push("index_value = ?");
            params.push(Box::new(index.clone()));
        }
        if let Some(parent) = patch.parent {
            sets.push("parent_id = ?");
            params.push(Box::new(parent_to_sql(parent)));
        }
        sets.push("updated = ?");
        params.push(Box::new(Timestamp::now().as_millis()));
        params.push(Box::new(id.get()));

        let sql = format!(
            "UPDATE {} SET {} WHERE id = ?",
            nodes_table(map),
            sets.join(", ")
        );
        let changed = tx.execute(&sql, rusqlite::params_from_iter(params))?;
        if changed == 0 {
            return Err(NotFoundError::node(id).into());
        }

        if let Some(content) = &patch.content {
            let ctable = content_table(map);
            tx.execute(
                &format!("DELETE FROM {} WHERE node_id = ?1", ctable),
                [id.get()],
            )?;
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (node_id, key, value) VALUES (?1, ?2, ?3)",
                ctable
            ))?;
            for (key, value) in content {
                stmt.execute(rusqlite::params![id.get(), key, value])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Deletes a node row and its content rows. **Does not recurse**: the
    /// node service deletes subtrees leaves-first.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node doesn't exist.
    #[instrument(skip(self))]
    pub fn delete_node(&self, map: MindmapId, id: NodeId) -> Result<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        mindmap_exists(&tx, map)?;

        tx.execute(
            &format!("DELETE FROM {} WHERE node_id = ?1", content_table(map)),
            [id.get()],
        )?;
        let changed = tx.execute(
            &format!("DELETE FROM {} WHERE id = ?1", nodes_table(map)),
            [id.get()],
        )?;
        if changed == 0 {
            return Err(NotFoundError::node(id).into());
        }
        tx.commit()?;
        Ok(())
    }

    /// Reparents a node: updates `parent_id` only. Index strings are the
    /// node service's concern.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node doesn't exist.
    #[instrument(skip(self))]
    pub fn move_node(&self, map: MindmapId, source: NodeId, target: NodeId) -> Result<()> {
        self.update_node(
            map,
            source,
            &NodePatch {
                parent: Some(target),
                ..Default::default()
            },
        )
    }
}

/// Maps the in-memory root parent sentinel to SQL NULL.
#[inline]
fn parent_to_sql(parent: NodeId) -> Option<i64> {
    if parent == NodeId::NONE {
        None
    } else {
        Some(parent.get())
    }
}

fn append_where(sql: &mut String, clauses: &[&str]) {
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

fn mindmap_exists(tx: &Transaction<'_>, id: MindmapId) -> Result<()> {
    let found: Option<i64> = tx
        .query_row("SELECT 1 FROM mindmaps WHERE id = ?1", [id.get()], |row| {
            row.get(0)
        })
        .optional()?;
    if found.is_none() {
        return Err(NotFoundError::mindmap(id).into());
    }
    Ok(())
}
