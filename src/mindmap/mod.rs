//! Mind-map lifecycle, ownership, and the permission predicate.
//!
//! Creating a mind-map writes the row and its root node (forced id 0,
//! name mirroring the mind-map, index `"0"`) and rolls both back if
//! either fails. Renames propagate to the root node — and root renames
//! back to the row — through the rename bridge on the event bus, so the
//! mirror invariant holds without a direct dependency cycle between this
//! service and the node service.

pub mod snapshot;
pub mod state;
pub mod types;

use std::sync::{Arc, RwLock};

use tracing::{info, instrument, warn};

use crate::error::{Error, NotFoundError, Result};
use crate::events::{EventBus, RenameEvent};
use crate::node::index::NodeIndex;
use crate::node::types::{Content, NewNodeRecord};
use crate::store::schema::MAX_NAME_LEN;
use crate::store::SqliteStore;
use crate::types::{MindmapId, NodeId, Timestamp};

use self::snapshot::{MindmapSnapshot, NodeSnapshot};
use self::state::{MapRegistry, MindmapState};
use self::types::{Mindmap, MindmapFilter, MindmapPatch, NewMindmap, PermissionLevel};

/// The mind-map service.
pub struct MindmapService {
    store: Arc<SqliteStore>,
    registry: Arc<MapRegistry>,
    bus: Arc<EventBus>,
}

impl MindmapService {
    /// Creates a mind-map service.
    pub fn new(store: Arc<SqliteStore>, registry: Arc<MapRegistry>, bus: Arc<EventBus>) -> Self {
        Self {
            store,
            registry,
            bus,
        }
    }

    /// Creates a mind-map owned by `owner`, together with its root node.
    ///
    /// The root is persisted with forced id 0, parent −1, index `"0"`,
    /// and the mind-map's name. If the root cannot be written the
    /// mind-map row (and its freshly created node tables) are rolled
    /// back.
    ///
    /// # Errors
    ///
    /// `Conflict` on a duplicate (name, owner) pair; `InvalidArgument`
    /// for a bad name.
    #[instrument(skip(self, info), fields(name = %info.name))]
    pub fn create(&self, owner: &str, info: &NewMindmap) -> Result<Mindmap> {
        validate_mindmap_name(&info.name)?;

        let id = self.store.add_mindmap(owner, info)?;

        let root = NewNodeRecord {
            parent: NodeId::NONE,
            name: info.name.clone(),
            index: NodeIndex::root().to_string(),
            content: Content::new(),
        };
        if let Err(err) = self.store.add_node(id, &root, Some(NodeId::ROOT)) {
            if let Err(revert) = self.store.delete_mindmap(id) {
                warn!(id = %id, error = %revert, "Failed to roll back mindmap after root failure");
            }
            return Err(err);
        }

        info!(id = %id, owner = %owner, "Mindmap created");
        self.get_by_id(id)
    }

    /// Returns a mind-map row by id.
    pub fn get_by_id(&self, id: MindmapId) -> Result<Mindmap> {
        self.store
            .get_mindmaps(&MindmapFilter::by_id(id))?
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::mindmap(id).into())
    }

    /// Lists the mind-maps `username` may see: owned ∪ public.
    pub fn list(&self, username: &str) -> Result<Vec<Mindmap>> {
        let mut maps = self.store.get_mindmaps(&MindmapFilter {
            owner: Some(username.to_string()),
            ..Default::default()
        })?;
        let public = self.store.get_mindmaps(&MindmapFilter {
            is_public: Some(true),
            ..Default::default()
        })?;
        for map in public {
            if maps.iter().all(|m| m.id != map.id) {
                maps.push(map);
            }
        }
        maps.sort_by_key(|m| m.id);
        Ok(maps)
    }

    /// Resolves a name to a mind-map `username` may see, preferring an
    /// owned mind-map over a public one of the same name.
    ///
    /// # Errors
    ///
    /// `NotFound` if no visible mind-map carries the name.
    pub fn resolve_visible(&self, username: &str, name: &str) -> Result<Mindmap> {
        let candidates = self.store.get_mindmaps(&MindmapFilter {
            name: Some(name.to_string()),
            ..Default::default()
        })?;
        candidates
            .iter()
            .find(|m| m.owner == username)
            .or_else(|| candidates.iter().find(|m| m.is_public))
            .cloned()
            .ok_or_else(|| NotFoundError::mindmap(name).into())
    }

    /// The permission level `username` holds on a mind-map.
    pub fn permission(&self, mindmap: &Mindmap, username: &str) -> PermissionLevel {
        PermissionLevel::of(mindmap, username)
    }

    /// Loads (or returns the already loaded) state for a mind-map.
    pub fn load(&self, id: MindmapId) -> Result<Arc<RwLock<MindmapState>>> {
        self.registry.load(&self.store, id)
    }

    /// Deletes a mind-map. Requires full permission.
    ///
    /// Drops the loaded state, then triggers the store's cascade (node
    /// tables first, then the row).
    #[instrument(skip(self, mindmap), fields(id = %mindmap.id))]
    pub fn delete(&self, username: &str, mindmap: &Mindmap) -> Result<()> {
        if !PermissionLevel::of(mindmap, username).allows_write() {
            return Err(Error::permission(format!(
                "user '{}' may not delete mindmap '{}'",
                username, mindmap.name
            )));
        }
        self.registry.evict(mindmap.id);
        self.store.delete_mindmap(mindmap.id)?;
        info!(name = %mindmap.name, "Mindmap deleted");
        Ok(())
    }

    /// Renames a loaded mind-map and synchronizes the root node through
    /// the rename bridge.
    ///
    /// The caller holds the state's write lock; the bridge handler runs
    /// inside it, so no observer can see the two names disagree.
    #[instrument(skip(self, state), fields(id = %state.map.id))]
    pub fn rename(&self, state: &mut MindmapState, new_name: &str) -> Result<()> {
        validate_mindmap_name(new_name)?;
        if state.map.name == new_name {
            return Ok(());
        }
        let old_name = state.map.name.clone();

        self.store.update_mindmap(
            state.map.id,
            &MindmapPatch {
                name: Some(new_name.to_string()),
                ..Default::default()
            },
        )?;
        state.map.name = new_name.to_string();
        state.map.updated = Timestamp::now();

        let event = RenameEvent::MindmapRenamed {
            id: state.map.id,
            name: new_name.to_string(),
        };
        if let Err(err) = self.bus.publish_rename(&event, &self.store, state) {
            state.map.name = old_name.clone();
            if let Err(revert) = self.store.update_mindmap(
                state.map.id,
                &MindmapPatch {
                    name: Some(old_name),
                    ..Default::default()
                },
            ) {
                warn!(id = %state.map.id, error = %revert, "Failed to revert mindmap rename");
            }
            return Err(err);
        }

        info!(name = %new_name, "Mindmap renamed");
        Ok(())
    }

    /// Toggles a mind-map's visibility.
    ///
    /// Callers must not hold the mind-map's state lock: if the map is
    /// loaded, its state is locked here to mirror the flag.
    #[instrument(skip(self))]
    pub fn set_visibility(&self, id: MindmapId, is_public: bool) -> Result<()> {
        self.store.update_mindmap(
            id,
            &MindmapPatch {
                is_public: Some(is_public),
                ..Default::default()
            },
        )?;
        if let Some(state) = self.registry.get_loaded(id) {
            if let Ok(mut state) = state.write() {
                state.map.is_public = is_public;
                state.map.updated = Timestamp::now();
            }
        }
        info!(id = %id, is_public, "Mindmap visibility changed");
        Ok(())
    }

    /// Imports a snapshot as a new private mind-map owned by `owner`.
    ///
    /// Node ids are assigned fresh and densely packed by pre-order
    /// traversal (root 0, then 1, 2, …); the snapshot's own structure is
    /// otherwise preserved. The whole import rolls back if any node fails
    /// to persist.
    #[instrument(skip(self, snapshot), fields(name = %snapshot.name))]
    pub fn import(&self, owner: &str, snapshot: &MindmapSnapshot) -> Result<Mindmap> {
        validate_mindmap_name(&snapshot.name)?;

        let id = self.store.add_mindmap(
            owner,
            &NewMindmap {
                name: snapshot.name.clone(),
                is_public: false,
            },
        )?;

        let result = (|| -> Result<()> {
            self.store.add_node(
                id,
                &NewNodeRecord {
                    parent: NodeId::NONE,
                    name: snapshot.name.clone(),
                    index: NodeIndex::root().to_string(),
                    content: snapshot.root.content.clone(),
                },
                Some(NodeId::ROOT),
            )?;
            let mut next_id: i64 = 1;
            self.persist_children(
                id,
                NodeId::ROOT,
                &NodeIndex::root(),
                &snapshot.root.children,
                &mut next_id,
            )
        })();

        if let Err(err) = result {
            if let Err(revert) = self.store.delete_mindmap(id) {
                warn!(id = %id, error = %revert, "Failed to roll back partial import");
            }
            return Err(err);
        }

        info!(id = %id, nodes = snapshot.root.node_count(), "Mindmap imported");
        self.get_by_id(id)
    }

    fn persist_children(
        &self,
        map: MindmapId,
        parent: NodeId,
        parent_index: &NodeIndex,
        children: &[NodeSnapshot],
        next_id: &mut i64,
    ) -> Result<()> {
        for (position, child) in children.iter().enumerate() {
            let id = NodeId(*next_id);
            *next_id += 1;
            let index = parent_index.child(position as u32 + 1);
            self.store.add_node(
                map,
                &NewNodeRecord {
                    parent,
                    name: child.name.clone(),
                    index: index.to_string(),
                    content: child.content.clone(),
                },
                Some(id),
            )?;
            self.persist_children(map, id, &index, &child.children, next_id)?;
        }
        Ok(())
    }

    /// Exports a loaded mind-map as a snapshot.
    pub fn export(&self, state: &MindmapState) -> Result<MindmapSnapshot> {
        Ok(MindmapSnapshot {
            name: state.map.name.clone(),
            root: self.node_snapshot(state, NodeId::ROOT)?,
        })
    }

    fn node_snapshot(&self, state: &MindmapState, id: NodeId) -> Result<NodeSnapshot> {
        let node = state.tree.get(id)?;
        let mut children = Vec::with_capacity(node.children.len());
        for &child in &node.children {
            children.push(self.node_snapshot(state, child)?);
        }
        Ok(NodeSnapshot {
            name: node.name.clone(),
            content: node.content.clone(),
            children,
        })
    }
}

/// Bridge handler: the root node was renamed, the mind-map row follows.
///
/// Registered on the event bus by the manager; performs plain updates and
/// never re-emits.
pub(crate) fn handle_root_renamed(
    event: &RenameEvent,
    store: &SqliteStore,
    state: &mut MindmapState,
) -> Result<()> {
    if let RenameEvent::RootNodeRenamed { id, name } = event {
        if state.map.id == *id && state.map.name != *name {
            store.update_mindmap(
                *id,
                &MindmapPatch {
                    name: Some(name.clone()),
                    ..Default::default()
                },
            )?;
            state.map.name = name.clone();
            state.map.updated = Timestamp::now();
        }
    }
    Ok(())
}

fn validate_mindmap_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_field("name", "must not be empty"));
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(Error::invalid_field(
            "name",
            format!("must not exceed {} characters", MAX_NAME_LEN),
        ));
    }
    Ok(())
}
