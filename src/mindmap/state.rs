//! Loaded mind-map state and the per-mind-map serialization registry.
//!
//! A loaded mind-map owns its node tree and its history exclusively; no
//! other service retains independent references into the tree. The
//! registry hands out one `Arc<RwLock<MindmapState>>` per mind-map:
//! readers share the read lock, and exactly one mutating operation holds
//! the write lock for its whole duration (store transactions and index
//! recomputation included). Cross-mind-map operations are independent.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, instrument};

use crate::error::{Error, NotFoundError, Result};
use crate::history::History;
use crate::mindmap::types::{Mindmap, MindmapFilter};
use crate::node::tree::NodeTree;
use crate::node::types::{NodeFilter, NodePatch};
use crate::store::SqliteStore;
use crate::types::MindmapId;

/// One loaded mind-map: row data, node tree, and undo history.
#[derive(Debug)]
pub struct MindmapState {
    /// The mind-map row.
    pub map: Mindmap,
    /// The in-memory node tree.
    pub tree: NodeTree,
    /// The mind-map's operation history.
    pub history: History,
}

impl MindmapState {
    /// Wraps already-loaded parts into a state.
    pub fn new(map: Mindmap, tree: NodeTree, history_limit: usize) -> Self {
        Self {
            map,
            tree,
            history: History::new(history_limit),
        }
    }
}

/// Registry of loaded mind-maps, keyed by id.
///
/// Loading is lazy: a mind-map's tree is read from the store the first
/// time a session selects it and shared by every later selection.
pub struct MapRegistry {
    inner: RwLock<HashMap<MindmapId, Arc<RwLock<MindmapState>>>>,
    history_limit: usize,
}

impl std::fmt::Debug for MapRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let loaded = self.inner.read().map(|m| m.len()).unwrap_or(0);
        f.debug_struct("MapRegistry")
            .field("loaded", &loaded)
            .field("history_limit", &self.history_limit)
            .finish()
    }
}

impl MapRegistry {
    /// Creates an empty registry whose histories hold `history_limit`
    /// records.
    pub fn new(history_limit: usize) -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
            history_limit,
        }
    }

    /// Returns the loaded state for a mind-map, if it is loaded.
    pub fn get_loaded(&self, id: MindmapId) -> Option<Arc<RwLock<MindmapState>>> {
        self.inner.read().ok()?.get(&id).cloned()
    }

    /// Returns the loaded state for a mind-map, loading it from the store
    /// on first use.
    ///
    /// Loading rebuilds the tree from the persisted rows, verifies the
    /// root invariants, and writes back any index strings the rebuild
    /// normalized (the recomputation is idempotent and restartable, so a
    /// partially-written set of indices from an interrupted operation
    /// heals here).
    #[instrument(skip(self, store))]
    pub fn load(
        &self,
        store: &SqliteStore,
        id: MindmapId,
    ) -> Result<Arc<RwLock<MindmapState>>> {
        if let Some(state) = self.get_loaded(id) {
            return Ok(state);
        }

        let map = store
            .get_mindmaps(&MindmapFilter::by_id(id))?
            .into_iter()
            .next()
            .ok_or_else(|| NotFoundError::mindmap(id))?;

        let rows = store.get_nodes(id, &NodeFilter::default())?;
        let mut tree = NodeTree::from_rows(rows)?;

        let root = tree.root();
        if root.name != map.name {
            return Err(Error::corruption(format!(
                "root node name '{}' does not mirror mindmap name '{}'",
                root.name, map.name
            )));
        }

        // Heal any stale persisted indices
        for (node_id, index) in tree.recompute_indices() {
            store.update_node(
                id,
                node_id,
                &NodePatch {
                    index: Some(index.to_string()),
                    ..Default::default()
                },
            )?;
        }

        let state = Arc::new(RwLock::new(MindmapState::new(
            map,
            tree,
            self.history_limit,
        )));

        let mut inner = self
            .inner
            .write()
            .map_err(|_| Error::io("registry lock poisoned"))?;
        // A racing load may have won; keep whichever is already in
        let entry = inner.entry(id).or_insert_with(|| state);
        debug!(id = %id, "Mindmap loaded");
        Ok(Arc::clone(entry))
    }

    /// Drops a loaded mind-map from the registry (its Arc stays valid for
    /// holders until they release it).
    pub fn evict(&self, id: MindmapId) {
        if let Ok(mut inner) = self.inner.write() {
            inner.remove(&id);
        }
    }

    /// Drops every loaded mind-map owned by `owner`. Returns the evicted
    /// ids.
    pub fn evict_owned_by(&self, owner: &str) -> Vec<MindmapId> {
        let mut evicted = Vec::new();
        if let Ok(mut inner) = self.inner.write() {
            inner.retain(|id, state| {
                let owned = state
                    .read()
                    .map(|s| s.map.owner == owner)
                    .unwrap_or(false);
                if owned {
                    evicted.push(*id);
                }
                !owned
            });
        }
        evicted
    }

    /// Drops every loaded mind-map.
    pub fn clear(&self) {
        if let Ok(mut inner) = self.inner.write() {
            inner.clear();
        }
    }

    /// Number of loaded mind-maps.
    pub fn loaded_count(&self) -> usize {
        self.inner.read().map(|m| m.len()).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mindmap::types::NewMindmap;
    use crate::node::types::NewNodeRecord;
    use crate::types::NodeId;
    use tempfile::tempdir;

    fn store_with_map(name: &str) -> (tempfile::TempDir, SqliteStore, MindmapId) {
        let dir = tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("test.db")).unwrap();
        store.add_user("alice", "h", true).unwrap();
        let id = store
            .add_mindmap(
                "alice",
                &NewMindmap {
                    name: name.to_string(),
                    is_public: false,
                },
            )
            .unwrap();
        store
            .add_node(
                id,
                &NewNodeRecord {
                    parent: NodeId::NONE,
                    name: name.to_string(),
                    index: "0".to_string(),
                    content: Default::default(),
                },
                Some(NodeId::ROOT),
            )
            .unwrap();
        (dir, store, id)
    }

    #[test]
    fn test_load_builds_state() {
        let (_dir, store, id) = store_with_map("plan");
        let registry = MapRegistry::new(10);

        let state = registry.load(&store, id).unwrap();
        let state = state.read().unwrap();
        assert_eq!(state.map.name, "plan");
        assert_eq!(state.tree.root().name, "plan");
        assert_eq!(state.tree.len(), 1);
        assert!(state.history.is_empty());
    }

    #[test]
    fn test_load_is_shared() {
        let (_dir, store, id) = store_with_map("plan");
        let registry = MapRegistry::new(10);

        let a = registry.load(&store, id).unwrap();
        let b = registry.load(&store, id).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(registry.loaded_count(), 1);
    }

    #[test]
    fn test_load_unknown_mindmap() {
        let (_dir, store, _id) = store_with_map("plan");
        let registry = MapRegistry::new(10);
        let err = registry.load(&store, MindmapId(99)).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_load_detects_name_mismatch() {
        let (_dir, store, id) = store_with_map("plan");
        // Corrupt the mirror invariant behind the registry's back
        store
            .update_node(
                id,
                NodeId::ROOT,
                &NodePatch {
                    name: Some("rogue".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        let registry = MapRegistry::new(10);
        let err = registry.load(&store, id).unwrap_err();
        assert!(err.is_corruption());
    }

    #[test]
    fn test_evict_owned_by() {
        let (_dir, store, id) = store_with_map("plan");
        let registry = MapRegistry::new(10);
        registry.load(&store, id).unwrap();

        let evicted = registry.evict_owned_by("alice");
        assert_eq!(evicted, vec![id]);
        assert_eq!(registry.loaded_count(), 0);

        registry.load(&store, id).unwrap();
        assert!(registry.evict_owned_by("bob").is_empty());
        assert_eq!(registry.loaded_count(), 1);
    }
}
