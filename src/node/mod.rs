//! Node management: all tree mutations go through here.
//!
//! Every operation works on a locked [`MindmapState`] (the caller holds
//! the mind-map's write lock for mutations) and follows the same shape:
//! validate, write the store, mutate the in-memory tree, recompute
//! positional indices, record an operation for undo. Store failures roll
//! the in-memory edits back and surface unchanged.
//!
//! # Invariants maintained on every successful operation
//!
//! - Every non-root node's parent exists in the same mind-map.
//! - Each parent's child sequence agrees with its children's positional
//!   indices; sibling positions are contiguous from 1.
//! - Node ids are unique within a mind-map and stable until deletion.
//! - The root cannot be moved, deleted, or reparented; its index is
//!   always `"0"` and its parent always `-1`.

pub mod index;
pub mod tree;
pub mod types;

use std::cmp::Ordering;
use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::error::{Error, NotFoundError, Result};
use crate::events::{EventBus, RenameEvent};
use crate::history::{DeletedNode, NodeFields, Operation};
use crate::mindmap::state::MindmapState;
use crate::store::schema::{MAX_CONTENT_KEY_LEN, MAX_NAME_LEN};
use crate::store::SqliteStore;
use crate::types::{Deadline, NodeId, Timestamp};

use self::tree::Node;
use self::types::{Content, FindFields, NewNodeRecord, NodeChange, NodePatch, NodeRef, OutlineRow};

/// The node service.
///
/// Holds no tree state of its own; trees live in the per-mind-map
/// [`MindmapState`] and are passed in under the caller's lock.
pub struct NodeService {
    store: Arc<SqliteStore>,
    bus: Arc<EventBus>,
}

impl NodeService {
    /// Creates a node service over the given store and event bus.
    pub fn new(store: Arc<SqliteStore>, bus: Arc<EventBus>) -> Self {
        Self { store, bus }
    }

    // =========================================================================
    // Public operations (recorded in history)
    // =========================================================================

    /// Adds a node under `parent` at the end of its child list.
    ///
    /// Returns the new node's id. The node's positional index is the
    /// parent's index with the new 1-based sibling position appended.
    ///
    /// # Errors
    ///
    /// - `InvalidArgument` for an empty or oversized name or bad content key
    /// - `NotFound` if the parent cannot be resolved
    /// - `Conflict` if a forced id is already taken
    #[instrument(skip(self, state, content), fields(mindmap = %state.map.id))]
    pub fn add(
        &self,
        state: &mut MindmapState,
        parent: &NodeRef,
        name: &str,
        content: Content,
        forced: Option<NodeId>,
        deadline: Deadline,
    ) -> Result<NodeId> {
        validate_node_name(name)?;
        validate_content(&content)?;

        let parent_id = state.tree.resolve(parent)?;
        let id = self.apply_add(state, parent_id, name.to_string(), content.clone(), forced, deadline)?;

        state.history.record(Operation::Add {
            id,
            parent: parent_id,
            name: name.to_string(),
            content,
        });
        info!(id = %id, parent = %parent_id, "Node added");
        Ok(id)
    }

    /// Updates a node's name, content, and/or parent.
    ///
    /// Content entries merge: an empty value deletes the key, a non-empty
    /// value inserts or overwrites it. For the root node only the name may
    /// change; a root rename is propagated to the mind-map's name through
    /// the rename bridge. An empty change, or one that computes to the
    /// current values, is a no-op and leaves indices, ids, and history
    /// untouched.
    #[instrument(skip(self, state, change), fields(mindmap = %state.map.id))]
    pub fn update(
        &self,
        state: &mut MindmapState,
        node: &NodeRef,
        change: &NodeChange,
        deadline: Deadline,
    ) -> Result<()> {
        if change.is_empty() {
            return Ok(());
        }
        let id = state.tree.resolve(node)?;

        if let Some(name) = &change.name {
            validate_node_name(name)?;
        }
        for (key, _) in &change.content {
            validate_content_key(key)?;
        }

        let current = state.tree.get(id)?;
        let old = NodeFields {
            name: current.name.clone(),
            content: current.content.clone(),
            parent: current.parent,
        };

        let mut new = old.clone();
        if let Some(name) = &change.name {
            new.name = name.clone();
        }
        for (key, value) in &change.content {
            if value.is_empty() {
                new.content.remove(key);
            } else {
                new.content.insert(key.clone(), value.clone());
            }
        }
        if let Some(parent_ref) = &change.parent {
            new.parent = state.tree.resolve(parent_ref)?;
        }

        if id.is_root() && (new.parent != old.parent || new.content != old.content) {
            return Err(Error::invalid("only the name of the root node can change"));
        }
        if new == old {
            return Ok(());
        }

        self.apply_fields(state, id, &new, deadline)?;
        state.history.record(Operation::Update { id, old, new });
        info!(id = %id, "Node updated");
        Ok(())
    }

    /// Deletes the subtree rooted at `node`.
    ///
    /// The subtree is captured parent-first in the operation record, so
    /// undo can restore every node with its original id, name, content,
    /// parent, and index.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for the root node.
    #[instrument(skip(self, state), fields(mindmap = %state.map.id))]
    pub fn delete(
        &self,
        state: &mut MindmapState,
        node: &NodeRef,
        deadline: Deadline,
    ) -> Result<()> {
        let id = state.tree.resolve(node)?;
        let subtree = self.apply_delete(state, id, deadline)?;
        let count = subtree.len();

        state.history.record(Operation::Delete { subtree });
        info!(id = %id, nodes = count, "Subtree deleted");
        Ok(())
    }

    /// Moves `source` under `target`, appending to the target's children.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` when source is the root or when the move would
    /// make a node its own ancestor (the cycle check walks the target's
    /// parent chain).
    #[instrument(skip(self, state), fields(mindmap = %state.map.id))]
    pub fn move_node(
        &self,
        state: &mut MindmapState,
        source: &NodeRef,
        target: &NodeRef,
        deadline: Deadline,
    ) -> Result<()> {
        let source_id = state.tree.resolve(source)?;
        let target_id = state.tree.resolve(target)?;

        let old_parent = self.apply_move(state, source_id, target_id, deadline)?;

        state.history.record(Operation::Move {
            id: source_id,
            old_parent,
            new_parent: target_id,
        });
        info!(id = %source_id, target = %target_id, "Node moved");
        Ok(())
    }

    /// Sorts the full subtree rooted at `parent`: the children of every
    /// node in the subtree are reordered.
    ///
    /// Nodes are compared by the given content key, falling back to the
    /// name when the key is absent on both sides (keyed nodes sort before
    /// unkeyed ones); with no key, by name. Values that both parse as
    /// floating point compare numerically, otherwise lexicographically.
    /// The sort is stable and `reverse` inverts it. Sorting is not
    /// recorded in history.
    #[instrument(skip(self, state), fields(mindmap = %state.map.id))]
    pub fn sort(
        &self,
        state: &mut MindmapState,
        parent: &NodeRef,
        field: Option<&str>,
        reverse: bool,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;
        let start = state.tree.resolve(parent)?;

        // Snapshot child orders for rollback
        let snapshot: Vec<(NodeId, Vec<NodeId>)> = state
            .tree
            .subtree_preorder(start)
            .into_iter()
            .filter_map(|id| {
                state
                    .tree
                    .get(id)
                    .ok()
                    .map(|n| (id, n.children.clone()))
            })
            .collect();

        let key = field.filter(|f| !f.is_empty()).map(str::to_string);
        state
            .tree
            .sort_subtree(start, move |a, b| compare_nodes(a, b, key.as_deref(), reverse));

        if let Err(err) = self.recompute_and_persist(state, deadline) {
            for (id, children) in snapshot {
                if let Ok(node) = state.tree.get_mut(id) {
                    node.children = children;
                }
            }
            state.tree.recompute_indices();
            return Err(err);
        }

        info!(start = %start, reverse, "Subtree sorted");
        Ok(())
    }

    /// Case-insensitive substring search over the mind-map.
    ///
    /// `fields` selects which of name, content values, and index string
    /// participate. Matches come back in pre-order.
    pub fn find(&self, state: &MindmapState, query: &str, fields: FindFields) -> Vec<OutlineRow> {
        let needle = query.to_lowercase();
        let mut out = Vec::new();
        for id in state.tree.preorder() {
            let node = match state.tree.get(id) {
                Ok(node) => node,
                Err(_) => continue,
            };
            let hit = (fields.name && node.name.to_lowercase().contains(&needle))
                || (fields.content
                    && node
                        .content
                        .values()
                        .any(|v| v.to_lowercase().contains(&needle)))
                || (fields.index && node.index.to_string().contains(&needle));
            if hit {
                out.push(outline_row(node));
            }
        }
        out
    }

    /// Pre-order outline of the subtree rooted at `start` (the whole map
    /// for the root).
    pub fn outline(&self, state: &MindmapState, start: &NodeRef) -> Result<Vec<OutlineRow>> {
        let start_id = state.tree.resolve(start)?;
        let mut out = Vec::new();
        for id in state.tree.subtree_preorder(start_id) {
            if let Ok(node) = state.tree.get(id) {
                out.push(outline_row(node));
            }
        }
        Ok(out)
    }

    // =========================================================================
    // Replay primitives (used by public operations and by undo/redo;
    // never record history themselves)
    // =========================================================================

    /// Inserts a node: store row first, then the tree.
    pub(crate) fn apply_add(
        &self,
        state: &mut MindmapState,
        parent: NodeId,
        name: String,
        content: Content,
        forced: Option<NodeId>,
        deadline: Deadline,
    ) -> Result<NodeId> {
        deadline.check()?;

        let parent_node = state.tree.get(parent)?;
        let index = parent_node
            .index
            .child(parent_node.children.len() as u32 + 1);

        let id = match forced {
            Some(forced_id) => {
                if state.tree.contains(forced_id) {
                    return Err(Error::conflict(format!(
                        "node id {} already exists",
                        forced_id
                    )));
                }
                forced_id
            }
            None => state.tree.alloc_id(),
        };

        self.store.add_node(
            state.map.id,
            &NewNodeRecord {
                parent,
                name: name.clone(),
                index: index.to_string(),
                content: content.clone(),
            },
            Some(id),
        )?;

        if let Err(err) = state.tree.attach_new(id, parent, name, content) {
            // Tree rejected what the store accepted; take the row back out
            if let Err(revert) = self.store.delete_node(state.map.id, id) {
                warn!(id = %id, error = %revert, "Failed to revert orphan node row");
            }
            return Err(err);
        }
        Ok(id)
    }

    /// Makes a node match a field snapshot exactly (name, full content,
    /// parent). Reparenting appends to the new parent's children.
    pub(crate) fn apply_fields(
        &self,
        state: &mut MindmapState,
        id: NodeId,
        target: &NodeFields,
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;

        let current = state.tree.get(id)?;
        let old = NodeFields {
            name: current.name.clone(),
            content: current.content.clone(),
            parent: current.parent,
        };
        let parent_change = target.parent != old.parent;

        if id.is_root() && parent_change {
            return Err(Error::invalid("the root node cannot be reparented"));
        }
        if parent_change {
            if !state.tree.contains(target.parent) {
                return Err(NotFoundError::node(target.parent).into());
            }
            if state.tree.is_ancestor(id, target.parent) {
                return Err(Error::invalid("move would make the node its own ancestor"));
            }
        }

        let patch = NodePatch {
            name: (target.name != old.name).then(|| target.name.clone()),
            content: (target.content != old.content).then(|| target.content.clone()),
            parent: parent_change.then_some(target.parent),
            index: None,
        };
        if patch.is_empty() {
            return Ok(());
        }
        self.store.update_node(state.map.id, id, &patch)?;

        let old_position = if parent_change {
            Some(state.tree.detach(id)?)
        } else {
            None
        };
        {
            let node = state.tree.get_mut(id)?;
            node.name = target.name.clone();
            node.content = target.content.clone();
            node.updated = Timestamp::now();
        }
        if parent_change {
            state.tree.reattach(id, target.parent)?;
        }

        if parent_change {
            if let Err(err) = self.recompute_and_persist(state, deadline) {
                // Put the node back where it was, then undo the row patch
                let _ = state.tree.detach(id);
                if let Some(position) = old_position {
                    let _ = state.tree.reattach_at(id, old.parent, position);
                }
                if let Ok(node) = state.tree.get_mut(id) {
                    node.name = old.name.clone();
                    node.content = old.content.clone();
                }
                state.tree.recompute_indices();
                self.revert_node_row(state, id, &old);
                return Err(err);
            }
        }

        if id.is_root() && target.name != old.name {
            let event = RenameEvent::RootNodeRenamed {
                id: state.map.id,
                name: target.name.clone(),
            };
            if let Err(err) = self.bus.publish_rename(&event, &self.store, state) {
                if let Ok(node) = state.tree.get_mut(id) {
                    node.name = old.name.clone();
                }
                self.revert_node_row(state, id, &old);
                return Err(err);
            }
        }
        Ok(())
    }

    /// Moves a node under a new parent. Returns the old parent id.
    pub(crate) fn apply_move(
        &self,
        state: &mut MindmapState,
        id: NodeId,
        new_parent: NodeId,
        deadline: Deadline,
    ) -> Result<NodeId> {
        deadline.check()?;

        if id.is_root() {
            return Err(Error::invalid("the root node cannot be moved"));
        }
        let old_parent = state.tree.get(id)?.parent;
        if !state.tree.contains(new_parent) {
            return Err(NotFoundError::node(new_parent).into());
        }
        if state.tree.is_ancestor(id, new_parent) {
            return Err(Error::invalid("move would make the node its own ancestor"));
        }

        self.store.move_node(state.map.id, id, new_parent)?;

        let old_position = state.tree.detach(id)?;
        state.tree.reattach(id, new_parent)?;

        if let Err(err) = self.recompute_and_persist(state, deadline) {
            let _ = state.tree.detach(id);
            let _ = state.tree.reattach_at(id, old_parent, old_position);
            state.tree.recompute_indices();
            if let Err(revert) = self.store.move_node(state.map.id, id, old_parent) {
                warn!(id = %id, error = %revert, "Failed to revert move in store");
            }
            return Err(err);
        }
        Ok(old_parent)
    }

    /// Deletes a subtree: captures it parent-first, deletes the rows
    /// leaves-first (the per-mind-map tables carry a parent foreign key),
    /// then removes the nodes from the tree and recomputes the whole
    /// mind-map's indices. Returns the captured subtree.
    pub(crate) fn apply_delete(
        &self,
        state: &mut MindmapState,
        id: NodeId,
        deadline: Deadline,
    ) -> Result<Vec<DeletedNode>> {
        deadline.check()?;

        if id.is_root() {
            return Err(Error::invalid("the root node cannot be deleted"));
        }
        state.tree.get(id)?;

        let captured: Vec<DeletedNode> = state
            .tree
            .subtree_preorder(id)
            .into_iter()
            .map(|node_id| {
                let node = state.tree.get(node_id)?;
                Ok(DeletedNode {
                    id: node.id,
                    parent: node.parent,
                    name: node.name.clone(),
                    content: node.content.clone(),
                    index: node.index.clone(),
                })
            })
            .collect::<Result<_>>()?;

        let mut deleted: Vec<&DeletedNode> = Vec::new();
        for tombstone in captured.iter().rev() {
            if let Err(err) = self.store.delete_node(state.map.id, tombstone.id) {
                // Re-insert what we already removed, parents before children
                for restored in deleted.iter().rev() {
                    if let Err(revert) = self.store.add_node(
                        state.map.id,
                        &NewNodeRecord {
                            parent: restored.parent,
                            name: restored.name.clone(),
                            index: restored.index.to_string(),
                            content: restored.content.clone(),
                        },
                        Some(restored.id),
                    ) {
                        warn!(id = %restored.id, error = %revert, "Failed to revert subtree delete");
                        break;
                    }
                }
                return Err(err);
            }
            deleted.push(tombstone);
        }

        state.tree.detach(id)?;
        state.tree.remove_subtree(id);

        // Rows are gone; a failed index write here heals on next load
        // because recomputation is idempotent and restartable.
        if let Err(err) = self.recompute_and_persist(state, deadline) {
            warn!(error = %err, "Index write-back incomplete after delete");
        }
        Ok(captured)
    }

    /// Restores a captured subtree with its original ids, parent-first.
    pub(crate) fn restore_subtree(
        &self,
        state: &mut MindmapState,
        subtree: &[DeletedNode],
        deadline: Deadline,
    ) -> Result<()> {
        deadline.check()?;

        let mut restored: Vec<NodeId> = Vec::new();
        for (i, tombstone) in subtree.iter().enumerate() {
            let result = self
                .store
                .add_node(
                    state.map.id,
                    &NewNodeRecord {
                        parent: tombstone.parent,
                        name: tombstone.name.clone(),
                        index: tombstone.index.to_string(),
                        content: tombstone.content.clone(),
                    },
                    Some(tombstone.id),
                )
                .and_then(|_| {
                    let now = Timestamp::now();
                    let node = Node {
                        id: tombstone.id,
                        parent: tombstone.parent,
                        name: tombstone.name.clone(),
                        content: tombstone.content.clone(),
                        index: tombstone.index.clone(),
                        children: Vec::new(),
                        created: now,
                        updated: now,
                    };
                    if i == 0 {
                        // The subtree root returns to its captured sibling slot
                        let position = tombstone.index.segments().last().copied().unwrap_or(1);
                        state.tree.attach_at(node, position)
                    } else {
                        state.tree.attach_at(node, u32::MAX)
                    }
                });

            if let Err(err) = result {
                // Unwind the partially restored prefix
                for undo_id in restored.iter().rev() {
                    if let Err(revert) = self.store.delete_node(state.map.id, *undo_id) {
                        warn!(id = %undo_id, error = %revert, "Failed to unwind partial restore");
                        break;
                    }
                }
                if let Some(first) = restored.first().copied() {
                    let _ = state.tree.detach(first);
                    state.tree.remove_subtree(first);
                }
                state.tree.recompute_indices();
                return Err(err);
            }
            restored.push(tombstone.id);
        }

        if let Err(err) = self.recompute_and_persist(state, deadline) {
            warn!(error = %err, "Index write-back incomplete after restore");
        }
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Recomputes every index from the root and writes back only the
    /// changed ones.
    fn recompute_and_persist(&self, state: &mut MindmapState, deadline: Deadline) -> Result<()> {
        let changed = state.tree.recompute_indices();
        if changed.is_empty() {
            return Ok(());
        }
        deadline.check()?;
        for (id, index) in &changed {
            self.store.update_node(
                state.map.id,
                *id,
                &NodePatch {
                    index: Some(index.to_string()),
                    ..Default::default()
                },
            )?;
        }
        Ok(())
    }

    /// Best-effort restoration of a node row to a field snapshot.
    fn revert_node_row(&self, state: &MindmapState, id: NodeId, fields: &NodeFields) {
        let patch = NodePatch {
            name: Some(fields.name.clone()),
            content: Some(fields.content.clone()),
            parent: Some(fields.parent),
            index: None,
        };
        if let Err(err) = self.store.update_node(state.map.id, id, &patch) {
            warn!(id = %id, error = %err, "Failed to revert node row");
        }
    }
}

/// Bridge handler: a mind-map rename arrives, the root node follows.
///
/// Registered on the event bus by the manager; performs plain updates and
/// never re-emits.
pub(crate) fn handle_mindmap_renamed(
    event: &RenameEvent,
    store: &SqliteStore,
    state: &mut MindmapState,
) -> Result<()> {
    if let RenameEvent::MindmapRenamed { id, name } = event {
        if state.map.id == *id && state.tree.root().name != *name {
            store.update_node(
                *id,
                NodeId::ROOT,
                &NodePatch {
                    name: Some(name.clone()),
                    ..Default::default()
                },
            )?;
            let root = state.tree.get_mut(NodeId::ROOT)?;
            root.name = name.clone();
            root.updated = Timestamp::now();
        }
    }
    Ok(())
}

fn outline_row(node: &Node) -> OutlineRow {
    OutlineRow {
        index: node.index.to_string(),
        id: node.id,
        name: node.name.clone(),
        content: node.content.clone(),
    }
}

fn validate_node_name(name: &str) -> Result<()> {
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

fn validate_content_key(key: &str) -> Result<()> {
    if key.is_empty() {
        return Err(Error::invalid_field("content", "keys must not be empty"));
    }
    if key.chars().count() > MAX_CONTENT_KEY_LEN {
        return Err(Error::invalid_field(
            "content",
            format!("keys must not exceed {} characters", MAX_CONTENT_KEY_LEN),
        ));
    }
    Ok(())
}

fn validate_content(content: &Content) -> Result<()> {
    for key in content.keys() {
        validate_content_key(key)?;
    }
    Ok(())
}

/// Sort comparator for [`NodeService::sort`].
fn compare_nodes(a: &Node, b: &Node, field: Option<&str>, reverse: bool) -> Ordering {
    let ordering = match field {
        None => compare_values(&a.name, &b.name),
        Some(key) => match (a.content.get(key), b.content.get(key)) {
            (Some(x), Some(y)) => compare_values(x, y),
            (None, None) => compare_values(&a.name, &b.name),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
        },
    };
    if reverse {
        ordering.reverse()
    } else {
        ordering
    }
}

/// Numeric comparison when both sides parse as floats, lexicographic
/// otherwise.
fn compare_values(a: &str, b: &str) -> Ordering {
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}
