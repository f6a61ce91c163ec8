//! Operation history: bounded undo/redo per mind-map.
//!
//! Every successful tree mutation produces an [`Operation`] record holding
//! enough to invert it and to reapply it. Records reference node **ids**,
//! never positional indices, so replay is stable across index
//! recomputation.
//!
//! The log is linear with a cursor. Recording new work truncates everything
//! past the cursor (new work always invalidates redo history) and evicts
//! the oldest record once the configured limit is exceeded. Undo inverts
//! the record at the cursor through the node service with recording
//! suppressed; redo re-applies the next record the same way. A failed
//! undo or redo surfaces its error and leaves the cursor untouched.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::mindmap::state::MindmapState;
use crate::node::index::NodeIndex;
use crate::node::types::Content;
use crate::node::NodeService;
use crate::types::{Deadline, NodeId};

/// The mutable fields of a node captured at a point in time.
///
/// `Update` records carry one of these for each side of the mutation;
/// applying a snapshot makes the node match it exactly.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeFields {
    /// Node name.
    pub name: String,
    /// Full attribute map (replacement, not merge).
    pub content: Content,
    /// Parent id.
    pub parent: NodeId,
}

/// One node of a deleted subtree, captured for restoration.
///
/// Captured parent-first (pre-order) so restoration can recreate parents
/// before their children, with their original ids.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeletedNode {
    /// Original node id, restored verbatim via a forced insert.
    pub id: NodeId,
    /// Parent id at deletion time.
    pub parent: NodeId,
    /// Name at deletion time.
    pub name: String,
    /// Attribute map at deletion time.
    pub content: Content,
    /// Positional index at deletion time; its last segment is the sibling
    /// position the node is restored into.
    pub index: NodeIndex,
}

/// A recorded mutation, sufficient to invert and to reapply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    /// A node was added.
    Add {
        /// The new node's id.
        id: NodeId,
        /// Parent it was added under.
        parent: NodeId,
        /// Name it was created with.
        name: String,
        /// Content it was created with.
        content: Content,
    },
    /// A subtree was deleted; `subtree` is parent-first.
    Delete {
        /// The captured subtree, parent before children.
        subtree: Vec<DeletedNode>,
    },
    /// A node's fields changed.
    Update {
        /// The affected node.
        id: NodeId,
        /// Fields before the change.
        old: NodeFields,
        /// Fields after the change.
        new: NodeFields,
    },
    /// A node moved to another parent.
    Move {
        /// The moved node.
        id: NodeId,
        /// Parent before the move.
        old_parent: NodeId,
        /// Parent after the move.
        new_parent: NodeId,
    },
}

impl Operation {
    /// The id of the node this record is about.
    pub fn node_id(&self) -> NodeId {
        match self {
            Operation::Add { id, .. }
            | Operation::Update { id, .. }
            | Operation::Move { id, .. } => *id,
            Operation::Delete { subtree } => {
                subtree.first().map(|n| n.id).unwrap_or(NodeId::NONE)
            }
        }
    }

    /// Short kind name for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Operation::Add { .. } => "add",
            Operation::Delete { .. } => "delete",
            Operation::Update { .. } => "update",
            Operation::Move { .. } => "move",
        }
    }
}

/// The bounded operation log of one mind-map.
///
/// `applied` counts the records currently applied: undo targets
/// `log[applied - 1]`, redo targets `log[applied]`.
#[derive(Clone, Debug)]
pub struct History {
    log: VecDeque<Operation>,
    applied: usize,
    limit: usize,
}

impl History {
    /// Creates an empty history holding at most `limit` records.
    pub fn new(limit: usize) -> Self {
        Self {
            log: VecDeque::new(),
            applied: 0,
            limit: limit.max(1),
        }
    }

    /// Appends a record after the cursor, truncating any redo tail, and
    /// advances the cursor. Evicts the oldest record beyond the limit;
    /// an evicted Delete record releases its tombstoned subtree.
    pub fn record(&mut self, op: Operation) {
        self.log.truncate(self.applied);
        self.log.push_back(op);
        self.applied += 1;
        while self.log.len() > self.limit {
            self.log.pop_front();
            self.applied -= 1;
        }
    }

    /// The record undo would invert, if any.
    pub fn undo_target(&self) -> Option<&Operation> {
        if self.applied == 0 {
            None
        } else {
            self.log.get(self.applied - 1)
        }
    }

    /// The record redo would reapply, if any.
    pub fn redo_target(&self) -> Option<&Operation> {
        self.log.get(self.applied)
    }

    /// Moves the cursor back after a successful inversion.
    pub fn mark_undone(&mut self) {
        debug_assert!(self.applied > 0);
        self.applied = self.applied.saturating_sub(1);
    }

    /// Moves the cursor forward after a successful reapplication.
    pub fn mark_redone(&mut self) {
        debug_assert!(self.applied < self.log.len());
        self.applied = (self.applied + 1).min(self.log.len());
    }

    /// Drops the whole log.
    pub fn reset(&mut self) {
        self.log.clear();
        self.applied = 0;
    }

    /// Number of records in the log (applied or not).
    pub fn len(&self) -> usize {
        self.log.len()
    }

    /// Returns true if the log is empty.
    pub fn is_empty(&self) -> bool {
        self.log.is_empty()
    }

    /// Number of currently applied records.
    pub fn applied(&self) -> usize {
        self.applied
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.applied > 0
    }

    /// Returns true if there is something to redo.
    pub fn can_redo(&self) -> bool {
        self.applied < self.log.len()
    }

    /// Replay view: the applied records in insertion order.
    pub fn applied_ops(&self) -> impl Iterator<Item = &Operation> {
        self.log.iter().take(self.applied)
    }
}

/// Undo/redo engine.
///
/// Inverts and reapplies operation records through the node service with
/// recording suppressed, so inversions do not themselves enter the log.
pub struct HistoryService {
    nodes: Arc<NodeService>,
}

impl HistoryService {
    /// Creates a history service driving the given node service.
    pub fn new(nodes: Arc<NodeService>) -> Self {
        Self { nodes }
    }

    /// Undoes the most recently applied operation.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if there is nothing to undo. Any service error
    /// from the inversion is surfaced and the cursor does not move.
    #[instrument(skip(self, state), fields(mindmap = %state.map.id))]
    pub fn undo(&self, state: &mut MindmapState, deadline: Deadline) -> Result<()> {
        let op = match state.history.undo_target() {
            Some(op) => op.clone(),
            None => return Err(Error::invalid("nothing to undo")),
        };

        self.apply_inverse(state, &op, deadline)?;
        state.history.mark_undone();

        info!(kind = op.kind(), node = %op.node_id(), "Operation undone");
        Ok(())
    }

    /// Reapplies the operation after the cursor.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` if there is nothing to redo. Any service error
    /// from the reapplication is surfaced and the cursor does not move.
    #[instrument(skip(self, state), fields(mindmap = %state.map.id))]
    pub fn redo(&self, state: &mut MindmapState, deadline: Deadline) -> Result<()> {
        let op = match state.history.redo_target() {
            Some(op) => op.clone(),
            None => return Err(Error::invalid("nothing to redo")),
        };

        self.apply_forward(state, &op, deadline)?;
        state.history.mark_redone();

        info!(kind = op.kind(), node = %op.node_id(), "Operation redone");
        Ok(())
    }

    /// Drops the mind-map's whole history.
    pub fn reset(&self, state: &mut MindmapState) {
        state.history.reset();
        debug!(mindmap = %state.map.id, "History reset");
    }

    /// Applies the inverse of a record, without recording.
    fn apply_inverse(
        &self,
        state: &mut MindmapState,
        op: &Operation,
        deadline: Deadline,
    ) -> Result<()> {
        match op {
            Operation::Add { id, .. } => {
                self.nodes.apply_delete(state, *id, deadline)?;
                Ok(())
            }
            Operation::Delete { subtree } => {
                self.nodes.restore_subtree(state, subtree, deadline)
            }
            Operation::Update { id, old, .. } => {
                self.nodes.apply_fields(state, *id, old, deadline)
            }
            Operation::Move { id, old_parent, .. } => {
                self.nodes.apply_move(state, *id, *old_parent, deadline)?;
                Ok(())
            }
        }
    }

    /// Re-applies a record as originally performed, without recording.
    ///
    /// Forward Add uses the recorded id as a forced insert so ids stay
    /// stable across undo/redo cycles.
    fn apply_forward(
        &self,
        state: &mut MindmapState,
        op: &Operation,
        deadline: Deadline,
    ) -> Result<()> {
        match op {
            Operation::Add {
                id,
                parent,
                name,
                content,
            } => {
                self.nodes.apply_add(
                    state,
                    *parent,
                    name.clone(),
                    content.clone(),
                    Some(*id),
                    deadline,
                )?;
                Ok(())
            }
            Operation::Delete { subtree } => {
                let id = subtree
                    .first()
                    .map(|n| n.id)
                    .ok_or_else(|| Error::corruption("empty delete record"))?;
                self.nodes.apply_delete(state, id, deadline)?;
                Ok(())
            }
            Operation::Update { id, new, .. } => {
                self.nodes.apply_fields(state, *id, new, deadline)
            }
            Operation::Move { id, new_parent, .. } => {
                self.nodes.apply_move(state, *id, *new_parent, deadline)?;
                Ok(())
            }
        }
    }
}
