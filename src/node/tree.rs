//! In-memory mind-map tree.
//!
//! The tree is an arena: a map from [`NodeId`] to [`Node`], where each node
//! carries an **ordered** list of child ids. That child order is the
//! authoritative sibling order; positional indices are derived from it and
//! recomputed after every structural mutation. Parents are referenced by id
//! and looked up through the map, so there are no ownership cycles and no
//! dangling parent pointers.
//!
//! `next_id` is monotonic for the lifetime of a loaded tree: ids of deleted
//! nodes are never handed out again, which lets a Delete record in the undo
//! history restore its captured ids without colliding with later adds.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::error::{Error, NotFoundError, Result};
use crate::node::index::NodeIndex;
use crate::node::types::{Content, NodeRef, NodeRow};
use crate::types::{NodeId, Timestamp};

/// An in-memory node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Node {
    /// Node id, unique within the mind-map. Root is 0.
    pub id: NodeId,
    /// Parent id; [`NodeId::NONE`] only for the root.
    pub parent: NodeId,
    /// Node name (free text).
    pub name: String,
    /// Attribute map.
    pub content: Content,
    /// Current positional index, kept in sync with `children` order.
    pub index: NodeIndex,
    /// Ordered child ids. This is the authoritative sibling order.
    pub children: Vec<NodeId>,
    /// Creation time.
    pub created: Timestamp,
    /// Last modification time.
    pub updated: Timestamp,
}

impl Node {
    fn new(id: NodeId, parent: NodeId, name: String, content: Content, index: NodeIndex) -> Self {
        let now = Timestamp::now();
        Self {
            id,
            parent,
            name,
            content,
            index,
            children: Vec::new(),
            created: now,
            updated: now,
        }
    }
}

/// The arena of one mind-map's nodes.
#[derive(Clone, Debug)]
pub struct NodeTree {
    nodes: HashMap<NodeId, Node>,
    next_id: i64,
}

impl NodeTree {
    /// Creates a tree holding only a root node (id 0, parent −1,
    /// index `"0"`) named after the mind-map.
    pub fn new(root_name: impl Into<String>) -> Self {
        let mut nodes = HashMap::new();
        nodes.insert(
            NodeId::ROOT,
            Node::new(
                NodeId::ROOT,
                NodeId::NONE,
                root_name.into(),
                Content::new(),
                NodeIndex::root(),
            ),
        );
        Self { nodes, next_id: 1 }
    }

    /// Rebuilds a tree from stored rows.
    ///
    /// Sibling order is recovered from the persisted index strings. The
    /// tree must contain exactly one root (id 0, parent −1) and every
    /// non-root parent must exist; anything else is `Corruption`.
    pub fn from_rows(rows: Vec<NodeRow>) -> Result<Self> {
        let mut nodes: HashMap<NodeId, Node> = HashMap::with_capacity(rows.len());
        let mut order: HashMap<NodeId, Vec<(Vec<u32>, NodeId)>> = HashMap::new();
        let mut next_id = 1;

        for row in rows {
            let index = NodeIndex::parse(&row.index).map_err(|_| {
                Error::corruption(format!(
                    "node {} carries unparseable index '{}'",
                    row.id, row.index
                ))
            })?;
            if row.parent == NodeId::NONE {
                if row.id != NodeId::ROOT {
                    return Err(Error::corruption(format!(
                        "non-root node {} has no parent",
                        row.id
                    )));
                }
            } else {
                order
                    .entry(row.parent)
                    .or_default()
                    .push((index.segments().to_vec(), row.id));
            }
            next_id = next_id.max(row.id.get() + 1);
            let node = Node {
                id: row.id,
                parent: row.parent,
                name: row.name,
                content: row.content,
                index,
                children: Vec::new(),
                created: row.created,
                updated: row.updated,
            };
            if nodes.insert(row.id, node).is_some() {
                return Err(Error::corruption(format!("duplicate node id {}", row.id)));
            }
        }

        if !nodes.contains_key(&NodeId::ROOT) {
            return Err(Error::corruption("mindmap has no root node"));
        }

        for (parent, mut group) in order {
            if !nodes.contains_key(&parent) {
                let child = group.first().map(|(_, id)| *id).unwrap_or(NodeId::NONE);
                return Err(Error::corruption(format!(
                    "node {} references missing parent {}",
                    child, parent
                )));
            }
            group.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
            let children: Vec<NodeId> = group.into_iter().map(|(_, id)| id).collect();
            if let Some(node) = nodes.get_mut(&parent) {
                node.children = children;
            }
        }

        let mut tree = Self { nodes, next_id };
        // Normalize: stored indices may be stale; child order is now truth
        tree.recompute_indices();
        Ok(tree)
    }

    /// Number of nodes, including the root.
    #[inline]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if only the root exists.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.nodes.len() <= 1
    }

    /// The root node.
    pub fn root(&self) -> &Node {
        // The root always exists; a tree without one never constructs
        self.nodes
            .get(&NodeId::ROOT)
            .unwrap_or_else(|| unreachable!("tree invariant: root exists"))
    }

    /// Looks a node up by id.
    pub fn get(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(&id)
            .ok_or_else(|| NotFoundError::node(id).into())
    }

    /// Looks a node up mutably by id.
    pub fn get_mut(&mut self, id: NodeId) -> Result<&mut Node> {
        self.nodes
            .get_mut(&id)
            .ok_or_else(|| NotFoundError::node(id).into())
    }

    /// Returns true if the id is present.
    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        self.nodes.contains_key(&id)
    }

    /// Hands out the next auto-assigned id.
    pub fn alloc_id(&mut self) -> NodeId {
        let id = NodeId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Records that a forced id was used, keeping `next_id` ahead of it.
    pub fn note_forced_id(&mut self, id: NodeId) {
        self.next_id = self.next_id.max(id.get() + 1);
    }

    /// Resolves a node reference to an id.
    ///
    /// Resolution by index walks from the root, consuming each dot
    /// separated segment as a 1-based child position; out-of-range
    /// segments fail with `InvalidArgument`. Resolution by id is a map
    /// lookup failing with `NotFound`.
    pub fn resolve(&self, node_ref: &NodeRef) -> Result<NodeId> {
        match node_ref {
            NodeRef::Id(id) => {
                if self.contains(*id) {
                    Ok(*id)
                } else {
                    Err(NotFoundError::node(id).into())
                }
            }
            NodeRef::Index(index) => {
                let mut current = NodeId::ROOT;
                for &seg in index.segments() {
                    let node = self.get(current)?;
                    current = *node.children.get(seg as usize - 1).ok_or_else(|| {
                        Error::invalid(format!(
                            "index '{}' is out of range at segment {}",
                            index, seg
                        ))
                    })?;
                }
                Ok(current)
            }
        }
    }

    /// Returns true if `ancestor` lies on the parent chain of `id`
    /// (a node is its own ancestor).
    pub fn is_ancestor(&self, ancestor: NodeId, id: NodeId) -> bool {
        let mut current = id;
        loop {
            if current == ancestor {
                return true;
            }
            match self.nodes.get(&current) {
                Some(node) if node.parent != NodeId::NONE => current = node.parent,
                _ => return false,
            }
        }
    }

    /// Ids of the subtree rooted at `id`, parent before children,
    /// siblings in order.
    pub fn subtree_preorder(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(current) = stack.pop() {
            out.push(current);
            if let Some(node) = self.nodes.get(&current) {
                for &child in node.children.iter().rev() {
                    stack.push(child);
                }
            }
        }
        out
    }

    /// All ids in pre-order from the root.
    pub fn preorder(&self) -> Vec<NodeId> {
        self.subtree_preorder(NodeId::ROOT)
    }

    /// Inserts a new node under `parent` at the end of its child list and
    /// returns the assigned index.
    ///
    /// The caller supplies the id (auto-assigned or forced).
    pub fn attach_new(
        &mut self,
        id: NodeId,
        parent: NodeId,
        name: String,
        content: Content,
    ) -> Result<NodeIndex> {
        if self.contains(id) {
            return Err(Error::conflict(format!("node id {} already in tree", id)));
        }
        let parent_node = self.get(parent)?;
        let position = parent_node.children.len() as u32 + 1;
        let index = parent_node.index.child(position);

        let node = Node::new(id, parent, name, content, index.clone());
        self.nodes.insert(id, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            parent_node.children.push(id);
        }
        self.note_forced_id(id);
        Ok(index)
    }

    /// Re-inserts a previously captured node at a specific 1-based sibling
    /// position (clamped to the end of the child list).
    ///
    /// Used when undo restores a deleted subtree: the captured index tells
    /// the node where it sat among its siblings.
    pub fn attach_at(&mut self, node: Node, position: u32) -> Result<()> {
        if self.contains(node.id) {
            return Err(Error::conflict(format!(
                "node id {} already in tree",
                node.id
            )));
        }
        let parent = node.parent;
        if !self.contains(parent) {
            return Err(Error::corruption(format!(
                "restore parent {} missing for node {}",
                parent, node.id
            )));
        }
        let id = node.id;
        self.nodes.insert(id, node);
        if let Some(parent_node) = self.nodes.get_mut(&parent) {
            let at = ((position.max(1) - 1) as usize).min(parent_node.children.len());
            parent_node.children.insert(at, id);
        }
        self.note_forced_id(id);
        Ok(())
    }

    /// Detaches `id` from its parent's child list, returning the 0-based
    /// position it held. The node stays in the arena.
    pub fn detach(&mut self, id: NodeId) -> Result<usize> {
        let parent = self.get(id)?.parent;
        if parent == NodeId::NONE {
            return Err(Error::invalid("the root node cannot be detached"));
        }
        let parent_node = self.get_mut(parent)?;
        let position = parent_node
            .children
            .iter()
            .position(|&c| c == id)
            .ok_or_else(|| {
                Error::corruption(format!("node {} missing from parent {} children", id, parent))
            })?;
        parent_node.children.remove(position);
        Ok(position)
    }

    /// Reattaches a detached node under `new_parent` at the end of its
    /// child list.
    pub fn reattach(&mut self, id: NodeId, new_parent: NodeId) -> Result<()> {
        if !self.contains(new_parent) {
            return Err(NotFoundError::node(new_parent).into());
        }
        self.get_mut(id)?.parent = new_parent;
        if let Some(parent_node) = self.nodes.get_mut(&new_parent) {
            parent_node.children.push(id);
        }
        Ok(())
    }

    /// Reattaches a detached node under its recorded parent at a specific
    /// 0-based position (move rollback path).
    pub fn reattach_at(&mut self, id: NodeId, parent: NodeId, position: usize) -> Result<()> {
        self.get_mut(id)?.parent = parent;
        let parent_node = self.get_mut(parent)?;
        let at = position.min(parent_node.children.len());
        parent_node.children.insert(at, id);
        Ok(())
    }

    /// Removes the subtree rooted at `id` (which must already be detached
    /// from its parent) and returns the nodes in pre-order.
    pub fn remove_subtree(&mut self, id: NodeId) -> Vec<Node> {
        let ids = self.subtree_preorder(id);
        let mut out = Vec::with_capacity(ids.len());
        for node_id in ids {
            if let Some(node) = self.nodes.remove(&node_id) {
                out.push(node);
            }
        }
        out
    }

    /// Recomputes every positional index from the root downward.
    ///
    /// The child at 1-based position `m` of a parent with index `s` gets
    /// index `s.m` (or just `"m"` under the root). Returns the nodes whose
    /// index actually changed, with their new values, so callers persist
    /// only those. Idempotent and restartable.
    pub fn recompute_indices(&mut self) -> Vec<(NodeId, NodeIndex)> {
        let mut changed = Vec::new();
        let mut stack: Vec<(NodeId, NodeIndex)> = vec![(NodeId::ROOT, NodeIndex::root())];
        while let Some((id, index)) = stack.pop() {
            let children: Vec<NodeId> = match self.nodes.get_mut(&id) {
                Some(node) => {
                    if node.index != index {
                        node.index = index.clone();
                        changed.push((id, index.clone()));
                    }
                    node.children.clone()
                }
                None => continue,
            };
            for (i, child) in children.into_iter().enumerate() {
                stack.push((child, index.child(i as u32 + 1)));
            }
        }
        changed
    }

    /// Stably sorts the children of every node in the subtree rooted at
    /// `start` with the given comparator. Indices are left stale; run
    /// [`recompute_indices`](Self::recompute_indices) afterwards.
    pub fn sort_subtree<F>(&mut self, start: NodeId, cmp: F)
    where
        F: Fn(&Node, &Node) -> Ordering,
    {
        for id in self.subtree_preorder(start) {
            let mut children = match self.nodes.get(&id) {
                Some(node) => node.children.clone(),
                None => continue,
            };
            children.sort_by(|a, b| match (self.nodes.get(a), self.nodes.get(b)) {
                (Some(a), Some(b)) => cmp(a, b),
                _ => Ordering::Equal,
            });
            if let Some(node) = self.nodes.get_mut(&id) {
                node.children = children;
            }
        }
    }
}
