//! Node data types shared between the store and the node service.

use std::collections::BTreeMap;

use crate::error::Result;
use crate::node::index::NodeIndex;
use crate::types::{NodeId, Timestamp};

/// Node content: a string-keyed map of attribute values.
///
/// `BTreeMap` keeps iteration, comparison, and exports deterministic.
pub type Content = BTreeMap<String, String>;

/// A node row as the store sees it.
///
/// `parent` is [`NodeId::NONE`] for the root (stored as SQL NULL); `index`
/// is the positional index string persisted alongside the row.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeRow {
    /// Node id, unique within the mind-map.
    pub id: NodeId,
    /// Parent id; [`NodeId::NONE`] only for the root.
    pub parent: NodeId,
    /// Node name (free text).
    pub name: String,
    /// Persisted positional index string.
    pub index: String,
    /// Attribute map.
    pub content: Content,
    /// Creation time.
    pub created: Timestamp,
    /// Last modification time.
    pub updated: Timestamp,
}

/// Input for inserting a node row.
#[derive(Clone, Debug)]
pub struct NewNodeRecord {
    /// Parent id; [`NodeId::NONE`] for the root.
    pub parent: NodeId,
    /// Node name.
    pub name: String,
    /// Positional index string at insertion time.
    pub index: String,
    /// Attribute map.
    pub content: Content,
}

/// Store-level patch to a node row. `None` fields are left unchanged.
///
/// `content` replaces the whole attribute map; merge semantics live in the
/// node service.
#[derive(Clone, Debug, Default)]
pub struct NodePatch {
    /// New name.
    pub name: Option<String>,
    /// New positional index string.
    pub index: Option<String>,
    /// New parent id.
    pub parent: Option<NodeId>,
    /// Full replacement attribute map.
    pub content: Option<Content>,
}

impl NodePatch {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.index.is_none()
            && self.parent.is_none()
            && self.content.is_none()
    }
}

/// Attribute filter for node queries. Set fields must all match.
#[derive(Clone, Debug, Default)]
pub struct NodeFilter {
    /// Match by id.
    pub id: Option<NodeId>,
    /// Match by exact name.
    pub name: Option<String>,
    /// Match by parent id.
    pub parent: Option<NodeId>,
}

impl NodeFilter {
    /// Filter matching a single id.
    pub fn by_id(id: NodeId) -> Self {
        Self {
            id: Some(id),
            ..Default::default()
        }
    }
}

/// How a command refers to a node: by durable id or by positional index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeRef {
    /// Durable numeric id.
    Id(NodeId),
    /// Current positional index.
    Index(NodeIndex),
}

impl NodeRef {
    /// Parses a textual reference. With `by_id` set the string is a numeric
    /// id, otherwise a positional index.
    pub fn parse(s: &str, by_id: bool) -> Result<Self> {
        if by_id {
            let raw: i64 = s.parse().map_err(|_| {
                crate::error::Error::invalid(format!("bad node id '{}'", s))
            })?;
            Ok(NodeRef::Id(NodeId(raw)))
        } else {
            Ok(NodeRef::Index(NodeIndex::parse(s)?))
        }
    }

    /// A reference to the root node.
    pub fn root() -> Self {
        NodeRef::Index(NodeIndex::root())
    }
}

impl From<NodeId> for NodeRef {
    fn from(id: NodeId) -> Self {
        NodeRef::Id(id)
    }
}

/// Service-level change to a node. Unset fields are left unchanged.
#[derive(Clone, Debug, Default)]
pub struct NodeChange {
    /// New name.
    pub name: Option<String>,
    /// Content merge entries: an empty value deletes the key, a non-empty
    /// value inserts or overwrites it.
    pub content: Vec<(String, String)>,
    /// New parent (detach from the old parent, append under the new one).
    pub parent: Option<NodeRef>,
}

impl NodeChange {
    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.content.is_empty() && self.parent.is_none()
    }
}

/// Which node fields participate in a find query.
#[derive(Clone, Copy, Debug)]
pub struct FindFields {
    /// Match against the node name.
    pub name: bool,
    /// Match against any content value.
    pub content: bool,
    /// Match against the positional index string.
    pub index: bool,
}

impl Default for FindFields {
    /// Name and content participate by default; index does not.
    fn default() -> Self {
        Self {
            name: true,
            content: true,
            index: false,
        }
    }
}

impl FindFields {
    /// All fields participate.
    pub fn all() -> Self {
        Self {
            name: true,
            content: true,
            index: true,
        }
    }
}

/// One row of a mind-map outline, in pre-order.
///
/// This is the structured form the out-of-scope renderer consumes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OutlineRow {
    /// Positional index string.
    pub index: String,
    /// Durable node id.
    pub id: NodeId,
    /// Node name.
    pub name: String,
    /// Attribute map.
    pub content: Content,
}
