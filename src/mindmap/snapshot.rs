//! Snapshot codec seam for import and export.
//!
//! A snapshot is the portable form of one mind-map: a named tree of
//! (name, content) pairs with no ids and no indices. Exports walk the
//! loaded tree; imports re-persist the snapshot with fresh, densely packed
//! node ids assigned by pre-order traversal (see
//! [`MindmapService::import`](crate::mindmap::MindmapService::import)).
//! The serde derives make the JSON wiring trivial; other formats plug in
//! outside this crate.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::node::types::Content;

/// One node of a snapshot tree.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeSnapshot {
    /// Node name.
    pub name: String,
    /// Attribute map.
    #[serde(default, skip_serializing_if = "Content::is_empty")]
    pub content: Content,
    /// Children, in sibling order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeSnapshot>,
}

impl NodeSnapshot {
    /// Number of nodes in this subtree, including itself.
    pub fn node_count(&self) -> usize {
        1 + self
            .children
            .iter()
            .map(NodeSnapshot::node_count)
            .sum::<usize>()
    }
}

/// A portable mind-map: its name and its root's subtree.
///
/// The root snapshot's own name is ignored on import; the mind-map name
/// wins, keeping the mirror invariant between the two.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MindmapSnapshot {
    /// Mind-map name.
    pub name: String,
    /// The root node's subtree.
    pub root: NodeSnapshot,
}

impl MindmapSnapshot {
    /// Parses a snapshot from JSON.
    ///
    /// # Errors
    ///
    /// `InvalidArgument` for malformed input.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw)
            .map_err(|e| Error::invalid(format!("malformed mindmap snapshot: {}", e)))
    }

    /// Serializes the snapshot as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Error::io(format!("cannot serialize snapshot: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MindmapSnapshot {
        let mut content = Content::new();
        content.insert("priority".to_string(), "1".to_string());
        MindmapSnapshot {
            name: "plan".to_string(),
            root: NodeSnapshot {
                name: "plan".to_string(),
                content: Content::new(),
                children: vec![
                    NodeSnapshot {
                        name: "A".to_string(),
                        content,
                        children: vec![NodeSnapshot {
                            name: "A1".to_string(),
                            ..Default::default()
                        }],
                    },
                    NodeSnapshot {
                        name: "B".to_string(),
                        ..Default::default()
                    },
                ],
            },
        }
    }

    #[test]
    fn test_json_round_trip() {
        let snapshot = sample();
        let json = snapshot.to_json().unwrap();
        let parsed = MindmapSnapshot::from_json(&json).unwrap();
        assert_eq!(parsed, snapshot);
    }

    #[test]
    fn test_node_count() {
        assert_eq!(sample().root.node_count(), 4);
    }

    #[test]
    fn test_malformed_json_is_invalid_argument() {
        let err = MindmapSnapshot::from_json("{").unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[test]
    fn test_minimal_snapshot_parses() {
        let parsed =
            MindmapSnapshot::from_json(r#"{"name": "m", "root": {"name": "m"}}"#).unwrap();
        assert!(parsed.root.children.is_empty());
        assert!(parsed.root.content.is_empty());
    }
}
