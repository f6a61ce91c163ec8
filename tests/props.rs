//! Property tests: the tree invariants hold under arbitrary operation
//! sequences, and index strings round-trip.

use std::collections::HashSet;

use mindnoscape::node::index::NodeIndex;
use mindnoscape::node::tree::NodeTree;
use mindnoscape::{Content, NodeId};
use proptest::prelude::*;

/// Checks the universal tree invariants:
/// - root id 0, parent −1, index "0"
/// - every child's index is its parent's index plus its 1-based position
/// - ids unique, every child's parent pointer agrees
/// - index recomputation is idempotent
fn check_invariants(tree: &NodeTree) {
    let root = tree.root();
    assert_eq!(root.id, NodeId::ROOT);
    assert_eq!(root.parent, NodeId::NONE);
    assert_eq!(root.index.to_string(), "0");

    let mut seen = HashSet::new();
    for id in tree.preorder() {
        assert!(seen.insert(id), "duplicate id {} in preorder", id);
        let node = tree.get(id).unwrap();
        for (position, &child) in node.children.iter().enumerate() {
            let child_node = tree.get(child).unwrap();
            assert_eq!(child_node.parent, id);
            assert_eq!(child_node.index, node.index.child(position as u32 + 1));
        }
    }
    assert_eq!(seen.len(), tree.len(), "unreachable nodes exist");

    let mut copy = tree.clone();
    assert!(
        copy.recompute_indices().is_empty(),
        "recomputation must be idempotent"
    );
}

proptest! {
    #[test]
    fn prop_tree_invariants_under_random_ops(
        ops in proptest::collection::vec((0u8..4, 0u8..32, 0u8..32), 0..48)
    ) {
        let mut tree = NodeTree::new("root");
        for (kind, a, b) in ops {
            let nodes = tree.preorder();
            match kind {
                // Add a node under an arbitrary parent
                0 => {
                    let parent = nodes[(a as usize) % nodes.len()];
                    let id = tree.alloc_id();
                    tree.attach_new(id, parent, format!("n{}", id), Content::new())
                        .unwrap();
                }
                // Delete an arbitrary non-root subtree
                1 => {
                    if nodes.len() > 1 {
                        let target = nodes[1 + (a as usize) % (nodes.len() - 1)];
                        tree.detach(target).unwrap();
                        tree.remove_subtree(target);
                    }
                }
                // Move an arbitrary non-root node, unless it would cycle
                2 => {
                    if nodes.len() > 1 {
                        let source = nodes[1 + (a as usize) % (nodes.len() - 1)];
                        let target = nodes[(b as usize) % nodes.len()];
                        if !tree.is_ancestor(source, target) {
                            tree.detach(source).unwrap();
                            tree.reattach(source, target).unwrap();
                        }
                    }
                }
                // Sort the whole tree by name
                _ => {
                    tree.sort_subtree(NodeId::ROOT, |x, y| x.name.cmp(&y.name));
                }
            }
            tree.recompute_indices();
            check_invariants(&tree);
        }
    }

    #[test]
    fn prop_index_display_parse_round_trip(
        segments in proptest::collection::vec(1u32..100, 0..6)
    ) {
        let mut index = NodeIndex::root();
        for segment in &segments {
            index = index.child(*segment);
        }
        let parsed = NodeIndex::parse(&index.to_string()).unwrap();
        prop_assert_eq!(parsed, index);
    }

    #[test]
    fn prop_index_parse_never_panics(s in "\\PC*") {
        let _ = NodeIndex::parse(&s);
    }

    #[test]
    fn prop_sort_is_idempotent_in_memory(
        names in proptest::collection::vec("[a-z]{1,4}", 1..12)
    ) {
        let mut tree = NodeTree::new("root");
        for name in &names {
            let id = tree.alloc_id();
            tree.attach_new(id, NodeId::ROOT, name.clone(), Content::new()).unwrap();
        }
        tree.sort_subtree(NodeId::ROOT, |x, y| x.name.cmp(&y.name));
        tree.recompute_indices();
        let once: Vec<NodeId> = tree.root().children.clone();

        tree.sort_subtree(NodeId::ROOT, |x, y| x.name.cmp(&y.name));
        tree.recompute_indices();
        prop_assert_eq!(&once, &tree.root().children);
        check_invariants(&tree);
    }
}
