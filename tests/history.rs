//! Integration tests for undo/redo: inversions, round trips, cursor
//! discipline, and id stability across redo cycles.

use mindnoscape::node::types::{NodeFilter, NodeRow};
use mindnoscape::prelude::*;
use std::sync::Arc;
use tempfile::tempdir;

fn setup_with_map() -> (tempfile::TempDir, Arc<Manager>, SessionHandle, MindmapId) {
    let dir = tempdir().unwrap();
    let config = Config {
        database_dir: dir.path().join("data"),
        history_limit: 8,
        ..Default::default()
    };
    let manager = Manager::new(config).unwrap();

    let session = manager.connect();
    session
        .run(Command::new(UserCommand::Add {
            username: "alice".to_string(),
            password: Some("p".to_string()),
        }))
        .unwrap();
    session
        .run(Command::new(UserCommand::Select {
            username: "alice".to_string(),
        }))
        .unwrap();
    let map = match session
        .run(Command::new(MindmapCommand::Add {
            name: "plan".to_string(),
            is_public: false,
        }))
        .unwrap()
    {
        Reply::Mindmap(map) => map.id,
        other => panic!("expected Reply::Mindmap, got {:?}", other),
    };
    session
        .run(Command::new(MindmapCommand::Select {
            name: "plan".to_string(),
        }))
        .unwrap();
    (dir, manager, session, map)
}

fn add_node(session: &SessionHandle, parent: &str, name: &str) -> NodeId {
    add_node_with(session, parent, name, vec![])
}

fn add_node_with(
    session: &SessionHandle,
    parent: &str,
    name: &str,
    content: Vec<(String, String)>,
) -> NodeId {
    match session
        .run(Command::new(NodeCommand::Add {
            parent: parent.to_string(),
            name: name.to_string(),
            content,
            by_id: false,
        }))
        .unwrap()
    {
        Reply::NodeId(id) => id,
        other => panic!("expected Reply::NodeId, got {:?}", other),
    }
}

/// Storage view with timestamps stripped: undo must restore everything
/// but creation times.
fn stored_shape(manager: &Manager, map: MindmapId) -> Vec<(NodeId, NodeId, String, String, Vec<(String, String)>)> {
    let mut rows: Vec<NodeRow> = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::default())
        .unwrap();
    rows.sort_by_key(|r| r.id);
    rows.into_iter()
        .map(|r| {
            (
                r.id,
                r.parent,
                r.name,
                r.index,
                r.content.into_iter().collect(),
            )
        })
        .collect()
}

fn undo(session: &SessionHandle) {
    session.run(Command::new(SystemCommand::Undo)).unwrap();
}

fn redo(session: &SessionHandle) {
    session.run(Command::new(SystemCommand::Redo)).unwrap();
}

// ============================================================================
// Scenario: undo a subtree delete, byte-for-byte restoration
// ============================================================================

#[test]
fn test_undo_delete_restores_subtree_exactly() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "0", "B");
    add_node_with(
        &session,
        "1",
        "A1",
        vec![("status".to_string(), "open".to_string())],
    );
    add_node(&session, "1.1", "A11");

    let before = stored_shape(&manager, map);

    // Delete the whole A subtree, then bring it back
    session
        .run(Command::new(NodeCommand::Delete {
            node: "1".to_string(),
            by_id: false,
        }))
        .unwrap();
    assert_eq!(stored_shape(&manager, map).len(), 2); // root + B

    undo(&session);
    assert_eq!(stored_shape(&manager, map), before);
}

#[test]
fn test_undo_delete_restores_middle_sibling_position() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "first");
    add_node(&session, "0", "second");
    add_node(&session, "0", "third");
    let before = stored_shape(&manager, map);

    session
        .run(Command::new(NodeCommand::Delete {
            node: "2".to_string(),
            by_id: false,
        }))
        .unwrap();
    undo(&session);

    // "second" returned to position 2, not to the end
    assert_eq!(stored_shape(&manager, map), before);
}

// ============================================================================
// Round trips: apply; undo; redo == apply
// ============================================================================

#[test]
fn test_add_undo_redo_round_trip() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    let id = add_node(&session, "0", "B");
    let applied = stored_shape(&manager, map);

    undo(&session);
    assert!(stored_shape(&manager, map).iter().all(|(i, ..)| *i != id));

    redo(&session);
    // Redo re-adds with the same forced id
    assert_eq!(stored_shape(&manager, map), applied);
}

#[test]
fn test_update_undo_redo_round_trip() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node_with(
        &session,
        "0",
        "task",
        vec![("status".to_string(), "open".to_string())],
    );
    let original = stored_shape(&manager, map);

    session
        .run(Command::new(NodeCommand::Update {
            node: "1".to_string(),
            name: Some("renamed".to_string()),
            content: vec![
                ("status".to_string(), String::new()),
                ("owner".to_string(), "alice".to_string()),
            ],
            by_id: false,
        }))
        .unwrap();
    let applied = stored_shape(&manager, map);
    assert_ne!(original, applied);

    undo(&session);
    assert_eq!(stored_shape(&manager, map), original);
    redo(&session);
    assert_eq!(stored_shape(&manager, map), applied);
}

#[test]
fn test_move_undo_redo_round_trip() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "0", "B");
    add_node(&session, "1", "A1");
    let original = stored_shape(&manager, map);

    session
        .run(Command::new(NodeCommand::Move {
            source: "1.1".to_string(),
            target: "2".to_string(),
            by_id: false,
        }))
        .unwrap();
    let applied = stored_shape(&manager, map);

    undo(&session);
    assert_eq!(stored_shape(&manager, map), original);
    redo(&session);
    assert_eq!(stored_shape(&manager, map), applied);
}

#[test]
fn test_root_rename_undo_resyncs_mindmap_name() {
    let (_dir, manager, session, map) = setup_with_map();

    session
        .run(Command::new(NodeCommand::Update {
            node: "0".to_string(),
            name: Some("plan2".to_string()),
            content: vec![],
            by_id: false,
        }))
        .unwrap();
    assert_eq!(manager.mindmaps().get_by_id(map).unwrap().name, "plan2");

    undo(&session);
    // The bridge runs on the inversion too
    assert_eq!(manager.mindmaps().get_by_id(map).unwrap().name, "plan");

    redo(&session);
    assert_eq!(manager.mindmaps().get_by_id(map).unwrap().name, "plan2");
}

// ============================================================================
// Cursor discipline
// ============================================================================

#[test]
fn test_new_work_truncates_redo_tail() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "0", "B");
    undo(&session); // B gone

    add_node(&session, "0", "C");

    // B's redo is invalidated
    let err = session.run(Command::new(SystemCommand::Redo)).unwrap_err();
    assert!(err.is_invalid_argument());

    let names: Vec<String> = stored_shape(&manager, map)
        .into_iter()
        .map(|(_, _, name, _, _)| name)
        .collect();
    assert_eq!(names, vec!["plan", "A", "C"]);
}

#[test]
fn test_undo_empty_history_fails_cleanly() {
    let (_dir, _manager, session, _map) = setup_with_map();

    let err = session.run(Command::new(SystemCommand::Undo)).unwrap_err();
    assert!(err.is_invalid_argument());
    let err = session.run(Command::new(SystemCommand::Redo)).unwrap_err();
    assert!(err.is_invalid_argument());
}

#[test]
fn test_undo_to_empty_map_and_back() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "1", "A1");

    undo(&session);
    undo(&session);
    assert_eq!(stored_shape(&manager, map).len(), 1); // just the root

    redo(&session);
    redo(&session);
    let names: Vec<String> = stored_shape(&manager, map)
        .into_iter()
        .map(|(_, _, name, _, _)| name)
        .collect();
    assert_eq!(names, vec!["plan", "A", "A1"]);
}

#[test]
fn test_history_limit_evicts_oldest() {
    let (_dir, _manager, session, _map) = setup_with_map();

    // history_limit is 8; record 10 operations
    for i in 0..10 {
        add_node(&session, "0", &format!("n{}", i));
    }
    for _ in 0..8 {
        undo(&session);
    }
    // The two oldest records were evicted; nothing more to undo
    let err = session.run(Command::new(SystemCommand::Undo)).unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Id stability
// ============================================================================

#[test]
fn test_ids_stable_across_repeated_undo_redo() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node(&session, "0", "A");
    let b = add_node(&session, "0", "B");

    for _ in 0..3 {
        undo(&session);
        redo(&session);
    }

    let shape = stored_shape(&manager, map);
    let b_row = shape.iter().find(|(_, _, name, ..)| name == "B").unwrap();
    assert_eq!(b_row.0, b);
}

#[test]
fn test_new_nodes_never_reuse_tombstoned_ids() {
    let (_dir, manager, session, map) = setup_with_map();

    let a = add_node(&session, "0", "A");
    session
        .run(Command::new(NodeCommand::Delete {
            node: "1".to_string(),
            by_id: false,
        }))
        .unwrap();

    // A's id sits in a Delete record; a new node must not take it
    let b = add_node(&session, "0", "B");
    assert_ne!(a, b);

    // Unwinding still works: first the add of B, then the delete of A
    undo(&session);
    undo(&session);
    let shape = stored_shape(&manager, map);
    let restored = shape.iter().find(|(_, _, name, ..)| name == "A").unwrap();
    assert_eq!(restored.0, a);
}

// ============================================================================
// Per-mind-map histories
// ============================================================================

#[test]
fn test_histories_are_per_mindmap() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "A");

    // Switch to a second mind-map; its history is empty
    session
        .run(Command::new(MindmapCommand::Add {
            name: "other".to_string(),
            is_public: false,
        }))
        .unwrap();
    session
        .run(Command::new(MindmapCommand::Select {
            name: "other".to_string(),
        }))
        .unwrap();
    let err = session.run(Command::new(SystemCommand::Undo)).unwrap_err();
    assert!(err.is_invalid_argument());

    // Back on the first map the record is still there
    session
        .run(Command::new(MindmapCommand::Select {
            name: "plan".to_string(),
        }))
        .unwrap();
    undo(&session);
}
