//! Integration tests for node operations: indices, content merging,
//! moves, sorting, and search.

use mindnoscape::node::types::NodeFilter;
use mindnoscape::prelude::*;
use mindnoscape::OutlineRow;
use std::sync::Arc;
use tempfile::tempdir;

fn setup_with_map() -> (tempfile::TempDir, Arc<Manager>, SessionHandle, MindmapId) {
    let dir = tempdir().unwrap();
    let config = Config {
        database_dir: dir.path().join("data"),
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

fn view(session: &SessionHandle) -> Vec<OutlineRow> {
    match session
        .run(Command::new(MindmapCommand::View {
            index: String::new(),
            show_ids: true,
        }))
        .unwrap()
    {
        Reply::Rows(rows) => rows,
        other => panic!("expected Reply::Rows, got {:?}", other),
    }
}

fn index_of<'a>(rows: &'a [OutlineRow], name: &str) -> &'a str {
    rows.iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| panic!("node '{}' not in outline", name))
        .index
        .as_str()
}

// ============================================================================
// Scenario: add children, check indices, delete one, check contraction
// ============================================================================

#[test]
fn test_add_delete_and_index_contraction() {
    let (_dir, manager, session, map) = setup_with_map();

    let a = add_node(&session, "0", "A");
    let b = add_node(&session, "0", "B");
    let a1 = add_node(&session, "1", "A1");

    let rows = view(&session);
    assert_eq!(index_of(&rows, "A"), "1");
    assert_eq!(index_of(&rows, "B"), "2");
    assert_eq!(index_of(&rows, "A1"), "1.1");

    // All ids distinct and non-zero
    assert_ne!(a, b);
    assert_ne!(a, a1);
    assert!(a.get() > 0 && b.get() > 0 && a1.get() > 0);

    session
        .run(Command::new(NodeCommand::Delete {
            node: "2".to_string(),
            by_id: false,
        }))
        .unwrap();

    let rows = view(&session);
    assert_eq!(index_of(&rows, "A"), "1");
    assert_eq!(index_of(&rows, "A1"), "1.1");
    assert!(rows.iter().all(|r| r.name != "B"));

    // B's row and content rows are gone from storage
    let stored = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::by_id(b))
        .unwrap();
    assert!(stored.is_empty());
}

#[test]
fn test_deleting_middle_child_contracts_siblings() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "first");
    add_node(&session, "0", "second");
    add_node(&session, "0", "third");

    session
        .run(Command::new(NodeCommand::Delete {
            node: "2".to_string(),
            by_id: false,
        }))
        .unwrap();

    let rows = view(&session);
    assert_eq!(index_of(&rows, "first"), "1");
    // third slid into position 2; positions stay contiguous from 1
    assert_eq!(index_of(&rows, "third"), "2");
}

#[test]
fn test_resolution_by_id_and_index_agree() {
    let (_dir, _manager, session, _map) = setup_with_map();

    let a = add_node(&session, "0", "A");
    add_node(&session, "1", "A1");

    // Rename via id, observe via index
    session
        .run(Command::new(NodeCommand::Update {
            node: a.to_string(),
            name: Some("renamed".to_string()),
            content: vec![],
            by_id: true,
        }))
        .unwrap();
    let rows = view(&session);
    assert_eq!(index_of(&rows, "renamed"), "1");
}

#[test]
fn test_bad_index_strings_rejected() {
    let (_dir, _manager, session, _map) = setup_with_map();
    add_node(&session, "0", "A");

    for bad in ["x", "1..2", "0.1", "-1"] {
        let err = session
            .run(Command::new(NodeCommand::Add {
                parent: bad.to_string(),
                name: "child".to_string(),
                content: vec![],
                by_id: false,
            }))
            .unwrap_err();
        assert!(err.is_invalid_argument(), "'{}' should be rejected", bad);
    }

    // Well-formed but out of range
    let err = session
        .run(Command::new(NodeCommand::Add {
            parent: "5".to_string(),
            name: "child".to_string(),
            content: vec![],
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Content merge semantics
// ============================================================================

#[test]
fn test_content_merge_insert_overwrite_delete() {
    let (_dir, manager, session, map) = setup_with_map();

    let id = add_node_with(
        &session,
        "0",
        "task",
        vec![
            ("status".to_string(), "open".to_string()),
            ("priority".to_string(), "2".to_string()),
        ],
    );

    session
        .run(Command::new(NodeCommand::Update {
            node: "1".to_string(),
            name: None,
            content: vec![
                // overwrite, delete, insert
                ("status".to_string(), "done".to_string()),
                ("priority".to_string(), String::new()),
                ("owner".to_string(), "alice".to_string()),
            ],
            by_id: false,
        }))
        .unwrap();

    let rows = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::by_id(id))
        .unwrap();
    let content = &rows[0].content;
    assert_eq!(content.get("status").map(String::as_str), Some("done"));
    assert_eq!(content.get("owner").map(String::as_str), Some("alice"));
    assert!(!content.contains_key("priority"));
}

#[test]
fn test_noop_update_changes_nothing() {
    let (_dir, manager, session, map) = setup_with_map();

    add_node_with(
        &session,
        "0",
        "task",
        vec![("status".to_string(), "open".to_string())],
    );
    let before = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::default())
        .unwrap();

    // Identical values: indices, ids, and history stay untouched
    session
        .run(Command::new(NodeCommand::Update {
            node: "1".to_string(),
            name: Some("task".to_string()),
            content: vec![("status".to_string(), "open".to_string())],
            by_id: false,
        }))
        .unwrap();

    let after = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::default())
        .unwrap();
    let key = |rows: &[mindnoscape::node::types::NodeRow]| {
        rows.iter()
            .map(|r| (r.id, r.parent, r.name.clone(), r.index.clone(), r.content.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&before), key(&after));

    // Nothing to undo
    let err = session.run(Command::new(SystemCommand::Undo)).unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Root protections
// ============================================================================

#[test]
fn test_root_cannot_be_deleted_or_moved() {
    let (_dir, _manager, session, _map) = setup_with_map();
    add_node(&session, "0", "A");

    let err = session
        .run(Command::new(NodeCommand::Delete {
            node: "0".to_string(),
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    let err = session
        .run(Command::new(NodeCommand::Move {
            source: "0".to_string(),
            target: "1".to_string(),
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    // Content on the root is off limits too
    let err = session
        .run(Command::new(NodeCommand::Update {
            node: "0".to_string(),
            name: None,
            content: vec![("k".to_string(), "v".to_string())],
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Move
// ============================================================================

#[test]
fn test_move_reindexes_subtree() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "0", "B");
    add_node(&session, "1", "A1");

    // Move A1 under B
    session
        .run(Command::new(NodeCommand::Move {
            source: "1.1".to_string(),
            target: "2".to_string(),
            by_id: false,
        }))
        .unwrap();

    let rows = view(&session);
    assert_eq!(index_of(&rows, "A1"), "2.1");
}

#[test]
fn test_move_cycle_rejected_without_changes() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "A");
    add_node(&session, "1", "A1");
    add_node(&session, "1.1", "A11");

    // A is an ancestor of A11: moving A under A11 would close a cycle
    let err = session
        .run(Command::new(NodeCommand::Move {
            source: "1".to_string(),
            target: "1.1.1".to_string(),
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());

    // Nothing changed
    let rows = view(&session);
    assert_eq!(index_of(&rows, "A"), "1");
    assert_eq!(index_of(&rows, "A1"), "1.1");
    assert_eq!(index_of(&rows, "A11"), "1.1.1");

    // Moving a node onto itself is the degenerate cycle
    let err = session
        .run(Command::new(NodeCommand::Move {
            source: "1".to_string(),
            target: "1".to_string(),
            by_id: false,
        }))
        .unwrap_err();
    assert!(err.is_invalid_argument());
}

// ============================================================================
// Sort
// ============================================================================

#[test]
fn test_sort_by_name_recurses() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "c");
    add_node(&session, "0", "a");
    add_node(&session, "0", "b");
    add_node(&session, "2", "z");
    add_node(&session, "2", "y");

    session
        .run(Command::new(NodeCommand::Sort {
            parent: String::new(),
            field: String::new(),
            reverse: false,
            by_id: false,
        }))
        .unwrap();

    let rows = view(&session);
    assert_eq!(index_of(&rows, "a"), "1");
    assert_eq!(index_of(&rows, "b"), "2");
    assert_eq!(index_of(&rows, "c"), "3");
    // Children of "a" (previously at "2") were sorted too
    assert_eq!(index_of(&rows, "y"), "1.1");
    assert_eq!(index_of(&rows, "z"), "1.2");
}

#[test]
fn test_sort_by_field_numeric_and_reverse() {
    let (_dir, _manager, session, _map) = setup_with_map();

    for (name, priority) in [("low", "10"), ("high", "2"), ("mid", "9")] {
        add_node_with(
            &session,
            "0",
            name,
            vec![("priority".to_string(), priority.to_string())],
        );
    }

    session
        .run(Command::new(NodeCommand::Sort {
            parent: String::new(),
            field: "priority".to_string(),
            reverse: false,
            by_id: false,
        }))
        .unwrap();
    let rows = view(&session);
    // Numeric comparison: 2 < 9 < 10 (lexicographic would give 10 first)
    assert_eq!(index_of(&rows, "high"), "1");
    assert_eq!(index_of(&rows, "mid"), "2");
    assert_eq!(index_of(&rows, "low"), "3");

    session
        .run(Command::new(NodeCommand::Sort {
            parent: String::new(),
            field: "priority".to_string(),
            reverse: true,
            by_id: false,
        }))
        .unwrap();
    let rows = view(&session);
    assert_eq!(index_of(&rows, "low"), "1");
    assert_eq!(index_of(&rows, "high"), "3");
}

#[test]
fn test_sort_is_idempotent() {
    let (_dir, manager, session, map) = setup_with_map();

    for name in ["b", "c", "a"] {
        add_node(&session, "0", name);
    }
    let sort = || {
        session
            .run(Command::new(NodeCommand::Sort {
                parent: String::new(),
                field: String::new(),
                reverse: false,
                by_id: false,
            }))
            .unwrap()
    };

    sort();
    let once = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::default())
        .unwrap();
    sort();
    let twice = manager
        .store_for_test()
        .get_nodes(map, &NodeFilter::default())
        .unwrap();

    let key = |rows: &[mindnoscape::node::types::NodeRow]| {
        rows.iter()
            .map(|r| (r.id, r.parent, r.name.clone(), r.index.clone()))
            .collect::<Vec<_>>()
    };
    assert_eq!(key(&once), key(&twice));
}

// ============================================================================
// Find
// ============================================================================

#[test]
fn test_find_matches_name_and_content() {
    let (_dir, _manager, session, _map) = setup_with_map();

    add_node(&session, "0", "Shopping");
    add_node_with(
        &session,
        "0",
        "errands",
        vec![("note".to_string(), "buy milk at the SHOP".to_string())],
    );
    add_node(&session, "0", "work");

    let find = |query: &str| -> Vec<String> {
        match session
            .run(Command::new(NodeCommand::Find {
                query: query.to_string(),
                by_id: false,
            }))
            .unwrap()
        {
            Reply::Rows(rows) => rows.into_iter().map(|r| r.name).collect(),
            other => panic!("expected Reply::Rows, got {:?}", other),
        }
    };

    // Case-insensitive, matches names and content values, pre-order
    assert_eq!(find("shop"), vec!["Shopping", "errands"]);
    assert_eq!(find("WORK"), vec!["work"]);
    assert!(find("nothing-here").is_empty());
}
