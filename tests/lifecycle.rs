//! Integration tests for core lifecycle: configuration, manager startup,
//! default-user bootstrap, and clean reopen.

use mindnoscape::prelude::*;
use mindnoscape::user::types::UserFilter;
use std::sync::Arc;
use tempfile::tempdir;

fn test_config(dir: &std::path::Path) -> Config {
    Config {
        database_dir: dir.join("data"),
        ..Default::default()
    }
}

// ============================================================================
// Startup
// ============================================================================

#[test]
fn test_manager_creates_database() {
    let dir = tempdir().unwrap();
    let config = test_config(dir.path());
    let db_path = config.database_path();

    assert!(!db_path.exists());
    let manager = Manager::new(config).unwrap();
    assert!(db_path.exists());
    manager.shutdown();
}

#[test]
fn test_manager_rejects_invalid_config() {
    let dir = tempdir().unwrap();
    let config = Config {
        database_dir: dir.path().join("data"),
        history_limit: 0,
        ..Default::default()
    };
    assert!(Manager::new(config).is_err());
}

#[test]
fn test_config_file_written_when_missing() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");

    let config = Config::load_or_create(&path).unwrap();
    assert!(path.exists());
    assert_eq!(config.default_user, "admin");

    // Loading again reads the same file
    let again = Config::load_or_create(&path).unwrap();
    assert_eq!(again.database_file, config.database_file);
}

#[test]
fn test_second_manager_on_same_database_conflicts() {
    let dir = tempdir().unwrap();
    let manager = Manager::new(test_config(dir.path())).unwrap();

    let err = Manager::new(test_config(dir.path())).unwrap_err();
    assert!(err.is_conflict());
    manager.shutdown();
}

// ============================================================================
// Scenario: bootstrap a fresh store, create a user, authenticate
// ============================================================================

#[test]
fn test_bootstrap_user_and_authenticate() {
    let dir = tempdir().unwrap();
    let manager = Manager::new(test_config(dir.path())).unwrap();
    let session = manager.connect();

    session
        .run(Command::new(UserCommand::Add {
            username: "alice".to_string(),
            password: Some("p".to_string()),
        }))
        .unwrap();

    let found = manager
        .users()
        .find(&UserFilter::by_username("alice"))
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].username, "alice");
    assert!(found[0].active);

    assert!(manager.users().authenticate("alice", "p").unwrap());
    assert!(!manager.users().authenticate("alice", "q").unwrap());
}

#[test]
fn test_default_user_bootstrap_and_guard() {
    let dir = tempdir().unwrap();
    let manager = Manager::new(test_config(dir.path())).unwrap();

    assert!(manager.users().exists("admin").unwrap());
    assert!(manager.users().authenticate("admin", "admin").unwrap());

    // The configured default user's password is locked
    let err = manager
        .users()
        .update(
            "admin",
            mindnoscape::user::types::UserUpdate {
                password: Some("new".to_string()),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert!(err.is_permission_denied());
}

// ============================================================================
// Reopen
// ============================================================================

#[test]
fn test_users_survive_reopen() {
    let dir = tempdir().unwrap();

    {
        let manager = Manager::new(test_config(dir.path())).unwrap();
        let session = manager.connect();
        session
            .run(Command::new(UserCommand::Add {
                username: "alice".to_string(),
                password: Some("p".to_string()),
            }))
            .unwrap();
        manager.shutdown();
    }

    let manager = Manager::new(test_config(dir.path())).unwrap();
    assert!(manager.users().exists("alice").unwrap());
    assert!(manager.users().authenticate("alice", "p").unwrap());
}

#[test]
fn test_multiple_open_close_cycles() {
    let dir = tempdir().unwrap();
    for i in 0..3 {
        let manager = Manager::new(test_config(dir.path())).unwrap();
        assert!(
            manager.users().exists("admin").unwrap(),
            "Iteration {} failed",
            i
        );
        manager.shutdown();
    }
}

// ============================================================================
// Sessions
// ============================================================================

#[test]
fn test_exit_command_disconnects() {
    let dir = tempdir().unwrap();
    let manager = Manager::new(test_config(dir.path())).unwrap();
    let session = manager.connect();
    assert_eq!(manager.session_count(), 1);

    let reply = session.run(Command::new(SystemCommand::Exit)).unwrap();
    assert!(matches!(reply, Reply::Exited));
    assert_eq!(manager.session_count(), 0);

    // Further commands fail: the session is gone
    let err = session
        .run(Command::new(SystemCommand::Undo))
        .unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn test_manager_is_send_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Arc<Manager>>();
}
