//! CLI integration tests for cortex
//!
//! No graph store is available here. Commands that connect are pointed at a
//! closed local port.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command isolated to a temporary config directory
#[allow(deprecated)]
fn cortex_cmd(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("cortex").unwrap();
    cmd.env("CORTEX_CONFIG_DIR", config_dir.path());
    cmd.env_remove("NEO4J_URI");
    cmd.env_remove("NEO4J_USER");
    cmd.env_remove("NEO4J_DATABASE");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("doctor"))
        .stdout(predicate::str::contains("ingest"))
        .stdout(predicate::str::contains("query"))
        .stdout(predicate::str::contains("watch"));
}

#[test]
fn test_config_list_shows_defaults() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graph.uri = bolt://localhost:7687"))
        .stdout(predicate::str::contains("breaker.failure_threshold = 5"))
        .stdout(predicate::str::contains("vector.message_namespace = neural_chat"));
}

#[test]
fn test_config_set_persists() {
    let dir = TempDir::new().unwrap();

    cortex_cmd(&dir)
        .args(["config", "set", "breaker.failure_threshold", "3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Set breaker.failure_threshold = 3"));
    assert!(dir.path().join("config.toml").exists());

    cortex_cmd(&dir)
        .args(["config", "get", "breaker.failure_threshold"])
        .assert()
        .success()
        .stdout("3\n");

    cortex_cmd(&dir)
        .args(["--quiet", "config", "reset"])
        .assert()
        .success()
        .stdout("");
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_config_rejects_unknown_key() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "get", "graph.colour"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown configuration key"));
}

#[test]
fn test_config_rejects_invalid_value() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "set", "graph.max_connections", "many"])
        .assert()
        .failure();
    assert!(!dir.path().join("config.toml").exists());
}

#[test]
fn test_env_override_applies_to_get() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .env("NEO4J_URI", "bolt://graph.internal:7687")
        .args(["config", "get", "graph.uri"])
        .assert()
        .success()
        .stdout("bolt://graph.internal:7687\n");
}

#[test]
fn test_config_path_uses_override_dir() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_query_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["query", "--kind", "gossip", "anything"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown query kind"));
}

#[test]
fn test_ingest_rejects_unknown_kind() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["ingest", "--kind", "rumor", "hello"])
        .assert()
        .failure();
}

#[test]
fn test_doctor_reports_vectors_as_process_local() {
    let dir = TempDir::new().unwrap();
    cortex_cmd(&dir)
        .args(["config", "set", "graph.connection_timeout_ms", "500"])
        .assert()
        .success();

    cortex_cmd(&dir)
        .env("NEO4J_URI", "bolt://127.0.0.1:1")
        .env_remove("NEO4J_PASSWORD")
        .arg("doctor")
        .assert()
        .success()
        .stdout(predicate::str::contains("[!!] Graph store"))
        .stdout(predicate::str::contains(
            "[OK] Vector store: 0 records in 0 namespaces, process-local, discarded on exit",
        ));
}
