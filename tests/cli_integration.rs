//! CLI Integration Tests
//!
//! These tests drive the built `blobkv` binary end-to-end against the file
//! backend in a temporary directory. Two invocations sharing a directory
//! stand in for two machines sharing a bucket.
//!
//! Run with:
//! ```bash
//! cargo test --test cli_integration
//! ```

use std::path::Path;
use std::process::Command;
use tempfile::tempdir;

/// A blobkv command isolated from the caller's environment and config file
fn blobkv_command(home: &Path) -> Command {
    let mut command = Command::new(env!("CARGO_BIN_EXE_blobkv"));
    for (name, _) in std::env::vars() {
        if name.starts_with("BLOBKV_") {
            command.env_remove(name);
        }
    }
    command
        .env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"));
    command
}

/// Run blobkv as `user` against `root` and return (stdout, stderr, success)
fn run_blobkv_as(user: &str, args: &[&str], root: &Path) -> (String, String, bool) {
    let output = blobkv_command(root)
        .args(["--root", root.join("bucket").to_str().unwrap(), "-u", user])
        .args(args)
        .output()
        .expect("Failed to execute blobkv");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

fn run_blobkv(args: &[&str], root: &Path) -> (String, String, bool) {
    run_blobkv_as("alice", args, root)
}

// ============================================================================
// Set / Get
// ============================================================================

#[test]
fn test_cli_set_then_get() {
    let dir = tempdir().unwrap();

    let (stdout, _stderr, success) = run_blobkv(&["store", "set", "my_name", "Bob"], dir.path());
    assert!(success, "set should succeed");
    assert!(stdout.is_empty(), "set prints nothing in text mode");

    let (stdout, _stderr, success) = run_blobkv(&["store", "get", "my_name"], dir.path());
    assert!(success, "get should succeed");
    assert_eq!(stdout, "Bob\n");
}

#[test]
fn test_cli_get_missing_key_fails() {
    let dir = tempdir().unwrap();

    let (stdout, stderr, success) = run_blobkv(&["store", "get", "nobody"], dir.path());

    assert!(!success, "get of a missing key should fail");
    assert!(stdout.is_empty(), "nothing should be printed as a value");
    assert!(
        stderr.contains("Key nobody not found."),
        "should name the key, got: {}",
        stderr
    );
    assert!(stderr.contains(" Error "), "should tag the error");
}

#[test]
fn test_cli_overwrite() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "k", "first"], dir.path());
    run_blobkv(&["store", "set", "k", "second"], dir.path());

    let (stdout, _, _) = run_blobkv(&["store", "get", "k"], dir.path());
    assert_eq!(stdout, "second\n");
}

#[test]
fn test_cli_json_value() {
    let dir = tempdir().unwrap();

    let (_, _, success) = run_blobkv(
        &["store", "set", "my_data", r#"{"name": "Bob", "lab": "MLO"}"#, "--json"],
        dir.path(),
    );
    assert!(success, "set --json should succeed");

    let (stdout, _, success) = run_blobkv(&["-f", "json", "store", "get", "my_data"], dir.path());
    assert!(success);
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(parsed["type"], "map");
    assert_eq!(parsed["value"]["lab"], "MLO");
    assert_eq!(parsed["value"]["name"], "Bob");
}

#[test]
fn test_cli_invalid_json_value() {
    let dir = tempdir().unwrap();

    let (_, stderr, success) =
        run_blobkv(&["store", "set", "k", "{not json", "--json"], dir.path());
    assert!(!success);
    assert!(stderr.contains("not valid JSON"), "got: {}", stderr);
}

// ============================================================================
// Unset / Pop
// ============================================================================

#[test]
fn test_cli_unset() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "temp", "x"], dir.path());

    let (_, _, success) = run_blobkv(&["store", "unset", "temp"], dir.path());
    assert!(success, "unset should succeed");

    let (_, _, success) = run_blobkv(&["store", "get", "temp"], dir.path());
    assert!(!success, "key should be gone after unset");

    let (_, stderr, success) = run_blobkv(&["store", "unset", "temp"], dir.path());
    assert!(!success, "second unset should fail");
    assert!(stderr.contains("not found"));
}

#[test]
fn test_cli_pop() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "once", "hello"], dir.path());

    let (stdout, _, success) = run_blobkv(&["store", "pop", "once"], dir.path());
    assert!(success, "pop should succeed");
    assert_eq!(stdout, "hello\n");

    let (_, _, success) = run_blobkv(&["store", "pop", "once"], dir.path());
    assert!(!success, "second pop should fail");
}

// ============================================================================
// Listing / metadata / namespaces
// ============================================================================

#[test]
fn test_cli_list() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "b", "1"], dir.path());
    run_blobkv(&["store", "set", "a", "2"], dir.path());

    let (stdout, _, success) = run_blobkv(&["store", "list"], dir.path());
    assert!(success);
    assert_eq!(stdout, "a\nb\n");

    let (stdout, _, _) = run_blobkv(&["-f", "json", "store", "list"], dir.path());
    assert!(stdout.contains("\"count\":2"), "got: {}", stdout);
}

#[test]
fn test_cli_users_are_separate_namespaces() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "shared", "from alice"], dir.path());

    let (_, _, success) = run_blobkv_as("bob", &["store", "get", "shared"], dir.path());
    assert!(!success, "bob should not see alice's key");

    let (stdout, _, _) = run_blobkv(&["store", "get", "shared"], dir.path());
    assert_eq!(stdout, "from alice\n");
}

#[test]
fn test_cli_ttl_recorded_in_info() {
    let dir = tempdir().unwrap();

    run_blobkv(&["store", "set", "short", "lived", "--ttl-days", "2"], dir.path());

    let (stdout, _, success) = run_blobkv(&["-f", "json", "store", "info", "short"], dir.path());
    assert!(success, "info should succeed");
    let parsed: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let written = parsed["written_at"].as_u64().unwrap();
    assert_eq!(parsed["expires_at"].as_u64(), Some(written + 2 * 86_400));
    assert_eq!(parsed["object"], "alice/short");
    assert_eq!(parsed["expired"], false);
}

#[test]
fn test_cli_huge_ttl_rejected() {
    let dir = tempdir().unwrap();

    let (_, stderr, success) = run_blobkv(
        &["store", "set", "k", "v", "--ttl-days", "300000000000000"],
        dir.path(),
    );
    assert!(!success, "an overflowing ttl should fail");
    assert!(stderr.contains("too large"), "got: {}", stderr);
    assert!(!stderr.contains("panicked"), "got: {}", stderr);

    let (_, _, success) = run_blobkv(&["store", "get", "k"], dir.path());
    assert!(!success, "nothing should have been written");
}

#[test]
fn test_cli_json_error_output() {
    let dir = tempdir().unwrap();

    let (stdout, _, success) = run_blobkv(&["-f", "json", "store", "get", "missing"], dir.path());
    assert!(!success);
    assert!(stdout.contains("\"status\":\"error\""), "got: {}", stdout);
}

#[test]
fn test_cli_config_redacts_secret() {
    let dir = tempdir().unwrap();

    let output = blobkv_command(dir.path())
        .env("BLOBKV_SECRET_KEY", "hunter2")
        .env("BLOBKV_BUCKET", "shared")
        .args(["config"])
        .output()
        .expect("Failed to execute blobkv");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success());
    assert!(stdout.contains("\"bucket\": \"shared\""), "got: {}", stdout);
    assert!(!stdout.contains("hunter2"));
    assert!(stdout.contains("<redacted>"));
}

#[test]
fn test_cli_s3_without_settings_fails() {
    let dir = tempdir().unwrap();

    let output = blobkv_command(dir.path())
        .args(["-b", "s3", "-u", "alice", "store", "get", "x"])
        .output()
        .expect("Failed to execute blobkv");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(!output.status.success());
    assert!(stderr.contains("BLOBKV_ENDPOINT"), "got: {}", stderr);
}
