//! Runs a stand-in `fl` script to check output capture without the real CLI.
#![cfg(unix)]

use fl_cli_runner::{last_line, FlCli};
use serial_test::serial;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

const FAKE_FL: &str = r#"#!/bin/sh
case "$1" in
  mod)
    case "$2" in
      create) echo "Successfully created module $3." ;;
      *) echo "fl: error: Not Found" >&2; exit 1 ;;
    esac ;;
  where) pwd ;;
  marker) echo "$FL_TEST_MARKER" ;;
  hang) sleep 30 ;;
  *) echo "fl: error: unexpected argument $1" >&2; exit 80 ;;
esac
"#;

fn install_fake_fl(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("fl");
    std::fs::write(&path, FAKE_FL).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

#[tokio::test]
#[serial]
async fn test_captures_stdout() {
    let dir = TempDir::new().unwrap();
    let cli = FlCli::new(install_fake_fl(&dir));

    let output = cli.run(&["mod", "create", "test_mod"]).await;
    assert!(output.success);
    assert_eq!(output.transcript(), "Successfully created module test_mod.\n");
    assert!(!output.is_error());
}

#[tokio::test]
#[serial]
async fn test_error_is_last_line() {
    let dir = TempDir::new().unwrap();
    let cli = FlCli::new(install_fake_fl(&dir));

    let output = cli.run(&["mod", "delete", "missing"]).await;
    assert!(!output.success);
    assert_eq!(output.last_line(), "fl: error: Not Found");
    assert!(output.is_error());
}

#[tokio::test]
#[serial]
async fn test_run_into_sink() {
    let dir = TempDir::new().unwrap();
    let cli = FlCli::new(install_fake_fl(&dir));
    let mut sink = Vec::new();

    cli.run_into(&["mod", "create", "a"], &mut sink).await.unwrap();
    cli.run_into(&["mod", "get", "b"], &mut sink).await.unwrap();

    let text = String::from_utf8(sink).unwrap();
    assert_eq!(
        text,
        "Successfully created module a.\nfl: error: Not Found\n"
    );
    assert_eq!(last_line(&text), "fl: error: Not Found");
}

#[tokio::test]
#[serial]
async fn test_working_dir_and_env() {
    let dir = TempDir::new().unwrap();
    let scratch = TempDir::new().unwrap();
    let cli = FlCli::new(install_fake_fl(&dir))
        .working_dir(scratch.path())
        .env("FL_TEST_MARKER", "e2e");

    let output = cli.run(&["where"]).await;
    let reported = PathBuf::from(output.stdout.trim());
    assert_eq!(
        reported.canonicalize().unwrap(),
        scratch.path().canonicalize().unwrap()
    );

    let output = cli.run(&["marker"]).await;
    assert_eq!(output.stdout, "e2e\n");
}

#[tokio::test]
async fn test_missing_binary_reports_error() {
    let cli = FlCli::new("/nonexistent/fl-binary");
    let output = cli.run(&["fn", "list"]).await;

    assert!(!output.success);
    assert!(output
        .last_line()
        .starts_with("fl: error: failed to launch /nonexistent/fl-binary"));
}

#[tokio::test]
#[serial]
async fn test_timeout_kills_command() {
    let dir = TempDir::new().unwrap();
    let cli = FlCli::new(install_fake_fl(&dir)).timeout(Duration::from_millis(200));

    let output = cli.run(&["hang"]).await;
    assert!(!output.success);
    assert_eq!(output.last_line(), "fl: error: command timed out after 200ms");
}
