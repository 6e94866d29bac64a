//! End-to-end runs of the `latelog` binary.

use std::fs;
use std::process::Command;
use std::time::{Duration, Instant};
use tempfile::TempDir;

fn latelog_cmd() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_latelog"));
    // Keep the user's config file out of the picture.
    cmd.env("XDG_CONFIG_HOME", "/nonexistent-latelog-test-config");
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_help_lists_options() {
    let output = latelog_cmd()
        .arg("--help")
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--log"));
    assert!(stdout.contains("--append"));
}

#[test]
fn test_output_reaches_terminal_and_log() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");

    let output = latelog_cmd()
        .arg("--log")
        .arg(&log)
        .args(["--", "sh", "-c", "echo to-stdout; echo to-stderr >&2"])
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());

    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stdout.contains("to-stdout"));
    assert!(!stdout.contains("to-stderr"));
    assert!(stderr.contains("to-stderr"));

    let logged = fs::read_to_string(&log).unwrap();
    assert!(logged.contains("to-stdout\n"));
    assert!(logged.contains("to-stderr\n"));
}

#[test]
fn test_exit_code_is_propagated() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");

    let output = latelog_cmd()
        .arg("--log")
        .arg(&log)
        .args(["--", "sh", "-c", "echo failing; exit 3"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(3));
    assert!(fs::read_to_string(&log).unwrap().contains("failing"));
}

#[test]
fn test_append_keeps_previous_contents() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("run.log");
    fs::write(&log, "previous run\n").unwrap();

    let status = latelog_cmd()
        .arg("--log")
        .arg(&log)
        .args(["--append", "--no-stderr", "--", "echo", "next run"])
        .status()
        .expect("Failed to execute command");
    assert!(status.success());

    let logged = fs::read_to_string(&log).unwrap();
    assert!(logged.starts_with("previous run\n"));
    assert!(logged.contains("next run\n"));
}

#[test]
fn test_config_file_is_used() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("from-config.log");
    let config = dir.path().join("config.toml");
    fs::write(
        &config,
        format!(
            "[log]\npath = {:?}\n\n[capture]\nstderr = false\n",
            log.display().to_string()
        ),
    )
    .unwrap();

    let output = latelog_cmd()
        .arg("--config")
        .arg(&config)
        .args(["--", "sh", "-c", "echo configured; echo unlogged >&2"])
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success());

    let logged = fs::read_to_string(&log).unwrap();
    assert!(logged.contains("configured\n"));
    assert!(!logged.contains("unlogged"));
    assert!(String::from_utf8_lossy(&output.stderr).contains("unlogged"));
}

#[test]
fn test_unwritable_log_fails_and_restores_terminal() {
    let dir = TempDir::new().unwrap();
    let log = dir.path().join("missing-dir").join("run.log");

    let started = Instant::now();
    let output = latelog_cmd()
        .arg("--log")
        .arg(&log)
        .args(["--", "sh", "-c", "echo early; sleep 5"])
        .output()
        .expect("Failed to execute command");

    // The child was killed instead of waited for.
    assert!(started.elapsed() < Duration::from_secs(4));
    assert_eq!(output.status.code(), Some(1));

    // Printed after the capture is torn down, so it only arrives if fd 2
    // points at the terminal again rather than at an unread pipe.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let error_line = stderr
        .lines()
        .find(|line| line.starts_with("Error: Failed to open log file"));
    assert!(error_line.is_some(), "stderr was: {stderr}");
}

#[test]
fn test_invalid_config_exits_with_error() {
    let output = latelog_cmd()
        .args(["--no-stdout", "--no-stderr", "--", "true"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Config validation failed"));
}
