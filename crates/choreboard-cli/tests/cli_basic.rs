//! Basic CLI E2E tests.
//!
//! Each test runs the binary against its own temporary HOME so the data
//! directory starts empty.

use std::path::Path;
use std::process::Command;

/// Run a CLI command and return (exit code, stdout, stderr).
fn run_cli(home: &Path, args: &[&str]) -> (i32, String, String) {
    let output = Command::new(env!("CARGO_BIN_EXE_choreboard-cli"))
        .args(args)
        .env("HOME", home)
        .env_remove("CHOREBOARD_ENV")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (code, stdout, stderr)
}

fn ok(home: &Path, args: &[&str]) -> String {
    let (code, stdout, stderr) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    stdout
}

#[test]
fn test_help() {
    let home = tempfile::tempdir().unwrap();
    let out = ok(home.path(), &["--help"]);
    assert!(out.contains("chore"));
    assert!(out.contains("badge"));
}

#[test]
fn test_config_roundtrip() {
    let home = tempfile::tempdir().unwrap();
    assert_eq!(ok(home.path(), &["config", "get", "scheduler.debounce_secs"]), "5");
    ok(home.path(), &["config", "set", "scheduler.debounce_secs", "0"]);
    assert_eq!(ok(home.path(), &["config", "get", "scheduler.debounce_secs"]), "0");

    let (code, _, stderr) = run_cli(home.path(), &["config", "get", "scheduler.nope"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("unknown key"));
}

#[test]
fn test_claim_approve_flow() {
    let home = tempfile::tempdir().unwrap();
    let h = home.path();
    ok(h, &["kid", "add", "Ava"]);
    ok(h, &["chore", "add", "Dishes", "--points", "5", "--kid", "Ava"]);
    ok(h, &["chore", "claim", "Ava", "Dishes"]);
    assert_eq!(ok(h, &["chore", "approve", "Ava", "Dishes"]), "approved (+5)");

    let status: serde_json::Value =
        serde_json::from_str(&ok(h, &["chore", "status", "Dishes"])).unwrap();
    assert_eq!(status["aggregate"], "approved");

    let points: serde_json::Value =
        serde_json::from_str(&ok(h, &["stats", "points", "Ava"])).unwrap();
    assert_eq!(points["balance"], 5.0);
    assert_eq!(points["points"]["earned"], 5.0);
}

#[test]
fn test_reward_needs_balance() {
    let home = tempfile::tempdir().unwrap();
    let h = home.path();
    ok(h, &["kid", "add", "Ben"]);
    ok(h, &["reward", "add", "Ice cream", "20"]);

    let (code, _, stderr) = run_cli(h, &["reward", "redeem", "Ben", "Ice cream"]);
    assert_eq!(code, 1);
    assert!(stderr.starts_with("error:"));
}

#[test]
fn test_unknown_kid_fails() {
    let home = tempfile::tempdir().unwrap();
    let (code, _, stderr) = run_cli(home.path(), &["kid", "show", "Nobody"]);
    assert_eq!(code, 1);
    assert!(stderr.contains("kid not found"));
}

#[test]
fn test_tick_reports_json() {
    let home = tempfile::tempdir().unwrap();
    let report: serde_json::Value =
        serde_json::from_str(&ok(home.path(), &["tick", "--evaluate"])).unwrap();
    assert_eq!(report["swept"], true);
    assert_eq!(report["evaluated"], 0);
}
