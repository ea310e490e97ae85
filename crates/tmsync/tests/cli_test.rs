//! Integration tests for the `tmsync` CLI binary.
//!
//! Trees are written to temporary files; no device is involved.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `tmsync` binary with env isolation.
///
/// Clears `TMSYNC_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn tmsync_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tmsync");
    cmd.env("HOME", "/tmp/tmsync-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tmsync-cli-test-nonexistent")
        .env_remove("TMSYNC_CONFIG")
        .env_remove("TMSYNC_OUTPUT")
        .env_remove("TMSYNC_DEFAULTS__OUTPUT")
        .env_remove("TMSYNC_RECONCILE__SHARED_PARTITION")
        .env_remove("TMSYNC_RECONCILE__GSLB_DELAY_MS")
        .env_remove("RUST_LOG");
    cmd
}

fn write_json(dir: &Path, name: &str, value: &serde_json::Value) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, serde_json::to_string_pretty(value).unwrap()).unwrap();
    path
}

fn tenant_tree() -> serde_json::Value {
    json!({
        "/T/": { "command": "auth partition" },
        "/T/A/": { "command": "sys folder" },
        "/T/A/m": { "command": "ltm monitor http", "properties": { "interval": 5 } },
        "/T/A/p": { "command": "ltm pool", "properties": { "monitor": "/T/A/m" } }
    })
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = tmsync_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = String::from_utf8_lossy(&output.stderr);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    tmsync_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("diff")
            .and(predicate::str::contains("compile"))
            .and(predicate::str::contains("topology")),
    );
}

#[test]
fn test_version_flag() {
    tmsync_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("tmsync"));
}

#[test]
fn test_completions_bash() {
    tmsync_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Diff ────────────────────────────────────────────────────────────

#[test]
fn test_diff_plain_lists_new_objects() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());

    tmsync_cmd()
        .args(["diff", "-t", "T", "-o", "plain", "--desired"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(predicate::str::contains("N /T/A/p").and(predicate::str::contains("N /T/A/m")));
}

#[test]
fn test_diff_identical_trees_is_empty() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());

    let output = tmsync_cmd()
        .args(["diff", "-t", "T", "-o", "json-compact", "--desired"])
        .arg(&desired)
        .arg("--current")
        .arg(&desired)
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["scope"], "T");
    assert_eq!(report["diffs"], json!([]));
}

#[test]
fn test_diff_reads_current_dir() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());
    write_json(dir.path(), "T.json", &tenant_tree());

    tmsync_cmd()
        .args(["diff", "-t", "T", "-o", "plain", "--desired"])
        .arg(&desired)
        .arg("--current-dir")
        .arg(dir.path())
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

#[test]
fn test_missing_desired_file_exits_not_found() {
    tmsync_cmd()
        .args(["diff", "-t", "T", "--desired", "/tmp/tmsync-cli-test-nonexistent/desired.json"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn test_current_conflicts_with_current_dir() {
    tmsync_cmd()
        .args(["diff", "-t", "T", "--desired", "a.json", "--current", "b.json", "--current-dir", "c"])
        .assert()
        .code(2);
}

// ── Compile ─────────────────────────────────────────────────────────

#[test]
fn test_compile_prints_script() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());

    tmsync_cmd()
        .args(["compile", "-t", "T", "--desired"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("tmsh::begin_transaction")
                .and(predicate::str::contains("tmsh::create ltm pool /T/A/p"))
                .and(predicate::str::contains("tmsh::commit_transaction")),
        );
}

#[test]
fn test_compile_plan_as_json() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());

    let output = tmsync_cmd()
        .args(["compile", "-t", "T", "--plan", "-o", "json", "--desired"])
        .arg(&desired)
        .output()
        .unwrap();
    assert!(output.status.success());
    let plan: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(plan["transactions"][0]["kind"], "main");
    assert_eq!(plan["pre_trans"][0]["line"], "tmsh::create auth partition T");
}

#[test]
fn test_compile_immutable_address_exits_unprocessable() {
    let dir = TempDir::new().unwrap();
    let current = write_json(
        dir.path(),
        "current.json",
        &json!({ "/T/A/va": { "command": "ltm virtual-address", "properties": { "address": "10.0.0.1" } } }),
    );
    let desired = write_json(
        dir.path(),
        "desired.json",
        &json!({ "/T/A/va": { "command": "ltm virtual-address", "properties": { "address": "10.0.0.2" } } }),
    );

    tmsync_cmd()
        .args(["compile", "-t", "T", "--desired"])
        .arg(&desired)
        .arg("--current")
        .arg(&current)
        .assert()
        .code(3)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("cannot be modified"));
}

#[test]
fn test_compile_saves_shared_counts() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(
        dir.path(),
        "desired.json",
        &json!({
            "/Common/10.0.0.1": { "command": "ltm node", "properties": { "address": "10.0.0.1" } },
            "/T/A/p": { "command": "ltm pool", "properties": { "members": { "/Common/10.0.0.1:80": {} } } }
        }),
    );
    let common = dir.path().join("state").join("common.json");

    tmsync_cmd()
        .args(["compile", "-t", "T", "--task-id", "t1", "--save-common", "--desired"])
        .arg(&desired)
        .arg("--common")
        .arg(&common)
        .assert()
        .success();

    let saved: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&common).unwrap()).unwrap();
    assert!(saved.to_string().contains("/Common/10.0.0.1"));
}

#[test]
fn test_save_common_requires_common() {
    tmsync_cmd()
        .args(["compile", "-t", "T", "--desired", "a.json", "--save-common"])
        .assert()
        .code(2);
}

// ── Topology ────────────────────────────────────────────────────────

#[test]
fn test_topology_parse_plain() {
    tmsync_cmd()
        .args(["topology", "parse", "-o", "plain", "not country US", "region /Common/r1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("not country US").and(predicate::str::contains("region /Common/r1")));
}

#[test]
fn test_topology_parse_rejects_unknown_type() {
    tmsync_cmd()
        .args(["topology", "parse", "galaxy far-away"])
        .assert()
        .code(3);
}

#[test]
fn test_topology_order_most_specific_first() {
    let dir = TempDir::new().unwrap();
    let file = write_json(
        dir.path(),
        "records.json",
        &json!([
            { "source": "country US", "destination": "pool /Common/p1", "weight": 10 },
            { "source": "region /Common/r1", "destination": "pool /Common/p2", "weight": 20 }
        ]),
    );

    let output = tmsync_cmd()
        .args(["topology", "order", "-o", "plain"])
        .arg(&file)
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].starts_with("region /Common/r1"), "{stdout}");
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_init_then_show() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");

    tmsync_cmd().args(["config", "init", "--config"]).arg(&path).assert().success();
    assert!(path.exists());

    tmsync_cmd()
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("already exists"));

    tmsync_cmd()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("shared_partition = \"Common\""));
}

#[test]
fn test_config_path_honors_flag() {
    tmsync_cmd()
        .args(["config", "path", "--config", "/tmp/tmsync-cli-test-nonexistent/x.toml"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/tmp/tmsync-cli-test-nonexistent/x.toml"));
}

#[test]
fn test_env_overrides_output_default() {
    let dir = TempDir::new().unwrap();
    let desired = write_json(dir.path(), "desired.json", &tenant_tree());

    tmsync_cmd()
        .env("TMSYNC_DEFAULTS__OUTPUT", "plain")
        .args(["diff", "-t", "T", "--desired"])
        .arg(&desired)
        .assert()
        .success()
        .stdout(predicate::str::contains("N /T/A/p"));
}
