//! CLI integration tests
//!
//! Tests the gm-client binary using assert_cmd.

use assert_cmd::Command;
use predicates::prelude::*;

fn gm_client() -> Command {
    let mut cmd = Command::cargo_bin("gm-client")
        .expect("Failed to locate gm-client binary - ensure it's built before running tests");
    cmd.env_remove("GAGGIMATE_DEVICE").env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_cli_help() {
    gm_client()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("GaggiMate client"))
        .stdout(predicate::str::contains("watch"))
        .stdout(predicate::str::contains("send"));
}

#[test]
fn test_cli_version() {
    gm_client()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("gm-client"));
}

#[test]
fn test_send_rejects_unknown_mode() {
    gm_client()
        .args(["send", "mode", "espresso"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown mode"));
}

#[test]
fn test_config_show_applies_device_override() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");

    gm_client()
        .args(["--config", path.to_str().unwrap(), "-d", "10.1.2.3", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("device_url = \"ws://10.1.2.3/ws\""))
        .stdout(predicate::str::contains("[backoff]"));
}

#[test]
fn test_config_init_refuses_to_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");
    let path_arg = path.to_str().unwrap();

    gm_client()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("device_url"));

    gm_client()
        .args(["--config", path_arg, "config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));

    gm_client()
        .args(["--config", path_arg, "-d", "espresso.lan", "config", "init", "--force"])
        .assert()
        .success();
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("ws://espresso.lan/ws"));
}

#[test]
fn test_status_gives_up_on_unreachable_device() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("client.toml");

    gm_client()
        .args([
            "--config",
            path.to_str().unwrap(),
            "--device",
            "ws://127.0.0.1:9/ws",
            "--timeout",
            "1",
            "--log-level",
            "error",
            "status",
        ])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Timed out"));
}
