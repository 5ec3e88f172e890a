//! CLI end-to-end tests
//!
//! Tests for the magnetcast command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::process::Command;
use tempfile::tempdir;

/// Get a command for the magnetcast binary
#[allow(deprecated)]
fn magnetcast_cmd() -> Command {
    Command::cargo_bin("magnetcast").unwrap()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = magnetcast_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = magnetcast_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("magnetcast"))
        .stdout(predicate::str::contains("publish"))
        .stdout(predicate::str::contains("play"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = magnetcast_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_play_help_lists_orders() {
    let mut cmd = magnetcast_cmd();
    cmd.args(["play", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--order"))
        .stdout(predicate::str::contains("completion"))
        .stdout(predicate::str::contains("feed"));
}

#[test]
fn test_cli_publish_nonexistent_path() {
    let mut cmd = magnetcast_cmd();
    cmd.args(["publish", "/nonexistent/path/stream.m3u8"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_cli_publish_rejects_zero_window() {
    let temp = tempdir().unwrap();
    let playlist = temp.path().join("stream.m3u8");
    fs::write(&playlist, "#EXTM3U\n").unwrap();

    let mut cmd = magnetcast_cmd();
    cmd.args(["publish", playlist.to_str().unwrap(), "--max-sessions", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("at least one session"));
}

#[test]
fn test_cli_play_requires_output() {
    let mut cmd = magnetcast_cmd();
    cmd.args(["play", "http://127.0.0.1:9/stream.magnets"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No output file"));
}

#[test]
fn test_cli_play_local_feed_requires_gateway() {
    let temp = tempdir().unwrap();
    let feed = temp.path().join("stream.magnets");
    fs::write(&feed, "").unwrap();

    let mut cmd = magnetcast_cmd();
    cmd.args(["play", feed.to_str().unwrap(), "--output", "out.mp4"])
        .current_dir(temp.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("gateway URL is required"));
}

#[test]
fn test_cli_inspect_lists_entries() {
    let temp = tempdir().unwrap();
    let playlist = temp.path().join("stream.m3u8");
    fs::write(temp.path().join("init.mp4"), b"init").unwrap();
    fs::write(temp.path().join("seg0.m4s"), b"seg0").unwrap();
    fs::write(
        temp.path().join("seg0.m4s.magnet"),
        "magnet:?xt=urn:btmh:12200000000000000000000000000000000000000000000000000000000000000000&dn=seg0.m4s\n",
    )
    .unwrap();
    fs::write(
        &playlist,
        "#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\"\n#EXTINF:2.0,\nseg0.m4s\n#EXTINF:2.0,\nseg1.m4s\n",
    )
    .unwrap();

    let mut cmd = magnetcast_cmd();
    cmd.args(["inspect", playlist.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Entries: 3"))
        .stdout(predicate::str::contains("init.mp4"))
        .stdout(predicate::str::contains("urn:btmh:12200000"))
        .stdout(predicate::str::contains("seg1.m4s (missing)"));
}

#[test]
fn test_cli_inspect_json_output() {
    let temp = tempdir().unwrap();
    let playlist = temp.path().join("stream.m3u8");
    fs::write(&playlist, "#EXTM3U\n#EXT-X-MAP:URI=\"init.mp4\"\nseg0.m4s\n").unwrap();

    let mut cmd = magnetcast_cmd();
    let output = cmd
        .args(["inspect", "--json", playlist.to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());

    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["entries"].as_array().unwrap().len(), 2);
    assert_eq!(json["entries"][1]["uri"], "seg0.m4s");
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(
        &config_file,
        r#"
[publisher]
interval_ms = 1000

[window]
max_sessions = 8

[consumer]
delivery_order = "feed"
retrieval_retries = 2
"#,
    )
    .unwrap();

    let mut cmd = magnetcast_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"))
        .stdout(predicate::str::contains("8 sessions"))
        .stdout(predicate::str::contains("Feed order"));
}

#[test]
fn test_cli_validate_rejects_bad_config() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("config.toml");
    fs::write(&config_file, "[publisher]\ninterval_ms = 0\n").unwrap();

    let mut cmd = magnetcast_cmd();
    cmd.args(["validate", config_file.to_str().unwrap()])
        .assert()
        .failure();
}
