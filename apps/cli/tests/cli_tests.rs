//! stride-cli 命令行测试（内置模拟机器人）

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn cli() -> Command {
    let mut cmd = Command::cargo_bin("stride-cli").unwrap();
    cmd.env("STRIDE_USERNAME", "operator")
        .env("STRIDE_PASSWORD", "pw");
    cmd
}

/// 空配置文件：使用内置默认值，不读取用户目录下的配置
fn empty_config(dir: &TempDir) -> PathBuf {
    let path = dir.path().join("session.toml");
    std::fs::write(&path, "").unwrap();
    path
}

fn observe(dir: &TempDir, output: &Path, samples: u32) {
    let config = empty_config(dir);
    cli()
        .arg("observe")
        .arg("--config")
        .arg(&config)
        .arg("--output")
        .arg(output)
        .arg("--samples")
        .arg(samples.to_string())
        .assert()
        .success();
}

#[test]
fn test_config_show_prints_sections() {
    let dir = TempDir::new().unwrap();
    let config = empty_config(&dir);
    cli()
        .args(["config", "show", "--file"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("[lease]"))
        .stdout(predicate::str::contains("[replay]"))
        .stdout(predicate::str::contains("heartbeat_interval_ms = 1000"));
}

#[test]
fn test_config_check_rejects_invalid_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "[motion]\nstand_timeout_ms = 0\n").unwrap();
    cli()
        .args(["config", "check", "--file"])
        .arg(&path)
        .assert()
        .failure();
}

#[test]
fn test_config_init_then_check() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("stride/session.toml");
    cli()
        .args(["config", "init", "--file"])
        .arg(&path)
        .assert()
        .success();
    cli()
        .args(["config", "check", "--file"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("✅"));
}

#[test]
fn test_walk_runs_full_session() {
    let dir = TempDir::new().unwrap();
    let config = empty_config(&dir);
    cli()
        .arg("walk")
        .arg("--config")
        .arg(&config)
        .args(["--walk-secs", "0.1", "--pause-secs", "0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("行走完成"));
}

#[test]
fn test_walk_rejects_excessive_speed() {
    cli()
        .args(["walk", "--speed", "3.0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--speed"));
}

#[test]
fn test_empty_address_is_startup_failure() {
    let dir = TempDir::new().unwrap();
    let config = empty_config(&dir);
    cli()
        .args(["walk", ""])
        .arg("--config")
        .arg(&config)
        .args(["--walk-secs", "0.1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Session startup failed (connect)"));
}

#[test]
fn test_arm_runs_full_session() {
    let dir = TempDir::new().unwrap();
    let config = empty_config(&dir);
    cli()
        .arg("arm")
        .arg("--config")
        .arg(&config)
        .args(["--step-secs", "0.05"])
        .assert()
        .success();
}

#[test]
fn test_observe_writes_requested_samples() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("spot_state_log.jsonl");
    observe(&dir, &output, 2);

    let content = std::fs::read_to_string(&output).unwrap();
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn test_replay_recorded_log() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("spot_state_log.jsonl");
    observe(&dir, &output, 3);

    let config = empty_config(&dir);
    cli()
        .arg("replay")
        .arg(&output)
        .arg("--config")
        .arg(&config)
        .arg("--yes")
        .assert()
        .success()
        .stdout(predicate::str::contains("回放完成"));
}

#[test]
fn test_replay_missing_log_fails() {
    let dir = TempDir::new().unwrap();
    cli()
        .arg("replay")
        .arg(dir.path().join("missing.jsonl"))
        .arg("--yes")
        .assert()
        .failure()
        .stderr(predicate::str::contains("文件不存在"));
}
