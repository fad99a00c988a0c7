use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const CONFIG: &str = r#"{
    "VFX": {
        "permissions": ["write group {show} * //{show}/...## {user} {mdy_str}"],
        "groups": {"{show}": "empty"},
        "streams": {"//{show}/{show}-main": {"type": "mainline"}}
    }
}"#;

fn showsetup(temp: &Path) -> Command {
    let mut cmd = Command::cargo_bin("p4-showsetup").unwrap();
    cmd.current_dir(temp)
        .env_remove("LOG_LEVEL")
        .env_remove("RUST_LOG")
        .arg("--log-dir")
        .arg(temp.join("logs"));
    cmd
}

fn config_file(temp: &TempDir) -> String {
    let path = temp.path().join("show_setup_configs.json");
    fs::write(&path, CONFIG).unwrap();
    path.display().to_string()
}

#[test]
fn test_help_lists_options() {
    let temp = TempDir::new().unwrap();
    showsetup(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--show"))
        .stdout(predicate::str::contains("--division"))
        .stdout(predicate::str::contains("--dry-run"));
}

#[test]
fn test_invalid_show_code_exits_nonzero() {
    let temp = TempDir::new().unwrap();
    showsetup(temp.path())
        .args(["--show", "1A", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid show code '1A'"))
        .stderr(predicate::str::contains("can not start with a number"));
}

#[test]
fn test_every_broken_rule_is_listed() {
    let temp = TempDir::new().unwrap();
    showsetup(temp.path())
        .args(["--show", "1", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("can not start with a number"))
        .stderr(predicate::str::contains("at least 2 characters"));
}

#[test]
fn test_unknown_division_fails_non_interactively() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);
    showsetup(temp.path())
        .args(["--show", "FOO", "--yes", "--division", "RE", "--config", &config])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown division"))
        .stderr(predicate::str::contains("VFX"));
}

#[test]
fn test_missing_config_fails() {
    let temp = TempDir::new().unwrap();
    let missing = temp.path().join("nope.json");
    showsetup(temp.path())
        .args(["--show", "FOO", "--yes", "--config"])
        .arg(&missing)
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_missing_p4_binary_fails_before_any_change() {
    let temp = TempDir::new().unwrap();
    let config = config_file(&temp);
    showsetup(temp.path())
        .args(["--show", "FOO", "--yes", "--division", "vfx", "--config", &config])
        .args(["--p4", "p4-binary-that-does-not-exist", "--no-lock"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("p4-binary-that-does-not-exist"));
}

#[test]
fn test_run_log_is_written() {
    let temp = TempDir::new().unwrap();
    showsetup(temp.path())
        .args(["--show", "1A", "--yes"])
        .assert()
        .failure();

    let logs: Vec<_> = fs::read_dir(temp.path().join("logs"))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().into_string().unwrap())
        .collect();
    assert_eq!(logs.len(), 1);
    assert!(logs[0].starts_with("p4_show_setup_"));
}

#[test]
fn test_short_loglevel_flag() {
    let temp = TempDir::new().unwrap();
    showsetup(temp.path())
        .args(["-l", "WARNING", "--show", "1A", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid show code '1A'"));
}
