//! Configuration integration tests.
//!
//! These tests verify workspace discovery, format parsing, validation and
//! precedence from an end-to-end perspective using the compiled binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// Run from `dir` via `-C`, keeping logs and user config inside `root`.
fn cmd_at(root: &Path, dir: &Path) -> Command {
    let mut c = cmd();
    c.args(["-C", dir.to_str().unwrap()])
        .env("BUMPER_LOG_DIR", root.join("logs"))
        .env("XDG_CONFIG_HOME", root.join("xdg"))
        .env("GIT_CEILING_DIRECTORIES", root.parent().unwrap_or(root))
        .env_remove("RUST_LOG");
    c
}

fn workspace_with(file: &str, content: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join(".bumper")).unwrap();
    fs::write(tmp.path().join(".bumper").join(file), content).unwrap();
    tmp
}

const TOML_GROUP: &str = r#"
[[groups]]
name = "api"
current_cmd = ["echo", "2.0.0"]
next_cmd = ["true"]
changelog_cmd = ["true"]
cat_cmd = ["echo", "workspace notes"]
"#;

// =============================================================================
// Workspace Discovery
// =============================================================================

#[test]
fn discovers_workspace_in_parent_directory() {
    let tmp = workspace_with("config.toml", TOML_GROUP);
    let nested = tmp.path().join("src").join("deep");
    fs::create_dir_all(&nested).unwrap();

    cmd_at(tmp.path(), &nested)
        .args(["current", "--group", "api"])
        .assert()
        .success()
        .stdout("2.0.0\n");
}

#[test]
fn dot_bumper_file_is_not_a_workspace() {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join(".bumper"), "not a directory").unwrap();

    cmd_at(tmp.path(), tmp.path())
        .args(["pre", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not inside a bumper workspace"));
}

#[test]
fn runs_without_release_groups() {
    let tmp = TempDir::new().unwrap();
    fs::create_dir_all(tmp.path().join(".bumper")).unwrap();

    cmd_at(tmp.path(), tmp.path())
        .args(["pre", "status"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// =============================================================================
// Config Format Parsing
// =============================================================================

#[test]
fn parses_toml_config() {
    let tmp = workspace_with("config.toml", TOML_GROUP);
    cmd_at(tmp.path(), tmp.path())
        .args(["current", "--group", "api"])
        .assert()
        .success()
        .stdout("2.0.0\n");
}

#[test]
fn parses_yaml_config() {
    let tmp = workspace_with(
        "config.yaml",
        r#"
log_level: warn
groups:
  - name: web
    current_cmd: [echo, v3.1.4]
    next_cmd: ["true"]
    changelog_cmd: ["true"]
    cat_cmd: ["true"]
"#,
    );
    cmd_at(tmp.path(), tmp.path())
        .args(["current", "--group", "web"])
        .assert()
        .success()
        .stdout("3.1.4\n");
}

#[test]
fn parses_json_config() {
    let tmp = workspace_with(
        "config.json",
        r#"{
  "log_level": "error",
  "groups": [
    {
      "name": "cli",
      "current_cmd": ["echo", "0.9.0"],
      "next_cmd": ["true"],
      "changelog_cmd": ["true"],
      "cat_cmd": ["true"]
    }
  ]
}"#,
    );
    cmd_at(tmp.path(), tmp.path())
        .args(["current", "--group", "cli"])
        .assert()
        .success()
        .stdout("0.9.0\n");
}

#[test]
fn rejects_unknown_log_level() {
    let tmp = workspace_with("config.toml", r#"log_level = "loud""#);
    cmd_at(tmp.path(), tmp.path())
        .args(["pre", "status"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("failed to load configuration"));
}

// =============================================================================
// Validation
// =============================================================================

#[test]
fn invalid_config_reports_every_problem() {
    let tmp = workspace_with(
        "config.toml",
        r#"
[[groups]]
name = "api"
current_cmd = ["echo", "1.0.0"]
next_cmd = ["true"]

[[groups]]
name = "api"
current_cmd = ["echo", "1.0.0"]
next_cmd = ["true"]
changelog_cmd = ["true"]
cat_cmd = ["true"]

[[groups]]
name = ""
current_cmd = ["echo", "1.0.0"]
next_cmd = ["true"]
changelog_cmd = ["true"]
cat_cmd = ["true"]
"#,
    );

    cmd_at(tmp.path(), tmp.path())
        .arg("commit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration is invalid"))
        .stderr(predicate::str::contains("group \"api\" is missing changelog_cmd"))
        .stderr(predicate::str::contains("group \"api\" is missing cat_cmd"))
        .stderr(predicate::str::contains("group \"api\" is defined more than once"))
        .stderr(predicate::str::contains("group #3 has an empty name"));
}

#[test]
fn invalid_config_blocks_every_state_change() {
    let duplicated = format!("{TOML_GROUP}\n{TOML_GROUP}");
    let tmp = workspace_with("config.toml", &duplicated);

    cmd_at(tmp.path(), tmp.path())
        .args(["pre", "enter", "api", "--tag", "beta"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("configuration is invalid"));
    assert!(!tmp.path().join(".bumper/prerelease.toml").exists());

    cmd_at(tmp.path(), tmp.path())
        .args(["bump", "--group", "api", "--patch", "-m", "fix"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("defined more than once"));
    let records = fs::read_dir(tmp.path().join(".bumper"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| e.file_name().to_string_lossy().starts_with("bump-"))
        .count();
    assert_eq!(records, 0);
}

// =============================================================================
// Precedence
// =============================================================================

#[test]
fn explicit_config_overrides_workspace_config() {
    let tmp = workspace_with("config.toml", TOML_GROUP);
    let override_path = tmp.path().join("override.toml");
    fs::write(
        &override_path,
        TOML_GROUP.replace("workspace notes", "override notes"),
    )
    .unwrap();

    cmd_at(tmp.path(), tmp.path())
        .args(["cat", "--group", "api", "--version", "2.0.0"])
        .arg("--config")
        .arg(&override_path)
        .assert()
        .success()
        .stdout(predicate::str::contains("override notes"));
}

#[test]
fn workspace_config_overrides_user_config() {
    let tmp = workspace_with("config.toml", TOML_GROUP);
    let user_dir = tmp.path().join("xdg").join("bumper");
    fs::create_dir_all(&user_dir).unwrap();
    fs::write(
        user_dir.join("config.toml"),
        TOML_GROUP.replace("workspace notes", "user notes"),
    )
    .unwrap();

    cmd_at(tmp.path(), tmp.path())
        .args(["cat", "--group", "api", "--version", "2.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("workspace notes"));
}

#[test]
fn configured_log_dir_receives_logs() {
    let tmp = workspace_with("config.toml", TOML_GROUP);
    let log_dir = tmp.path().join("configured-logs");
    let content = format!(
        "log_dir = \"{}\"\n{TOML_GROUP}",
        log_dir.to_str().unwrap().replace('\\', "\\\\")
    );
    fs::write(tmp.path().join(".bumper/config.toml"), content).unwrap();

    cmd()
        .args(["-C", tmp.path().to_str().unwrap(), "current", "--group", "api"])
        .env_remove("BUMPER_LOG_DIR")
        .env_remove("BUMPER_LOG_PATH")
        .env("XDG_CONFIG_HOME", tmp.path().join("xdg"))
        .assert()
        .success();

    assert!(log_dir.is_dir());
}
