//! End-to-end CLI integration tests
//!
//! These tests invoke the compiled binary as a subprocess to verify
//! that the CLI behaves correctly from a user's perspective. Release
//! groups are backed by small `sh` scripts that keep the version in a
//! `VERSION` file and append changelog arguments to `CHANGELOG`.

use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Returns a Command configured to run our binary.
///
/// Note: `cargo_bin` is marked deprecated for edge cases involving custom
/// cargo build directories, but works correctly for standard project layouts.
#[allow(deprecated)]
fn cmd() -> Command {
    Command::cargo_bin(env!("CARGO_PKG_NAME")).unwrap()
}

/// A command running inside `dir`, isolated from user config and logging
/// into the directory itself.
fn cmd_in(dir: &Path) -> Command {
    let mut c = cmd();
    c.current_dir(dir)
        .env("BUMPER_LOG_DIR", dir.join("logs"))
        .env("XDG_CONFIG_HOME", dir.join("xdg"))
        .env("GIT_CEILING_DIRECTORIES", dir.parent().unwrap_or(dir))
        .env_remove("RUST_LOG")
        .env_remove("BUMPER_LOG_PATH");
    c
}

const GROUPS: &str = r#"
[[groups]]
name = "api"
current_cmd = ["sh", "-c", "cat VERSION"]
next_cmd = ["sh", "-c", "echo \"$BUMPER_GROUP_NEXT_VERSION\" > VERSION"]
changelog_cmd = ["sh", "-c", "echo \"$BUMPER_GROUP_NEXT_VERSION $*\" >> CHANGELOG", "changelog"]
cat_cmd = ["sh", "-c", "echo \"notes for $BUMPER_GROUP $BUMPER_GROUP_VERSION\""]
"#;

/// The same group, keeping its changelog through the built-in commands.
const BUILTIN_GROUPS: &str = r#"
[[groups]]
name = "api"
display_name = "API"
current_cmd = ["sh", "-c", "cat VERSION"]
next_cmd = ["sh", "-c", "echo \"$BUMPER_GROUP_NEXT_VERSION\" > VERSION"]
changelog_cmd = ["bumper", "builtins", "amendlog:default"]
cat_cmd = ["bumper", "builtins", "cat:default"]
"#;

/// PATH with our binary first, so group commands can call `bumper`.
fn path_with_bumper() -> std::ffi::OsString {
    let bin = Path::new(env!("CARGO_BIN_EXE_bumper"));
    let mut dirs = vec![bin.parent().unwrap().to_path_buf()];
    dirs.extend(std::env::split_paths(&std::env::var_os("PATH").unwrap_or_default()));
    std::env::join_paths(dirs).unwrap()
}

/// An initialized workspace with one group at version 1.2.3.
fn workspace() -> TempDir {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path()).arg("init").assert().success();
    fs::write(tmp.path().join(".bumper/config.toml"), GROUPS).unwrap();
    fs::write(tmp.path().join("VERSION"), "1.2.3\n").unwrap();
    tmp
}

fn read(dir: &Path, name: &str) -> String {
    fs::read_to_string(dir.join(name)).unwrap_or_default()
}

fn pending_records(dir: &Path) -> usize {
    fs::read_dir(dir.join(".bumper"))
        .unwrap()
        .filter_map(Result::ok)
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with("bump-") && name.ends_with(".md")
        })
        .count()
}

fn bump(dir: &Path, level: &str, message: &str) {
    cmd_in(dir)
        .args(["bump", "--group", "api", level, "-m", message])
        .assert()
        .success();
}

// =============================================================================
// Help & Version
// =============================================================================

#[test]
fn help_flag_shows_usage() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("Commands:"))
        .stdout(predicate::str::contains("Options:"));
}

#[test]
fn long_help_lists_environment() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("BUMPER_LOG_DIR"));
}

#[test]
fn version_flag_shows_version() {
    cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn pre_help_lists_subcommands() {
    cmd()
        .args(["pre", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("enter"))
        .stdout(predicate::str::contains("exit"))
        .stdout(predicate::str::contains("status"));
}

// =============================================================================
// Init & Create
// =============================================================================

#[test]
fn init_creates_workspace() {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("Initialized"));
    assert!(tmp.path().join(".bumper/config.toml").is_file());
}

#[test]
fn init_keeps_existing_config() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .arg("init")
        .assert()
        .success()
        .stdout(predicate::str::contains("already initialized"));
    assert_eq!(read(tmp.path(), ".bumper/config.toml"), GROUPS);
}

#[test]
fn create_adds_sorted_groups() {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path()).arg("init").assert().success();
    cmd_in(tmp.path())
        .args([
            "create",
            "web",
            "cli",
            "--current-cmd",
            "cat VERSION",
            "--next-cmd",
            "tee VERSION",
            "--changelog-cmd",
            "changelog add",
            "--cat-cmd",
            "changelog show",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("Added release group"));

    let config = read(tmp.path(), ".bumper/config.toml");
    let cli = config.find("name = \"cli\"").unwrap();
    let web = config.find("name = \"web\"").unwrap();
    assert!(cli < web);
    assert!(config.contains("\"changelog\""));
    assert!(config.contains("\"add\""));

    cmd_in(tmp.path())
        .args([
            "create",
            "web",
            "--current-cmd",
            "a",
            "--next-cmd",
            "b",
            "--changelog-cmd",
            "c",
            "--cat-cmd",
            "d",
        ])
        .assert()
        .success()
        .stdout(predicate::str::contains("already exists"));
}

#[test]
fn create_defaults_to_builtin_changelog() {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path()).arg("init").assert().success();
    cmd_in(tmp.path())
        .args([
            "create",
            "api",
            "--current-cmd",
            "cat VERSION",
            "--next-cmd",
            "tee VERSION",
        ])
        .assert()
        .success();

    let config = read(tmp.path(), ".bumper/config.toml");
    assert!(config.contains("\"amendlog:default\""));
    assert!(config.contains("\"cat:default\""));
}

#[test]
fn create_requires_version_commands() {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path()).arg("init").assert().success();
    cmd_in(tmp.path())
        .args(["create", "api", "--current-cmd", "cat VERSION"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--next-cmd"));
}

#[test]
fn commands_outside_workspace_fail() {
    let tmp = TempDir::new().unwrap();
    cmd_in(tmp.path())
        .arg("commit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("bumper init"));
}

// =============================================================================
// Bump
// =============================================================================

#[test]
fn bump_writes_record() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["bump", "--minor", "-m", "add widgets"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".bumper/bump-"));
    assert_eq!(pending_records(tmp.path()), 1);
}

#[test]
fn bump_rejects_unknown_group() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["bump", "--group", "nope", "--patch", "-m", "x"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("nope"));
    assert_eq!(pending_records(tmp.path()), 0);
}

#[test]
fn bump_requires_message() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["bump", "--patch"])
        .assert()
        .failure();
}

#[test]
fn empty_bump_releases_nothing() {
    let tmp = workspace();
    cmd_in(tmp.path()).args(["bump", "--empty"]).assert().success();
    assert_eq!(pending_records(tmp.path()), 1);

    cmd_in(tmp.path())
        .args(["next", "--group", "api"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty());
}

// =============================================================================
// Current, Next, Cat
// =============================================================================

#[test]
fn current_prints_version() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["current", "--group", "api"])
        .assert()
        .success()
        .stdout("1.2.3\n");
}

#[test]
fn next_follows_highest_bump() {
    let tmp = workspace();
    bump(tmp.path(), "--patch", "fix");
    bump(tmp.path(), "--minor", "feature");
    cmd_in(tmp.path())
        .args(["next", "--group", "api"])
        .assert()
        .success()
        .stdout("1.3.0\n");
}

#[test]
fn next_json_is_null_without_bumps() {
    let tmp = workspace();
    let output = cmd_in(tmp.path())
        .args(["next", "--group", "api", "--json"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["group"], "api");
    assert!(json["version"].is_null());
}

#[test]
fn cat_runs_cat_command() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["cat", "--group", "api", "--version", "1.2.3"])
        .assert()
        .success()
        .stdout(predicate::str::contains("notes for api 1.2.3"));
}

#[test]
fn cat_reads_environment() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .arg("cat")
        .env("BUMPER_GROUP", "api")
        .env("BUMPER_GROUP_VERSION", "9.9.9")
        .assert()
        .success()
        .stdout(predicate::str::contains("notes for api 9.9.9"));
}

#[test]
fn unknown_group_is_an_error() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["current", "--group", "web"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

// =============================================================================
// Commit
// =============================================================================

#[test]
fn commit_applies_pending_bumps() {
    let tmp = workspace();
    bump(tmp.path(), "--minor", "add widgets");

    cmd_in(tmp.path())
        .arg("commit")
        .assert()
        .success()
        .stdout(predicate::str::contains("1.3.0"));

    assert_eq!(read(tmp.path(), "VERSION").trim(), "1.3.0");
    let changelog = read(tmp.path(), "CHANGELOG");
    assert!(changelog.contains("1.3.0 --group api --minor add widgets"));
    assert_eq!(pending_records(tmp.path()), 0);
}

#[test]
fn commit_without_bumps_is_a_noop() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .arg("commit")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending version bumps"));
    assert_eq!(read(tmp.path(), "VERSION"), "1.2.3\n");
}

#[test]
fn commit_json_reports_releases() {
    let tmp = workspace();
    bump(tmp.path(), "--major", "breaking");
    let output = cmd_in(tmp.path())
        .args(["commit", "--json"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["releases"][0]["group"], "api");
    assert_eq!(json["releases"][0]["version"], "2.0.0");
    assert_eq!(json["deleted"], 1);
}

#[test]
fn commit_json_keeps_command_output_off_stdout() {
    let tmp = workspace();
    fs::write(
        tmp.path().join(".bumper/config.toml"),
        GROUPS.replace(
            "echo \\\"$BUMPER_GROUP_NEXT_VERSION\\\" > VERSION",
            "echo stored-version; echo \\\"$BUMPER_GROUP_NEXT_VERSION\\\" > VERSION",
        ),
    )
    .unwrap();
    bump(tmp.path(), "--patch", "fix");

    let output = cmd_in(tmp.path())
        .args(["--json", "commit"])
        .assert()
        .success()
        .stderr(predicate::str::contains("stored-version"));
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json["releases"][0]["version"], "1.2.4");
    assert_eq!(read(tmp.path(), "VERSION").trim(), "1.2.4");
}

#[test]
fn failing_group_command_keeps_records() {
    let tmp = workspace();
    fs::write(
        tmp.path().join(".bumper/config.toml"),
        GROUPS.replace("echo \\\"$BUMPER_GROUP_NEXT_VERSION\\\" > VERSION", "exit 4"),
    )
    .unwrap();
    bump(tmp.path(), "--patch", "fix");

    cmd_in(tmp.path())
        .arg("commit")
        .assert()
        .failure()
        .stderr(predicate::str::contains("commit failed"));
    assert_eq!(pending_records(tmp.path()), 1);
}

// =============================================================================
// Built-in changelog
// =============================================================================

#[test]
fn builtin_changelog_is_written_and_read_back() {
    let tmp = workspace();
    let dir = tmp.path();
    fs::write(dir.join(".bumper/config.toml"), BUILTIN_GROUPS).unwrap();
    bump(dir, "--minor", "Add pagination");
    bump(dir, "--patch", "Fix cursor encoding");

    cmd_in(dir)
        .env("PATH", path_with_bumper())
        .arg("commit")
        .assert()
        .success();

    let changelog = read(dir, "CHANGELOG.md");
    assert!(changelog.starts_with("# Changelog\n\n## API 1.3.0\n"));
    assert!(changelog.contains("### Minor Changes\n\n- Add pagination"));
    assert!(changelog.contains("### Patch Changes\n\n- Fix cursor encoding"));

    cmd_in(dir)
        .env("PATH", path_with_bumper())
        .args(["cat", "--group", "api", "--version", "1.3.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("## API 1.3.0"))
        .stdout(predicate::str::contains("- Add pagination"));

    cmd_in(dir)
        .env("PATH", path_with_bumper())
        .args(["cat", "--group", "api", "--version", "9.9.9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("no release notes found"));
}

// =============================================================================
// Prerelease trains
// =============================================================================

#[test]
fn prerelease_train_end_to_end() {
    let tmp = workspace();
    let dir = tmp.path();
    bump(dir, "--minor", "stable feature");
    cmd_in(dir).arg("commit").assert().success();
    assert_eq!(read(dir, "VERSION").trim(), "1.3.0");

    cmd_in(dir)
        .args(["pre", "enter", "api", "--tag", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Next commit will produce"))
        .stdout(predicate::str::contains("1.3.0-beta.1"));

    bump(dir, "--patch", "first fix");
    cmd_in(dir).arg("commit").assert().success();
    assert_eq!(read(dir, "VERSION").trim(), "1.3.1-beta.1");

    bump(dir, "--patch", "second fix");
    cmd_in(dir).arg("commit").assert().success();
    assert_eq!(read(dir, "VERSION").trim(), "1.3.1-beta.2");

    // Prereleases do not touch the changelog.
    assert!(!read(dir, "CHANGELOG").contains("fix"));
    assert!(dir.join(".bumper/prerelease").is_dir());

    cmd_in(dir)
        .args(["pre", "status", "api"])
        .assert()
        .success()
        .stdout(predicate::str::contains(
            "api: 1.3.0-beta.2 (tag: beta, from: 1.3.0)",
        ));

    cmd_in(dir)
        .args(["pre", "exit", "api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("graduated to"));

    assert_eq!(read(dir, "VERSION").trim(), "1.3.1");
    let changelog = read(dir, "CHANGELOG");
    let graduation = changelog.lines().last().unwrap();
    assert!(graduation.starts_with("1.3.1 --group api"));
    assert!(graduation.contains("--patch first fix"));
    assert!(graduation.contains("--patch second fix"));
    assert!(!dir.join(".bumper/prerelease").exists());
    assert!(!dir.join(".bumper/prerelease.toml").exists());

    cmd_in(dir)
        .args(["pre", "status"])
        .assert()
        .success()
        .stdout("api: not in prerelease\n");
}

#[test]
fn entering_twice_is_a_noop() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "rc"])
        .assert()
        .success();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "rc"])
        .assert()
        .success()
        .stdout(predicate::str::contains("already in prerelease"));
}

#[test]
fn switching_tags_resets_the_counter() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "alpha"])
        .assert()
        .success();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "beta"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Switched api from alpha"))
        .stdout(predicate::str::contains("1.2.3-beta.1"));
}

#[test]
fn invalid_tag_is_rejected() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "not valid"])
        .assert()
        .failure();
    assert!(!tmp.path().join(".bumper/prerelease.toml").exists());
}

#[test]
fn exit_requires_a_train() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "exit", "api"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in prerelease"));
}

#[test]
fn exit_without_bumps_only_leaves_the_train() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "beta"])
        .assert()
        .success();
    cmd_in(tmp.path())
        .args(["pre", "exit", "api"])
        .assert()
        .success()
        .stdout(predicate::str::contains("without changes"));
    assert_eq!(read(tmp.path(), "VERSION"), "1.2.3\n");
}

#[test]
fn status_json_lists_trains() {
    let tmp = workspace();
    cmd_in(tmp.path())
        .args(["pre", "enter", "api", "--tag", "beta"])
        .assert()
        .success();
    let output = cmd_in(tmp.path())
        .args(["pre", "status", "--json"])
        .assert()
        .success();
    let json: serde_json::Value = serde_json::from_slice(&output.get_output().stdout).unwrap();
    assert_eq!(json[0]["group"], "api");
    assert_eq!(json[0]["prerelease"]["tag"], "beta");
    assert_eq!(json[0]["prerelease"]["from_version"], "1.2.3");
    assert_eq!(json[0]["prerelease"]["counter"], 0);
}
