//! External per-group commands.
//!
//! Each release group delegates version storage, changelog editing and
//! release notes to commands configured in `.bumper/config.toml`. Parameters
//! travel through the environment:
//!
//! | Variable                    | Set for                         |
//! |-----------------------------|---------------------------------|
//! | `BUMPER_GROUP`              | every command                   |
//! | `BUMPER_GROUP_NEXT_VERSION` | `next_cmd`, `changelog_cmd`     |
//! | `BUMPER_GROUP_VERSION`      | `cat_cmd`                       |

use std::process::{Command, Stdio};

use camino::{Utf8Path, Utf8PathBuf};
use semver::Version;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::aggregate::ReleaseGroupStatus;
use crate::config::ReleaseGroup;
use crate::version::{self, VersionError};

/// Environment variable naming the group a command runs for.
pub const ENV_GROUP: &str = "BUMPER_GROUP";
/// Environment variable carrying the version being released.
pub const ENV_NEXT_VERSION: &str = "BUMPER_GROUP_NEXT_VERSION";
/// Environment variable carrying the version whose notes are requested.
pub const ENV_VERSION: &str = "BUMPER_GROUP_VERSION";

/// Errors from running group commands.
#[derive(Error, Debug)]
pub enum GroupCommandError {
    /// The group has no command configured for this purpose.
    #[error("release group {group:?} has no {field} configured")]
    NotConfigured {
        /// The release group.
        group: String,
        /// The missing config field.
        field: &'static str,
    },

    /// The command could not be started.
    #[error("failed to run {program} for release group {group:?}: {source}")]
    Spawn {
        /// The release group.
        group: String,
        /// The program that failed to start.
        program: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The command exited unsuccessfully.
    #[error("{field} for release group {group:?} exited with {status}")]
    Failed {
        /// The release group.
        group: String,
        /// Which command failed.
        field: &'static str,
        /// Exit status description.
        status: String,
    },

    /// The current version command printed something that is not semver.
    #[error("current version of release group {group:?} is not valid: {source}")]
    InvalidVersion {
        /// The release group.
        group: String,
        /// The parse error.
        source: VersionError,
    },
}

/// Result alias for group command operations.
pub type GroupCommandResult<T> = Result<T, GroupCommandError>;

/// The operations a release workflow needs from a release group.
pub trait GroupCommands {
    /// Query the group's current version.
    fn current_version(&self, group: &ReleaseGroup) -> GroupCommandResult<Version>;

    /// Store `version` as the group's new version.
    fn set_next_version(&self, group: &ReleaseGroup, version: &Version) -> GroupCommandResult<()>;

    /// Add a changelog section for `version` built from `status`.
    fn amend_changelog(
        &self,
        group: &ReleaseGroup,
        version: &Version,
        status: &ReleaseGroupStatus,
    ) -> GroupCommandResult<()>;

    /// Print the release notes of `version` to stdout.
    fn release_notes(&self, group: &ReleaseGroup, version: &str) -> GroupCommandResult<()>;
}

/// Arguments appended to the changelog command.
///
/// `--group <name>` first, then every entry with its bucket flag in
/// major, minor, patch order.
pub fn changelog_args(group: &str, status: &ReleaseGroupStatus) -> Vec<String> {
    let entries = status.major.len() + status.minor.len() + status.patch.len();
    let mut args = Vec::with_capacity(2 + 2 * entries);
    args.push("--group".to_string());
    args.push(group.to_string());
    for (flag, entries) in [
        ("--major", &status.major),
        ("--minor", &status.minor),
        ("--patch", &status.patch),
    ] {
        for entry in entries {
            args.push(flag.to_string());
            args.push(entry.content.clone());
        }
    }
    args
}

/// [`GroupCommands`] that runs the configured programs from the workspace root.
///
/// Commands inherit stderr. Set and amend commands also inherit stdout
/// unless [`with_stdout_on_stderr`](Self::with_stdout_on_stderr) is set;
/// the current version command's stdout is captured.
#[derive(Debug, Clone)]
pub struct ProcessCommands {
    root: Utf8PathBuf,
    stdout_on_stderr: bool,
}

impl ProcessCommands {
    /// Run commands with `root` as their working directory.
    pub fn new(root: &Utf8Path) -> Self {
        Self {
            root: root.to_path_buf(),
            stdout_on_stderr: false,
        }
    }

    /// Send what set and amend commands print to stderr.
    ///
    /// Keeps our own stdout machine-readable when it carries a report.
    pub const fn with_stdout_on_stderr(mut self, enabled: bool) -> Self {
        self.stdout_on_stderr = enabled;
        self
    }

    fn passthrough(&self) -> Stdio {
        if self.stdout_on_stderr {
            Stdio::from(std::io::stderr())
        } else {
            Stdio::inherit()
        }
    }

    fn command(
        &self,
        group: &ReleaseGroup,
        field: &'static str,
        argv: &[String],
    ) -> GroupCommandResult<Command> {
        let Some((program, args)) = argv.split_first() else {
            return Err(GroupCommandError::NotConfigured {
                group: group.name.clone(),
                field,
            });
        };
        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(&self.root)
            .env(ENV_GROUP, &group.name)
            .stdin(Stdio::null())
            .stderr(Stdio::inherit());
        Ok(cmd)
    }

    fn run(
        &self,
        group: &ReleaseGroup,
        field: &'static str,
        mut cmd: Command,
    ) -> GroupCommandResult<std::process::Output> {
        let program = cmd.get_program().to_string_lossy().into_owned();
        debug!(group = %group.name, field, %program, "running group command");
        let output = cmd.output().map_err(|source| GroupCommandError::Spawn {
            group: group.name.clone(),
            program,
            source,
        })?;
        if !output.status.success() {
            return Err(GroupCommandError::Failed {
                group: group.name.clone(),
                field,
                status: output.status.to_string(),
            });
        }
        Ok(output)
    }
}

impl GroupCommands for ProcessCommands {
    #[instrument(skip(self, group), fields(group = %group.name))]
    fn current_version(&self, group: &ReleaseGroup) -> GroupCommandResult<Version> {
        let mut cmd = self.command(group, "current_cmd", &group.current_cmd)?;
        cmd.stdout(Stdio::piped());
        let output = self.run(group, "current_cmd", cmd)?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        let current =
            version::parse_version(&stdout).map_err(|source| GroupCommandError::InvalidVersion {
                group: group.name.clone(),
                source,
            })?;
        debug!(%current, "current version");
        Ok(current)
    }

    #[instrument(skip(self, group), fields(group = %group.name, %version))]
    fn set_next_version(&self, group: &ReleaseGroup, version: &Version) -> GroupCommandResult<()> {
        let mut cmd = self.command(group, "next_cmd", &group.next_cmd)?;
        cmd.env(ENV_NEXT_VERSION, version.to_string())
            .stdout(self.passthrough());
        self.run(group, "next_cmd", cmd)?;
        Ok(())
    }

    #[instrument(skip(self, group, status), fields(group = %group.name, %version))]
    fn amend_changelog(
        &self,
        group: &ReleaseGroup,
        version: &Version,
        status: &ReleaseGroupStatus,
    ) -> GroupCommandResult<()> {
        let mut cmd = self.command(group, "changelog_cmd", &group.changelog_cmd)?;
        cmd.args(changelog_args(&group.name, status))
            .env(ENV_NEXT_VERSION, version.to_string())
            .stdout(self.passthrough());
        self.run(group, "changelog_cmd", cmd)?;
        Ok(())
    }

    #[instrument(skip(self, group), fields(group = %group.name))]
    fn release_notes(&self, group: &ReleaseGroup, version: &str) -> GroupCommandResult<()> {
        let mut cmd = self.command(group, "cat_cmd", &group.cat_cmd)?;
        cmd.env(ENV_VERSION, version).stdout(Stdio::inherit());
        self.run(group, "cat_cmd", cmd)?;
        Ok(())
    }
}
