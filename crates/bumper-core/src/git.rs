//! Git queries used to timestamp bump records.
//!
//! Shells out to `git` for all operations. This ensures we inherit the user's
//! credentials and remote configuration when fetching more history.

use std::collections::HashSet;
use std::process::Command;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Errors from git operations.
#[derive(Error, Debug)]
pub enum GitError {
    /// Failed to execute the `git` command.
    #[error("failed to run git: {0}")]
    Exec(#[from] std::io::Error),

    /// `git` returned a non-zero exit code.
    #[error("git {command} failed: {stderr}")]
    Command {
        /// The git subcommand that failed (e.g., "log").
        command: String,
        /// Captured stderr.
        stderr: String,
    },

    /// Not inside a git repository.
    #[error("not a git repository (or any parent up to mount point)")]
    NotARepo,

    /// Git printed something we could not interpret.
    #[error("unexpected output from git {command}: {output:?}")]
    Unexpected {
        /// The git subcommand.
        command: String,
        /// The offending output.
        output: String,
    },
}

/// Result alias for git operations.
pub type GitResult<T> = Result<T, GitError>;

/// A commit that touched a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitRef {
    /// Full commit id.
    pub sha: String,
    /// Committer time in seconds since the Unix epoch.
    pub timestamp: i64,
}

impl CommitRef {
    /// The 7-character abbreviation used in changelog entries.
    pub fn short_sha(&self) -> &str {
        self.sha.get(..7).unwrap_or(&self.sha)
    }
}

/// Check if `dir` is inside a git work tree.
#[instrument]
pub fn is_inside_repo(dir: &Utf8Path) -> GitResult<bool> {
    match git_in(dir, &["rev-parse", "--is-inside-work-tree"]) {
        Ok(output) => Ok(output.trim() == "true"),
        Err(GitError::Command { .. } | GitError::NotARepo) => Ok(false),
        Err(e) => Err(e),
    }
}

/// The top-level directory of the work tree containing `dir`.
#[instrument]
pub fn toplevel(dir: &Utf8Path) -> GitResult<Utf8PathBuf> {
    let output = git_in(dir, &["rev-parse", "--show-toplevel"])?;
    Ok(Utf8PathBuf::from(output.trim()))
}

/// Whether `HEAD` points at a commit. False in a freshly initialized repo.
#[instrument]
pub fn has_commits(dir: &Utf8Path) -> GitResult<bool> {
    match git_in(dir, &["rev-parse", "--verify", "--quiet", "HEAD"]) {
        Ok(_) => Ok(true),
        Err(GitError::Command { .. }) => Ok(false),
        Err(e) => Err(e),
    }
}

/// Whether the repository is a shallow clone.
#[instrument]
pub fn is_shallow(dir: &Utf8Path) -> GitResult<bool> {
    let output = git_in(dir, &["rev-parse", "--is-shallow-repository"])?;
    match output.trim() {
        "true" => Ok(true),
        "false" => Ok(false),
        other => Err(GitError::Unexpected {
            command: "rev-parse".into(),
            output: other.into(),
        }),
    }
}

/// Commits at the shallow boundary. Their parents are not available locally,
/// so git reports every file in them as added.
#[instrument]
pub fn shallow_commits(dir: &Utf8Path) -> GitResult<HashSet<String>> {
    let output = git_in(dir, &["rev-parse", "--git-path", "shallow"])?;
    let shallow_file = dir.join(output.trim());
    match std::fs::read_to_string(&shallow_file) {
        Ok(contents) => Ok(contents
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashSet::new()),
        Err(e) => Err(GitError::Exec(e)),
    }
}

/// Find the most recent commit reachable from `HEAD` that added `path`.
///
/// `path` is relative to the repository root. Commits on the shallow
/// boundary are skipped since their parent trees are unknown. Returns
/// `None` when the path is untracked or only appears at the boundary.
#[instrument(skip(boundary))]
pub fn introducing_commit(
    root: &Utf8Path,
    path: &str,
    boundary: &HashSet<String>,
) -> GitResult<Option<CommitRef>> {
    let output = git_in(
        root,
        &["log", "--diff-filter=A", "--format=%H %ct", "--", path],
    )?;

    for line in output.lines() {
        let Some((sha, ts)) = line.trim().split_once(' ') else {
            continue;
        };
        if boundary.contains(sha) {
            debug!(sha, "skipping shallow boundary commit");
            continue;
        }
        let timestamp = ts.parse::<i64>().map_err(|_| GitError::Unexpected {
            command: "log".into(),
            output: line.into(),
        })?;
        return Ok(Some(CommitRef {
            sha: sha.to_string(),
            timestamp,
        }));
    }
    Ok(None)
}

/// Fetch `by` more commits of history into a shallow clone.
#[instrument]
pub fn deepen(dir: &Utf8Path, by: u32) -> GitResult<()> {
    let depth = by.to_string();
    git_in(dir, &["fetch", "--deepen", &depth])?;
    Ok(())
}

/// Run a git command in `dir` and return its stdout.
fn git_in(dir: &Utf8Path, args: &[&str]) -> GitResult<String> {
    let output = Command::new("git").current_dir(dir).args(args).output()?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    } else {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();

        if stderr.contains("not a git repository") {
            return Err(GitError::NotARepo);
        }

        Err(GitError::Command {
            command: args.first().unwrap_or(&"").to_string(),
            stderr,
        })
    }
}
