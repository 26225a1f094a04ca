//! Source history resolution for bump records.
//!
//! Each record is timestamped with the commit that introduced it, so that
//! changelog entries come out in the order changes landed. Resolution is
//! best effort: shallow clones are deepened a bounded number of times and
//! anything still unresolved is reported and left out.

use std::collections::{HashMap, HashSet};

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::git::{self, GitError};

pub use crate::git::CommitRef;

/// Errors from history lookups.
#[derive(Error, Debug)]
pub enum HistoryError {
    /// The underlying git query failed.
    #[error(transparent)]
    Git(#[from] GitError),
}

/// Result alias for history operations.
pub type HistoryResult<T> = Result<T, HistoryError>;

/// Introducing commits keyed by record path.
pub type ResolvedHistory = HashMap<Utf8PathBuf, CommitRef>;

/// A queryable commit history.
pub trait History {
    /// The most recent commit that added `path`, if it is visible locally.
    fn introducing_commit(&self, path: &Utf8Path) -> HistoryResult<Option<CommitRef>>;

    /// Whether older history could still be fetched.
    fn is_shallow(&self) -> HistoryResult<bool>;

    /// Fetch `by` more commits of history.
    fn deepen(&mut self, by: u32) -> HistoryResult<()>;
}

/// Bounds on how hard [`resolve`] tries to complete a shallow history.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeepenPolicy {
    /// Maximum number of deepen fetches.
    pub max_attempts: u32,
    /// Commits fetched per attempt.
    pub batch_size: u32,
}

impl Default for DeepenPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 10,
            batch_size: 50,
        }
    }
}

/// Find the introducing commit of every path.
///
/// While some paths are unresolved and the history is shallow, fetches
/// `policy.batch_size` more commits, at most `policy.max_attempts` times.
/// A failed fetch stops deepening but is not fatal. Paths that remain
/// unresolved are logged and absent from the result.
#[instrument(skip(history, paths), fields(paths = paths.len()))]
pub fn resolve<H: History + ?Sized>(
    history: &mut H,
    paths: &[Utf8PathBuf],
    policy: &DeepenPolicy,
) -> HistoryResult<ResolvedHistory> {
    let mut resolved = ResolvedHistory::with_capacity(paths.len());
    let mut pending: Vec<&Utf8PathBuf> = paths.iter().collect();
    let mut attempts = 0;

    loop {
        let mut unresolved = Vec::new();
        for path in pending {
            match history.introducing_commit(path)? {
                Some(commit) => {
                    resolved.insert(path.clone(), commit);
                }
                None => unresolved.push(path),
            }
        }
        pending = unresolved;

        if pending.is_empty() || attempts >= policy.max_attempts || !history.is_shallow()? {
            break;
        }

        attempts += 1;
        debug!(
            attempt = attempts,
            by = policy.batch_size,
            unresolved = pending.len(),
            "deepening shallow clone"
        );
        if let Err(e) = history.deepen(policy.batch_size) {
            warn!(error = %e, "could not fetch more history");
            break;
        }
    }

    for path in pending {
        warn!(file = %path, "could not resolve git info for bump file");
    }
    Ok(resolved)
}

/// [`History`] backed by the `git` command line.
#[derive(Debug)]
pub struct GitHistory {
    root: Utf8PathBuf,
    boundary: HashSet<String>,
}

impl GitHistory {
    /// Open the repository containing `dir`.
    ///
    /// Returns `None` when there is no repository or it has no commits yet,
    /// in which case records simply go without timestamps.
    #[instrument]
    pub fn open(dir: &Utf8Path) -> HistoryResult<Option<Self>> {
        let inside = match git::is_inside_repo(dir) {
            Ok(inside) => inside,
            Err(GitError::Exec(e)) => {
                warn!(error = %e, "git is not available");
                false
            }
            Err(e) => return Err(e.into()),
        };
        if !inside || !git::has_commits(dir)? {
            debug!("no git history available");
            return Ok(None);
        }
        let root = git::toplevel(dir)?;
        let boundary = git::shallow_commits(&root)?;
        Ok(Some(Self { root, boundary }))
    }

    /// The work tree root.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    fn relative(&self, path: &Utf8Path) -> Option<String> {
        let canonical = path
            .canonicalize_utf8()
            .unwrap_or_else(|_| path.to_path_buf());
        let root = self
            .root
            .canonicalize_utf8()
            .unwrap_or_else(|_| self.root.clone());
        canonical
            .strip_prefix(&root)
            .ok()
            .map(|rel| rel.as_str().replace('\\', "/"))
    }
}

impl History for GitHistory {
    fn introducing_commit(&self, path: &Utf8Path) -> HistoryResult<Option<CommitRef>> {
        let Some(rel) = self.relative(path) else {
            debug!(%path, "path is outside the repository");
            return Ok(None);
        };
        Ok(git::introducing_commit(&self.root, &rel, &self.boundary)?)
    }

    fn is_shallow(&self) -> HistoryResult<bool> {
        Ok(git::is_shallow(&self.root)?)
    }

    fn deepen(&mut self, by: u32) -> HistoryResult<()> {
        git::deepen(&self.root, by)?;
        self.boundary = git::shallow_commits(&self.root)?;
        Ok(())
    }
}

/// Resolve `paths` against the repository around `dir`, if there is one.
pub fn resolve_in(
    dir: &Utf8Path,
    paths: &[Utf8PathBuf],
    policy: &DeepenPolicy,
) -> HistoryResult<ResolvedHistory> {
    if paths.is_empty() {
        return Ok(ResolvedHistory::new());
    }
    match GitHistory::open(dir)? {
        Some(mut history) => resolve(&mut history, paths, policy),
        None => {
            warn!("no git repository found; bump records will not be ordered by commit time");
            Ok(ResolvedHistory::new())
        }
    }
}
