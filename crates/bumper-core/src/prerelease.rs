//! Prerelease trains.
//!
//! A release group is either stable or in a train. Train membership lives in
//! `.bumper/prerelease.toml`:
//!
//! ```toml
//! [groups.api]
//! tag = "beta"
//! from_version = "1.2.3"
//! counter = 2
//! ```
//!
//! The state is loaded once, mutated in memory and saved only after every
//! dependent step has succeeded.

use std::collections::BTreeMap;
use std::io::Write;

use camino::Utf8PathBuf;
use semver::{Prerelease, Version};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::version::{self, BumpLevel, VersionError};
use crate::workspace::Workspace;

/// Errors from loading, saving or advancing prerelease trains.
#[derive(Error, Debug)]
pub enum PrereleaseError {
    /// The state file could not be read or written.
    #[error("failed to access prerelease state {path}: {source}")]
    Io {
        /// The state file or its directory.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The state file is not valid TOML for this schema.
    #[error("failed to decode prerelease state {path}: {source}")]
    Decode {
        /// The state file.
        path: Utf8PathBuf,
        /// The underlying TOML error.
        source: toml::de::Error,
    },

    /// The state could not be encoded.
    #[error("failed to encode prerelease state: {0}")]
    Encode(#[from] toml::ser::Error),

    /// A tag or version was rejected.
    #[error(transparent)]
    Version(#[from] VersionError),

    /// The group has no active train.
    #[error("release group {0:?} is not in prerelease mode")]
    NotInPrerelease(String),
}

/// Result alias for prerelease operations.
pub type PrereleaseResult<T> = Result<T, PrereleaseError>;

/// One group's active train.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrereleaseGroupState {
    /// Leading prerelease identifier, e.g. `beta`.
    pub tag: String,
    /// Stable version the train started from.
    pub from_version: Version,
    /// Sequence number of the last prerelease; 0 before the first commit.
    pub counter: u64,
}

impl PrereleaseGroupState {
    /// The version shown by `pre status`: `from-tag.max(counter, 1)`.
    pub fn display_version(&self) -> String {
        format!("{}-{}.{}", self.from_version, self.tag, self.counter.max(1))
    }

    /// The status line for a group in this train.
    pub fn status(&self) -> String {
        format!(
            "{} (tag: {}, from: {})",
            self.display_version(),
            self.tag,
            self.from_version
        )
    }
}

/// What [`PrereleaseState::enter`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnterOutcome {
    /// The group was stable and now has a fresh train.
    Entered,
    /// Already in a train with the same tag; nothing changed.
    AlreadyEntered,
    /// The tag changed; the base version was kept and the counter reset.
    Switched {
        /// The tag that was replaced.
        previous_tag: String,
    },
}

/// Train state for every group in a workspace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrereleaseState {
    /// Active trains keyed by release group name.
    #[serde(default)]
    pub groups: BTreeMap<String, PrereleaseGroupState>,
}

impl PrereleaseState {
    /// Load the state file. A missing file means no trains.
    #[instrument(skip(workspace), fields(root = %workspace.root()))]
    pub fn load(workspace: &Workspace) -> PrereleaseResult<Self> {
        let path = workspace.prerelease_state_file();
        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("no prerelease state");
                return Ok(Self::default());
            }
            Err(source) => return Err(PrereleaseError::Io { path, source }),
        };
        let state: Self =
            toml::from_str(&raw).map_err(|source| PrereleaseError::Decode { path, source })?;
        debug!(groups = state.groups.len(), "loaded prerelease state");
        Ok(state)
    }

    /// Persist the state, removing the file when no group is in a train.
    ///
    /// The file is replaced atomically.
    #[instrument(skip(self, workspace), fields(groups = self.groups.len()))]
    pub fn save(&self, workspace: &Workspace) -> PrereleaseResult<()> {
        let path = workspace.prerelease_state_file();

        if self.groups.is_empty() {
            return match std::fs::remove_file(&path) {
                Ok(()) => {
                    debug!(%path, "removed prerelease state");
                    Ok(())
                }
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(source) => Err(PrereleaseError::Io { path, source }),
            };
        }

        let encoded = toml::to_string(self)?;
        let dir = workspace.dir();
        let mut tmp = tempfile::NamedTempFile::new_in(&dir).map_err(|source| {
            PrereleaseError::Io {
                path: dir.clone(),
                source,
            }
        })?;
        tmp.write_all(encoded.as_bytes())
            .map_err(|source| PrereleaseError::Io {
                path: path.clone(),
                source,
            })?;
        tmp.persist(&path).map_err(|e| PrereleaseError::Io {
            path: path.clone(),
            source: e.error,
        })?;
        debug!(%path, "saved prerelease state");
        Ok(())
    }

    /// The train of `group`, if any.
    pub fn get(&self, group: &str) -> Option<&PrereleaseGroupState> {
        self.groups.get(group)
    }

    /// Whether `group` is in a train.
    pub fn is_in_prerelease(&self, group: &str) -> bool {
        self.groups.contains_key(group)
    }

    /// Put `group` in a train tagged `tag`.
    ///
    /// `current` is the group's current version. It only matters when the
    /// group is stable, in which case its `MAJOR.MINOR.PATCH` core becomes
    /// the train's base.
    pub fn enter(
        &mut self,
        group: &str,
        tag: &str,
        current: &Version,
    ) -> PrereleaseResult<EnterOutcome> {
        version::validate_tag(tag)?;

        let outcome = match self.groups.get_mut(group) {
            Some(existing) if existing.tag == tag => EnterOutcome::AlreadyEntered,
            Some(existing) => {
                let previous_tag = std::mem::replace(&mut existing.tag, tag.to_string());
                existing.counter = 0;
                EnterOutcome::Switched { previous_tag }
            }
            None => {
                self.groups.insert(
                    group.to_string(),
                    PrereleaseGroupState {
                        tag: tag.to_string(),
                        from_version: version::stable_core(current),
                        counter: 0,
                    },
                );
                EnterOutcome::Entered
            }
        };
        info!(group, tag, ?outcome, "entered prerelease");
        Ok(outcome)
    }

    /// Remove `group` from its train, returning the removed state.
    pub fn exit(&mut self, group: &str) -> Option<PrereleaseGroupState> {
        let removed = self.groups.remove(group);
        if removed.is_some() {
            info!(group, "exited prerelease");
        }
        removed
    }

    /// Record the counter of the prerelease just produced for `group`.
    pub fn set_counter(&mut self, group: &str, counter: u64) {
        if let Some(state) = self.groups.get_mut(group) {
            state.counter = counter;
        }
    }
}

/// Compute the next prerelease of a train.
///
/// The base is `from` incremented by the higher of `accumulated` (bumps
/// already released in this train) and `pending`, with at least a patch
/// increment. The counter continues when the base is the one the previous
/// prerelease had, and restarts at 1 otherwise.
///
/// The previous base is only known when `accumulated` is a real bump, so a
/// train whose held records carry no level for this group restarts at 1 even
/// when `counter > 0`.
pub fn compute_next_version(
    from: &Version,
    tag: &str,
    counter: u64,
    accumulated: BumpLevel,
    pending: BumpLevel,
) -> PrereleaseResult<(Version, u64)> {
    let highest = accumulated.max(pending).max(BumpLevel::Patch);
    let base = version::next_version(from, highest);

    let previous_base = (counter > 0 && !accumulated.is_none())
        .then(|| version::next_version(from, accumulated));

    let next_counter = if previous_base.as_ref() == Some(&base) {
        counter + 1
    } else {
        1
    };

    let pre = Prerelease::new(&format!("{tag}.{next_counter}"))
        .map_err(|_| VersionError::InvalidTag(tag.to_string()))?;
    let mut next = version::stable_core(&base);
    next.pre = pre;
    Ok((next, next_counter))
}

/// The stable version a train graduates to.
pub fn graduation_version(
    state: &PrereleaseGroupState,
    accumulated: BumpLevel,
    pending: BumpLevel,
) -> PrereleaseResult<Version> {
    let (pre, _) = compute_next_version(
        &state.from_version,
        &state.tag,
        state.counter,
        accumulated,
        pending,
    )?;
    Ok(version::stable_core(&pre))
}
