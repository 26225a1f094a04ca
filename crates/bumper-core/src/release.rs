//! Release workflows: commit, prerelease enter/exit and next-version queries.
//!
//! Every workflow computes all versions before it runs a single mutating
//! group command, stops at the first failing command, and saves the
//! prerelease state last.

use std::collections::BTreeMap;

use semver::Version;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

use crate::aggregate::{self, GroupStatuses, ReleaseGroupStatus};
use crate::commands::{GroupCommandError, GroupCommands};
use crate::config::{Config, ReleaseGroup};
use crate::history::{self, DeepenPolicy, HistoryError};
use crate::prerelease::{self, EnterOutcome, PrereleaseError, PrereleaseGroupState, PrereleaseState};
use crate::records::{self, BumpRecord, RecordError};
use crate::version::{self, BumpLevel};
use crate::workspace::Workspace;

/// Errors from release workflows.
#[derive(Error, Debug)]
pub enum ReleaseError {
    /// The named group is not configured.
    #[error("release group {0:?} not found")]
    UnknownGroup(String),

    /// Reading or moving bump records failed.
    #[error(transparent)]
    Records(#[from] RecordError),

    /// Querying git history failed.
    #[error(transparent)]
    History(#[from] HistoryError),

    /// Loading, saving or advancing a train failed.
    #[error(transparent)]
    Prerelease(#[from] PrereleaseError),

    /// A group command failed.
    #[error(transparent)]
    Command(#[from] GroupCommandError),
}

/// Result alias for release workflows.
pub type ReleaseResult<T> = Result<T, ReleaseError>;

/// Parsed records and their aggregation.
#[derive(Debug, Default)]
pub struct Collected {
    /// Records in listing order.
    pub records: Vec<BumpRecord>,
    /// Per-group statuses.
    pub statuses: GroupStatuses,
}

impl Collected {
    /// Level of `group`, `None` when no record targets it.
    pub fn level(&self, group: &str) -> BumpLevel {
        aggregate::level_of(&self.statuses, group)
    }
}

/// One group's release produced by a workflow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupRelease {
    /// Release group name.
    pub group: String,
    /// Highest bump level that went into the release.
    pub level: BumpLevel,
    /// The version written by the group's next command.
    pub version: Version,
    /// Whether this is a prerelease of an active train.
    pub prerelease: bool,
}

/// Outcome of [`Releaser::commit`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommitReport {
    /// Groups released, in configuration order.
    pub releases: Vec<GroupRelease>,
    /// Records moved to the prerelease holding area.
    pub held: usize,
    /// Records deleted.
    pub deleted: usize,
}

/// Outcome of [`Releaser::exit_prerelease`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExitReport {
    /// Release group name.
    pub group: String,
    /// The stable release, absent when the train had no bumps.
    pub release: Option<GroupRelease>,
}

/// Outcome of [`Releaser::enter_prerelease`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnterReport {
    /// What changed.
    pub outcome: EnterOutcome,
    /// The group's train after entering.
    pub state: PrereleaseGroupState,
}

#[derive(Debug)]
struct Planned<'g> {
    group: &'g ReleaseGroup,
    level: BumpLevel,
    version: Version,
    counter: Option<u64>,
}

/// Runs release workflows for one workspace.
#[derive(Debug)]
pub struct Releaser<'a, C: GroupCommands + ?Sized> {
    workspace: &'a Workspace,
    config: &'a Config,
    commands: &'a C,
    policy: DeepenPolicy,
}

impl<'a, C: GroupCommands + ?Sized> Releaser<'a, C> {
    /// Create a releaser with the default history deepening policy.
    pub fn new(workspace: &'a Workspace, config: &'a Config, commands: &'a C) -> Self {
        Self {
            workspace,
            config,
            commands,
            policy: DeepenPolicy::default(),
        }
    }

    /// Override how shallow clones are deepened.
    pub const fn with_policy(mut self, policy: DeepenPolicy) -> Self {
        self.policy = policy;
        self
    }

    fn group(&self, name: &str) -> ReleaseResult<&'a ReleaseGroup> {
        self.config
            .group(name)
            .ok_or_else(|| ReleaseError::UnknownGroup(name.to_string()))
    }

    fn collect(&self, paths: &[camino::Utf8PathBuf]) -> ReleaseResult<Collected> {
        if paths.is_empty() {
            return Ok(Collected::default());
        }
        let records = records::parse_all(paths)?;
        let resolved = history::resolve_in(self.workspace.root(), paths, &self.policy)?;
        let statuses = aggregate::aggregate(&records, &resolved, self.config);
        Ok(Collected { records, statuses })
    }

    /// Parse and aggregate pending records.
    pub fn collect_pending(&self) -> ReleaseResult<Collected> {
        let paths = records::list_pending(self.workspace)?;
        self.collect(&paths)
    }

    /// Parse and aggregate records held by prerelease trains.
    pub fn collect_prerelease(&self) -> ReleaseResult<Collected> {
        let paths = records::list_prerelease(self.workspace)?;
        self.collect(&paths)
    }

    fn plan(
        &self,
        group: &'a ReleaseGroup,
        pending: &Collected,
        held: &Collected,
        state: &PrereleaseState,
    ) -> ReleaseResult<Option<Planned<'a>>> {
        let level = pending.level(&group.name);
        if level.is_none() {
            return Ok(None);
        }

        let planned = match state.get(&group.name) {
            Some(train) => {
                let (version, counter) = prerelease::compute_next_version(
                    &train.from_version,
                    &train.tag,
                    train.counter,
                    held.level(&group.name),
                    level,
                )?;
                Planned {
                    group,
                    level,
                    version,
                    counter: Some(counter),
                }
            }
            None => {
                let current = self.commands.current_version(group)?;
                Planned {
                    group,
                    level,
                    version: version::next_version(&current, level),
                    counter: None,
                }
            }
        };
        debug!(group = %group.name, version = %planned.version, "planned release");
        Ok(Some(planned))
    }

    /// The version `commit` would give `group`, or `None` if nothing is pending.
    #[instrument(skip(self))]
    pub fn next_version(&self, group: &str) -> ReleaseResult<Option<Version>> {
        let group = self.group(group)?;
        let pending = self.collect_pending()?;
        let state = PrereleaseState::load(self.workspace)?;
        let held = if state.is_in_prerelease(&group.name) {
            self.collect_prerelease()?
        } else {
            Collected::default()
        };
        Ok(self
            .plan(group, &pending, &held, &state)?
            .map(|planned| planned.version))
    }

    /// Consume pending records into version bumps and changelog entries.
    ///
    /// Stable groups get the next semver increment and a changelog section.
    /// Groups in a train get their next prerelease; their records move to
    /// the holding area so that graduation can write one consolidated
    /// changelog section.
    #[instrument(skip(self), fields(root = %self.workspace.root()))]
    pub fn commit(&self) -> ReleaseResult<CommitReport> {
        let pending = self.collect_pending()?;
        if pending.records.is_empty() {
            info!("no pending version bumps found");
            return Ok(CommitReport::default());
        }

        let mut state = PrereleaseState::load(self.workspace)?;
        let held = if state.groups.is_empty() {
            Collected::default()
        } else {
            self.collect_prerelease()?
        };

        let mut plans = Vec::new();
        for group in &self.config.groups {
            if let Some(planned) = self.plan(group, &pending, &held, &state)? {
                plans.push(planned);
            }
        }

        let empty = ReleaseGroupStatus::default();
        let mut releases = Vec::with_capacity(plans.len());
        for planned in &plans {
            let group = planned.group;
            self.commands.set_next_version(group, &planned.version)?;
            if planned.counter.is_none() {
                let status = pending.statuses.get(&group.name).unwrap_or(&empty);
                self.commands
                    .amend_changelog(group, &planned.version, status)?;
            }
            info!(group = %group.name, version = %planned.version, "released");
            releases.push(GroupRelease {
                group: group.name.clone(),
                level: planned.level,
                version: planned.version.clone(),
                prerelease: planned.counter.is_some(),
            });
        }

        let (held_count, deleted) = self.dispose(&pending.records, &state)?;

        for planned in &plans {
            if let Some(counter) = planned.counter {
                state.set_counter(&planned.group.name, counter);
            }
        }
        state.save(self.workspace)?;

        Ok(CommitReport {
            releases,
            held: held_count,
            deleted,
        })
    }

    /// Hold records that feed an active train and delete the rest.
    ///
    /// Held records keep only the annotations of groups in a train.
    fn dispose(
        &self,
        consumed: &[BumpRecord],
        state: &PrereleaseState,
    ) -> ReleaseResult<(usize, usize)> {
        let mut to_hold = Vec::new();
        let mut to_delete = Vec::new();

        for record in consumed {
            let in_train: BTreeMap<String, String> = record
                .annotations
                .iter()
                .filter(|(group, _)| state.is_in_prerelease(group))
                .map(|(g, l)| (g.clone(), l.clone()))
                .collect();

            if in_train.is_empty() {
                to_delete.push(record.path.clone());
                continue;
            }
            if in_train.len() != record.annotations.len() {
                let trimmed = BumpRecord {
                    annotations: in_train,
                    ..record.clone()
                };
                std::fs::write(&record.path, trimmed.render()?).map_err(|source| {
                    RecordError::Io {
                        path: record.path.clone(),
                        source,
                    }
                })?;
            }
            to_hold.push(record.path.clone());
        }

        records::move_to_prerelease(self.workspace, &to_hold)?;
        records::delete(&to_delete)?;
        debug!(held = to_hold.len(), deleted = to_delete.len(), "disposed bump records");
        Ok((to_hold.len(), to_delete.len()))
    }

    /// Drop the holding area once it no longer feeds any train.
    ///
    /// With trains still running only an empty directory is removed. After
    /// the last train exits, leftover held records have no reader and are
    /// deleted with it.
    fn tidy_holding_area(&self, state: &PrereleaseState) -> ReleaseResult<()> {
        if state.groups.is_empty() {
            records::delete_all_prerelease(self.workspace)?;
        } else {
            records::remove_prerelease_dir_if_empty(self.workspace)?;
        }
        Ok(())
    }

    /// Put `group` in a prerelease train tagged `tag`.
    #[instrument(skip(self))]
    pub fn enter_prerelease(&self, group: &str, tag: &str) -> ReleaseResult<EnterReport> {
        let group = self.group(group)?;
        version::validate_tag(tag).map_err(PrereleaseError::from)?;

        let mut state = PrereleaseState::load(self.workspace)?;
        let current = match state.get(&group.name) {
            Some(train) => train.from_version.clone(),
            None => self.commands.current_version(group)?,
        };

        let outcome = state.enter(&group.name, tag, &current)?;
        if outcome != EnterOutcome::AlreadyEntered {
            state.save(self.workspace)?;
        }

        let train = state
            .get(&group.name)
            .cloned()
            .ok_or_else(|| PrereleaseError::NotInPrerelease(group.name.clone()))?;
        Ok(EnterReport {
            outcome,
            state: train,
        })
    }

    /// Graduate `group` from its train to a stable release.
    ///
    /// Held and pending records for the group are consolidated into one
    /// changelog section. When the train saw no bumps the group just leaves
    /// the train.
    #[instrument(skip(self))]
    pub fn exit_prerelease(&self, group: &str) -> ReleaseResult<ExitReport> {
        let group = self.group(group)?;
        let mut state = PrereleaseState::load(self.workspace)?;
        let train = state
            .get(&group.name)
            .cloned()
            .ok_or_else(|| PrereleaseError::NotInPrerelease(group.name.clone()))?;

        let held = self.collect_prerelease()?;
        let pending = self.collect_pending()?;
        let merged = aggregate::merge(&held.statuses, &pending.statuses);

        let Some(status) = merged.get(&group.name).filter(|s| !s.level.is_none()) else {
            warn!(group = %group.name, "no bumps were made during prerelease, cleaning up state");
            records::release_group(&held.records, &group.name)?;
            state.exit(&group.name);
            self.tidy_holding_area(&state)?;
            state.save(self.workspace)?;
            return Ok(ExitReport {
                group: group.name.clone(),
                release: None,
            });
        };

        let version = prerelease::graduation_version(
            &train,
            held.level(&group.name),
            pending.level(&group.name),
        )?;

        self.commands.set_next_version(group, &version)?;
        self.commands.amend_changelog(group, &version, status)?;

        records::release_group(&held.records, &group.name)?;
        records::release_group(&pending.records, &group.name)?;

        state.exit(&group.name);
        self.tidy_holding_area(&state)?;
        state.save(self.workspace)?;
        info!(group = %group.name, %version, "graduated from prerelease");

        Ok(ExitReport {
            group: group.name.clone(),
            release: Some(GroupRelease {
                group: group.name.clone(),
                level: status.level,
                version,
                prerelease: false,
            }),
        })
    }
}
