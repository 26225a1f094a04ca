//! Per-group aggregation of bump records.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::warn;

use crate::config::Config;
use crate::history::ResolvedHistory;
use crate::records::BumpRecord;
use crate::version::BumpLevel;

/// One changelog line derived from a bump record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogEntry {
    /// Commit time of the introducing commit, or 0 when unknown.
    pub timestamp: i64,
    /// Short id of the introducing commit.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    /// Rendered entry: `<short sha>: <body>`, or just the body.
    pub content: String,
}

impl LogEntry {
    /// Build an entry for `record`, prefixing the commit id when known.
    pub fn for_record(record: &BumpRecord, history: &ResolvedHistory) -> Self {
        match history.get(&record.path) {
            Some(commit) => {
                let short = commit.short_sha().to_string();
                Self {
                    timestamp: commit.timestamp,
                    content: format!("{short}: {}", record.body),
                    commit: Some(short),
                }
            }
            None => Self {
                timestamp: 0,
                commit: None,
                content: record.body.clone(),
            },
        }
    }
}

/// The aggregated bumps of one release group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReleaseGroupStatus {
    /// Highest level across all entries.
    pub level: BumpLevel,
    /// Entries that asked for a major bump.
    pub major: Vec<LogEntry>,
    /// Entries that asked for a minor bump.
    pub minor: Vec<LogEntry>,
    /// Entries that asked for a patch bump.
    pub patch: Vec<LogEntry>,
}

impl ReleaseGroupStatus {
    /// File `entry` under `level` and raise the group level.
    pub fn push(&mut self, level: BumpLevel, entry: LogEntry) {
        let bucket = match level {
            BumpLevel::Major => &mut self.major,
            BumpLevel::Minor => &mut self.minor,
            BumpLevel::Patch => &mut self.patch,
            BumpLevel::None => return,
        };
        bucket.push(entry);
        self.level = self.level.max(level);
    }

    /// Whether no entries have been recorded.
    pub fn is_empty(&self) -> bool {
        self.major.is_empty() && self.minor.is_empty() && self.patch.is_empty()
    }

    /// Stable sort each bucket by timestamp.
    fn sort(&mut self) {
        for bucket in [&mut self.major, &mut self.minor, &mut self.patch] {
            bucket.sort_by_key(|e| e.timestamp);
        }
    }

    /// Append `other`'s entries after ours and keep the higher level.
    fn absorb(&mut self, other: &Self) {
        self.level = self.level.max(other.level);
        self.major.extend(other.major.iter().cloned());
        self.minor.extend(other.minor.iter().cloned());
        self.patch.extend(other.patch.iter().cloned());
    }
}

/// Aggregation results keyed by release group name.
pub type GroupStatuses = BTreeMap<String, ReleaseGroupStatus>;

/// Level of `group` in `statuses`, `None` when absent.
pub fn level_of(statuses: &GroupStatuses, group: &str) -> BumpLevel {
    statuses.get(group).map_or(BumpLevel::None, |s| s.level)
}

/// Reduce records into per-group statuses.
///
/// Records are consumed in the given order. Unknown groups and level labels
/// are skipped with a warning. Each bucket ends up sorted by timestamp,
/// ties keeping record order.
pub fn aggregate(
    records: &[BumpRecord],
    history: &ResolvedHistory,
    config: &Config,
) -> GroupStatuses {
    let mut statuses = GroupStatuses::new();

    for record in records {
        let entry = LogEntry::for_record(record, history);
        for (group, label) in &record.annotations {
            if !config.has_group(group) {
                warn!(file = %record.path, group = %group, "skipping bump for unknown group");
                continue;
            }
            let Some(level) = BumpLevel::from_label(label) else {
                warn!(
                    file = %record.path,
                    group = %group,
                    level = %label,
                    "unknown level in bump file front matter"
                );
                continue;
            };
            statuses
                .entry(group.clone())
                .or_default()
                .push(level, entry.clone());
        }
    }

    for status in statuses.values_mut() {
        status.sort();
    }
    statuses
}

/// Union two aggregation results.
///
/// For groups present in both, levels take the maximum and `a`'s entries
/// come before `b`'s in every bucket.
pub fn merge(a: &GroupStatuses, b: &GroupStatuses) -> GroupStatuses {
    let mut merged = a.clone();
    for (group, status) in b {
        merged.entry(group.clone()).or_default().absorb(status);
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReleaseGroup;
    use crate::history::CommitRef;
    use camino::Utf8PathBuf;

    fn config(names: &[&str]) -> Config {
        Config {
            groups: names
                .iter()
                .map(|n| ReleaseGroup {
                    name: (*n).to_string(),
                    ..ReleaseGroup::default()
                })
                .collect(),
            ..Config::default()
        }
    }

    fn record(name: &str, body: &str, ann: &[(&str, &str)]) -> BumpRecord {
        BumpRecord {
            path: Utf8PathBuf::from(format!("/ws/.bumper/bump-{name}.md")),
            annotations: ann
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
            body: body.to_string(),
        }
    }

    fn contents(entries: &[LogEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.content.as_str()).collect()
    }

    #[test]
    fn empty_input_yields_nothing() {
        let statuses = aggregate(&[], &ResolvedHistory::new(), &config(&["api"]));
        assert!(statuses.is_empty());
        assert_eq!(level_of(&statuses, "api"), BumpLevel::None);
    }

    #[test]
    fn takes_highest_level_per_group() {
        let records = [
            record("a", "fix", &[("api", "patch")]),
            record("b", "feature", &[("api", "minor"), ("web", "patch")]),
        ];
        let statuses = aggregate(&records, &ResolvedHistory::new(), &config(&["api", "web"]));

        let api = &statuses["api"];
        assert_eq!(api.level, BumpLevel::Minor);
        assert_eq!(contents(&api.minor), vec!["feature"]);
        assert_eq!(contents(&api.patch), vec!["fix"]);
        assert!(api.major.is_empty());
        assert_eq!(statuses["web"].level, BumpLevel::Patch);
    }

    #[test]
    fn unknown_groups_and_levels_are_skipped() {
        let records = [record(
            "a",
            "change",
            &[("api", "minor"), ("cli", ""), ("ghost", "major"), ("web", "huge")],
        )];
        let config = config(&["api", "cli", "web"]);
        let statuses = aggregate(&records, &ResolvedHistory::new(), &config);

        assert_eq!(statuses["api"].level, BumpLevel::Minor);
        assert!(!statuses.contains_key("cli"));
        assert!(!statuses.contains_key("ghost"));
        assert!(!statuses.contains_key("web"));
    }

    #[test]
    fn entries_sort_by_commit_time_then_record_order() {
        let records = [
            record("a", "late", &[("api", "patch")]),
            record("b", "untracked-1", &[("api", "patch")]),
            record("c", "early", &[("api", "patch")]),
            record("d", "untracked-2", &[("api", "patch")]),
        ];
        let mut history = ResolvedHistory::new();
        history.insert(
            records[0].path.clone(),
            CommitRef {
                sha: "bbbbbbbbbbbbbbbb".into(),
                timestamp: 200,
            },
        );
        history.insert(
            records[2].path.clone(),
            CommitRef {
                sha: "aaaaaaaaaaaaaaaa".into(),
                timestamp: 100,
            },
        );

        let statuses = aggregate(&records, &history, &config(&["api"]));
        assert_eq!(
            contents(&statuses["api"].patch),
            vec!["untracked-1", "untracked-2", "aaaaaaa: early", "bbbbbbb: late"]
        );
        assert_eq!(statuses["api"].patch[2].commit.as_deref(), Some("aaaaaaa"));
    }

    #[test]
    fn merge_disjoint_is_union() {
        let a = aggregate(
            &[record("a", "x", &[("api", "major")])],
            &ResolvedHistory::new(),
            &config(&["api", "web"]),
        );
        let b = aggregate(
            &[record("b", "y", &[("web", "patch")])],
            &ResolvedHistory::new(),
            &config(&["api", "web"]),
        );
        let merged = merge(&a, &b);
        assert_eq!(merged["api"], a["api"]);
        assert_eq!(merged["web"], b["web"]);
    }

    #[test]
    fn merge_overlapping_concatenates() {
        let cfg = config(&["api"]);
        let a = aggregate(
            &[record("a", "held", &[("api", "patch")])],
            &ResolvedHistory::new(),
            &cfg,
        );
        let b = aggregate(
            &[
                record("b", "new", &[("api", "patch")]),
                record("c", "bigger", &[("api", "minor")]),
            ],
            &ResolvedHistory::new(),
            &cfg,
        );
        let merged = merge(&a, &b);
        assert_eq!(merged["api"].level, BumpLevel::Minor);
        assert_eq!(contents(&merged["api"].patch), vec!["held", "new"]);
        assert_eq!(contents(&merged["api"].minor), vec!["bigger"]);
    }

    #[test]
    fn level_matches_buckets() {
        let mut status = ReleaseGroupStatus::default();
        assert!(status.is_empty());
        status.push(
            BumpLevel::None,
            LogEntry {
                timestamp: 0,
                commit: None,
                content: "ignored".into(),
            },
        );
        assert!(status.is_empty());
        assert_eq!(status.level, BumpLevel::None);
    }
}
