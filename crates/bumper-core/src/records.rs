//! Bump record storage.
//!
//! A bump record is a Markdown file named `bump-<name>.md` that starts with a
//! YAML annotation block mapping release group names to bump levels:
//!
//! ```text
//! ---
//! api: minor
//! web: patch
//! ---
//!
//! Added pagination to the list endpoints.
//! ```
//!
//! Pending records live directly in `.bumper/`. Records consumed by a
//! prerelease commit move to `.bumper/prerelease/` until the train exits.

use std::collections::BTreeMap;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::workspace::Workspace;

const DELIMITER: &str = "---";
const RECORD_PREFIX: &str = "bump-";
const RECORD_SUFFIX: &str = ".md";

/// Errors from reading and writing bump records.
#[derive(Error, Debug)]
pub enum RecordError {
    /// The directory could not be turned into a glob pattern.
    #[error("invalid record pattern {pattern}: {source}")]
    Pattern {
        /// The rejected pattern.
        pattern: String,
        /// The glob complaint.
        source: glob::PatternError,
    },

    /// A record file could not be read, written, moved or removed.
    #[error("failed to access bump record {path}: {source}")]
    Io {
        /// The record or directory involved.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A record's annotation block is malformed.
    #[error("malformed bump record {path}: {message}")]
    Parse {
        /// The offending record.
        path: Utf8PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// Annotations could not be encoded as YAML.
    #[error("failed to encode bump record annotations: {0}")]
    Encode(String),
}

/// Result alias for record operations.
pub type RecordResult<T> = Result<T, RecordError>;

/// A parsed bump record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BumpRecord {
    /// Where the record lives.
    pub path: Utf8PathBuf,
    /// Release group name to bump level label.
    pub annotations: BTreeMap<String, String>,
    /// Free-text Markdown body, trimmed.
    pub body: String,
}

impl BumpRecord {
    /// Render the record back into its on-disk form.
    pub fn render(&self) -> RecordResult<String> {
        render(&self.annotations, &self.body)
    }
}

/// Pending records in `.bumper/`, in directory listing order.
pub fn list_pending(workspace: &Workspace) -> RecordResult<Vec<Utf8PathBuf>> {
    list_in(&workspace.dir())
}

/// Records held in `.bumper/prerelease/`.
pub fn list_prerelease(workspace: &Workspace) -> RecordResult<Vec<Utf8PathBuf>> {
    list_in(&workspace.prerelease_dir())
}

fn list_in(dir: &Utf8Path) -> RecordResult<Vec<Utf8PathBuf>> {
    let pattern = format!(
        "{}/{RECORD_PREFIX}*{RECORD_SUFFIX}",
        glob::Pattern::escape(dir.as_str())
    );
    let entries = glob::glob(&pattern).map_err(|source| RecordError::Pattern {
        pattern: pattern.clone(),
        source,
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(|e| RecordError::Io {
            path: Utf8PathBuf::from(e.path().to_string_lossy().into_owned()),
            source: e.into(),
        })?;
        match Utf8PathBuf::from_path_buf(path) {
            Ok(path) if path.is_file() => paths.push(path),
            Ok(_) => {}
            Err(path) => debug!(path = %path.display(), "skipping non UTF-8 record path"),
        }
    }
    debug!(dir = %dir, count = paths.len(), "listed bump records");
    Ok(paths)
}

/// Read and parse one record.
pub fn parse(path: &Utf8Path) -> RecordResult<BumpRecord> {
    let content = std::fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let (annotations, body) = parse_content(&content).map_err(|message| RecordError::Parse {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(BumpRecord {
        path: path.to_path_buf(),
        annotations,
        body,
    })
}

/// Parse every record, stopping at the first malformed one.
pub fn parse_all(paths: &[Utf8PathBuf]) -> RecordResult<Vec<BumpRecord>> {
    paths.iter().map(|p| parse(p)).collect()
}

/// Split record content into its annotation map and trimmed body.
pub fn parse_content(content: &str) -> Result<(BTreeMap<String, String>, String), String> {
    let mut lines = content.split_inclusive('\n');

    match lines.next() {
        Some(first) if is_delimiter(first) => {}
        _ => return Err(format!("record must start with a {DELIMITER} line")),
    }

    let mut block = String::new();
    let mut closed = false;
    for line in lines.by_ref() {
        if is_delimiter(line) {
            closed = true;
            break;
        }
        block.push_str(line);
    }
    if !closed {
        return Err(format!("annotation block is missing its closing {DELIMITER} line"));
    }

    let body: String = lines.collect();
    let block = block.trim();
    let annotations = if block.is_empty() {
        BTreeMap::new()
    } else {
        serde_saphyr::from_str::<BTreeMap<String, Option<String>>>(block)
            .map_err(|e| format!("invalid annotation block: {e}"))?
            .into_iter()
            .map(|(group, label)| (group, label.unwrap_or_default()))
            .collect()
    };

    Ok((annotations, body.trim().to_string()))
}

fn is_delimiter(line: &str) -> bool {
    line.trim_end_matches(['\n', '\r']) == DELIMITER
}

/// Render annotations and body into record content.
pub fn render(annotations: &BTreeMap<String, String>, body: &str) -> RecordResult<String> {
    let mut out = String::from(DELIMITER);
    out.push('\n');
    if !annotations.is_empty() {
        let yaml = serde_saphyr::to_string(annotations)
            .map_err(|e| RecordError::Encode(e.to_string()))?;
        out.push_str(&yaml);
        if !yaml.ends_with('\n') {
            out.push('\n');
        }
    }
    out.push_str(DELIMITER);
    out.push_str("\n\n");
    out.push_str(body.trim());
    out.push('\n');
    Ok(out)
}

/// Write a new pending record with a unique `bump-*.md` name.
#[instrument(skip(workspace, body), fields(groups = annotations.len()))]
pub fn write_new(
    workspace: &Workspace,
    annotations: &BTreeMap<String, String>,
    body: &str,
) -> RecordResult<Utf8PathBuf> {
    let dir = workspace.dir();
    let content = render(annotations, body)?;

    let file = tempfile::Builder::new()
        .prefix(RECORD_PREFIX)
        .suffix(RECORD_SUFFIX)
        .tempfile_in(&dir)
        .map_err(|source| RecordError::Io {
            path: dir.clone(),
            source,
        })?;
    let (_, path) = file.keep().map_err(|e| RecordError::Io {
        path: dir.clone(),
        source: e.error,
    })?;
    let path = Utf8PathBuf::from_path_buf(path).map_err(|p| RecordError::Io {
        path: dir.clone(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} is not valid UTF-8", p.display()),
        ),
    })?;

    std::fs::write(&path, content).map_err(|source| RecordError::Io {
        path: path.clone(),
        source,
    })?;
    debug!(%path, "wrote bump record");
    Ok(path)
}

/// Remove the given records.
pub fn delete(paths: &[Utf8PathBuf]) -> RecordResult<()> {
    for path in paths {
        std::fs::remove_file(path).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(%path, "deleted bump record");
    }
    Ok(())
}

/// Move records into the prerelease holding area, creating it if needed.
pub fn move_to_prerelease(workspace: &Workspace, paths: &[Utf8PathBuf]) -> RecordResult<()> {
    let holding = workspace.prerelease_dir();
    std::fs::create_dir_all(&holding).map_err(|source| RecordError::Io {
        path: holding.clone(),
        source,
    })?;

    for path in paths {
        let Some(name) = path.file_name() else {
            continue;
        };
        let dest = holding.join(name);
        std::fs::rename(path, &dest).map_err(|source| RecordError::Io {
            path: path.clone(),
            source,
        })?;
        debug!(from = %path, to = %dest, "moved bump record to prerelease");
    }
    Ok(())
}

/// Delete every held record and the holding area once it is empty.
pub fn delete_all_prerelease(workspace: &Workspace) -> RecordResult<()> {
    let held = list_prerelease(workspace)?;
    delete(&held)?;
    remove_prerelease_dir_if_empty(workspace)
}

/// Remove `.bumper/prerelease/` if nothing is left in it.
pub fn remove_prerelease_dir_if_empty(workspace: &Workspace) -> RecordResult<()> {
    let holding = workspace.prerelease_dir();
    let mut entries = match std::fs::read_dir(&holding) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(source) => {
            return Err(RecordError::Io {
                path: holding,
                source,
            });
        }
    };
    if entries.next().is_none() {
        std::fs::remove_dir(&holding).map_err(|source| RecordError::Io {
            path: holding.clone(),
            source,
        })?;
        debug!(dir = %holding, "removed empty prerelease directory");
    }
    Ok(())
}

/// Strip `group` from each record's annotations.
///
/// Records left without annotations are deleted, the rest are rewritten in
/// place. Returns how many records were deleted.
pub fn release_group(records: &[BumpRecord], group: &str) -> RecordResult<usize> {
    let mut deleted = 0;
    for record in records {
        if !record.annotations.contains_key(group) {
            continue;
        }
        let mut remaining = record.clone();
        remaining.annotations.remove(group);
        if remaining.annotations.is_empty() {
            delete(std::slice::from_ref(&record.path))?;
            deleted += 1;
        } else {
            let content = remaining.render()?;
            std::fs::write(&record.path, content).map_err(|source| RecordError::Io {
                path: record.path.clone(),
                source,
            })?;
            debug!(path = %record.path, group, "released group from bump record");
        }
    }
    Ok(deleted)
}
