//! Built-in `CHANGELOG.md` maintenance.
//!
//! Groups created without explicit changelog commands use
//! `bumper builtins amendlog:default` and `bumper builtins cat:default`,
//! which keep one Markdown file shaped like this:
//!
//! ```text
//! # Changelog
//!
//! ## api 1.3.0
//!
//! ### Minor Changes
//!
//! - 1a2b3c4: Added pagination to the list endpoints.
//! ```
//!
//! New sections go directly under the `# Changelog` title, so the newest
//! release is always first.

use std::io::Write;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Changelog file used when no path is given.
pub const DEFAULT_CHANGELOG: &str = "CHANGELOG.md";

/// Environment variable overriding the changelog path for the built-ins.
pub const ENV_CHANGELOG_PATH: &str = "BUMPER_CHANGELOG_PATH";

const TITLE: &str = "# Changelog";
const SECTION_PREFIX: &str = "## ";

/// Errors from the built-in changelog commands.
#[derive(Error, Debug)]
pub enum ChangelogError {
    /// The changelog could not be read or written.
    #[error("failed to access changelog {path}: {source}")]
    Io {
        /// The changelog file.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The changelog has no section for the requested release.
    #[error("no release notes found for {label} {version} in {path}")]
    NotFound {
        /// The changelog file.
        path: Utf8PathBuf,
        /// Display name of the release group.
        label: String,
        /// The requested version.
        version: String,
    },
}

/// Result alias for changelog operations.
pub type ChangelogResult<T> = Result<T, ChangelogError>;

/// Entries of one release, by bump level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangelogEntries {
    /// Breaking changes.
    pub major: Vec<String>,
    /// New functionality.
    pub minor: Vec<String>,
    /// Fixes.
    pub patch: Vec<String>,
}

/// Render the `## <label> <version>` section, without trailing newline.
///
/// Empty buckets get no subsection.
pub fn render_section(label: &str, version: &str, entries: &ChangelogEntries) -> String {
    let mut out = format!("{SECTION_PREFIX}{label} {version}\n\n");
    for (heading, bucket) in [
        ("Major Changes", &entries.major),
        ("Minor Changes", &entries.minor),
        ("Patch Changes", &entries.patch),
    ] {
        if bucket.is_empty() {
            continue;
        }
        out.push_str("### ");
        out.push_str(heading);
        out.push_str("\n\n");
        for entry in bucket {
            out.push_str(&format_entry(entry));
        }
        out.push('\n');
    }
    out.trim().to_string()
}

/// One bullet; continuation lines are indented under it.
fn format_entry(entry: &str) -> String {
    if entry.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    for (i, line) in entry.lines().enumerate() {
        if i == 0 {
            out.push_str("- ");
            out.push_str(line);
        } else {
            out.push('\n');
            if !line.trim().is_empty() {
                out.push_str("  ");
                out.push_str(line);
            }
        }
    }
    out.push('\n');
    out
}

/// Insert `section` below the first `# Changelog` line of `existing`.
///
/// A file without the title gets one, with the section right after it.
pub fn insert_section(existing: &str, section: &str) -> String {
    let mut lines: Vec<&str> = existing.lines().collect();
    match lines.iter().position(|line| line.starts_with(TITLE)) {
        Some(title) => {
            lines.insert(title + 1, "");
            lines.insert(title + 2, section);
        }
        None => {
            let rest = if lines.iter().all(|l| l.trim().is_empty()) {
                Vec::new()
            } else {
                let mut rest = vec![""];
                rest.append(&mut lines);
                rest
            };
            lines = vec![TITLE, "", section];
            lines.extend(rest);
        }
    }
    let mut out = lines.join("\n");
    out.push('\n');
    out
}

/// Add a section for `version` to the changelog at `path`, creating it if needed.
#[instrument(skip_all, fields(%path, %label, %version))]
pub fn amend(
    path: &Utf8Path,
    label: &str,
    version: &str,
    entries: &ChangelogEntries,
) -> ChangelogResult<()> {
    let existing = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
        Err(source) => {
            return Err(ChangelogError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };
    let updated = insert_section(&existing, &render_section(label, version, entries));
    write_atomic(path, &updated)?;
    debug!(label, version, "amended changelog");
    Ok(())
}

fn write_atomic(path: &Utf8Path, content: &str) -> ChangelogResult<()> {
    let io = |source: std::io::Error| ChangelogError::Io {
        path: path.to_path_buf(),
        source,
    };
    let dir = path
        .parent()
        .filter(|p| !p.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(io)?;
    tmp.write_all(content.as_bytes()).map_err(io)?;
    tmp.persist(path).map_err(|e| io(e.error))?;
    Ok(())
}

/// The section for `label` `version` in `content`, heading included.
///
/// The section ends at the next `## ` heading. Returns `None` when there is
/// no such heading or the section is blank.
pub fn find_section(content: &str, label: &str, version: &str) -> Option<String> {
    let heading = format!("{SECTION_PREFIX}{label} {version}");
    let mut lines = content.lines();
    let start = lines.find(|line| {
        line.strip_prefix(heading.as_str())
            .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
    })?;

    let mut out = String::from(start);
    for line in lines.take_while(|line| !line.starts_with(SECTION_PREFIX)) {
        out.push('\n');
        out.push_str(line);
    }
    let out = out.trim();
    (!out.is_empty()).then(|| out.to_string())
}

/// Read the release notes of `label` `version` from the changelog at `path`.
#[instrument(skip_all, fields(%path, %label, %version))]
pub fn release_notes(path: &Utf8Path, label: &str, version: &str) -> ChangelogResult<String> {
    let content = std::fs::read_to_string(path).map_err(|source| ChangelogError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    find_section(&content, label, version).ok_or_else(|| ChangelogError::NotFound {
        path: path.to_path_buf(),
        label: label.to_string(),
        version: version.to_string(),
    })
}
