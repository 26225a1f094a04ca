//! Bump levels and semver increments.
//!
//! Versions are plain [`semver::Version`] values. This module adds the
//! ordered [`BumpLevel`] and the increment rules every other module relies on.

use semver::Version;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from version operations.
#[derive(Error, Debug)]
pub enum VersionError {
    /// Failed to parse a semver string.
    #[error("invalid semver {input:?}: {source}")]
    InvalidSemver {
        /// The rejected input.
        input: String,
        /// The parser's complaint.
        source: semver::Error,
    },

    /// A prerelease tag that cannot appear in a semver prerelease.
    #[error("invalid prerelease tag {0:?}: use ASCII letters, digits and hyphens")]
    InvalidTag(String),
}

/// Result alias for version operations.
pub type VersionResult<T> = Result<T, VersionError>;

/// Semver bump level.
///
/// Levels are totally ordered and aggregation always keeps the maximum, so
/// [`BumpLevel::None`] is the identity of every fold.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum BumpLevel {
    /// Nothing to release.
    #[default]
    None,
    /// Patch release (x.y.Z).
    Patch,
    /// Minor release (x.Y.0).
    Minor,
    /// Major release (X.0.0).
    Major,
}

impl BumpLevel {
    /// Parse an annotation label. Only `major`, `minor` and `patch` are bumps.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "major" => Some(Self::Major),
            "minor" => Some(Self::Minor),
            "patch" => Some(Self::Patch),
            _ => None,
        }
    }

    /// The label written into bump record annotations.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Patch => "patch",
            Self::Minor => "minor",
            Self::Major => "major",
        }
    }

    /// Whether this level asks for a release at all.
    pub fn is_none(self) -> bool {
        self == Self::None
    }
}

impl std::fmt::Display for BumpLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compute the next version by applying a bump level.
///
/// Lower components are zeroed and build metadata is dropped. A patch bump
/// of a prerelease graduates it (`1.2.3-rc.1` becomes `1.2.3`). `None`
/// returns the version unchanged.
pub fn next_version(current: &Version, level: BumpLevel) -> Version {
    match level {
        BumpLevel::None => current.clone(),
        BumpLevel::Patch if !current.pre.is_empty() => {
            Version::new(current.major, current.minor, current.patch)
        }
        BumpLevel::Patch => Version::new(current.major, current.minor, current.patch + 1),
        BumpLevel::Minor => Version::new(current.major, current.minor + 1, 0),
        BumpLevel::Major => Version::new(current.major + 1, 0, 0),
    }
}

/// The `MAJOR.MINOR.PATCH` core of a version, without prerelease or build.
pub const fn stable_core(version: &Version) -> Version {
    Version::new(version.major, version.minor, version.patch)
}

/// Parse a version string, stripping an optional `v` prefix.
pub fn parse_version(s: &str) -> VersionResult<Version> {
    let trimmed = s.trim();
    let bare = trimmed.strip_prefix('v').unwrap_or(trimmed);
    Version::parse(bare).map_err(|source| VersionError::InvalidSemver {
        input: s.to_string(),
        source,
    })
}

/// Check that `tag` can be used as the leading prerelease identifier.
pub fn validate_tag(tag: &str) -> VersionResult<()> {
    let valid = !tag.is_empty()
        && !tag.contains('.')
        && semver::Prerelease::new(&format!("{tag}.1")).is_ok();
    if valid {
        Ok(())
    } else {
        Err(VersionError::InvalidTag(tag.to_string()))
    }
}
