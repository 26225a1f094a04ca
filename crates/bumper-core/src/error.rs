//! Error types for bumper-core

use thiserror::Error;

/// Errors that can occur when working with configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to deserialize configuration.
    #[error("invalid configuration: {0}")]
    Deserialize(#[from] Box<figment::Error>),

    /// The configuration parsed but describes an unusable set of release groups.
    #[error(transparent)]
    Invalid(#[from] InvalidConfig),

    /// Failed to encode the release group file.
    #[error("failed to encode configuration: {0}")]
    Serialize(#[from] toml::ser::Error),

    /// Failed to read the release group file before rewriting it.
    #[error("failed to decode {path}: {source}")]
    Decode {
        /// The file being read.
        path: String,
        /// The underlying TOML error.
        source: toml::de::Error,
    },

    /// Failed to read or write a configuration file.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The file being accessed.
        path: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Every problem found while validating release groups.
///
/// Validation never stops at the first violation, so one run of the tool
/// shows the operator everything that needs fixing.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("invalid release group configuration:\n{}", format_problems(.problems))]
pub struct InvalidConfig {
    /// One human-readable line per violation.
    pub problems: Vec<String>,
}

fn format_problems(problems: &[String]) -> String {
    problems
        .iter()
        .map(|p| format!("  - {p}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Result type alias using [`ConfigError`].
pub type ConfigResult<T> = Result<T, ConfigError>;
