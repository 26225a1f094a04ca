//! Core library for bumper.
//!
//! This crate holds everything bumper knows about pending change records,
//! release groups and prerelease trains. The `bumper` CLI is a display layer
//! over it.
//!
//! # Modules
//!
//! - [`aggregate`] - Reduce bump records into per-group release statuses
//! - [`changelog`] - Built-in `CHANGELOG.md` sections
//! - [`commands`] - Per-group external commands (current/next/changelog/notes)
//! - [`config`] - Configuration loading, validation and release groups
//! - [`error`] - Configuration error types and result aliases
//! - [`git`] - Thin wrapper around the `git` binary
//! - [`history`] - Introducing-commit lookup with shallow clone deepening
//! - [`prerelease`] - Prerelease train state and version computation
//! - [`records`] - Pending bump record store
//! - [`release`] - Commit and graduation workflows
//! - [`version`] - Bump levels and semver increments
//! - [`workspace`] - Workspace discovery and on-disk layout
//!
//! # Quick Start
//!
//! ```no_run
//! use bumper_core::{ConfigLoader, Workspace};
//!
//! let cwd = camino::Utf8PathBuf::from(".");
//! let workspace = Workspace::discover(&cwd).expect("no .bumper directory");
//! let config = ConfigLoader::new()
//!     .with_workspace(&workspace)
//!     .load()
//!     .expect("Failed to load configuration");
//!
//! for group in &config.groups {
//!     println!("{}", group.name);
//! }
//! ```
#![deny(unsafe_code)]

pub mod aggregate;

pub mod changelog;

pub mod commands;

pub mod config;

pub mod error;

pub mod git;

pub mod history;

pub mod prerelease;

pub mod records;

pub mod release;

pub mod version;

pub mod workspace;

pub use commands::{GroupCommands, ProcessCommands};

pub use config::{Config, ConfigLoader, LogLevel, ReleaseGroup};

pub use error::{ConfigError, ConfigResult, InvalidConfig};

pub use prerelease::PrereleaseState;

pub use release::Releaser;

pub use version::BumpLevel;

pub use workspace::Workspace;

// Re-export semver so downstream crates don't need a direct dependency.
pub use semver;
