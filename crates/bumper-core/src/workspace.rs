//! Workspace discovery and on-disk layout.
//!
//! A workspace is a directory holding a `.bumper/` directory:
//!
//! ```text
//! .bumper/
//!   config.toml           release groups
//!   bump-<name>.md        pending bump records
//!   prerelease.toml       active prerelease trains
//!   prerelease/
//!     bump-<name>.md      records accumulated by a train
//! ```

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::{debug, instrument};

/// Name of the workspace marker directory.
pub const WORKSPACE_DIR: &str = ".bumper";

const PRERELEASE_DIR: &str = "prerelease";
const PRERELEASE_STATE_FILE: &str = "prerelease.toml";
const CONFIG_STEM: &str = "config";

/// Errors from workspace discovery.
#[derive(Error, Debug)]
pub enum WorkspaceError {
    /// No ancestor of the start directory holds a `.bumper` directory.
    #[error("no {WORKSPACE_DIR} directory found in {start} or any parent (run `bumper init`)")]
    NotFound {
        /// Where the search began.
        start: Utf8PathBuf,
    },

    /// Failed to inspect or create workspace paths.
    #[error("failed to access {path}: {source}")]
    Io {
        /// The path being accessed.
        path: Utf8PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Result alias for workspace operations.
pub type WorkspaceResult<T> = Result<T, WorkspaceError>;

/// A located workspace. All paths hang off its root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workspace {
    root: Utf8PathBuf,
}

impl Workspace {
    /// Use `root` as a workspace root without checking for `.bumper`.
    pub fn at<P: AsRef<Utf8Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Walk up from `start` to the first directory containing a `.bumper`
    /// directory. A `.bumper` regular file does not count.
    #[instrument(fields(%start))]
    pub fn discover(start: &Utf8Path) -> WorkspaceResult<Self> {
        let absolute = if start.is_absolute() {
            start.to_path_buf()
        } else {
            let cwd = std::env::current_dir().map_err(|source| WorkspaceError::Io {
                path: start.to_path_buf(),
                source,
            })?;
            let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|p| WorkspaceError::Io {
                path: start.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("{} is not valid UTF-8", p.display()),
                ),
            })?;
            cwd.join(start)
        };

        let mut current = Some(absolute.as_path());
        while let Some(dir) = current {
            if dir.join(WORKSPACE_DIR).is_dir() {
                debug!(root = %dir, "found workspace");
                return Ok(Self::at(dir));
            }
            current = dir.parent();
        }

        Err(WorkspaceError::NotFound {
            start: start.to_path_buf(),
        })
    }

    /// Create `.bumper/` under `root` if it is missing.
    pub fn create(root: &Utf8Path) -> WorkspaceResult<Self> {
        let workspace = Self::at(root);
        let dir = workspace.dir();
        std::fs::create_dir_all(&dir).map_err(|source| WorkspaceError::Io { path: dir, source })?;
        Ok(workspace)
    }

    /// The workspace root (the directory containing `.bumper/`).
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// The `.bumper/` directory.
    pub fn dir(&self) -> Utf8PathBuf {
        self.root.join(WORKSPACE_DIR)
    }

    /// The default release group file, `.bumper/config.toml`.
    pub fn config_file(&self) -> Utf8PathBuf {
        self.dir().join(format!("{CONFIG_STEM}.toml"))
    }

    /// Release group file with the given extension.
    pub fn config_file_with_ext(&self, ext: &str) -> Utf8PathBuf {
        self.dir().join(format!("{CONFIG_STEM}.{ext}"))
    }

    /// The holding area for records consumed by prerelease commits.
    pub fn prerelease_dir(&self) -> Utf8PathBuf {
        self.dir().join(PRERELEASE_DIR)
    }

    /// The persisted prerelease train state.
    pub fn prerelease_state_file(&self) -> Utf8PathBuf {
        self.dir().join(PRERELEASE_STATE_FILE)
    }
}
