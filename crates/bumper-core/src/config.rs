//! Configuration loading, validation and release groups.
//!
//! Configuration is merged from (in order of precedence, highest first):
//! - explicit files passed to [`ConfigLoader::with_file`]
//! - the workspace file `.bumper/config.<ext>`
//! - `~/.config/bumper/config.<ext>` (user config)
//! - defaults
//!
//! Where `<ext>` is one of: `toml`, `yaml`, `yml`, `json`
//!
//! # Example
//! ```no_run
//! use camino::Utf8PathBuf;
//! use bumper_core::{ConfigLoader, Workspace};
//!
//! let workspace = Workspace::at(Utf8PathBuf::from("/repo"));
//! let config = ConfigLoader::new()
//!     .with_workspace(&workspace)
//!     .load()
//!     .unwrap();
//! config.validate().unwrap();
//! ```

use std::collections::HashSet;

use camino::{Utf8Path, Utf8PathBuf};
use figment::Figment;
use figment::providers::{Format, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult, InvalidConfig};
use crate::workspace::Workspace;

/// The configuration for bumper.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    /// Log level for the application (e.g., "debug", "info", "warn", "error").
    pub log_level: LogLevel,
    /// Directory for JSONL log files (falls back to platform defaults if unset).
    pub log_dir: Option<Utf8PathBuf>,
    /// Independently versioned release groups in this workspace.
    pub groups: Vec<ReleaseGroup>,
}

/// An independently versioned unit within a workspace.
///
/// Each command is an argv list executed from the workspace root.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ReleaseGroup {
    /// Unique name, used as the key in bump record annotations.
    pub name: String,
    /// Optional human-friendly name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    /// Amends the changelog; receives `--group` and `--major/--minor/--patch` entries.
    #[serde(default)]
    pub changelog_cmd: Vec<String>,
    /// Prints release notes for `BUMPER_GROUP_VERSION`.
    #[serde(default)]
    pub cat_cmd: Vec<String>,
    /// Prints the current version on stdout.
    #[serde(default)]
    pub current_cmd: Vec<String>,
    /// Writes `BUMPER_GROUP_NEXT_VERSION` wherever the version lives.
    #[serde(default)]
    pub next_cmd: Vec<String>,
}

impl ReleaseGroup {
    /// The display name, falling back to the group name.
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.name)
    }
}

impl Config {
    /// Look up a release group by name.
    pub fn group(&self, name: &str) -> Option<&ReleaseGroup> {
        self.groups.iter().find(|g| g.name == name)
    }

    /// Whether `name` is a configured release group.
    pub fn has_group(&self, name: &str) -> bool {
        self.group(name).is_some()
    }

    /// Check every release group, collecting all violations.
    pub fn validate(&self) -> Result<(), InvalidConfig> {
        let mut problems = Vec::new();
        let mut seen = HashSet::new();

        for (index, group) in self.groups.iter().enumerate() {
            let name = group.name.trim();
            if name.is_empty() {
                problems.push(format!("group #{} has an empty name", index + 1));
            } else if !seen.insert(name) {
                problems.push(format!("group {name:?} is defined more than once"));
            }

            let who = if name.is_empty() {
                format!("group #{}", index + 1)
            } else {
                format!("group {name:?}")
            };
            for (field, cmd) in [
                ("changelog_cmd", &group.changelog_cmd),
                ("cat_cmd", &group.cat_cmd),
                ("current_cmd", &group.current_cmd),
                ("next_cmd", &group.next_cmd),
            ] {
                if cmd.first().is_none_or(|program| program.trim().is_empty()) {
                    problems.push(format!("{who} is missing {field}"));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(InvalidConfig { problems })
        }
    }
}

/// Log level configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Verbose output for debugging and development.
    Debug,
    /// Standard operational information (default).
    #[default]
    Info,
    /// Warnings about potential issues.
    Warn,
    /// Errors that indicate failures.
    Error,
}

impl LogLevel {
    /// Returns the log level as a lowercase string slice.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warn => "warn",
            Self::Error => "error",
        }
    }
}

/// Supported configuration file extensions (in order of preference).
const CONFIG_EXTENSIONS: &[&str] = &["toml", "yaml", "yml", "json"];

/// Application name for XDG directory lookup.
const APP_NAME: &str = "bumper";

/// Builder for loading configuration from multiple sources.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    /// Workspace whose `.bumper/config.<ext>` is merged.
    workspace: Option<Workspace>,
    /// Whether to include user config from XDG directory.
    include_user_config: bool,
    /// Explicit config files to load (for testing or programmatic use).
    explicit_files: Vec<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new config loader with default settings.
    pub fn new() -> Self {
        Self {
            workspace: None,
            include_user_config: true,
            explicit_files: Vec::new(),
        }
    }

    /// Merge the release group file of this workspace.
    pub fn with_workspace(mut self, workspace: &Workspace) -> Self {
        self.workspace = Some(workspace.clone());
        self
    }

    /// Set whether to include user config from `~/.config/bumper/`.
    pub const fn with_user_config(mut self, include: bool) -> Self {
        self.include_user_config = include;
        self
    }

    /// Add an explicit config file to load.
    ///
    /// Files are loaded in order, with later files taking precedence.
    pub fn with_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.explicit_files.push(path.as_ref().to_path_buf());
        self
    }

    /// Load configuration, merging all discovered sources.
    #[tracing::instrument(
        skip(self),
        fields(workspace = ?self.workspace.as_ref().map(Workspace::root))
    )]
    pub fn load(self) -> ConfigResult<Config> {
        tracing::debug!("loading configuration");
        let mut figment = Figment::new().merge(Serialized::defaults(Config::default()));

        if self.include_user_config
            && let Some(user_config) = find_user_config()
        {
            figment = merge_file(figment, &user_config);
        }

        if let Some(ref workspace) = self.workspace
            && let Some(workspace_config) = find_workspace_config(workspace)
        {
            figment = merge_file(figment, &workspace_config);
        }

        for file in &self.explicit_files {
            figment = merge_file(figment, file);
        }

        let config: Config = figment
            .extract()
            .map_err(|e| ConfigError::Deserialize(Box::new(e)))?;
        tracing::debug!(
            log_level = config.log_level.as_str(),
            groups = config.groups.len(),
            "configuration loaded"
        );
        Ok(config)
    }
}

/// Find the release group file of a workspace, trying each extension.
pub fn find_workspace_config(workspace: &Workspace) -> Option<Utf8PathBuf> {
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| workspace.config_file_with_ext(ext))
        .find(|path| path.is_file())
}

/// Find user config in XDG config directory.
fn find_user_config() -> Option<Utf8PathBuf> {
    let config_dir = user_config_dir()?;
    CONFIG_EXTENSIONS
        .iter()
        .map(|ext| config_dir.join(format!("config.{ext}")))
        .find(|path| path.is_file())
}

/// Merge a config file into the figment, detecting format from extension.
fn merge_file(figment: Figment, path: &Utf8Path) -> Figment {
    match path.extension() {
        Some("yaml" | "yml") => figment.merge(Yaml::file_exact(path.as_str())),
        Some("json") => figment.merge(Json::file_exact(path.as_str())),
        _ => figment.merge(Toml::file_exact(path.as_str())),
    }
}

/// Get the user config directory path.
///
/// Returns `~/.config/bumper/` on Linux, `~/Library/Application Support/bumper/`
/// on macOS, and equivalent on other platforms.
pub fn user_config_dir() -> Option<Utf8PathBuf> {
    let proj_dirs = directories::ProjectDirs::from("", "", APP_NAME)?;
    Utf8PathBuf::from_path_buf(proj_dirs.config_dir().to_path_buf()).ok()
}

/// The persisted shape of `.bumper/config.toml`.
#[derive(Debug, Default, Deserialize, Serialize)]
struct GroupsFile {
    #[serde(default)]
    groups: Vec<ReleaseGroup>,
}

/// Write an empty release group file unless one already exists.
///
/// Returns `true` when a file was created.
pub fn init_groups_file(workspace: &Workspace) -> ConfigResult<bool> {
    if let Some(existing) = find_workspace_config(workspace) {
        tracing::debug!(path = %existing, "configuration already present");
        return Ok(false);
    }
    write_groups_file(&workspace.config_file(), &GroupsFile::default())?;
    Ok(true)
}

/// Append release groups to `.bumper/config.toml`, keeping them sorted.
///
/// Names already present are skipped and returned in the second list.
pub fn add_groups(
    workspace: &Workspace,
    groups: Vec<ReleaseGroup>,
) -> ConfigResult<(Vec<String>, Vec<String>)> {
    let path = workspace.config_file();
    let mut file = if path.is_file() {
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Io {
            path: path.to_string(),
            source,
        })?;
        toml::from_str::<GroupsFile>(&raw).map_err(|source| ConfigError::Decode {
            path: path.to_string(),
            source,
        })?
    } else {
        GroupsFile::default()
    };

    let mut added = Vec::new();
    let mut skipped = Vec::new();
    for group in groups {
        if file.groups.iter().any(|g| g.name == group.name) {
            tracing::warn!(group = %group.name, "skipping existing release group");
            skipped.push(group.name);
        } else {
            added.push(group.name.clone());
            file.groups.push(group);
        }
    }

    if !added.is_empty() {
        file.groups.sort_by(|a, b| a.name.cmp(&b.name));
        write_groups_file(&path, &file)?;
    }
    Ok((added, skipped))
}

fn write_groups_file(path: &Utf8Path, file: &GroupsFile) -> ConfigResult<()> {
    let encoded = toml::to_string(file)?;
    std::fs::write(path, encoded).map_err(|source| ConfigError::Io {
        path: path.to_string(),
        source,
    })
}
