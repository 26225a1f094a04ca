//! Builtins command: default changelog commands for release groups.
//!
//! `bumper create` points new groups at these unless other commands are
//! given, so a workspace keeps a `CHANGELOG.md` out of the box.

use anyhow::Context;
use camino::Utf8PathBuf;
use clap::{Args, Subcommand};
use tracing::{instrument, warn};

use bumper_core::changelog::{self, ChangelogEntries, DEFAULT_CHANGELOG, ENV_CHANGELOG_PATH};
use bumper_core::commands::{ENV_GROUP, ENV_NEXT_VERSION, ENV_VERSION};
use bumper_core::version;
use bumper_core::{Config, Workspace};

/// Argv stored as `changelog_cmd` for groups created without one.
pub const DEFAULT_CHANGELOG_CMD: &[&str] = &["bumper", "builtins", "amendlog:default"];

/// Argv stored as `cat_cmd` for groups created without one.
pub const DEFAULT_CAT_CMD: &[&str] = &["bumper", "builtins", "cat:default"];

/// Arguments for the `builtins` subcommand.
#[derive(Args, Debug)]
pub struct BuiltinsArgs {
    /// The built-in to run.
    #[command(subcommand)]
    pub command: BuiltinCommand,
}

/// Built-in group commands.
#[derive(Subcommand, Debug)]
pub enum BuiltinCommand {
    /// Add a release section to CHANGELOG.md
    #[command(name = "amendlog:default")]
    AmendLog(AmendLogArgs),

    /// Print one release's section of CHANGELOG.md
    #[command(name = "cat:default")]
    CatLog(CatLogArgs),
}

/// Arguments for `builtins amendlog:default`.
#[derive(Args, Debug, Default)]
pub struct AmendLogArgs {
    /// Release group
    #[arg(short, long, env = ENV_GROUP)]
    pub group: String,

    /// The version being released
    #[arg(long = "version", value_name = "VERSION", env = ENV_NEXT_VERSION)]
    pub release: String,

    /// Changelog file [default: CHANGELOG.md in the workspace root]
    #[arg(long, value_name = "FILE", env = ENV_CHANGELOG_PATH)]
    pub path: Option<Utf8PathBuf>,

    /// Breaking change (repeatable)
    #[arg(long, value_name = "ENTRY", allow_hyphen_values = true)]
    pub major: Vec<String>,

    /// New functionality (repeatable)
    #[arg(long, value_name = "ENTRY", allow_hyphen_values = true)]
    pub minor: Vec<String>,

    /// Bug fix (repeatable)
    #[arg(long, value_name = "ENTRY", allow_hyphen_values = true)]
    pub patch: Vec<String>,
}

/// Arguments for `builtins cat:default`.
#[derive(Args, Debug, Default)]
pub struct CatLogArgs {
    /// Release group
    #[arg(short, long, env = ENV_GROUP)]
    pub group: String,

    /// Version whose notes to print
    #[arg(long = "version", value_name = "VERSION", env = ENV_VERSION)]
    pub release: String,

    /// Changelog file [default: CHANGELOG.md in the workspace root]
    #[arg(long, value_name = "FILE", env = ENV_CHANGELOG_PATH)]
    pub path: Option<Utf8PathBuf>,
}

/// Execute a built-in.
pub fn cmd_builtins(
    args: BuiltinsArgs,
    workspace: &Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    match args.command {
        BuiltinCommand::AmendLog(args) => amend_log(args, workspace, config),
        BuiltinCommand::CatLog(args) => cat_log(args, workspace, config),
    }
}

fn changelog_path(path: Option<Utf8PathBuf>, workspace: &Workspace) -> Utf8PathBuf {
    path.unwrap_or_else(|| workspace.root().join(DEFAULT_CHANGELOG))
}

fn normalized(release: &str) -> anyhow::Result<String> {
    let parsed =
        version::parse_version(release).with_context(|| format!("invalid version {release:?}"))?;
    Ok(parsed.to_string())
}

#[instrument(
    name = "cmd_amendlog",
    skip_all,
    fields(group = %args.group, version = %args.release)
)]
fn amend_log(args: AmendLogArgs, workspace: &Workspace, config: &Config) -> anyhow::Result<()> {
    let release = normalized(&args.release)?;
    let label = match config.group(&args.group) {
        Some(group) => group.label().to_string(),
        None => {
            warn!(group = %args.group, "release group not in config, using its name as heading");
            args.group.clone()
        }
    };
    let path = changelog_path(args.path, workspace);
    let entries = ChangelogEntries {
        major: args.major,
        minor: args.minor,
        patch: args.patch,
    };

    changelog::amend(&path, &label, &release, &entries)
        .with_context(|| format!("failed to amend {path}"))
}

#[instrument(
    name = "cmd_catlog",
    skip_all,
    fields(group = %args.group, version = %args.release)
)]
fn cat_log(args: CatLogArgs, workspace: &Workspace, config: &Config) -> anyhow::Result<()> {
    let release = normalized(&args.release)?;
    let group = super::find_group(config, &args.group)?;
    let path = changelog_path(args.path, workspace);

    let notes = changelog::release_notes(&path, group.label(), &release)?;
    println!("{notes}");
    Ok(())
}
