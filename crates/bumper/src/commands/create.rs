//! Create command: add release groups to `.bumper/config.toml`.

use anyhow::{Context, bail};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::instrument;

use bumper_core::{ReleaseGroup, Workspace, config};

use super::builtins::{DEFAULT_CAT_CMD, DEFAULT_CHANGELOG_CMD};

/// Arguments for the `create` subcommand.
#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// Names of the release groups to add
    #[arg(required = true, value_name = "NAME")]
    pub names: Vec<String>,

    /// Command printing the current version
    #[arg(long, value_name = "CMD")]
    pub current_cmd: String,

    /// Command storing `$BUMPER_GROUP_NEXT_VERSION`
    #[arg(long, value_name = "CMD")]
    pub next_cmd: String,

    /// Command adding a changelog section [default: bumper builtins amendlog:default]
    #[arg(long, value_name = "CMD")]
    pub changelog_cmd: Option<String>,

    /// Command printing release notes for `$BUMPER_GROUP_VERSION`
    /// [default: bumper builtins cat:default]
    #[arg(long, value_name = "CMD")]
    pub cat_cmd: Option<String>,
}

fn argv(cmd: &str) -> Vec<String> {
    cmd.split_whitespace().map(str::to_string).collect()
}

fn argv_or(cmd: Option<&str>, default: &[&str]) -> Vec<String> {
    cmd.map_or_else(|| default.iter().map(|s| (*s).to_string()).collect(), argv)
}

/// Add one group per name, each sharing the given commands.
#[instrument(name = "cmd_create", skip_all, fields(names = ?args.names))]
pub fn cmd_create(args: CreateArgs, workspace: &Workspace) -> anyhow::Result<()> {
    if let Some(blank) = args.names.iter().find(|n| n.trim().is_empty()) {
        bail!("release group names cannot be blank: {blank:?}");
    }
    let groups = args
        .names
        .iter()
        .map(|name| ReleaseGroup {
            name: name.trim().to_string(),
            display_name: None,
            changelog_cmd: argv_or(args.changelog_cmd.as_deref(), DEFAULT_CHANGELOG_CMD),
            cat_cmd: argv_or(args.cat_cmd.as_deref(), DEFAULT_CAT_CMD),
            current_cmd: argv(&args.current_cmd),
            next_cmd: argv(&args.next_cmd),
        })
        .collect();

    let (added, skipped) =
        config::add_groups(workspace, groups).context("failed to update configuration")?;
    for name in &added {
        println!("  {} Added release group {}", "✓".green(), name.bold());
    }
    for name in &skipped {
        println!("  {} {} already exists", "-".dimmed(), name.bold());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_split_on_whitespace() {
        assert_eq!(argv("  cargo   pkgid -p api "), vec!["cargo", "pkgid", "-p", "api"]);
        assert!(argv("   ").is_empty());
    }

    #[test]
    fn changelog_commands_default_to_builtins() {
        assert_eq!(
            argv_or(None, DEFAULT_CHANGELOG_CMD),
            vec!["bumper", "builtins", "amendlog:default"]
        );
        assert_eq!(argv_or(Some("notes show"), DEFAULT_CAT_CMD), vec!["notes", "show"]);
    }
}
