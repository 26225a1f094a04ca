//! Current command: print a group's current version.

use anyhow::Context;
use clap::Args;
use tracing::instrument;

use bumper_core::{Config, GroupCommands, ProcessCommands, Workspace};

/// Arguments for the `current` subcommand.
#[derive(Args, Debug, Default)]
pub struct CurrentArgs {
    /// Release group to query
    #[arg(short, long)]
    pub group: String,
}

/// Run the group's current version command and print the parsed version.
#[instrument(name = "cmd_current", skip_all, fields(group = %args.group))]
pub fn cmd_current(
    args: CurrentArgs,
    global_json: bool,
    workspace: &Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    let group = super::find_group(config, &args.group)?;
    let version = ProcessCommands::new(workspace.root())
        .current_version(group)
        .context("failed to query current version")?;

    if global_json {
        let json = serde_json::json!({ "group": group.name, "version": version });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else {
        println!("{version}");
    }
    Ok(())
}
