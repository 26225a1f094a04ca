//! Cat command: print release notes.

use anyhow::Context;
use clap::Args;
use tracing::instrument;

use bumper_core::commands::{ENV_GROUP, ENV_VERSION};
use bumper_core::{Config, GroupCommands, ProcessCommands, Workspace};

/// Arguments for the `cat` subcommand.
#[derive(Args, Debug, Default)]
pub struct CatArgs {
    /// Release group whose notes to print
    #[arg(short, long, env = ENV_GROUP)]
    pub group: String,

    /// Version whose notes to print
    #[arg(long = "version", value_name = "VERSION", env = ENV_VERSION)]
    pub release: String,
}

/// Hand off to the group's cat command, which writes to our stdout.
#[instrument(name = "cmd_cat", skip_all, fields(group = %args.group, version = %args.release))]
pub fn cmd_cat(args: CatArgs, workspace: &Workspace, config: &Config) -> anyhow::Result<()> {
    let group = super::find_group(config, &args.group)?;
    ProcessCommands::new(workspace.root())
        .release_notes(group, &args.release)
        .context("failed to print release notes")
}
