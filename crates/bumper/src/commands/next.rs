//! Next command: preview the version `commit` would produce.

use anyhow::Context;
use clap::Args;
use tracing::instrument;

use bumper_core::{Config, ProcessCommands, Releaser, Workspace};

/// Arguments for the `next` subcommand.
#[derive(Args, Debug, Default)]
pub struct NextArgs {
    /// Release group to query
    #[arg(short, long)]
    pub group: String,
}

/// Print the next version, or nothing when no bump targets the group.
#[instrument(name = "cmd_next", skip_all, fields(group = %args.group))]
pub fn cmd_next(
    args: NextArgs,
    global_json: bool,
    workspace: &Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    super::find_group(config, &args.group)?;
    let commands = ProcessCommands::new(workspace.root());
    let next = Releaser::new(workspace, config, &commands)
        .next_version(&args.group)
        .context("failed to compute next version")?;

    if global_json {
        let json = serde_json::json!({ "group": args.group, "version": next });
        println!("{}", serde_json::to_string_pretty(&json)?);
    } else if let Some(version) = next {
        println!("{version}");
    }
    Ok(())
}
