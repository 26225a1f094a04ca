//! Init command: create the `.bumper` workspace.

use anyhow::Context;
use camino::Utf8Path;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::instrument;

use bumper_core::{Workspace, config};

/// Arguments for the `init` subcommand.
#[derive(Args, Debug, Default)]
pub struct InitArgs {}

/// Create `.bumper/` and an empty `config.toml` in `cwd`.
///
/// An existing configuration is left untouched.
#[instrument(name = "cmd_init", skip_all, fields(%cwd))]
pub fn cmd_init(_args: InitArgs, cwd: &Utf8Path) -> anyhow::Result<()> {
    let workspace = Workspace::create(cwd).context("failed to create .bumper directory")?;
    if config::init_groups_file(&workspace).context("failed to write configuration")? {
        println!(
            "  {} Initialized bumper in {}",
            "✓".green(),
            workspace.dir().cyan()
        );
    } else {
        println!("{}", "bumper is already initialized here.".yellow());
    }
    Ok(())
}
