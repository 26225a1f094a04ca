//! Commit command: apply pending bumps.

use anyhow::Context;
use clap::Args;
use owo_colors::OwoColorize;
use tracing::instrument;

use bumper_core::release::CommitReport;
use bumper_core::{Config, ProcessCommands, Releaser, Workspace};

/// Arguments for the `commit` subcommand.
#[derive(Args, Debug, Default)]
pub struct CommitArgs {}

/// Set new versions, amend changelogs and consume pending bump records.
#[instrument(name = "cmd_commit", skip_all, fields(json_output = global_json))]
pub fn cmd_commit(
    _args: CommitArgs,
    global_json: bool,
    workspace: &Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    let commands = ProcessCommands::new(workspace.root()).with_stdout_on_stderr(global_json);
    let report = Releaser::new(workspace, config, &commands)
        .commit()
        .context("commit failed")?;

    if global_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &CommitReport) {
    if report.releases.is_empty() {
        println!("{}", "No pending version bumps.".yellow());
        return;
    }
    for release in &report.releases {
        let kind = if release.prerelease { "prerelease" } else { release.level.as_str() };
        println!(
            "  {} {} {} ({})",
            "✓".green(),
            release.group.bold(),
            release.version.to_string().green().bold(),
            kind.dimmed()
        );
    }
    if report.held > 0 {
        println!(
            "  {} {} bump record(s) held for prerelease",
            "→".dimmed(),
            report.held
        );
    }
}
