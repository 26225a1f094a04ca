//! Pre command: enter, exit and inspect prerelease trains.

use anyhow::Context;
use clap::{Args, Subcommand};
use owo_colors::OwoColorize;
use serde::Serialize;
use tracing::instrument;

use bumper_core::prerelease::{EnterOutcome, PrereleaseGroupState};
use bumper_core::{Config, PrereleaseState, ProcessCommands, Releaser, Workspace};

/// Arguments for the `pre` subcommand.
#[derive(Args, Debug)]
pub struct PreArgs {
    /// The prerelease operation.
    #[command(subcommand)]
    pub command: PreCommand,
}

/// Prerelease operations.
#[derive(Subcommand, Debug)]
pub enum PreCommand {
    /// Start (or switch) a prerelease train for a group
    Enter {
        /// Release group
        group: String,
        /// Prerelease identifier, e.g. alpha, beta or rc
        #[arg(short, long)]
        tag: String,
    },

    /// Graduate a group from its train to a stable release
    Exit {
        /// Release group
        group: String,
    },

    /// Show train state for one or all groups
    Status {
        /// Release group (all configured groups when omitted)
        group: Option<String>,
    },
}

/// Execute a prerelease operation.
#[instrument(name = "cmd_pre", skip_all)]
pub fn cmd_pre(
    args: PreArgs,
    global_json: bool,
    workspace: &Workspace,
    config: &Config,
) -> anyhow::Result<()> {
    match args.command {
        PreCommand::Enter { group, tag } => enter(workspace, config, &group, &tag),
        PreCommand::Exit { group } => exit(workspace, config, &group),
        PreCommand::Status { group } => status(workspace, config, group.as_deref(), global_json),
    }
}

fn enter(workspace: &Workspace, config: &Config, group: &str, tag: &str) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    super::find_group(config, group)?;
    let commands = ProcessCommands::new(workspace.root());
    let report = Releaser::new(workspace, config, &commands)
        .enter_prerelease(group, tag)
        .context("failed to enter prerelease")?;

    match report.outcome {
        EnterOutcome::AlreadyEntered => {
            println!("{group} is already in prerelease with tag {}", tag.bold());
            return Ok(());
        }
        EnterOutcome::Switched { ref previous_tag } => println!(
            "  {} Switched {group} from {previous_tag} to {}",
            "✓".green(),
            tag.bold()
        ),
        EnterOutcome::Entered => println!(
            "  {} Entered {} prerelease for {group}",
            "✓".green(),
            tag.bold()
        ),
    }
    println!(
        "  {} Next commit will produce: {}",
        "→".dimmed(),
        report.state.display_version().green()
    );
    Ok(())
}

fn exit(workspace: &Workspace, config: &Config, group: &str) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    let commands = ProcessCommands::new(workspace.root());
    let report = Releaser::new(workspace, config, &commands)
        .exit_prerelease(group)
        .context("failed to exit prerelease")?;

    match report.release {
        Some(release) => println!(
            "  {} {} graduated to {}",
            "✓".green(),
            release.group.bold(),
            release.version.to_string().green().bold()
        ),
        None => println!("{group} left prerelease without changes"),
    }
    Ok(())
}

#[derive(Serialize)]
struct StatusLine<'a> {
    group: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    prerelease: Option<&'a PrereleaseGroupState>,
}

fn status(
    workspace: &Workspace,
    config: &Config,
    group: Option<&str>,
    global_json: bool,
) -> anyhow::Result<()> {
    let names: Vec<&str> = match group {
        Some(name) => vec![super::find_group(config, name)?.name.as_str()],
        None => config.groups.iter().map(|g| g.name.as_str()).collect(),
    };
    let state = PrereleaseState::load(workspace).context("failed to read prerelease state")?;
    let lines: Vec<StatusLine<'_>> = names
        .into_iter()
        .map(|name| StatusLine {
            group: name,
            prerelease: state.get(name),
        })
        .collect();

    if global_json {
        println!("{}", serde_json::to_string_pretty(&lines)?);
        return Ok(());
    }
    for line in &lines {
        match line.prerelease {
            Some(train) => println!("{}: {}", line.group, train.status()),
            None => println!("{}: not in prerelease", line.group),
        }
    }
    Ok(())
}
