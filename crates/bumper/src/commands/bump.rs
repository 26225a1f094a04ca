//! Bump command: write a pending bump record.

use std::collections::BTreeMap;

use anyhow::{Context, bail};
use clap::Args;
use owo_colors::OwoColorize;
use tracing::{debug, instrument};

use bumper_core::records;
use bumper_core::{BumpLevel, Config, Workspace};

/// Arguments for the `bump` subcommand.
#[derive(Args, Debug, Default)]
pub struct BumpArgs {
    /// Release group to bump (repeatable; defaults to the only configured group)
    #[arg(short, long = "group", value_name = "GROUP")]
    pub groups: Vec<String>,

    /// Breaking change
    #[arg(long)]
    pub major: bool,

    /// New functionality
    #[arg(long)]
    pub minor: bool,

    /// Bug fix
    #[arg(long)]
    pub patch: bool,

    /// Changelog entry
    #[arg(short, long, value_name = "TEXT", required_unless_present = "empty")]
    pub message: Option<String>,

    /// Record a change that needs no release
    #[arg(long, conflicts_with_all = ["groups", "major", "minor", "patch", "message"])]
    pub empty: bool,
}

impl BumpArgs {
    /// The requested level; the highest flag wins.
    pub const fn level(&self) -> BumpLevel {
        if self.major {
            BumpLevel::Major
        } else if self.minor {
            BumpLevel::Minor
        } else if self.patch {
            BumpLevel::Patch
        } else {
            BumpLevel::None
        }
    }
}

/// Execute the bump command.
#[instrument(name = "cmd_bump", skip_all, fields(groups = ?args.groups, empty = args.empty))]
pub fn cmd_bump(args: BumpArgs, workspace: &Workspace, config: &Config) -> anyhow::Result<()> {
    super::ensure_valid(config)?;
    let annotations = if args.empty {
        BTreeMap::new()
    } else {
        annotations_for(&args, config)?
    };
    let body = args.message.as_deref().unwrap_or_default();
    debug!(?annotations, "writing bump record");

    let path =
        records::write_new(workspace, &annotations, body).context("failed to write bump record")?;
    let shown = path
        .strip_prefix(workspace.root())
        .map_or_else(|_| path.clone(), camino::Utf8Path::to_path_buf);
    println!("  {} Created {}", "✓".green(), shown.cyan());
    Ok(())
}

fn annotations_for(args: &BumpArgs, config: &Config) -> anyhow::Result<BTreeMap<String, String>> {
    let level = args.level();
    if level.is_none() {
        bail!("choose a bump level with --major, --minor or --patch (or use --empty)");
    }

    let groups = if args.groups.is_empty() {
        match config.groups.as_slice() {
            [only] => vec![only.name.clone()],
            [] => bail!("no release groups configured (see `bumper create`)"),
            _ => bail!("several release groups are configured; pass --group"),
        }
    } else {
        args.groups.clone()
    };

    let unknown: Vec<&str> = groups
        .iter()
        .filter(|g| !config.has_group(g))
        .map(String::as_str)
        .collect();
    if !unknown.is_empty() {
        bail!("unknown release group(s): {}", unknown.join(", "));
    }

    Ok(groups
        .into_iter()
        .map(|g| (g, level.as_str().to_string()))
        .collect())
}
