//! Library interface for the `bumper` CLI.
//!
//! This crate exposes the CLI's argument parser and command structure as a library,
//! primarily for documentation generation and testing. The actual entry point is
//! in `main.rs`.
//!
//! # Structure
//!
//! - [`Cli`] - The root argument parser (clap derive)
//! - [`Commands`] - Available subcommands
//! - [`commands`] - Command implementations
//!
//! # Documentation Generation
//!
//! The [`command()`] function returns the clap `Command` for generating man pages
//! and shell completions via `xtask`.

pub mod commands;

use clap::{CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Color output preference.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum)]
pub enum ColorChoice {
    /// Detect terminal capabilities automatically.
    #[default]
    Auto,
    /// Always emit colors.
    Always,
    /// Never emit colors.
    Never,
}

impl ColorChoice {
    /// Set the global color override. Call once at startup.
    pub fn apply(self) {
        match self {
            Self::Auto => {}
            Self::Always => owo_colors::set_override(true),
            Self::Never => owo_colors::set_override(false),
        }
    }

    /// Whether log output on stderr may use ANSI escapes.
    pub fn stderr_ansi(self) -> bool {
        use std::io::IsTerminal;
        match self {
            Self::Auto => std::io::stderr().is_terminal(),
            Self::Always => true,
            Self::Never => false,
        }
    }
}

const ENV_HELP: &str = "\
ENVIRONMENT VARIABLES:
    RUST_LOG            Log filter (e.g., debug, bumper_core=trace)
    BUMPER_LOG_PATH     Explicit log file path
    BUMPER_LOG_DIR      Log directory
";

/// Command-line interface definition for bumper.
#[derive(Parser)]
#[command(name = "bumper")]
#[command(
    about = "Version bumps and changelogs for release groups, with prerelease trains",
    long_about = None
)]
#[command(version)]
#[command(after_long_help = ENV_HELP)]
pub struct Cli {
    /// The subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file (merged over workspace config)
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Run as if started in DIR
    #[arg(short = 'C', long, global = true)]
    pub chdir: Option<PathBuf>,

    /// Only print errors (suppresses warnings/info)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// More detail (repeatable; e.g. -vv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Colorize output
    #[arg(long, global = true, value_enum, default_value_t)]
    pub color: ColorChoice,

    /// Output as JSON (for scripting)
    #[arg(long, global = true)]
    pub json: bool,
}

/// Available subcommands for the CLI.
#[derive(Subcommand)]
pub enum Commands {
    /// Create a .bumper workspace in the current directory
    Init(commands::init::InitArgs),

    /// Add release groups to the workspace configuration
    Create(commands::create::CreateArgs),

    /// Record a pending version bump
    Bump(commands::bump::BumpArgs),

    /// Apply pending bumps: set versions and amend changelogs
    Commit(commands::commit::CommitArgs),

    /// Print a release group's current version
    Current(commands::current::CurrentArgs),

    /// Print the version the next commit would produce
    Next(commands::next::NextArgs),

    /// Print release notes for a version
    Cat(commands::cat::CatArgs),

    /// Manage prerelease trains
    Pre(commands::pre::PreArgs),

    /// Built-in changelog commands used as group defaults
    Builtins(commands::builtins::BuiltinsArgs),
}

impl Commands {
    /// Whether the command runs before a workspace exists.
    pub const fn creates_workspace(&self) -> bool {
        matches!(self, Self::Init(_))
    }
}

/// Returns the clap command for documentation generation
pub fn command() -> clap::Command {
    Cli::command()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_nested_pre_commands() {
        let cli =
            Cli::try_parse_from(["bumper", "pre", "enter", "api", "--tag", "beta"]).unwrap();
        let Commands::Pre(args) = cli.command else {
            panic!("expected pre");
        };
        assert!(matches!(
            args.command,
            commands::pre::PreCommand::Enter { ref group, ref tag }
                if group == "api" && tag == "beta"
        ));
    }

    #[test]
    fn parses_builtin_names() {
        let cli = Cli::try_parse_from([
            "bumper",
            "builtins",
            "amendlog:default",
            "--group",
            "api",
            "--version",
            "1.0.0",
            "--patch",
            "-v2 fixed",
            "--patch",
            "other",
        ])
        .unwrap();
        let Commands::Builtins(args) = cli.command else {
            panic!("expected builtins");
        };
        let commands::builtins::BuiltinCommand::AmendLog(amend) = args.command else {
            panic!("expected amendlog:default");
        };
        assert_eq!(amend.release, "1.0.0");
        assert_eq!(amend.patch, vec!["-v2 fixed", "other"]);
    }

    #[test]
    fn global_flags_after_subcommand() {
        let cli =
            Cli::try_parse_from(["bumper", "next", "--group", "api", "--json", "-vv"]).unwrap();
        assert!(cli.json);
        assert_eq!(cli.verbose, 2);
    }
}
