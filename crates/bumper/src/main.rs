//! bumper CLI
#![deny(unsafe_code)]

use anyhow::Context;
use bumper::{Cli, Commands, commands};
use bumper_core::config::ConfigLoader;
use bumper_core::{Config, Workspace};
use camino::Utf8PathBuf;
use clap::Parser;
use tracing::debug;

mod observability;

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    cli.color.apply();

    if let Some(ref dir) = cli.chdir {
        std::env::set_current_dir(dir)
            .with_context(|| format!("failed to change directory to {}", dir.display()))?;
    }

    let cwd = std::env::current_dir().context("failed to determine current directory")?;
    let cwd = Utf8PathBuf::try_from(cwd).map_err(|e| {
        anyhow::anyhow!(
            "current directory is not valid UTF-8: {}",
            e.into_path_buf().display()
        )
    })?;
    let explicit_config = cli
        .config
        .clone()
        .map(|path| {
            Utf8PathBuf::try_from(path).map_err(|e| {
                anyhow::anyhow!(
                    "config path is not valid UTF-8: {}",
                    e.into_path_buf().display()
                )
            })
        })
        .transpose()?;

    let workspace = if cli.command.creates_workspace() {
        None
    } else {
        let workspace = Workspace::discover(&cwd)
            .context("not inside a bumper workspace (run `bumper init`)")?;
        Some(workspace)
    };

    let mut loader = ConfigLoader::new();
    if let Some(ref ws) = workspace {
        loader = loader.with_workspace(ws);
    }
    if let Some(ref path) = explicit_config {
        loader = loader.with_file(path);
    }
    let config: Config = loader.load().context("failed to load configuration")?;

    let obs_config = observability::ObservabilityConfig::new(
        config
            .log_dir
            .as_ref()
            .map(|dir| dir.as_std_path().to_path_buf()),
        cli.color.stderr_ansi(),
    );
    let file_filter = observability::env_filter(cli.quiet, cli.verbose, config.log_level.as_str());
    let stderr_level = observability::stderr_level(cli.quiet, cli.verbose);
    let _guard = observability::init_observability(&obs_config, file_filter, stderr_level)
        .context("failed to initialize logging/tracing")?;

    debug!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        json = cli.json,
        color = ?cli.color,
        workspace = ?workspace.as_ref().map(Workspace::root),
        "CLI initialized"
    );

    let result = dispatch(cli.command, &cwd, workspace.as_ref(), &config, cli.json);
    if let Err(ref err) = result {
        tracing::error!(error = %err, "fatal error");
    }
    result
}

fn dispatch(
    command: Commands,
    cwd: &camino::Utf8Path,
    workspace: Option<&Workspace>,
    config: &Config,
    json: bool,
) -> anyhow::Result<()> {
    let ws = || workspace.context("not inside a bumper workspace");
    match command {
        Commands::Init(args) => commands::init::cmd_init(args, cwd),
        Commands::Create(args) => commands::create::cmd_create(args, ws()?),
        Commands::Bump(args) => commands::bump::cmd_bump(args, ws()?, config),
        Commands::Commit(args) => commands::commit::cmd_commit(args, json, ws()?, config),
        Commands::Current(args) => commands::current::cmd_current(args, json, ws()?, config),
        Commands::Next(args) => commands::next::cmd_next(args, json, ws()?, config),
        Commands::Cat(args) => commands::cat::cmd_cat(args, ws()?, config),
        Commands::Pre(args) => commands::pre::cmd_pre(args, json, ws()?, config),
        Commands::Builtins(args) => commands::builtins::cmd_builtins(args, ws()?, config),
    }
}
