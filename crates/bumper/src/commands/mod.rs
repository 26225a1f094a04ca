//! Command implementations

pub mod builtins;

pub mod bump;

pub mod cat;

pub mod commit;

pub mod create;

pub mod current;

pub mod init;

pub mod next;

pub mod pre;

use anyhow::Context;
use bumper_core::{Config, ReleaseGroup};

/// Reject configurations with problems before any command runs.
pub fn ensure_valid(config: &Config) -> anyhow::Result<()> {
    config.validate().context("configuration is invalid")
}

/// Look up a configured group by name.
pub fn find_group<'c>(config: &'c Config, name: &str) -> anyhow::Result<&'c ReleaseGroup> {
    config
        .group(name)
        .with_context(|| format!("release group {name:?} not found"))
}
