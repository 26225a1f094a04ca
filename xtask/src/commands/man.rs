use std::fs;
use std::path::{Path, PathBuf};

use clap::Args;

#[derive(Args, Debug)]
pub struct ManArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/man/man1")]
    pub out_dir: PathBuf,
}

pub fn cmd_man(args: ManArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let mut cli = bumper::command();
    cli.build();
    write_pages(&out_dir, crate::BIN_NAME, &cli)
}

/// Write `<name>.1` for `cmd`, then recurse into its subcommands as
/// `<name>-<sub>.1` (so `pre enter` becomes `bumper-pre-enter.1`).
fn write_pages(out_dir: &Path, name: &str, cmd: &clap::Command) -> Result<(), String> {
    let mut buffer = Vec::new();
    clap_mangen::Man::new(cmd.clone())
        .render(&mut buffer)
        .map_err(|e| format!("render manpage for {name}: {e}"))?;

    let path = out_dir.join(format!("{name}.1"));
    fs::write(&path, buffer).map_err(|e| format!("{}: {e}", path.display()))?;
    println!("wrote {}", path.display());

    for sub in cmd.get_subcommands().filter(|s| s.get_name() != "help") {
        write_pages(out_dir, &format!("{name}-{}", sub.get_name()), sub)?;
    }
    Ok(())
}
