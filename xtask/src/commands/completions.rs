use std::fs;
use std::path::PathBuf;

use clap::Args;
use clap_complete::{Shell, generate_to};

#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// Output directory, relative to the workspace root
    #[arg(long = "out-dir", default_value = "dist/share/completions")]
    pub out_dir: PathBuf,

    /// Generate only for one shell (default: bash, zsh, fish, powershell and elvish)
    #[arg(long, value_enum)]
    pub shell: Option<Shell>,
}

pub fn cmd_completions(args: CompletionsArgs) -> Result<(), String> {
    let out_dir = crate::workspace_root().join(args.out_dir);
    fs::create_dir_all(&out_dir).map_err(|e| format!("{}: {e}", out_dir.display()))?;

    let shells = args.shell.map_or_else(
        || {
            vec![
                Shell::Bash,
                Shell::Zsh,
                Shell::Fish,
                Shell::PowerShell,
                Shell::Elvish,
            ]
        },
        |shell| vec![shell],
    );

    let mut cli = bumper::command();
    for shell in shells {
        let path = generate_to(shell, &mut cli, crate::BIN_NAME, &out_dir)
            .map_err(|e| format!("{shell} completions: {e}"))?;
        println!("wrote {}", path.display());
    }
    Ok(())
}
