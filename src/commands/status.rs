//! Status command implementation.

use anyhow::Result;
use clap::Args;

use devback::git::CommandGit;
use devback::output::OutputConfig;
use devback::status::{self, StatusOptions};

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Show only the global configuration
    #[arg(long)]
    pub no_repo: bool,

    /// Scan backups for snapshot count and total size
    #[arg(long)]
    pub scan_backups: bool,
}

/// Execute the status command
pub fn execute(args: StatusArgs, color: &str) -> Result<()> {
    let runtime = super::load_runtime()?;
    let git = CommandGit::new();

    let opts = StatusOptions {
        no_repo: args.no_repo,
        scan_backups: args.scan_backups,
    };
    let report = status::status(
        &opts,
        &runtime.config_file,
        &runtime.config_path,
        runtime.config_exists,
        &runtime.config,
        &git,
    )?;

    let output = OutputConfig::from_env_and_flag(color);
    print!("{}", status::format_status(&report, &output));
    Ok(())
}
