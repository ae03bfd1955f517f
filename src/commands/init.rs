//! Init command implementation: create the global configuration file.

use anyhow::Result;
use clap::Args;

use devback::defaults;
use devback::init::{self, InitOptions};

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Backup base directory to record in the config
    #[arg(long, value_name = "PATH")]
    pub backup_dir: Option<String>,

    /// Replace an existing config (the old file is kept as .bak)
    #[arg(long)]
    pub force: bool,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the init command
pub fn execute(args: InitArgs) -> Result<()> {
    let opts = InitOptions {
        backup_dir: args.backup_dir.unwrap_or_default(),
        force: args.force,
        dry_run: args.dry_run,
    };
    init::init(&opts, &defaults::config_path())?;
    Ok(())
}
