//! Setup command implementation: configure the current repository.

use anyhow::Result;
use clap::Args;

use devback::git::CommandGit;
use devback::setup::{self, SetupOptions};

/// Arguments for the setup command
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Set backup.slug for slug-based repository keys
    #[arg(long, value_name = "SLUG")]
    pub slug: Option<String>,

    /// Overwrite hooks that devback did not install
    #[arg(long)]
    pub force: bool,

    /// Configure git without installing hooks
    #[arg(long)]
    pub no_hooks: bool,

    /// Show what would be done without making changes
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the setup command
pub fn execute(args: SetupArgs) -> Result<()> {
    let opts = SetupOptions {
        slug: args.slug.unwrap_or_default(),
        force: args.force,
        no_hooks: args.no_hooks,
        dry_run: args.dry_run,
    };
    let git = CommandGit::new();
    setup::setup(&opts, &git)?;
    Ok(())
}
