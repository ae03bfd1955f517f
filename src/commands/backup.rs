//! Backup command implementation.
//!
//! Runs one snapshot of the repository containing the current directory,
//! then rotates old snapshots. This is the same code path the git hooks
//! trigger, minus the hook-only suppression logic.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use devback::backup;
use devback::cancel::CancelToken;
use devback::config::expand_home;
use devback::defaults;
use devback::error::Error;
use devback::git::CommandGit;

/// Arguments for the backup command
#[derive(Args, Debug)]
pub struct BackupArgs {
    /// Backup base directory (overrides backup.base_dir from the config)
    #[arg(long, value_name = "PATH", env = "DEVBACK_BACKUP_DIR")]
    pub backup_dir: Option<PathBuf>,

    /// Plan the snapshot and rotation without writing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the backup command
pub fn execute(args: BackupArgs) -> Result<()> {
    let runtime = super::load_runtime()?;
    let mut cfg = runtime.config;
    if let Some(dir) = args.backup_dir {
        cfg.backup_dir = expand_home(&dir.to_string_lossy(), &defaults::home_dir());
    }
    cfg.dry_run = args.dry_run;

    let git = CommandGit::new();
    let token = CancelToken::new();
    let result = backup::backup(&cfg, &git, &token)?;

    println!("Copied {} file(s)", result.copied_files);
    if result.partial_success {
        // The snapshot is kept as evidence, but the run is not a success.
        return Err(Error::critical(format!(
            "backup completed with {} skipped file(s)",
            result.skipped_files
        ))
        .into());
    }
    Ok(())
}
