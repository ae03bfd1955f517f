//! Key command implementation: print the derived repository key.

use anyhow::Result;
use clap::Args;

use devback::git::CommandGit;
use devback::repokey;
use devback::repository;

/// Arguments for the key command
#[derive(Args, Debug)]
pub struct KeyArgs {}

/// Execute the key command
pub fn execute(_args: KeyArgs) -> Result<()> {
    let runtime = super::load_runtime()?;
    let git = CommandGit::new();

    let repo_root = repository::resolve_repo_root(&git)?;
    repository::ensure_git_repo(&git, &repo_root)?;
    let key = repokey::derive_repo_key(&runtime.config, &git, &repo_root);

    println!("{}", key);
    Ok(())
}
