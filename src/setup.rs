//! # Repository Setup
//!
//! Configures the current repository for automatic backups: sets
//! `backup.enabled = true` in git config, optionally records a `backup.slug`
//! for key derivation, and installs the hook scripts.
//!
//! Linked worktrees need two twists. Config writes go to the worktree scope
//! (after enabling `extensions.worktreeConfig`) so that enabling backups in
//! one worktree does not silently enable them everywhere. Hooks, on the
//! other hand, are shared: they are always installed under
//! `<commonGitDir>/hooks`, because that is where git looks for them from
//! every attached worktree.

use std::fs;
use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::git::GitPort;
use crate::repository;
use crate::templates;

/// Options for [`setup`].
#[derive(Debug, Clone, Default)]
pub struct SetupOptions {
    /// Optional `backup.slug` value to record.
    pub slug: String,
    /// Overwrite hooks that devback did not install.
    pub force: bool,
    /// Configure git without touching hooks.
    pub no_hooks: bool,
    /// Plan the changes without writing anything.
    pub dry_run: bool,
}

/// Configures the repository containing the current directory.
pub fn setup(opts: &SetupOptions, git: &dyn GitPort) -> Result<()> {
    let repo_root = repository::resolve_repo_root(git)?;
    repository::ensure_git_repo(git, &repo_root)?;
    let dirs = repository::resolve_git_dirs(git, &repo_root)?;

    configure_git(opts, git, &repo_root, dirs.is_worktree)?;

    if opts.no_hooks {
        info!("skipping hook installation (--no-hooks)");
        return Ok(());
    }
    install_hooks(opts, &dirs.common_dir)
}

fn configure_git(
    opts: &SetupOptions,
    git: &dyn GitPort,
    repo_root: &Path,
    is_worktree: bool,
) -> Result<()> {
    let scope = if is_worktree { "worktree" } else { "local" };
    if opts.dry_run {
        info!("dry run: would set backup.enabled=true ({} config)", scope);
        if !opts.slug.trim().is_empty() {
            info!("dry run: would set backup.slug={}", opts.slug.trim());
        }
        return Ok(());
    }

    if is_worktree {
        // Worktree-scoped config only works once the extension is on.
        git.config_set(repo_root, "extensions.worktreeConfig", "true")?;
        git.config_set_worktree(repo_root, "backup.enabled", "true")?;
        if !opts.slug.trim().is_empty() {
            git.config_set_worktree(repo_root, "backup.slug", opts.slug.trim())?;
        }
    } else {
        git.config_set(repo_root, "backup.enabled", "true")?;
        if !opts.slug.trim().is_empty() {
            git.config_set(repo_root, "backup.slug", opts.slug.trim())?;
        }
    }
    info!("✓ backup.enabled=true ({} config)", scope);
    Ok(())
}

fn install_hooks(opts: &SetupOptions, common_git_dir: &Path) -> Result<()> {
    let hooks_dir = common_git_dir.join("hooks");
    if !opts.dry_run {
        filesystem::ensure_dir(&hooks_dir)
            .map_err(|e| Error::critical(format!("create hooks dir: {}", e)))?;
    }

    for name in templates::HOOK_NAMES {
        let script = templates::hook_script(name).expect("known hook name");
        let path = hooks_dir.join(name);

        match hook_state(&path) {
            HookState::Ours => {
                if opts.dry_run {
                    info!("dry run: would refresh hook {}", name);
                    continue;
                }
            }
            HookState::Foreign if !opts.force => {
                warn!(
                    "hook {} exists and was not installed by devback; use --force to overwrite",
                    name
                );
                continue;
            }
            HookState::Foreign => {
                info!("overwriting existing hook {} (--force)", name);
            }
            HookState::Missing => {}
        }

        if opts.dry_run {
            info!("dry run: would install hook {}", name);
            continue;
        }
        fs::write(&path, script)
            .map_err(|e| Error::critical(format!("write hook {}: {}", name, e)))?;
        filesystem::set_mode(&path, 0o755)
            .map_err(|e| Error::critical(format!("chmod hook {}: {}", name, e)))?;
        info!("✓ installed hook {}", name);
    }
    Ok(())
}

enum HookState {
    Missing,
    Ours,
    Foreign,
}

fn hook_state(path: &Path) -> HookState {
    match fs::read_to_string(path) {
        Ok(content) if content.contains(templates::HOOK_MARKER) => HookState::Ours,
        Ok(_) => HookState::Foreign,
        Err(_) => HookState::Missing,
    }
}

/// True when every devback hook is installed under `common_git_dir/hooks`.
pub fn hooks_installed(common_git_dir: &Path) -> bool {
    templates::HOOK_NAMES.iter().all(|name| {
        matches!(
            hook_state(&common_git_dir.join("hooks").join(name)),
            HookState::Ours
        )
    })
}
