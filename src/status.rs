//! # Status Reporting
//!
//! Gathers the global configuration and the current repository's backup
//! state into a [`StatusReport`], and renders it for the terminal.
//!
//! Snapshot scanning is opt-in (`--scan-backups`): walking every snapshot to
//! sum sizes can take a while on large backup roots, and the common question
//! is "is this repo configured?", not "how big is everything?".

use std::path::{Path, PathBuf};

use console::style;

use crate::config::{Config, ConfigFile};
use crate::error::Result;
use crate::git::GitPort;
use crate::output::OutputConfig;
use crate::repokey;
use crate::repository;
use crate::setup;
use crate::snapshot;

/// What to include in a status report.
#[derive(Debug, Clone, Default)]
pub struct StatusOptions {
    /// Only report global configuration, even inside a repository.
    pub no_repo: bool,
    /// Walk snapshots to count them and sum their sizes.
    pub scan_backups: bool,
}

/// Repository-scoped part of the report.
#[derive(Debug, Clone)]
pub struct RepoStatus {
    pub root: PathBuf,
    pub repo_key: String,
    pub is_worktree: bool,
    pub enabled: bool,
    pub hooks_installed: bool,
    /// `(count, total KiB)`, present only when scanning was requested.
    pub snapshots: Option<(usize, i64)>,
}

/// Everything `devback status` prints.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub config_path: PathBuf,
    pub config_exists: bool,
    pub backup_dir: PathBuf,
    pub keep_count: i64,
    pub keep_days: i64,
    pub max_total_gb: i64,
    pub no_size: bool,
    pub repo: Option<RepoStatus>,
}

/// Builds the status report.
pub fn status(
    opts: &StatusOptions,
    file: &ConfigFile,
    config_path: &Path,
    config_exists: bool,
    cfg: &Config,
    git: &dyn GitPort,
) -> Result<StatusReport> {
    let mut report = StatusReport {
        config_path: config_path.to_path_buf(),
        config_exists,
        backup_dir: cfg.backup_dir.clone(),
        keep_count: file.backup.keep_count,
        keep_days: file.backup.keep_days,
        max_total_gb: file.backup.max_total_gb,
        no_size: file.backup.no_size,
        repo: None,
    };

    if opts.no_repo {
        return Ok(report);
    }
    let Ok(root) = git.repo_root() else {
        return Ok(report);
    };
    if repository::ensure_git_repo(git, &root).is_err() {
        return Ok(report);
    }

    let dirs = repository::resolve_git_dirs(git, &root)?;
    let repo_key = repokey::derive_repo_key(cfg, git, &root);
    let enabled = read_enabled(git, &root);

    let snapshots = if opts.scan_backups && !cfg.backup_dir.as_os_str().is_empty() {
        let repo_dir = cfg.backup_dir.join(&repo_key);
        let snaps = snapshot::list_snapshots(&repo_dir).unwrap_or_default();
        let total_kb = snaps
            .iter()
            .map(|s| snapshot::dir_size_kb(&s.time_dir))
            .sum();
        Some((snaps.len(), total_kb))
    } else {
        None
    };

    report.repo = Some(RepoStatus {
        root,
        repo_key,
        is_worktree: dirs.is_worktree,
        enabled,
        hooks_installed: setup::hooks_installed(&dirs.common_dir),
        snapshots,
    });
    Ok(report)
}

/// Reads `backup.enabled`, worktree config first, then local, then global.
pub fn read_enabled(git: &dyn GitPort, repo_root: &Path) -> bool {
    let value = git
        .config_get_worktree(repo_root, "backup.enabled")
        .ok()
        .flatten()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| {
            git.config_get(repo_root, "backup.enabled")
                .ok()
                .flatten()
                .filter(|v| !v.trim().is_empty())
        })
        .or_else(|| git.config_get_global("backup.enabled").ok().flatten());
    value.map(|v| parse_bool(&v)).unwrap_or(false)
}

/// Git-style truthiness for `backup.enabled`.
pub fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

/// Renders a report for the terminal.
pub fn format_status(report: &StatusReport, output: &OutputConfig) -> String {
    let paint = |ok: bool, text: String| -> String {
        if !output.use_color {
            return text;
        }
        if ok {
            style(text).green().to_string()
        } else {
            style(text).yellow().to_string()
        }
    };

    let mut out = String::new();
    out.push_str("devback status\n\n");

    out.push_str(&format!(
        "  config:      {} ({})\n",
        report.config_path.display(),
        paint(
            report.config_exists,
            if report.config_exists {
                "present".to_string()
            } else {
                "missing".to_string()
            }
        ),
    ));
    let has_dir = !report.backup_dir.as_os_str().is_empty();
    out.push_str(&format!(
        "  backup dir:  {}\n",
        paint(
            has_dir,
            if has_dir {
                report.backup_dir.display().to_string()
            } else {
                "(not configured)".to_string()
            }
        ),
    ));
    out.push_str(&format!(
        "  retention:   keep {} snapshots, {} days",
        report.keep_count, report.keep_days
    ));
    if report.no_size {
        out.push_str(", size check off\n");
    } else {
        out.push_str(&format!(", max {} GB\n", report.max_total_gb));
    }

    let Some(repo) = &report.repo else {
        out.push_str("\n  (no repository information)\n");
        return out;
    };

    out.push('\n');
    out.push_str(&format!("  repository:  {}\n", repo.root.display()));
    out.push_str(&format!("  repo key:    {}\n", repo.repo_key));
    if repo.is_worktree {
        out.push_str("  worktree:    linked\n");
    }
    out.push_str(&format!(
        "  backups:     {}\n",
        paint(
            repo.enabled,
            if repo.enabled {
                "enabled".to_string()
            } else {
                "disabled (run: devback setup)".to_string()
            }
        ),
    ));
    out.push_str(&format!(
        "  hooks:       {}\n",
        paint(
            repo.hooks_installed,
            if repo.hooks_installed {
                "installed".to_string()
            } else {
                "not installed".to_string()
            }
        ),
    ));
    if let Some((count, total_kb)) = repo.snapshots {
        out.push_str(&format!(
            "  snapshots:   {} ({})\n",
            count,
            snapshot::human_kb(total_kb)
        ));
    }
    out
}
