//! # Backup Driver
//!
//! Composes the whole snapshot pipeline: resolve → key → lock → reserve →
//! copy → finalize → rotate. The driver itself is single-threaded; the only
//! parallelism is the Phase-E worker pool inside [`crate::copy`], plus the
//! lock refresher thread.
//!
//! Failure discipline:
//!
//! - anything that fails before `.done` is written causes the entire
//!   snapshot directory (and an orphaned date directory) to be removed;
//! - per-file Phase-E failures accumulate into [`BackupResult`]; the
//!   snapshot still completes and is kept as evidence, and the invoker
//!   surfaces the partial result as a critical exit;
//! - rotation failures are logged, never propagated.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::{Local, Utc};
use log::{debug, info, warn};

use crate::cancel::CancelToken;
use crate::config::Config;
use crate::copy;
use crate::error::{Error, Result};
use crate::exclude::ExcludeList;
use crate::filesystem;
use crate::git::GitPort;
use crate::lock::{self, LockRecord, RefreshTimer};
use crate::repokey;
use crate::repository;
use crate::rotate;
use crate::snapshot::{self, DONE_MARKER, PARTIAL_MARKER, RESERVE_MARKER};

/// Name of the per-repository lock directory.
pub const LOCK_DIR_NAME: &str = ".backup.lock";

/// Statistics of one backup run.
#[derive(Debug, Clone, Default)]
pub struct BackupResult {
    pub copied_files: usize,
    pub skipped_files: usize,
    pub permission_errs: Vec<String>,
    pub other_errors: Vec<String>,
    /// True when at least one file could not be copied. The snapshot is
    /// still valid (`.done` exists) but incomplete.
    pub partial_success: bool,
}

/// How often a running backup refreshes its lock record.
///
/// One hour by default; `DEVBACK_LOCK_REFRESH_MS` overrides it so tests can
/// exercise the refresher without waiting.
fn lock_refresh_interval() -> Duration {
    if let Ok(ms) = std::env::var("DEVBACK_LOCK_REFRESH_MS") {
        if let Ok(ms) = ms.trim().parse::<u64>() {
            if ms > 0 {
                return Duration::from_millis(ms);
            }
        }
    }
    Duration::from_secs(60 * 60)
}

/// Runs one backup of the repository containing the current directory.
///
/// Returns the copy statistics; callers decide how to surface
/// `partial_success` (the CLI exits critical, hooks only notify).
pub fn backup(cfg: &Config, git: &dyn GitPort, token: &CancelToken) -> Result<BackupResult> {
    if cfg.backup_dir.as_os_str().is_empty() {
        return Err(Error::usage(
            "backup.base_dir not configured (run: devback init --backup-dir <path>)",
        ));
    }
    token.check()?;

    log_config(cfg);

    let repo_root = repository::resolve_repo_root(git)?;
    repository::ensure_git_repo(git, &repo_root)?;
    let repo_key = repokey::derive_repo_key(cfg, git, &repo_root);
    debug!("repository key: {}", repo_key);

    if cfg.dry_run {
        return dry_run_flow(cfg, git, &repo_root, &repo_key);
    }

    let repo_dir = ensure_backup_dirs(&cfg.backup_dir, &repo_key)?;

    let lock_dir = repo_dir.join(LOCK_DIR_NAME);
    let record = LockRecord::for_current_process(&repo_root, &cfg.backup_dir);
    let guard = lock::acquire(&lock_dir, &record)?;
    let timer = RefreshTimer::start(lock_dir.clone(), lock_refresh_interval());

    let outcome = run_snapshot(cfg, git, &repo_root, &repo_dir, token);

    drop(timer); // stop refreshing before the lock goes away
    drop(guard);
    outcome
}

fn log_config(cfg: &Config) {
    debug!("backup directory: {}", cfg.backup_dir.display());
    debug!(
        "retention: keep_count={} keep_days={} max_total_gb={} size_margin_mb={} no_size={}",
        cfg.keep_count, cfg.keep_days, cfg.max_total_gb, cfg.size_margin_mb, cfg.no_size
    );
    debug!(
        "repo key style: {} (auto_remote_merge={}, remote_hash_len={})",
        cfg.key_style, cfg.auto_remote_merge, cfg.remote_hash_len
    );
}

fn ensure_backup_dirs(backup_dir: &Path, repo_key: &str) -> Result<PathBuf> {
    filesystem::ensure_dir(backup_dir)
        .map_err(|e| Error::critical(format!("ensure backup root: {}", e)))?;
    // The key may contain `/` and introduce intermediate directories.
    let repo_dir = backup_dir.join(repo_key);
    filesystem::ensure_dir(&repo_dir)
        .map_err(|e| Error::critical(format!("ensure repo dir: {}", e)))?;
    Ok(repo_dir)
}

/// Removes the snapshot tree (and an emptied date dir) unless disarmed.
struct SnapshotCleanup {
    path: PathBuf,
    armed: bool,
}

impl SnapshotCleanup {
    fn new(path: &Path) -> SnapshotCleanup {
        SnapshotCleanup {
            path: path.to_path_buf(),
            armed: true,
        }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for SnapshotCleanup {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        debug!("cleaning up partial snapshot: {}", self.path.display());
        let _ = fs::remove_dir_all(&self.path);
        if let Some(parent) = self.path.parent() {
            let _ = filesystem::remove_dir_if_empty(parent);
        }
    }
}

fn run_snapshot(
    cfg: &Config,
    git: &dyn GitPort,
    repo_root: &Path,
    repo_dir: &Path,
    token: &CancelToken,
) -> Result<BackupResult> {
    token.check()?;
    let now = Local::now();
    let date_dir = snapshot::format_date_dir(&now);
    let target = snapshot::reserve_snapshot_dir(repo_dir, &date_dir, &now)?;
    let mut cleanup = SnapshotCleanup::new(&target);

    let partial = target.join(PARTIAL_MARKER);
    fs::write(&partial, b"").map_err(|e| Error::critical(format!("mark partial: {}", e)))?;

    let result = Mutex::new(BackupResult::default());
    if let Err(err) = copy_snapshot(git, repo_root, &target, &result, token) {
        let result = result.into_inner().unwrap_or_else(|p| p.into_inner());
        print_summary(&result);
        return Err(err);
    }
    let result = result.into_inner().unwrap_or_else(|p| p.into_inner());

    let _ = fs::remove_file(&partial);
    fs::write(target.join(DONE_MARKER), b"")
        .map_err(|e| Error::critical(format!("mark done: {}", e)))?;
    let _ = fs::remove_dir_all(target.join(RESERVE_MARKER));
    cleanup.disarm();

    // A cancellation observed this late keeps the completed snapshot but
    // skips rotation.
    if !token.is_cancelled() {
        rotate::rotate_repo(repo_dir, cfg, false, Utc::now());
    }

    info!("backup finished → {}", target.display());
    print_summary(&result);
    Ok(result)
}

fn copy_snapshot(
    git: &dyn GitPort,
    repo_root: &Path,
    target: &Path,
    result: &Mutex<BackupResult>,
    token: &CancelToken,
) -> Result<()> {
    let dirs = repository::resolve_git_dirs(git, repo_root)?;
    let dst_git = target.join(".git");

    debug!("copy {} -> {}", dirs.common_dir.display(), dst_git.display());
    copy::copy_git_dir(&dirs.common_dir, &dst_git, result, token)?;
    copy::strip_worktrees(&dst_git)?;
    info!("✓ .git copied");

    let keep = plan_working_tree_copy(git, repo_root)?;
    token.check()?;
    copy::copy_selected(&keep, repo_root, target, result, token)?;
    if keep.is_empty() {
        info!("no ignored/untracked files to copy (after exclusions)");
    } else {
        info!("✓ copied ignored/untracked: {} item(s)", keep.len());
    }
    Ok(())
}

/// Lists ignored/untracked candidates and filters them through
/// `.devbackignore`.
fn plan_working_tree_copy(git: &dyn GitPort, repo_root: &Path) -> Result<Vec<String>> {
    let excludes = ExcludeList::load(repo_root);
    let all_paths = git.list_ignored_untracked(repo_root)?;
    debug!("raw ignored/untracked from git: {}", all_paths.len());

    let mut keep = Vec::with_capacity(all_paths.len());
    for path in all_paths {
        match excludes.matched_by(&path) {
            Some(pattern) => debug!("skip: {} (matched '{}')", path, pattern),
            None => keep.push(path),
        }
    }
    Ok(keep)
}

fn dry_run_flow(
    cfg: &Config,
    git: &dyn GitPort,
    repo_root: &Path,
    repo_key: &str,
) -> Result<BackupResult> {
    let now = Local::now();
    let snapshot_dir = cfg
        .backup_dir
        .join(repo_key)
        .join(snapshot::format_date_dir(&now))
        .join(snapshot::format_time_dir(&now));
    info!("dry run: backup skipped; would create {}", snapshot_dir.display());

    let dirs = repository::resolve_git_dirs(git, repo_root)?;
    info!(
        "dry run: would copy {} to {}",
        dirs.common_dir.display(),
        snapshot_dir.join(".git").display()
    );

    let keep = plan_working_tree_copy(git, repo_root)?;
    if keep.is_empty() {
        info!("dry run: no ignored/untracked files to copy (after exclusions)");
    } else {
        info!("dry run: would copy ignored/untracked: {} item(s)", keep.len());
    }

    let repo_dir = cfg.backup_dir.join(repo_key);
    if repo_dir.is_dir() {
        rotate::rotate_repo(&repo_dir, cfg, true, Utc::now());
    }

    Ok(BackupResult::default())
}

fn print_summary(result: &BackupResult) {
    if result.skipped_files == 0
        && result.permission_errs.is_empty()
        && result.other_errors.is_empty()
    {
        return;
    }

    warn!("skipped {} file(s) due to errors", result.skipped_files);

    if result.permission_errs.len() > 5 {
        warn!("first 5 permission errors:");
        for err in result.permission_errs.iter().take(5) {
            warn!("  - {}", err);
        }
        warn!("  ... and {} more", result.permission_errs.len() - 5);
    } else {
        for err in &result.permission_errs {
            warn!("  - {}", err);
        }
    }

    for err in &result.other_errors {
        warn!("  - {}", err);
    }

    if result.partial_success {
        warn!("backup completed with warnings: some files were not backed up");
        warn!("consider checking permissions or disk space");
    }
}
