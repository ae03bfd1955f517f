//! # Copy Engine
//!
//! Two copy strategies feed one snapshot:
//!
//! - **Phase A** ([`copy_git_dir`]): a sequential recursive copy of the
//!   common git dir into `<snapshot>/.git`, preserving directory modes,
//!   symlinks (without following), and file permission bits. The inner
//!   `worktrees/` subtree is stripped afterwards so linked-worktree
//!   bookkeeping never pollutes a snapshot.
//! - **Phase E** ([`copy_selected`]): a parallel copy of the filtered
//!   ignored/untracked paths, fanned out over `2 × logical CPUs` workers fed
//!   through a bounded FIFO channel.
//!
//! Failure accounting differs by phase: a non-permission failure in Phase A
//! aborts the snapshot, while Phase E only accumulates into the
//! [`BackupResult`]; the snapshot still completes and is kept as evidence.

use std::fs;
use std::io;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;

use log::{debug, warn};
use walkdir::WalkDir;

use crate::backup::BackupResult;
use crate::cancel::CancelToken;
use crate::error::{Error, Result};
use crate::filesystem;

/// Records one failed path into the result counters.
fn record_error(result: &Mutex<BackupResult>, label: &str, err: &io::Error) {
    let msg = format!("{}: {}", label, err);
    warn!("{}", msg);
    let mut result = result.lock().unwrap();
    result.skipped_files += 1;
    if filesystem::is_permission(err) {
        result.permission_errs.push(msg);
    } else {
        result.other_errors.push(msg);
    }
    result.partial_success = true;
}

fn record_copied(result: &Mutex<BackupResult>) {
    result.lock().unwrap().copied_files += 1;
}

/// Recursively copies `src` into `dst`, preserving entry types and modes.
///
/// Every failure is recorded; when any *non-permission* failure occurred the
/// function returns `Critical` so the caller can discard the snapshot.
pub fn copy_git_dir(
    src: &Path,
    dst: &Path,
    result: &Mutex<BackupResult>,
    token: &CancelToken,
) -> Result<()> {
    let mut fatal = 0usize;
    for entry in WalkDir::new(src).follow_links(false) {
        token.check()?;
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                let label = err
                    .path()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(|| src.display().to_string());
                let io_err = err
                    .into_io_error()
                    .unwrap_or_else(|| io::Error::other("walk failed"));
                if !filesystem::is_permission(&io_err) {
                    fatal += 1;
                }
                record_error(result, &label, &io_err);
                continue;
            }
        };
        let rel = match entry.path().strip_prefix(src) {
            Ok(rel) => rel,
            Err(_) => continue,
        };
        let target = dst.join(rel);
        if let Err(err) = copy_entry(entry.path(), &target, result) {
            if !filesystem::is_permission(&err) {
                fatal += 1;
            }
            record_error(result, &entry.path().display().to_string(), &err);
        }
    }

    if fatal > 0 {
        return Err(Error::critical(format!(
            "failed to copy {} item(s) from {}",
            fatal,
            src.display()
        )));
    }
    Ok(())
}

fn copy_entry(path: &Path, target: &Path, result: &Mutex<BackupResult>) -> io::Result<()> {
    let meta = fs::symlink_metadata(path)?;
    if meta.is_dir() {
        fs::create_dir_all(target)?;
        filesystem::set_mode(target, filesystem::mode_of(&meta))?;
        return Ok(());
    }
    if meta.file_type().is_symlink() {
        let link_target = fs::read_link(path)?;
        if let Some(parent) = target.parent() {
            filesystem::ensure_dir(parent)?;
        }
        filesystem::replace_symlink(&link_target, target)?;
        return Ok(());
    }
    if let Some(parent) = target.parent() {
        filesystem::ensure_dir(parent)?;
    }
    filesystem::copy_file(path, target, filesystem::mode_of(&meta))?;
    record_copied(result);
    Ok(())
}

/// Removes `<dst_git>/worktrees/` unconditionally.
pub fn strip_worktrees(dst_git: &Path) -> Result<()> {
    let worktrees = dst_git.join("worktrees");
    match fs::remove_dir_all(&worktrees) {
        Ok(()) => {
            debug!("removed .git/worktrees from snapshot");
            Ok(())
        }
        Err(err) if filesystem::is_not_found(&err) => Ok(()),
        Err(err) => Err(Error::critical(format!(
            "remove worktrees dir: {}",
            err
        ))),
    }
}

/// Copies the surviving repo-relative `paths` from `src_root` into
/// `dst_root` using a bounded worker pool.
///
/// Individual failures are accumulated into `result` and never abort the
/// run; only cancellation surfaces as an error.
pub fn copy_selected(
    paths: &[String],
    src_root: &Path,
    dst_root: &Path,
    result: &Mutex<BackupResult>,
    token: &CancelToken,
) -> Result<()> {
    if paths.is_empty() {
        return Ok(());
    }

    let workers = (num_cpus::get() * 2).max(1);
    let (tx, rx) = mpsc::sync_channel::<&str>(workers * 2);
    let rx = Mutex::new(rx);

    thread::scope(|scope| {
        for _ in 0..workers {
            scope.spawn(|| loop {
                let job = rx.lock().unwrap().recv();
                let Ok(rel) = job else { return };
                // Keep draining after cancellation so the bounded sender can
                // never wedge on a full queue; just stop doing the work.
                if token.is_cancelled() {
                    continue;
                }
                copy_one(src_root, dst_root, rel, result);
            });
        }
        for rel in paths {
            if token.is_cancelled() {
                break;
            }
            if tx.send(rel.as_str()).is_err() {
                break;
            }
        }
        drop(tx);
    });

    token.check()
}

fn copy_one(src_root: &Path, dst_root: &Path, rel: &str, result: &Mutex<BackupResult>) {
    let src = src_root.join(rel);
    let dst = dst_root.join(rel);

    let meta = match fs::symlink_metadata(&src) {
        Ok(meta) => meta,
        Err(err) => {
            // Listed by git but gone by the time we got here.
            record_error(result, rel, &err);
            return;
        }
    };

    if meta.is_dir() {
        // Git's listing already enumerates contained files.
        if let Err(err) = fs::create_dir_all(&dst) {
            record_error(result, rel, &err);
        }
        return;
    }

    if meta.file_type().is_symlink() {
        if let Err(err) = copy_selected_symlink(&src, &dst) {
            record_error(result, rel, &err);
        }
        return;
    }

    if let Err(err) = dst
        .parent()
        .map(filesystem::ensure_dir)
        .unwrap_or(Ok(()))
        .and_then(|_| filesystem::copy_file(&src, &dst, filesystem::mode_of(&meta)))
    {
        record_error(result, rel, &err);
        return;
    }
    record_copied(result);
    debug!("copied: {}", rel);
}

fn copy_selected_symlink(src: &Path, dst: &Path) -> io::Result<()> {
    if let Some(parent) = dst.parent() {
        filesystem::ensure_dir(parent)?;
    }
    let link_target = fs::read_link(src)?;
    filesystem::replace_symlink(&link_target, dst)
}
