//! # Snapshot Layout
//!
//! One snapshot is one `<backupRoot>/<repoKey>/<YYYY-MM-DD>/<HHMMSS-NNNNNNNNN>`
//! directory. Three markers describe its state:
//!
//! - `.reserve`: a *directory*, present while a running process owns the
//!   snapshot. Created atomically during reservation.
//! - `.partial`: an empty file, present while the copy is in flight.
//! - `.done`: an empty file, present only after a successful copy.
//!
//! A snapshot is valid iff `.done` exists; listing, rotation, and size
//! accounting all key off that single file. `.reserve` being a directory
//! while the other two are files is deliberate: `mkdir` is the one primitive
//! that is atomic even on NFS-like filesystems, and external recovery tools
//! distinguish the markers by type.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, Timelike};
use log::warn;
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::filesystem;

/// Name of the in-progress reservation marker (a directory).
pub const RESERVE_MARKER: &str = ".reserve";
/// Name of the copy-in-flight marker (an empty file).
pub const PARTIAL_MARKER: &str = ".partial";
/// Name of the completion marker (an empty file).
pub const DONE_MARKER: &str = ".done";

/// A completed snapshot found under a repository's backup directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// The containing `YYYY-MM-DD` directory.
    pub date_dir: PathBuf,
    /// The snapshot's own `HHMMSS-NNNNNNNNN[-NN]` directory.
    pub time_dir: PathBuf,
    /// Path of the `.done` marker.
    pub done: PathBuf,
}

/// Formats the date directory name for `now`.
pub fn format_date_dir(now: &DateTime<Local>) -> String {
    now.format("%Y-%m-%d").to_string()
}

/// Formats the base time directory name for `now`: `HHMMSS-NNNNNNNNN`.
pub fn format_time_dir(now: &DateTime<Local>) -> String {
    format!("{}-{:09}", now.format("%H%M%S"), now.nanosecond())
}

/// True for names shaped like `YYYY-MM-DD`.
pub fn match_date_dir(name: &str) -> bool {
    let bytes = name.as_bytes();
    if bytes.len() != 10 || bytes[4] != b'-' || bytes[7] != b'-' {
        return false;
    }
    [0, 1, 2, 3, 5, 6, 8, 9]
        .iter()
        .all(|&i| bytes[i].is_ascii_digit())
}

/// True for names shaped like `HHMMSS`, `HHMMSS-NNNNNNNNN`, or with any
/// further numeric `-NN` collision suffixes.
pub fn match_time_dir(name: &str) -> bool {
    let mut parts = name.split('-');
    let Some(first) = parts.next() else {
        return false;
    };
    if first.len() != 6 || !first.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    parts.all(|p| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()))
}

/// Lists every completed snapshot under `repo_dir`, ordered by time directory
/// name ascending (which is chronological by construction).
pub fn list_snapshots(repo_dir: &Path) -> io::Result<Vec<Snapshot>> {
    let mut snaps = Vec::new();
    for date_entry in fs::read_dir(repo_dir)? {
        let date_entry = date_entry?;
        let name = date_entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if !match_date_dir(name) || !date_entry.file_type()?.is_dir() {
            continue;
        }
        let date_dir = date_entry.path();
        let Ok(time_entries) = fs::read_dir(&date_dir) else {
            continue;
        };
        for time_entry in time_entries.flatten() {
            let tname = time_entry.file_name();
            let Some(tname) = tname.to_str() else { continue };
            if !match_time_dir(tname) {
                continue;
            }
            match time_entry.file_type() {
                Ok(ft) if ft.is_dir() => {}
                _ => continue,
            }
            let time_dir = time_entry.path();
            let done = time_dir.join(DONE_MARKER);
            if done.is_file() {
                snaps.push(Snapshot {
                    date_dir: date_dir.clone(),
                    time_dir,
                    done,
                });
            }
        }
    }
    snaps.sort_by(|a, b| a.time_dir.cmp(&b.time_dir));
    Ok(snaps)
}

/// Reserves a uniquely named snapshot directory under
/// `<repo_dir>/<date_dir>/`.
///
/// The reservation protocol uses two exclusive `mkdir`s: first the candidate
/// time directory itself, then the `.reserve` directory (mode 0700) inside
/// it. Either existing already means another process claimed that name, and
/// the next candidate (`-01` … `-99`) is tried. Two processes on the same
/// filesystem can therefore never both own one time directory, even where
/// `mkdir` is the only atomic primitive available.
pub fn reserve_snapshot_dir(
    repo_dir: &Path,
    date_dir: &str,
    now: &DateTime<Local>,
) -> Result<PathBuf> {
    let base = format_time_dir(now);
    filesystem::ensure_dir(&repo_dir.join(date_dir))
        .map_err(|e| Error::critical(format!("ensure date dir: {}", e)))?;

    for i in 0..100 {
        let time_dir = if i == 0 {
            base.clone()
        } else {
            format!("{}-{:02}", base, i)
        };
        let target = repo_dir.join(date_dir).join(&time_dir);
        if let Err(err) = filesystem::create_dir_exclusive(&target, 0o755) {
            if filesystem::is_already_exists(&err) {
                continue;
            }
            return Err(Error::critical(format!(
                "create snapshot dir {}: {}",
                target.display(),
                err
            )));
        }
        let reserve = target.join(RESERVE_MARKER);
        if let Err(err) = filesystem::create_dir_exclusive(&reserve, 0o700) {
            let _ = fs::remove_dir_all(&target);
            if filesystem::is_already_exists(&err) {
                continue;
            }
            return Err(Error::critical(format!(
                "create reserve marker {}: {}",
                reserve.display(),
                err
            )));
        }
        return Ok(target);
    }
    Err(Error::critical(
        "failed to create a unique snapshot directory after 100 attempts",
    ))
}

/// Sums the sizes of all regular files under `root`, in KiB rounded up.
///
/// This is logical file size, not disk allocation; sparse files may be
/// under-counted. Walk errors are logged and skipped so that one unreadable
/// entry does not abort rotation.
pub fn dir_size_kb(root: &Path) -> i64 {
    let mut total: i64 = 0;
    for entry in WalkDir::new(root).follow_links(false) {
        match entry {
            Ok(entry) => {
                if entry.file_type().is_file() {
                    if let Ok(meta) = entry.metadata() {
                        total += meta.len() as i64;
                    }
                }
            }
            Err(err) => warn!("walk {}: {}", root.display(), err),
        }
    }
    (total + 1023) / 1024
}

/// Renders a KiB count as a human-readable size.
pub fn human_kb(kb: i64) -> String {
    const KB_IN_GB: i64 = 1024 * 1024;
    if kb >= KB_IN_GB {
        format!("{:.2} GiB", kb as f64 / KB_IN_GB as f64)
    } else if kb >= 1024 {
        format!("{:.2} MiB", kb as f64 / 1024.0)
    } else {
        format!("{} KiB", kb)
    }
}
