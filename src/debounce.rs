//! # Hook Debounce
//!
//! A rebase fires `post-rewrite` once per rewritten commit, and an
//! interactive rebase can also fire `post-commit` along the way. Backing up
//! on each of those would thrash the disk for minutes. Two mechanisms keep
//! hook-driven backups sane:
//!
//! - A **stamp file** at `<commonGitDir>/devback-backup-stamp` holding the
//!   unix time of the last hook backup. While the stamp is younger than 60
//!   seconds, a new `post-rewrite rebase` backup is suppressed. The stamp is
//!   updated on success *and* failure so a failing rebase sequence does not
//!   retry in a tight loop.
//! - **Rebase detection**: `post-commit` is suppressed outright while
//!   `GIT_REFLOG_ACTION` mentions a rebase or while rebase state
//!   (`rebase-merge/`, `rebase-apply/`, `REBASE_HEAD`) exists under the git
//!   dir; the `post-rewrite` at the end of the sequence covers it.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::debug;

use crate::filesystem;

/// Name of the stamp file inside the common git dir.
pub const STAMP_FILE: &str = "devback-backup-stamp";

/// Suppression window for repeated post-rewrite backups.
pub const DEBOUNCE_SECS: i64 = 60;

/// Path of the stamp file for a resolved repository.
pub fn stamp_path(common_git_dir: &Path) -> PathBuf {
    common_git_dir.join(STAMP_FILE)
}

/// True while an unexpired stamp exists.
///
/// A missing or unparseable stamp means "not active".
pub fn is_debounce_active(stamp: &Path, now: DateTime<Utc>) -> bool {
    let data = match fs::read_to_string(stamp) {
        Ok(data) => data,
        Err(_) => return false,
    };
    let Ok(secs) = data.trim().parse::<i64>() else {
        return false;
    };
    let Some(stamp_time) = DateTime::<Utc>::from_timestamp(secs, 0) else {
        return false;
    };
    now.signed_duration_since(stamp_time).num_seconds() < DEBOUNCE_SECS
}

/// Writes `now` to the stamp file atomically (`.tmp` + rename).
pub fn update_stamp(stamp: &Path, now: DateTime<Utc>) -> std::io::Result<()> {
    filesystem::atomic_write(stamp, now.timestamp().to_string().as_bytes())
}

/// True when the `GIT_REFLOG_ACTION` environment indicates a rebase.
pub fn is_rebase_reflog_action() -> bool {
    std::env::var("GIT_REFLOG_ACTION")
        .map(|action| action.to_lowercase().contains("rebase"))
        .unwrap_or(false)
}

/// True while the repository has rebase state under `git_dir`.
pub fn is_rebase_in_progress(git_dir: &Path) -> bool {
    for marker in ["rebase-merge", "rebase-apply", "REBASE_HEAD"] {
        if filesystem::lexists(&git_dir.join(marker)) {
            debug!("rebase state present: {}", marker);
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_stamp_is_inactive() {
        let tmp = tempdir().unwrap();
        assert!(!is_debounce_active(&tmp.path().join(STAMP_FILE), Utc::now()));
    }

    #[test]
    fn test_fresh_stamp_is_active() {
        let tmp = tempdir().unwrap();
        let stamp = stamp_path(tmp.path());
        let now = Utc::now();
        update_stamp(&stamp, now).unwrap();
        assert!(is_debounce_active(&stamp, now));
        assert!(is_debounce_active(
            &stamp,
            now + chrono::Duration::seconds(DEBOUNCE_SECS - 1)
        ));
    }

    #[test]
    fn test_expired_stamp_is_inactive() {
        let tmp = tempdir().unwrap();
        let stamp = stamp_path(tmp.path());
        let now = Utc::now();
        update_stamp(&stamp, now).unwrap();
        assert!(!is_debounce_active(
            &stamp,
            now + chrono::Duration::seconds(DEBOUNCE_SECS)
        ));
    }

    #[test]
    fn test_garbage_stamp_is_inactive() {
        let tmp = tempdir().unwrap();
        let stamp = stamp_path(tmp.path());
        fs::write(&stamp, "three days ago").unwrap();
        assert!(!is_debounce_active(&stamp, Utc::now()));
        fs::write(&stamp, "").unwrap();
        assert!(!is_debounce_active(&stamp, Utc::now()));
    }

    #[test]
    fn test_stamp_format_is_plain_seconds() {
        let tmp = tempdir().unwrap();
        let stamp = stamp_path(tmp.path());
        let now = Utc::now();
        update_stamp(&stamp, now).unwrap();
        let content = fs::read_to_string(&stamp).unwrap();
        assert_eq!(content, now.timestamp().to_string());
        assert!(!tmp.path().join(format!("{}.tmp", STAMP_FILE)).exists());
    }

    #[test]
    fn test_rebase_state_detection() {
        let tmp = tempdir().unwrap();
        assert!(!is_rebase_in_progress(tmp.path()));

        fs::create_dir(tmp.path().join("rebase-merge")).unwrap();
        assert!(is_rebase_in_progress(tmp.path()));
        fs::remove_dir(tmp.path().join("rebase-merge")).unwrap();

        fs::write(tmp.path().join("REBASE_HEAD"), b"abc\n").unwrap();
        assert!(is_rebase_in_progress(tmp.path()));
    }
}
