//! End-to-end tests for linked-worktree repositories.
//!
//! A backup started from a linked worktree must snapshot the *common* git
//! dir (the shared object and ref store), never the worktree's private
//! bookkeeping directory, and the snapshot must not contain `worktrees/`.

mod common;
use common::prelude::*;

use std::fs;
use std::process::Command;

/// Creates a linked worktree next to the fixture repository and returns its
/// path.
fn add_worktree(fixture: &GitFixture) -> std::path::PathBuf {
    let wt = fixture.temp.path().join("wt");
    let status = Command::new("git")
        .args(["worktree", "add", "-b", "feature"])
        .arg(&wt)
        .current_dir(&fixture.repo)
        .env("HOME", fixture.temp.path())
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .status()
        .expect("run git worktree");
    assert!(status.success());
    wt
}

#[test]
fn test_worktree_backup_sources_common_git_dir() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();
    let wt = add_worktree(&fixture);
    fs::write(wt.join("wt-scratch.txt"), "worktree untracked").unwrap();

    fixture
        .devback()
        .current_dir(&wt)
        .args(["backup"])
        .assert()
        .code(0);

    let snapshots = fixture.done_snapshots();
    assert_eq!(snapshots.len(), 1);
    let snap = &snapshots[0];

    // The real object store came along: HEAD, refs, objects all live in the
    // common dir, not in the per-worktree gitdir.
    assert!(snap.join(".git/HEAD").is_file());
    assert!(snap.join(".git/refs").is_dir());

    // Linked-worktree bookkeeping is stripped.
    assert!(!snap.join(".git/worktrees").exists());

    // The worktree's own files were copied.
    assert_eq!(
        fs::read_to_string(snap.join("wt-scratch.txt")).unwrap(),
        "worktree untracked"
    );
}

#[test]
fn test_worktree_and_main_repo_have_distinct_keys() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();
    let wt = add_worktree(&fixture);

    let main_key = {
        let out = fixture.devback().args(["key"]).output().unwrap();
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    };
    let wt_key = {
        let out = fixture
            .devback()
            .current_dir(&wt)
            .args(["key"])
            .output()
            .unwrap();
        String::from_utf8(out.stdout).unwrap().trim().to_string()
    };

    // Different roots hash differently under name+hash.
    assert_ne!(main_key, wt_key);
}

#[test]
fn test_worktree_hook_stamp_lands_in_common_dir() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();
    let wt = add_worktree(&fixture);
    fixture.git(&["config", "backup.enabled", "true"]);

    fixture
        .devback()
        .current_dir(&wt)
        .args(["hook", "post-rewrite", "rebase", "--no-notify"])
        .assert()
        .code(0);

    // The debounce stamp is shared across worktrees, so it lives in the
    // common git dir.
    assert!(fixture.repo.join(".git/devback-backup-stamp").is_file());
    assert!(!fixture
        .repo
        .join(".git/worktrees/wt/devback-backup-stamp")
        .exists());
}
