//! End-to-end tests for `init`, `setup`, and `status`.

mod common;
use common::prelude::*;

use std::fs;

/// `init` writes a config with the requested base dir.
#[test]
fn test_init_writes_config() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new();

    fixture
        .devback()
        .args(["init", "--backup-dir", "~/backups"])
        .assert()
        .code(0);

    let content = fs::read_to_string(&fixture.config).unwrap();
    assert!(content.contains("base_dir = \"~/backups\""));
    assert!(content.contains("keep_count = 30"));

    // A second init without --force refuses (usage error).
    fixture
        .devback()
        .args(["init", "--backup-dir", "~/elsewhere"])
        .assert()
        .code(2);

    // --force replaces and keeps a backup.
    fixture
        .devback()
        .args(["init", "--backup-dir", "~/elsewhere", "--force"])
        .assert()
        .code(0);
    let content = fs::read_to_string(&fixture.config).unwrap();
    assert!(content.contains("~/elsewhere"));
}

/// `init` without --backup-dir is a usage error.
#[test]
fn test_init_requires_backup_dir() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new();
    fixture
        .devback()
        .args(["init"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("--backup-dir"));
}

/// `setup` enables backups and installs the three hooks.
#[test]
fn test_setup_installs_hooks() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();

    fixture.devback().args(["setup"]).assert().code(0);

    for hook in ["post-commit", "post-merge", "post-rewrite"] {
        let path = fixture.repo.join(".git/hooks").join(hook);
        assert!(path.is_file(), "{} not installed", hook);
        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("devback hook"));
    }

    // backup.enabled is now on, so a post-commit hook run backs up.
    fixture
        .devback()
        .args(["hook", "post-commit", "--no-notify"])
        .assert()
        .code(0);
    assert_eq!(fixture.done_snapshots().len(), 1);
}

/// `setup --slug` records the slug used for key derivation.
#[test]
fn test_setup_slug_feeds_key() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();

    fixture
        .devback()
        .args(["setup", "--slug", "team/billing", "--no-hooks"])
        .assert()
        .code(0);

    let output = fixture.devback().args(["key"]).output().unwrap();
    let key = String::from_utf8(output.stdout).unwrap().trim().to_string();
    assert_eq!(key, "team/billing/repo");
}

/// `setup --no-hooks` leaves the hooks directory untouched.
#[test]
fn test_setup_no_hooks() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();

    fixture
        .devback()
        .args(["setup", "--no-hooks"])
        .assert()
        .code(0);
    assert!(!fixture.repo.join(".git/hooks/post-commit").exists());
}

/// A pre-existing foreign hook survives setup without --force.
#[test]
fn test_setup_preserves_foreign_hook() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();
    let hooks = fixture.repo.join(".git/hooks");
    fs::create_dir_all(&hooks).unwrap();
    fs::write(hooks.join("post-commit"), "#!/bin/sh\necho custom\n").unwrap();

    fixture.devback().args(["setup"]).assert().code(0);
    let content = fs::read_to_string(hooks.join("post-commit")).unwrap();
    assert!(content.contains("echo custom"));

    fixture
        .devback()
        .args(["setup", "--force"])
        .assert()
        .code(0);
    let content = fs::read_to_string(hooks.join("post-commit")).unwrap();
    assert!(content.contains("devback hook post-commit"));
}

/// `status` reports configuration and repository state.
#[test]
fn test_status_reports_repo() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();

    fixture
        .devback()
        .args(["status", "--color", "never"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("config.toml"))
        .stdout(predicate::str::contains("disabled"));

    fixture.devback().args(["setup"]).assert().code(0);
    fixture.devback().args(["backup"]).assert().code(0);

    fixture
        .devback()
        .args(["status", "--scan-backups", "--color", "never"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("backups:     enabled"))
        .stdout(predicate::str::contains("hooks:       installed"))
        .stdout(predicate::str::contains("snapshots:   1"));
}

/// `status --no-repo` shows only the global section.
#[test]
fn test_status_no_repo() {
    if !git_available() {
        return;
    }
    let fixture = GitFixture::new().with_config();
    fixture
        .devback()
        .args(["status", "--no-repo", "--color", "never"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("no repository information"));
}

/// `completions` emits a script for every supported shell.
#[test]
fn test_completions_generate() {
    for shell in ["bash", "zsh", "fish"] {
        let mut cmd = assert_cmd::Command::cargo_bin("devback").unwrap();
        cmd.args(["completions", shell])
            .assert()
            .code(0)
            .stdout(predicate::str::contains("devback"));
    }
}
