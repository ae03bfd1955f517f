//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = GitFixture::new().with_config();
//!     fixture.devback().args(["backup"]).assert().success();
//! }
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::TempDir;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    #[allow(unused_imports)]
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::git_available;
    pub use super::GitFixture;
}

/// Check whether a `git` binary is available.
///
/// E2E tests that need a real repository call this and bail out early on
/// machines without git.
pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .output()
        .map(|out| out.status.success())
        .unwrap_or(false)
}

/// A temporary home directory holding a git repository, a backup root, and a
/// devback config, all isolated from the developer's real environment.
pub struct GitFixture {
    pub temp: TempDir,
    pub repo: PathBuf,
    pub backups: PathBuf,
    pub config: PathBuf,
}

#[allow(dead_code)]
impl GitFixture {
    /// Creates the fixture with an initialized repository containing one
    /// commit.
    pub fn new() -> GitFixture {
        let temp = TempDir::new().unwrap();
        let repo = temp.path().join("repo");
        let backups = temp.path().join("backups");
        let config = temp.path().join("config.toml");
        fs::create_dir_all(&repo).unwrap();
        fs::create_dir_all(&backups).unwrap();

        let fixture = GitFixture {
            temp,
            repo,
            backups,
            config,
        };
        fixture.git(&["init", "--initial-branch=main"]);
        fixture.git(&["config", "user.email", "dev@example.com"]);
        fixture.git(&["config", "user.name", "Dev"]);
        fixture.write_file("README.md", "# fixture\n");
        fixture.git(&["add", "."]);
        fixture.git(&["commit", "-m", "initial"]);
        fixture
    }

    /// Writes a devback config pointing `base_dir` at the fixture's backup
    /// root, with rotation disabled.
    pub fn with_config(self) -> GitFixture {
        self.write_config(&format!(
            "[backup]\nbase_dir = \"{}\"\n",
            self.backups.display()
        ));
        self
    }

    /// Writes arbitrary devback config content.
    pub fn write_config(&self, content: &str) {
        fs::write(&self.config, content).unwrap();
    }

    /// Runs git inside the fixture repository.
    pub fn git(&self, args: &[&str]) {
        let status = Command::new("git")
            .args(args)
            .current_dir(&self.repo)
            .env("HOME", self.temp.path())
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .status()
            .expect("run git");
        assert!(status.success(), "git {:?} failed", args);
    }

    /// Writes a file inside the repository.
    pub fn write_file(&self, rel: &str, content: &str) {
        let path = self.repo.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, content).unwrap();
    }

    /// Returns a `devback` command isolated to this fixture.
    pub fn devback(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::Command::cargo_bin("devback").unwrap();
        cmd.current_dir(&self.repo)
            .env("HOME", self.temp.path())
            .env("DEVBACK_CONFIG", &self.config)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env_remove("DEVBACK_BACKUP_DIR")
            .env_remove("GIT_REFLOG_ACTION")
            .env_remove("NO_COLOR");
        cmd
    }

    /// Lists the `.done` snapshot directories under the backup root,
    /// regardless of the repository key in use.
    pub fn done_snapshots(&self) -> Vec<PathBuf> {
        let mut found = Vec::new();
        collect_done(&self.backups, &mut found);
        found.sort();
        found
    }
}

#[allow(dead_code)]
fn collect_done(dir: &Path, found: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        if path.join(".done").is_file() {
            found.push(path);
        } else {
            collect_done(&path, found);
        }
    }
}
