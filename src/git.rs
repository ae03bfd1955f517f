//! # Git Port
//!
//! The snapshot engine talks to Git through the narrow [`GitPort`] trait so
//! that tests can substitute a fake repository view. The production
//! implementation, [`CommandGit`], shells out to the `git` command line tool,
//! the same approach the hooks themselves rely on, and the only one that
//! respects every exotic repository layout Git supports.

use std::path::{Path, PathBuf};
use std::process::Command;

use crate::error::{Error, Result};

/// Describes one entry of `git worktree list`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorktreeInfo {
    pub path: PathBuf,
    pub branch: String,
}

/// Git operations needed by the snapshot engine.
pub trait GitPort {
    /// Returns the working-tree root of the repository containing the
    /// current directory.
    fn repo_root(&self) -> Result<PathBuf>;

    /// Returns the git dir for `repo` (may be relative to the repo root).
    fn git_dir(&self, repo: &Path) -> Result<String>;

    /// Returns the common git dir for `repo` (may be relative to the repo
    /// root). Equals the git dir for regular repositories.
    fn common_git_dir(&self, repo: &Path) -> Result<String>;

    /// Reads a local config value. `Ok(None)` when the key is unset.
    fn config_get(&self, repo: &Path, key: &str) -> Result<Option<String>>;

    /// Sets a local config value.
    fn config_set(&self, repo: &Path, key: &str, value: &str) -> Result<()>;

    /// Reads a worktree-scoped config value. `Ok(None)` when unset or when
    /// worktree config is not enabled.
    fn config_get_worktree(&self, repo: &Path, key: &str) -> Result<Option<String>>;

    /// Sets a worktree-scoped config value.
    fn config_set_worktree(&self, repo: &Path, key: &str, value: &str) -> Result<()>;

    /// Reads a global config value. `Ok(None)` when the key is unset.
    fn config_get_global(&self, key: &str) -> Result<Option<String>>;

    /// Lists the worktrees attached to `repo`.
    fn worktree_list(&self, repo: &Path) -> Result<Vec<WorktreeInfo>>;

    /// Returns every path Git considers ignored or untracked, repo-relative
    /// with forward slashes. NUL-delimited on the wire, so paths containing
    /// newlines survive.
    fn list_ignored_untracked(&self, repo: &Path) -> Result<Vec<String>>;
}

/// [`GitPort`] implementation backed by the `git` CLI.
#[derive(Debug, Default, Clone, Copy)]
pub struct CommandGit;

impl CommandGit {
    pub fn new() -> Self {
        CommandGit
    }

    fn run(&self, dir: Option<&Path>, args: &[&str]) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .map_err(|e| Error::critical(format!("run git {}: {}", args.join(" "), e)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::critical(format!(
                "git {} failed: {}",
                args.join(" "),
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Like [`run`](Self::run) but treats exit status 1 with empty stderr as
    /// "key not set", which is the contract of `git config --get`.
    fn run_config_get(&self, dir: Option<&Path>, args: &[&str]) -> Result<Option<String>> {
        let mut cmd = Command::new("git");
        cmd.args(args);
        if let Some(dir) = dir {
            cmd.current_dir(dir);
        }
        let output = cmd
            .output()
            .map_err(|e| Error::critical(format!("run git {}: {}", args.join(" "), e)))?;
        if output.status.success() {
            let value = String::from_utf8_lossy(&output.stdout).trim().to_string();
            return Ok(Some(value));
        }
        if output.status.code() == Some(1) {
            return Ok(None);
        }
        let stderr = String::from_utf8_lossy(&output.stderr);
        Err(Error::critical(format!(
            "git {} failed: {}",
            args.join(" "),
            stderr.trim()
        )))
    }

    fn ls_files(&self, repo: &Path, extra: &[&str]) -> Result<Vec<String>> {
        let mut args = vec!["ls-files", "-z", "--others", "--exclude-standard"];
        args.extend_from_slice(extra);
        let out = self.run(Some(repo), &args)?;
        Ok(out
            .split('\0')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_string())
            .collect())
    }
}

impl GitPort for CommandGit {
    fn repo_root(&self) -> Result<PathBuf> {
        let out = self.run(None, &["rev-parse", "--show-toplevel"])?;
        let root = out.trim();
        if root.is_empty() {
            return Err(Error::critical("git returned an empty repository root"));
        }
        Ok(PathBuf::from(root))
    }

    fn git_dir(&self, repo: &Path) -> Result<String> {
        let out = self.run(Some(repo), &["rev-parse", "--git-dir"])?;
        Ok(out.trim().to_string())
    }

    fn common_git_dir(&self, repo: &Path) -> Result<String> {
        let out = self.run(Some(repo), &["rev-parse", "--git-common-dir"])?;
        Ok(out.trim().to_string())
    }

    fn config_get(&self, repo: &Path, key: &str) -> Result<Option<String>> {
        self.run_config_get(Some(repo), &["config", "--get", key])
    }

    fn config_set(&self, repo: &Path, key: &str, value: &str) -> Result<()> {
        self.run(Some(repo), &["config", key, value]).map(|_| ())
    }

    fn config_get_worktree(&self, repo: &Path, key: &str) -> Result<Option<String>> {
        self.run_config_get(Some(repo), &["config", "--worktree", "--get", key])
    }

    fn config_set_worktree(&self, repo: &Path, key: &str, value: &str) -> Result<()> {
        self.run(Some(repo), &["config", "--worktree", key, value])
            .map(|_| ())
    }

    fn config_get_global(&self, key: &str) -> Result<Option<String>> {
        self.run_config_get(None, &["config", "--global", "--get", key])
    }

    fn worktree_list(&self, repo: &Path) -> Result<Vec<WorktreeInfo>> {
        let out = self.run(Some(repo), &["worktree", "list", "--porcelain"])?;
        Ok(parse_worktree_porcelain(&out))
    }

    fn list_ignored_untracked(&self, repo: &Path) -> Result<Vec<String>> {
        // Two listings: untracked (not ignored) and ignored. Their union is
        // everything the working tree holds that the index does not.
        let mut paths = self.ls_files(repo, &[])?;
        let ignored = self.ls_files(repo, &["--ignored"])?;
        for p in ignored {
            if !paths.contains(&p) {
                paths.push(p);
            }
        }
        Ok(paths)
    }
}

fn parse_worktree_porcelain(out: &str) -> Vec<WorktreeInfo> {
    let mut worktrees = Vec::new();
    let mut path: Option<PathBuf> = None;
    let mut branch = String::new();
    for line in out.lines() {
        if let Some(p) = line.strip_prefix("worktree ") {
            if let Some(prev) = path.take() {
                worktrees.push(WorktreeInfo {
                    path: prev,
                    branch: std::mem::take(&mut branch),
                });
            }
            path = Some(PathBuf::from(p));
        } else if let Some(b) = line.strip_prefix("branch ") {
            branch = b.trim_start_matches("refs/heads/").to_string();
        }
    }
    if let Some(prev) = path {
        worktrees.push(WorktreeInfo { path: prev, branch });
    }
    worktrees
}
