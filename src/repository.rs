//! # Repository Resolution
//!
//! Locates the working-tree root, validates that it is a Git repository, and
//! resolves the git dir / common git dir pair that snapshotting needs.
//!
//! Linked worktrees are the interesting case: their `.git` is a one-line
//! gitfile pointing at a per-worktree directory inside the main repository's
//! `worktrees/` area, while the object and ref store lives in the *common*
//! git dir. Snapshots always copy the common dir (a snapshot of the
//! bookkeeping directory alone would be useless), and hook installation also
//! targets the common dir so that every worktree shares one set of hooks.

use std::fs;
use std::path::{Component, Path, PathBuf};

use crate::error::{Error, Result};
use crate::git::GitPort;

/// Resolved git directories for one repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitDirs {
    /// The repository's git dir, absolute.
    pub git_dir: PathBuf,
    /// The shared common git dir, absolute. Equals `git_dir` for a regular
    /// repository.
    pub common_dir: PathBuf,
    /// True when this working tree is a linked worktree.
    pub is_worktree: bool,
}

/// Returns the working-tree root, falling back to the current directory when
/// Git cannot answer (the caller still validates the result).
pub fn resolve_repo_root(git: &dyn GitPort) -> Result<PathBuf> {
    if let Ok(root) = git.repo_root() {
        return Ok(root);
    }
    std::env::current_dir().map_err(|e| Error::critical(format!("resolve working dir: {}", e)))
}

/// Validates that `repo_root` is a Git repository.
///
/// Prefers asking Git; when that fails, accepts a literal `.git` directory
/// or a gitfile whose `gitdir:` target exists as a directory.
pub fn ensure_git_repo(git: &dyn GitPort, repo_root: &Path) -> Result<()> {
    if let Ok(git_dir) = git.git_dir(repo_root) {
        if git_dir.trim().is_empty() {
            return Err(Error::critical(format!(
                "git dir is empty in {}",
                repo_root.display()
            )));
        }
        return validate_git_dir_path(repo_root, git_dir.trim(), "git dir");
    }
    ensure_git_repo_from_dot_git(repo_root)
}

fn ensure_git_repo_from_dot_git(repo_root: &Path) -> Result<()> {
    let dot_git = repo_root.join(".git");
    let meta = fs::symlink_metadata(&dot_git)
        .map_err(|e| Error::critical(format!(".git not found in {}: {}", repo_root.display(), e)))?;
    if meta.is_dir() {
        return Ok(());
    }
    if !meta.is_file() {
        return Err(Error::critical(format!(
            ".git is not a regular file or directory in {}",
            repo_root.display()
        )));
    }
    let target = read_gitfile(&dot_git)?;
    validate_git_dir_path(repo_root, &target, "gitdir")
}

/// Reads the `gitdir:` target from a gitfile.
pub fn read_gitfile(path: &Path) -> Result<String> {
    let data = fs::read_to_string(path)
        .map_err(|e| Error::critical(format!("read {}: {}", path.display(), e)))?;
    let line = data.lines().next().unwrap_or("").trim();
    let target = line
        .strip_prefix("gitdir:")
        .ok_or_else(|| Error::critical(format!("unsupported .git file format in {}", path.display())))?
        .trim();
    if target.is_empty() {
        return Err(Error::critical(format!(
            "empty gitdir in {}",
            path.display()
        )));
    }
    Ok(target.to_string())
}

fn validate_git_dir_path(repo_root: &Path, git_dir: &str, label: &str) -> Result<()> {
    let path = absolutize(repo_root, git_dir);
    let meta = fs::metadata(&path).map_err(|e| {
        Error::critical(format!("{} not found in {}: {}", label, repo_root.display(), e))
    })?;
    if !meta.is_dir() {
        return Err(Error::critical(format!(
            "{} is not a directory in {}",
            label,
            repo_root.display()
        )));
    }
    Ok(())
}

/// Resolves the git dir and common git dir for snapshotting, classifying the
/// repository as regular or linked worktree.
pub fn resolve_git_dirs(git: &dyn GitPort, repo_root: &Path) -> Result<GitDirs> {
    let git_dir = git.git_dir(repo_root)?;
    let common_dir = git.common_git_dir(repo_root)?;
    let git_dir = git_dir.trim();
    let common_dir = common_dir.trim();
    if git_dir.is_empty() {
        return Err(Error::critical(format!(
            "git dir is empty in {}",
            repo_root.display()
        )));
    }
    if common_dir.is_empty() {
        return Err(Error::critical(format!(
            "git common dir is empty in {}",
            repo_root.display()
        )));
    }

    let git_path = absolutize(repo_root, git_dir);
    let common_path = absolutize(repo_root, common_dir);
    for (path, label) in [(&git_path, "git dir"), (&common_path, "git common dir")] {
        let meta = fs::metadata(path).map_err(|e| {
            Error::critical(format!("{} not found in {}: {}", label, repo_root.display(), e))
        })?;
        if !meta.is_dir() {
            return Err(Error::critical(format!(
                "{} is not a directory in {}",
                label,
                repo_root.display()
            )));
        }
    }

    let is_worktree = normalize(&git_path) != normalize(&common_path);
    Ok(GitDirs {
        git_dir: git_path,
        common_dir: common_path,
        is_worktree,
    })
}

/// Resolves a possibly relative git dir against the repository root.
pub fn absolutize(repo_root: &Path, dir: &str) -> PathBuf {
    let path = Path::new(dir);
    if path.is_absolute() {
        normalize(path)
    } else {
        normalize(&repo_root.join(path))
    }
}

/// Lexically cleans a path: collapses `.`, resolves `..` against parents,
/// drops redundant separators. No filesystem access.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !out.pop() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}
