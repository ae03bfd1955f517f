//! # Repository Key Derivation
//!
//! A repository key is the filesystem-safe, `/`-separated identifier under
//! which all snapshots of one repository live inside the backup root. The
//! derivation is a pure function of the repository root, the configured
//! style, the optional `backup.slug` git config, and the `origin` remote URL,
//! never of the clock, so repeated runs land in the same place.
//!
//! Four styles exist:
//!
//! - **auto**: slug+basename when a slug is set, else remote-derived, else
//!   name+hash;
//! - **custom**: slug+basename, falling back to name+hash without a slug;
//! - **remote-hierarchy**: `host/owner/repo`, falling back to name+hash;
//! - **name+hash**: `<basename>--<sha256 prefix of the root path>`.
//!
//! The remote forms place clones of the same remote under a shared
//! hierarchy; `auto_remote_merge = false` appends a short hash of the local
//! path so distinct clones stay distinct.

use std::path::Path;

use log::debug;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::Config;
use crate::git::GitPort;

/// Repository key derivation style. A closed set; dispatch is a `match`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyStyle {
    #[default]
    Auto,
    Custom,
    RemoteHierarchy,
    NameHash,
}

impl std::str::FromStr for KeyStyle {
    type Err = std::convert::Infallible;

    /// Unrecognized styles resolve to `NameHash`, the style every other
    /// variant already falls back to.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim() {
            "" | "auto" => KeyStyle::Auto,
            "custom" => KeyStyle::Custom,
            "remote-hierarchy" => KeyStyle::RemoteHierarchy,
            "name-hash" | "name+hash" => KeyStyle::NameHash,
            _ => KeyStyle::NameHash,
        })
    }
}

impl std::fmt::Display for KeyStyle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            KeyStyle::Auto => "auto",
            KeyStyle::Custom => "custom",
            KeyStyle::RemoteHierarchy => "remote-hierarchy",
            KeyStyle::NameHash => "name+hash",
        };
        f.write_str(name)
    }
}

/// Makes one key segment filesystem-safe.
///
/// Characters outside `[A-Za-z0-9._-]` become `_`; leading dots are trimmed,
/// then leading and trailing `_`, `-`, and spaces. An empty survivor becomes
/// `repo`.
///
/// # Examples
///
/// ```
/// use devback::repokey::sanitize_segment;
///
/// assert_eq!(sanitize_segment("my repo"), "my_repo");
/// assert_eq!(sanitize_segment(".hidden"), "hidden");
/// assert_eq!(sanitize_segment("///"), "repo");
/// ```
pub fn sanitize_segment(s: &str) -> String {
    let mapped: String = s
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    // Trimming can expose new leading dots ("-.x" → ".x"), so iterate to a
    // fixpoint: keys must never start with a dot.
    let mut out: &str = &mapped;
    loop {
        let trimmed = out
            .trim_start_matches('.')
            .trim_matches(|c| c == '_' || c == '-' || c == ' ');
        if trimmed == out {
            break;
        }
        out = trimmed;
    }
    if out.is_empty() {
        "repo".to_string()
    } else {
        out.to_string()
    }
}

/// First 8 hex chars of the SHA-256 of `s`.
pub fn short_hash(s: &str) -> String {
    short_hash_n(s, 8)
}

/// First `n` hex chars of the SHA-256 of `s`.
///
/// `n <= 0` means the default of 8; values above 64 clamp to 64.
pub fn short_hash_n(s: &str, n: i64) -> String {
    let n = if n <= 0 { 8 } else { n.min(64) } as usize;
    let digest = Sha256::digest(s.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{:02x}", b)).collect();
    hex[..n].to_string()
}

/// Parses a git remote into `(host, owner, repo)`.
///
/// Two forms are understood: SCP-like `user@host:owner/repo(.git)` and
/// URL-like `scheme://host/…/owner/repo(.git)`. A remote with fewer than two
/// path segments after the host is unusable and yields `None`.
pub fn parse_remote(remote: &str) -> Option<(String, String, String)> {
    // SCP-like form: a colon splitting user@host from the path, and no
    // scheme separator anywhere.
    if let Some(colon) = remote.find(':') {
        let (left, right) = (&remote[..colon], &remote[colon + 1..]);
        if left.contains('@') && !remote.contains("://") {
            let host = &left[left.rfind('@').map(|i| i + 1).unwrap_or(0)..];
            let trimmed = right.strip_suffix(".git").unwrap_or(right);
            let parts: Vec<&str> = trimmed.split('/').collect();
            if parts.len() >= 2 {
                let owner = parts[parts.len() - 2];
                let repo = parts[parts.len() - 1];
                return Some((host.to_string(), owner.to_string(), repo.to_string()));
            }
            return None;
        }
    }

    let url = Url::parse(remote).ok()?;
    let host = url.host_str()?.to_string();
    let path = url.path().strip_suffix(".git").unwrap_or(url.path());
    let path = path.trim_matches('/');
    let parts: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if parts.len() < 2 {
        return None;
    }
    Some((
        host,
        parts[parts.len() - 2].to_string(),
        parts[parts.len() - 1].to_string(),
    ))
}

/// Derives the repository key for `repo_root` under the configured style.
///
/// Never fails: every style falls back to the name+hash form, which needs
/// nothing but the path itself.
pub fn derive_repo_key(cfg: &Config, git: &dyn GitPort, repo_root: &Path) -> String {
    match cfg.key_style {
        KeyStyle::Auto => {
            if let Some(key) = key_from_auto(cfg, git, repo_root) {
                return key;
            }
        }
        KeyStyle::Custom => {
            if let Some(key) = key_from_slug_config(git, repo_root) {
                debug!("repo key (custom): {}", key);
                return key;
            }
        }
        KeyStyle::RemoteHierarchy => {
            if let Some(key) = key_from_remote_hierarchy(git, repo_root) {
                debug!("repo key (remote-hierarchy): {}", key);
                return key;
            }
        }
        KeyStyle::NameHash => {}
    }

    let key = key_name_hash(repo_root);
    debug!("repo key (name+hash): {}", key);
    key
}

fn key_from_auto(cfg: &Config, git: &dyn GitPort, repo_root: &Path) -> Option<String> {
    if let Some(key) = key_from_slug_config(git, repo_root) {
        debug!("repo key (auto: slug+repo): {}", key);
        return Some(key);
    }
    if let Ok(Some(remote)) = git.config_get(repo_root, "remote.origin.url") {
        if let Some(key) = key_from_remote(cfg, &remote, repo_root) {
            debug!("repo key (auto: remote): {}", key);
            return Some(key);
        }
    }
    None
}

fn key_from_slug_config(git: &dyn GitPort, repo_root: &Path) -> Option<String> {
    let slug = match git.config_get(repo_root, "backup.slug") {
        Ok(Some(slug)) if !slug.trim().is_empty() => slug,
        _ => return None,
    };
    key_from_slug(&slug, repo_root)
}

/// Builds `slug/…/basename` from a `/`-separated slug.
pub fn key_from_slug(slug: &str, repo_root: &Path) -> Option<String> {
    let mut segments: Vec<String> = slug
        .split('/')
        .filter(|s| !s.is_empty())
        .map(sanitize_segment)
        .collect();
    if segments.is_empty() {
        return None;
    }
    segments.push(sanitize_segment(&basename(repo_root)));
    Some(segments.join("/"))
}

/// Builds `host/owner/repo` from the remote, appending a path hash when
/// clones must not merge.
pub fn key_from_remote(cfg: &Config, remote: &str, repo_root: &Path) -> Option<String> {
    let (host, owner, repo) = parse_remote(remote)?;
    let mut key = format!(
        "{}/{}/{}",
        sanitize_segment(&host),
        sanitize_segment(&owner),
        sanitize_segment(&repo)
    );
    if !cfg.auto_remote_merge {
        key.push_str("--");
        key.push_str(&short_hash_n(
            &repo_root.to_string_lossy(),
            cfg.remote_hash_len,
        ));
    }
    Some(key)
}

fn key_from_remote_hierarchy(git: &dyn GitPort, repo_root: &Path) -> Option<String> {
    let remote = git.config_get(repo_root, "remote.origin.url").ok()??;
    let (host, owner, repo) = parse_remote(&remote)?;
    Some(format!(
        "{}/{}/{}",
        sanitize_segment(&host),
        sanitize_segment(&owner),
        sanitize_segment(&repo)
    ))
}

/// `<sanitized basename>--<8-char hash of the absolute path>`.
pub fn key_name_hash(repo_root: &Path) -> String {
    format!(
        "{}--{}",
        sanitize_segment(&basename(repo_root)),
        short_hash(&repo_root.to_string_lossy())
    )
}

fn basename(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string_lossy().into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use std::path::PathBuf;

    /// GitPort fake exposing a fixed slug and remote.
    pub(crate) struct FakeGit {
        pub slug: Option<String>,
        pub remote: Option<String>,
    }

    impl FakeGit {
        pub(crate) fn new() -> Self {
            FakeGit {
                slug: None,
                remote: None,
            }
        }
    }

    impl GitPort for FakeGit {
        fn repo_root(&self) -> Result<PathBuf> {
            Err(Error::critical("not backed by a repository"))
        }
        fn git_dir(&self, _repo: &Path) -> Result<String> {
            Ok(".git".to_string())
        }
        fn common_git_dir(&self, _repo: &Path) -> Result<String> {
            Ok(".git".to_string())
        }
        fn config_get(&self, _repo: &Path, key: &str) -> Result<Option<String>> {
            Ok(match key {
                "backup.slug" => self.slug.clone(),
                "remote.origin.url" => self.remote.clone(),
                _ => None,
            })
        }
        fn config_set(&self, _repo: &Path, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        fn config_get_worktree(&self, _repo: &Path, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn config_set_worktree(&self, _repo: &Path, _key: &str, _value: &str) -> Result<()> {
            Ok(())
        }
        fn config_get_global(&self, _key: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn worktree_list(&self, _repo: &Path) -> Result<Vec<crate::git::WorktreeInfo>> {
            Ok(vec![])
        }
        fn list_ignored_untracked(&self, _repo: &Path) -> Result<Vec<String>> {
            Ok(vec![])
        }
    }

    #[test]
    fn test_sanitize_segment() {
        assert_eq!(sanitize_segment("repo"), "repo");
        assert_eq!(sanitize_segment("my repo"), "my_repo");
        assert_eq!(sanitize_segment("a/b\\c"), "a_b_c");
        assert_eq!(sanitize_segment("..dotted"), "dotted");
        assert_eq!(sanitize_segment("_-trim-_"), "trim");
        assert_eq!(sanitize_segment("-.hidden"), "hidden");
        assert_eq!(sanitize_segment(""), "repo");
        assert_eq!(sanitize_segment("日本語"), "repo");
    }

    #[test]
    fn test_short_hash_n_clamps() {
        let full = short_hash_n("x", 64);
        assert_eq!(full.len(), 64);
        assert_eq!(short_hash_n("x", 100), full);
        assert_eq!(short_hash_n("x", 0), full[..8].to_string());
        assert_eq!(short_hash_n("x", -3), full[..8].to_string());
        assert_eq!(short_hash_n("x", 1), full[..1].to_string());
        assert_eq!(short_hash("x"), full[..8].to_string());
    }

    #[test]
    fn test_parse_remote_equivalence() {
        let scp = parse_remote("git@host:o/r.git").unwrap();
        let https = parse_remote("https://host/o/r.git").unwrap();
        assert_eq!(scp, https);
        assert_eq!(scp, ("host".into(), "o".into(), "r".into()));
    }

    #[test]
    fn test_parse_remote_deep_paths() {
        assert_eq!(
            parse_remote("ssh://git.corp.example/team/group/app").unwrap(),
            ("git.corp.example".into(), "group".into(), "app".into())
        );
        assert_eq!(
            parse_remote("git@gitlab.com:org/sub/project.git").unwrap(),
            ("gitlab.com".into(), "sub".into(), "project".into())
        );
    }

    #[test]
    fn test_parse_remote_unusable() {
        assert_eq!(parse_remote("git@host:justrepo"), None);
        assert_eq!(parse_remote("https://host/onlyone"), None);
        assert_eq!(parse_remote("not a remote"), None);
        assert_eq!(parse_remote(""), None);
    }

    #[test]
    fn test_name_hash_key_shape() {
        // `/tmp/Repo` with name+hash: `Repo--` plus 8 hex chars.
        let key = key_name_hash(Path::new("/tmp/Repo"));
        assert!(key.starts_with("Repo--"));
        assert_eq!(key.len(), "Repo--".len() + 8);
    }

    #[test]
    fn test_slug_plus_basename() {
        let mut git = FakeGit::new();
        git.slug = Some("work/acme".to_string());
        let cfg = Config::default();
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/my repo"));
        assert_eq!(key, "work/acme/my_repo");
    }

    #[test]
    fn test_auto_remote_with_hash() {
        let mut git = FakeGit::new();
        git.remote = Some("git@github.com:acme/app.git".to_string());
        let cfg = Config {
            remote_hash_len: 8,
            ..Config::default()
        };
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        let (prefix, hash) = key.split_once("--").unwrap();
        assert_eq!(prefix, "github.com/acme/app");
        assert_eq!(hash.len(), 8);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_auto_remote_merge_drops_hash() {
        let mut git = FakeGit::new();
        git.remote = Some("git@github.com:acme/app.git".to_string());
        let cfg = Config {
            auto_remote_merge: true,
            ..Config::default()
        };
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        assert_eq!(key, "github.com/acme/app");
    }

    #[test]
    fn test_remote_hierarchy_style() {
        let mut git = FakeGit::new();
        git.remote = Some("https://github.com/acme/app.git".to_string());
        let cfg = Config {
            key_style: KeyStyle::RemoteHierarchy,
            ..Config::default()
        };
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        assert_eq!(key, "github.com/acme/app");
    }

    #[test]
    fn test_remote_hierarchy_falls_back_without_remote() {
        let git = FakeGit::new();
        let cfg = Config {
            key_style: KeyStyle::RemoteHierarchy,
            ..Config::default()
        };
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        assert!(key.starts_with("repo--"));
    }

    #[test]
    fn test_custom_without_slug_falls_back() {
        let git = FakeGit::new();
        let cfg = Config {
            key_style: KeyStyle::Custom,
            ..Config::default()
        };
        let key = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        assert!(key.starts_with("repo--"));
    }

    #[test]
    fn test_derivation_is_stable() {
        let mut git = FakeGit::new();
        git.remote = Some("git@github.com:acme/app.git".to_string());
        let cfg = Config::default();
        let a = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        let b = derive_repo_key(&cfg, &git, Path::new("/tmp/repo"));
        assert_eq!(a, b);
    }

    #[test]
    fn test_key_style_parsing() {
        assert_eq!("auto".parse::<KeyStyle>().unwrap(), KeyStyle::Auto);
        assert_eq!("".parse::<KeyStyle>().unwrap(), KeyStyle::Auto);
        assert_eq!("custom".parse::<KeyStyle>().unwrap(), KeyStyle::Custom);
        assert_eq!(
            "remote-hierarchy".parse::<KeyStyle>().unwrap(),
            KeyStyle::RemoteHierarchy
        );
        assert_eq!("name+hash".parse::<KeyStyle>().unwrap(), KeyStyle::NameHash);
        assert_eq!("bogus".parse::<KeyStyle>().unwrap(), KeyStyle::NameHash);
    }
}
