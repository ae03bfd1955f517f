//! # Exclude Lists
//!
//! Parses the optional `.devbackignore` file at the repository root and
//! decides which ignored/untracked candidates stay out of the snapshot.
//!
//! The format is deliberately small: one pattern per line, `#` comments,
//! blank lines skipped, CRLF tolerated, a single trailing `/` stripped so
//! that `build/` and `build` mean the same thing. A pattern containing a
//! glob meta-character (`*`, `?`, `[`) is matched shell-style: against the
//! full path when it contains a `/`, against the basename otherwise. A
//! literal pattern excludes the exact path and everything beneath it.
//! Matching is case-sensitive.

use std::fs;
use std::path::Path;

use glob::{MatchOptions, Pattern};
use log::{debug, warn};

use crate::filesystem;

/// File name of the per-repository exclude file.
pub const IGNORE_FILE: &str = ".devbackignore";

/// An ordered list of exclude patterns.
#[derive(Debug, Clone, Default)]
pub struct ExcludeList {
    patterns: Vec<String>,
}

impl ExcludeList {
    /// Parses exclude patterns from file content.
    pub fn parse(content: &str) -> ExcludeList {
        let mut patterns = Vec::new();
        for line in content.split('\n') {
            let line = line.replace('\r', "");
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let line = line.strip_suffix('/').unwrap_or(line);
            patterns.push(line.to_string());
        }
        ExcludeList { patterns }
    }

    /// Reads `<repo_root>/.devbackignore`.
    ///
    /// A missing file means no excludes; a read failure is logged and also
    /// treated as no excludes; a bad ignore file must never fail a backup.
    pub fn load(repo_root: &Path) -> ExcludeList {
        let path = repo_root.join(IGNORE_FILE);
        match fs::read_to_string(&path) {
            Ok(content) => {
                let list = ExcludeList::parse(&content);
                debug!("loaded {} exclude pattern(s) from {}", list.len(), IGNORE_FILE);
                list
            }
            Err(err) if filesystem::is_not_found(&err) => {
                debug!("no {} in repository", IGNORE_FILE);
                ExcludeList::default()
            }
            Err(err) => {
                warn!("{}: {} (treating as no excludes)", IGNORE_FILE, err);
                ExcludeList::default()
            }
        }
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the first pattern excluding `path`, or `None` to keep it.
    ///
    /// `path` is repo-relative with forward slashes, as produced by the Git
    /// port; backslashes are normalized defensively for listings that passed
    /// through Windows tooling.
    pub fn matched_by<'a>(&'a self, path: &str) -> Option<&'a str> {
        let path = path.replace('\\', "/");
        for pattern in &self.patterns {
            let pattern_norm = pattern.replace('\\', "/");
            if pattern_excludes(&pattern_norm, &path) {
                return Some(pattern.as_str());
            }
        }
        None
    }
}

fn pattern_excludes(pattern: &str, path: &str) -> bool {
    let has_meta = pattern.contains(['*', '?', '[']);
    if has_meta {
        let compiled = match Pattern::new(pattern) {
            Ok(p) => p,
            // An unparseable glob matches nothing, same as a failed match.
            Err(_) => return false,
        };
        let opts = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };
        let subject = if pattern.contains('/') {
            path
        } else {
            path.rsplit('/').next().unwrap_or(path)
        };
        return compiled.matches_with(subject, opts);
    }

    path == pattern || path.starts_with(&format!("{}/", pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_skips_comments_and_blanks() {
        let list = ExcludeList::parse("# header\n\nbuild/\n  \n*.log\r\nnode_modules\n");
        assert_eq!(list.patterns, vec!["build", "*.log", "node_modules"]);
    }

    #[test]
    fn test_literal_dir_excludes_exact_and_children() {
        let list = ExcludeList::parse("build/\n");
        assert!(list.matched_by("build").is_some());
        assert!(list.matched_by("build/out.o").is_some());
        assert!(list.matched_by("build/deep/nested.o").is_some());
        assert!(list.matched_by("builder").is_none());
        assert!(list.matched_by("src/build").is_none());
    }

    #[test]
    fn test_glob_without_slash_matches_basename() {
        let list = ExcludeList::parse("*.tmp\n");
        assert!(list.matched_by("notes.tmp").is_some());
        assert!(list.matched_by("deep/dir/cache.tmp").is_some());
        assert!(list.matched_by("notes.tmp.bak").is_none());
    }

    #[test]
    fn test_glob_with_slash_matches_full_path() {
        let list = ExcludeList::parse("logs/*.log\n");
        assert!(list.matched_by("logs/app.log").is_some());
        // `*` does not cross separators when the pattern is anchored.
        assert!(list.matched_by("logs/sub/app.log").is_none());
        assert!(list.matched_by("app.log").is_none());
    }

    #[test]
    fn test_combined_patterns() {
        let list = ExcludeList::parse("*.tmp\nlogs/*.log\n");
        let candidates = ["logs/app.log", "notes.tmp", "keep.txt"];
        let kept: Vec<&str> = candidates
            .iter()
            .filter(|p| list.matched_by(p).is_none())
            .copied()
            .collect();
        assert_eq!(kept, vec!["keep.txt"]);
    }

    #[test]
    fn test_case_sensitive() {
        let list = ExcludeList::parse("Build\n*.TMP\n");
        assert!(list.matched_by("build").is_none());
        assert!(list.matched_by("Build").is_some());
        assert!(list.matched_by("a.tmp").is_none());
        assert!(list.matched_by("a.TMP").is_some());
    }

    #[test]
    fn test_invalid_glob_matches_nothing() {
        let list = ExcludeList::parse("[\n");
        assert!(list.matched_by("[").is_none());
        assert!(list.matched_by("anything").is_none());
    }

    #[test]
    fn test_matched_pattern_is_reported() {
        let list = ExcludeList::parse("build/\n*.tmp\n");
        assert_eq!(list.matched_by("x.tmp"), Some("*.tmp"));
        assert_eq!(list.matched_by("build/a"), Some("build"));
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let list = ExcludeList::load(tmp.path());
        assert!(list.is_empty());
    }
}
