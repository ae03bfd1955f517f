//! # Configuration
//!
//! Defines the schema for the `~/.config/devback/config.toml` file and the
//! runtime configuration the backup engine consumes.
//!
//! The on-disk file is TOML with four sections: `[backup]`, `[notifications]`,
//! `[logging]`, and `[repo_key]`. Every field carries a default, so a missing
//! file or a sparse file both deserialize into a usable configuration; the
//! only value the engine insists on is `backup.base_dir`, which has no safe
//! default and is validated at the start of each backup.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::filesystem;
use crate::repokey::KeyStyle;

/// On-disk TOML configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ConfigFile {
    #[serde(default)]
    pub backup: BackupSection,
    #[serde(default)]
    pub notifications: NotificationsSection,
    #[serde(default)]
    pub logging: LoggingSection,
    #[serde(default)]
    pub repo_key: RepoKeySection,
}

/// `[backup]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BackupSection {
    #[serde(default)]
    pub base_dir: String,
    #[serde(default = "default_keep_count")]
    pub keep_count: i64,
    #[serde(default = "default_keep_days")]
    pub keep_days: i64,
    #[serde(default = "default_max_total_gb")]
    pub max_total_gb: i64,
    #[serde(default)]
    pub size_margin_mb: i64,
    #[serde(default = "default_true")]
    pub no_size: bool,
}

/// `[notifications]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NotificationsSection {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_sound")]
    pub sound: String,
}

/// `[logging]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingSection {
    #[serde(default = "default_log_dir")]
    pub dir: String,
    #[serde(default = "default_log_level")]
    pub level: String,
}

/// `[repo_key]` section.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RepoKeySection {
    #[serde(default = "default_key_style")]
    pub style: String,
    #[serde(default)]
    pub auto_remote_merge: bool,
    #[serde(default = "default_remote_hash_len")]
    pub remote_hash_len: i64,
}

fn default_keep_count() -> i64 {
    30
}
fn default_keep_days() -> i64 {
    90
}
fn default_max_total_gb() -> i64 {
    10
}
fn default_true() -> bool {
    true
}
fn default_sound() -> String {
    "default".to_string()
}
fn default_log_dir() -> String {
    "~/.local/state/devback/logs".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}
fn default_key_style() -> String {
    "auto".to_string()
}
fn default_remote_hash_len() -> i64 {
    8
}

impl Default for BackupSection {
    fn default() -> Self {
        BackupSection {
            base_dir: String::new(),
            keep_count: default_keep_count(),
            keep_days: default_keep_days(),
            max_total_gb: default_max_total_gb(),
            size_margin_mb: 0,
            no_size: true,
        }
    }
}

impl Default for NotificationsSection {
    fn default() -> Self {
        NotificationsSection {
            enabled: true,
            sound: default_sound(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        LoggingSection {
            dir: default_log_dir(),
            level: default_log_level(),
        }
    }
}

impl Default for RepoKeySection {
    fn default() -> Self {
        RepoKeySection {
            style: default_key_style(),
            auto_remote_merge: false,
            remote_hash_len: default_remote_hash_len(),
        }
    }
}

/// Runtime configuration consumed by the backup engine.
///
/// Built from a [`ConfigFile`] with home expansion applied, or assembled
/// directly by tests and by CLI flag overrides.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub backup_dir: PathBuf,
    pub dry_run: bool,
    pub keep_count: i64,
    pub keep_days: i64,
    pub max_total_gb: i64,
    pub size_margin_mb: i64,
    pub no_size: bool,
    pub key_style: KeyStyle,
    pub auto_remote_merge: bool,
    pub remote_hash_len: i64,
}

impl Config {
    /// Builds a runtime configuration from a parsed config file, expanding a
    /// leading `~` in `backup.base_dir` against `home`.
    pub fn from_file(file: &ConfigFile, home: &Path) -> Config {
        Config {
            backup_dir: expand_home(&file.backup.base_dir, home),
            dry_run: false,
            keep_count: file.backup.keep_count,
            keep_days: file.backup.keep_days,
            max_total_gb: file.backup.max_total_gb,
            size_margin_mb: file.backup.size_margin_mb,
            no_size: file.backup.no_size,
            key_style: file.repo_key.style.parse().unwrap_or_default(),
            auto_remote_merge: file.repo_key.auto_remote_merge,
            remote_hash_len: file.repo_key.remote_hash_len,
        }
    }
}

/// Expands a leading `~` or `~/` to `home`. Other paths pass through.
pub fn expand_home(path: &str, home: &Path) -> PathBuf {
    let path = path.trim();
    if path == "~" {
        return home.to_path_buf();
    }
    if let Some(rest) = path.strip_prefix("~/") {
        return home.join(rest);
    }
    PathBuf::from(path)
}

/// Loads the config file at `path`.
///
/// Returns the parsed file and whether it existed. A missing file yields the
/// defaults with `exists = false`; a directory at the config path is a usage
/// error; malformed TOML is critical.
pub fn load_config_file(path: &Path) -> Result<(ConfigFile, bool)> {
    let data = match fs::read_to_string(path) {
        Ok(data) => data,
        Err(err) if filesystem::is_not_found(&err) => {
            return Ok((ConfigFile::default(), false));
        }
        Err(_) if path.is_dir() => {
            return Err(Error::usage(format!(
                "config path is a directory: {}",
                path.display()
            )));
        }
        Err(err) => {
            return Err(Error::critical(format!(
                "read config {}: {}",
                path.display(),
                err
            )));
        }
    };
    let file: ConfigFile = toml::from_str(&data)
        .map_err(|e| Error::critical(format!("parse config {}: {}", path.display(), e)))?;
    Ok((file, true))
}

/// Serializes a config file back to TOML.
pub fn render_config_file(file: &ConfigFile) -> Result<String> {
    toml::to_string_pretty(file).map_err(|e| Error::critical(format!("render config: {}", e)))
}
