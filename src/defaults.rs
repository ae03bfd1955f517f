//! Default values and well-known paths for devback.
//!
//! This module provides centralized default locations used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Backup base directory suggested to users by `devback init`.
pub const SUGGESTED_BACKUP_DIR: &str = "~/.local/share/devback/backups";

/// Returns the home directory.
///
/// Falls back to the current directory when the platform cannot provide one,
/// which only realistically happens in stripped-down containers.
pub fn home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the path of the devback configuration file.
///
/// This is `~/.config/devback/config.toml` on every platform: hook scripts
/// need one predictable location regardless of the native config convention.
///
/// The `DEVBACK_CONFIG` environment variable overrides it, which is also how
/// the test suite isolates itself from a developer's real configuration.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("DEVBACK_CONFIG") {
        if !path.trim().is_empty() {
            return PathBuf::from(path);
        }
    }
    home_dir().join(".config").join("devback").join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_path_ends_with_toml() {
        if std::env::var("DEVBACK_CONFIG").is_err() {
            assert!(config_path().ends_with(".config/devback/config.toml"));
        }
    }
}
