//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `devback` command-line tool. Each subcommand is defined in its own file to
//! keep the logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and
//!   options, derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and performs the
//!   command's logic, calling into the `devback` library.
//!
//! Errors bubble up as `anyhow::Error`; the CLI layer downcasts to
//! [`devback::error::Error`] to pick the process exit code, so the closed
//! error taxonomy survives the trip through the command layer.

pub mod backup;
pub mod completions;
pub mod hook;
pub mod init;
pub mod key;
pub mod setup;
pub mod status;
pub mod test_locks;

use std::path::PathBuf;

use anyhow::Result;
use devback::config::{self, Config, ConfigFile};
use devback::defaults;

/// Everything a command needs from the global configuration.
pub struct Runtime {
    pub config_path: PathBuf,
    pub config_file: ConfigFile,
    pub config_exists: bool,
    pub config: Config,
}

/// Loads the configuration file and derives the runtime config.
pub fn load_runtime() -> Result<Runtime> {
    let config_path = defaults::config_path();
    let (config_file, config_exists) = config::load_config_file(&config_path)?;
    let config = Config::from_file(&config_file, &defaults::home_dir());
    Ok(Runtime {
        config_path,
        config_file,
        config_exists,
        config,
    })
}
