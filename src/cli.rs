//! # CLI Argument Parsing and Command Dispatch
//!
//! This module defines the command-line interface for the `devback` tool
//! using the `clap` library. It is responsible for:
//!
//! - Defining the top-level CLI structure, including global arguments like
//!   `--color` and `--log-level`.
//! - Defining the available subcommands (e.g., `backup`, `setup`, `hook`).
//! - Dispatching to the appropriate command implementation and mapping its
//!   outcome to the documented exit codes (0 success, 1 critical, 2 usage,
//!   76 lock busy, 130 interrupted).
//!
//! Each subcommand is implemented in its own module under `src/commands/` to
//! keep the code organized and maintainable.

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::LevelFilter;

use devback::error::Error;
use devback::exit_codes;

use crate::commands;

/// DevBack - Rotating, crash-safe snapshots of Git working trees
#[derive(Parser, Debug)]
#[command(name = "devback")]
#[command(
    version,
    about,
    long_about = "DevBack - Rotating, crash-safe snapshots of Git working trees:\n\
                  the .git directory plus everything Git ignores."
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,

    /// Increase output verbosity (can be repeated: -v -v)
    ///
    /// Overrides --log-level when specified:
    ///   -v     = debug level
    ///   -v -v  = trace level
    #[arg(short, long, global = true, action = ArgAction::Count, conflicts_with = "quiet")]
    verbose: u8,

    /// Suppress output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Snapshot the current repository into the backup root
    Backup(commands::backup::BackupArgs),

    /// Print the derived repository key and exit
    Key(commands::key::KeyArgs),

    /// Show DevBack configuration and repository status
    Status(commands::status::StatusArgs),

    /// Create the global configuration file
    Init(commands::init::InitArgs),

    /// Configure the current repository for automatic backups
    Setup(commands::setup::SetupArgs),

    /// Exercise the lock subsystem and exit
    TestLocks(commands::test_locks::TestLocksArgs),

    /// Git hook commands (called by hooks installed by `devback setup`)
    Hook(commands::hook::HookArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the parsed CLI command and return the process exit code.
    pub fn execute(self) -> i32 {
        if let Err(err) = self.init_logger() {
            eprintln!("{}", err);
            return exit_codes::USAGE;
        }

        let outcome = match self.command {
            Commands::Backup(args) => commands::backup::execute(args),
            Commands::Key(args) => commands::key::execute(args),
            Commands::Status(args) => commands::status::execute(args, &self.color),
            Commands::Init(args) => commands::init::execute(args),
            Commands::Setup(args) => commands::setup::execute(args),
            Commands::TestLocks(args) => commands::test_locks::execute(args),
            // Hooks never block git: exit 0 regardless of the outcome.
            Commands::Hook(args) => commands::hook::execute(args),
            Commands::Completions(args) => commands::completions::execute(args),
        };

        match outcome {
            Ok(()) => exit_codes::SUCCESS,
            Err(err) => {
                eprintln!("{}", err);
                map_exit_code(&err)
            }
        }
    }

    /// Initialize the logger with the specified log level and color settings
    fn init_logger(&self) -> Result<()> {
        let log_level = self.parse_log_level()?;
        let use_color = devback::output::OutputConfig::from_env_and_flag(&self.color).use_color;

        env_logger::Builder::from_default_env()
            .filter_level(log_level)
            .write_style(if use_color {
                env_logger::WriteStyle::Auto
            } else {
                env_logger::WriteStyle::Never
            })
            .format_timestamp(None)
            .format_module_path(false)
            .format_target(false)
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize logger: {}", e))?;

        Ok(())
    }

    /// Parse the log level, considering --verbose and --quiet flags
    ///
    /// Priority order:
    /// 1. --quiet (always sets to Error level)
    /// 2. --verbose (sets Debug for 1, Trace for 2+)
    /// 3. --log-level (explicit level)
    fn parse_log_level(&self) -> Result<LevelFilter> {
        if self.quiet {
            return Ok(LevelFilter::Error);
        }

        if self.verbose > 0 {
            return Ok(match self.verbose {
                1 => LevelFilter::Debug,
                _ => LevelFilter::Trace,
            });
        }

        match self.log_level.to_lowercase().as_str() {
            "error" => Ok(LevelFilter::Error),
            "warn" => Ok(LevelFilter::Warn),
            "info" => Ok(LevelFilter::Info),
            "debug" => Ok(LevelFilter::Debug),
            "trace" => Ok(LevelFilter::Trace),
            "off" => Ok(LevelFilter::Off),
            _ => Err(anyhow::anyhow!(
                "Invalid log level: '{}'. Valid options are: error, warn, info, debug, trace, off",
                self.log_level
            )),
        }
    }
}

/// Maps a command error to the documented exit codes by downcasting to the
/// library's closed error taxonomy. Anything that is not a library error is
/// critical.
fn map_exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<Error>() {
        Some(err) => err.exit_code(),
        None => exit_codes::CRITICAL,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_with_level(log_level: &str, verbose: u8, quiet: bool) -> Cli {
        Cli {
            command: Commands::Key(commands::key::KeyArgs {}),
            color: "auto".to_string(),
            log_level: log_level.to_string(),
            verbose,
            quiet,
        }
    }

    #[test]
    fn test_parse_log_level_with_verbose() {
        let cli = cli_with_level("info", 1, false);
        assert_eq!(cli.parse_log_level().unwrap(), LevelFilter::Debug);
    }

    #[test]
    fn test_parse_log_level_with_verbose_twice() {
        let cli = cli_with_level("info", 2, false);
        assert_eq!(cli.parse_log_level().unwrap(), LevelFilter::Trace);
    }

    #[test]
    fn test_parse_log_level_with_quiet() {
        let cli = cli_with_level("debug", 0, true);
        assert_eq!(cli.parse_log_level().unwrap(), LevelFilter::Error);
    }

    #[test]
    fn test_parse_log_level_explicit() {
        let cli = cli_with_level("trace", 0, false);
        assert_eq!(cli.parse_log_level().unwrap(), LevelFilter::Trace);
    }

    #[test]
    fn test_parse_log_level_invalid() {
        let cli = cli_with_level("noisy", 0, false);
        assert!(cli.parse_log_level().is_err());
    }

    #[test]
    fn test_map_exit_code_from_library_error() {
        let err: anyhow::Error = Error::LockBusy.into();
        assert_eq!(map_exit_code(&err), exit_codes::LOCK_BUSY);

        let err: anyhow::Error = Error::usage("bad flag").into();
        assert_eq!(map_exit_code(&err), exit_codes::USAGE);

        let err: anyhow::Error = Error::Interrupted.into();
        assert_eq!(map_exit_code(&err), exit_codes::INTERRUPTED);

        let err = anyhow::anyhow!("opaque failure");
        assert_eq!(map_exit_code(&err), exit_codes::CRITICAL);
    }
}
