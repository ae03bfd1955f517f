//! # DevBack CLI
//!
//! This is the binary entry point for the `devback` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Executing the appropriate command based on the parsed arguments.
//! - Translating command outcomes into the documented exit codes.
//!
//! The core application logic is defined in the `devback` library crate,
//! ensuring that the binary is a thin wrapper around the reusable library
//! functionality.

mod cli;
mod commands;

use clap::Parser;

fn main() {
    let cli = cli::Cli::parse();
    std::process::exit(cli.execute());
}
