//! # DevBack Library
//!
//! This library provides the core functionality for creating full, rotating,
//! crash-safe snapshots of a Git working tree. It is designed to be used by
//! the `devback` command-line tool but can also be integrated into other
//! applications that need repository snapshots.
//!
//! A snapshot contains the repository's `.git` directory (for linked
//! worktrees, the shared common directory) plus every file Git considers
//! ignored or untracked, filtered through an optional `.devbackignore` file
//! at the repository root.
//!
//! ## Core Concepts
//!
//! The library is built around a few key concepts:
//!
//! - **Repository resolution (`repository`, `git`)**: Locating the working
//!   tree root, the git dir, and the common git dir, and classifying the
//!   repository as regular or linked worktree.
//! - **Repository keys (`repokey`)**: Deriving a stable, filesystem-safe key
//!   that places snapshots of the same repository together under the backup
//!   root.
//! - **Snapshots (`snapshot`, `copy`)**: Atomically reserving a per-timestamp
//!   directory, copying the git dir and the filtered working-tree set, and
//!   finalizing with `.partial` → `.done` markers so that readers can always
//!   tell a complete snapshot from a crashed one.
//! - **Rotation (`rotate`)**: Ageing snapshots out by age, count, and total
//!   size, with dry-run support.
//! - **Locking (`lock`, `process`)**: A per-repository lock directory whose
//!   validity survives crashes and detects PID reuse.
//! - **Hook support (`debounce`)**: Debouncing duplicate backups during a
//!   rebase sequence.
//!
//! ## Execution Flow
//!
//! The main entry point is [`backup::backup`], which executes the following
//! high-level steps:
//!
//! 1.  **Resolve**: Find the working-tree root and validate the repository.
//! 2.  **Key**: Derive the repository key (`repokey`).
//! 3.  **Lock**: Acquire the per-repository lock and start its refresher.
//! 4.  **Reserve**: Atomically create the snapshot directory with a
//!     `.reserve` marker.
//! 5.  **Copy**: Copy the common git dir, then the filtered ignored/untracked
//!     files in parallel.
//! 6.  **Finalize**: Replace `.partial` with `.done`; on failure remove the
//!     snapshot tree entirely.
//! 7.  **Rotate**: Apply the retention rules to the surviving snapshots.

pub mod backup;
pub mod cancel;
pub mod config;
pub mod copy;
pub mod debounce;
pub mod defaults;
pub mod error;
pub mod exclude;
pub mod filesystem;
pub mod git;
pub mod init;
pub mod lock;
pub mod notify;
pub mod output;
pub mod process;
pub mod repokey;
pub mod repository;
pub mod rotate;
pub mod setup;
pub mod snapshot;
pub mod status;
pub mod templates;

#[cfg(test)]
mod repokey_proptest;

/// Exit codes used by the `devback` binary.
///
/// Hook commands never use these directly: hooks always exit 0 so that Git
/// operations are never blocked by a failing backup.
pub mod exit_codes {
    /// Operation completed successfully.
    pub const SUCCESS: i32 = 0;
    /// Critical error (bad repository, copy errors, permission problems).
    pub const CRITICAL: i32 = 1;
    /// Usage error (missing backup dir, bad configuration).
    pub const USAGE: i32 = 2;
    /// Another snapshot of the same repository is in progress.
    pub const LOCK_BUSY: i32 = 76;
    /// The operation was interrupted by a cancellation signal.
    pub const INTERRUPTED: i32 = 130;
}
