//! Test-locks command implementation.
//!
//! Exercises the lock subsystem end-to-end in a scratch directory:
//! acquisition, busy detection, refresh, release, and re-acquisition. Useful
//! on unusual filesystems (network mounts in particular) before trusting
//! them with real backups.

use std::path::Path;

use anyhow::Result;
use clap::Args;

use devback::lock;

/// Arguments for the test-locks command
#[derive(Args, Debug)]
pub struct TestLocksArgs {}

/// Execute the test-locks command
pub fn execute(_args: TestLocksArgs) -> Result<()> {
    lock::self_test(Path::new("/test/repo"), Path::new("/test/backup"))?;
    println!("All lock tests completed successfully");
    Ok(())
}
