//! Cooperative cancellation.
//!
//! Backup runs can take arbitrarily long, so every loop and every suspension
//! point polls a shared [`CancelToken`] before dispatching further work. The
//! token is a plain atomic flag; no async runtime is involved. Signal wiring
//! is the invoker's concern: the CLI installs nothing by default and simply
//! maps [`Error::Interrupted`] to exit code 130.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::error::{Error, Result};

/// A cloneable cancellation flag shared between the driver, the copy worker
/// pool, and the lock refresher.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    /// Creates a new, uncancelled token.
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns true once [`cancel`](Self::cancel) has been called.
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Returns `Err(Interrupted)` once cancelled, `Ok(())` otherwise.
    ///
    /// # Examples
    ///
    /// ```
    /// use devback::cancel::CancelToken;
    ///
    /// let token = CancelToken::new();
    /// assert!(token.check().is_ok());
    /// token.cancel();
    /// assert!(token.check().is_err());
    /// ```
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Interrupted)
        } else {
            Ok(())
        }
    }
}
