//! Error handling types for the devback application.
//!
//! The library distinguishes four error categories and propagates them by
//! identity, never by string matching. Each category maps to one of the exit
//! codes in [`crate::exit_codes`].

use thiserror::Error;

use crate::exit_codes;

/// Main error type for devback operations.
///
/// The taxonomy is closed: invokers match on the variant, not on the message.
/// `Usage` and `Critical` carry a human-readable description; `LockBusy` and
/// `Interrupted` are self-describing.
#[derive(Error, Debug)]
pub enum Error {
    /// Caller or configuration error; no filesystem state was changed.
    #[error("{0}")]
    Usage(String),

    /// An operation failed and may have left state behind that could only be
    /// cleaned up best-effort.
    #[error("{0}")]
    Critical(String),

    /// Another process holds the per-repository lock.
    #[error("another backup is already in progress")]
    LockBusy,

    /// A cancellation signal was observed at a suspension point.
    #[error("interrupted")]
    Interrupted,
}

impl Error {
    /// Shorthand for a [`Error::Usage`] with a formatted message.
    pub fn usage(message: impl Into<String>) -> Self {
        Error::Usage(message.into())
    }

    /// Shorthand for a [`Error::Critical`] with a formatted message.
    pub fn critical(message: impl Into<String>) -> Self {
        Error::Critical(message.into())
    }

    /// Map this error to the process exit code for the binary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) => exit_codes::USAGE,
            Error::Critical(_) => exit_codes::CRITICAL,
            Error::LockBusy => exit_codes::LOCK_BUSY,
            Error::Interrupted => exit_codes::INTERRUPTED,
        }
    }

    /// True when this error is [`Error::LockBusy`].
    pub fn is_lock_busy(&self) -> bool {
        matches!(self, Error::LockBusy)
    }

    /// True when this error is [`Error::Interrupted`].
    pub fn is_interrupted(&self) -> bool {
        matches!(self, Error::Interrupted)
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Critical(err.to_string())
    }
}

/// Result type alias for devback operations.
pub type Result<T> = std::result::Result<T, Error>;
