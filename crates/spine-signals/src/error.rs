//! Error types for signal disposition handling.

use nix::errno::Errno;
use nix::sys::signal::Signal;
use thiserror::Error;

/// Errors that can occur while reading or changing a signal disposition.
#[derive(Error, Debug)]
pub enum TrapError {
    /// The current disposition of a signal could not be read.
    #[error("Failed to query disposition of {signal}: {source}")]
    Query { signal: Signal, source: Errno },

    /// The disposition of a signal could not be changed.
    #[error("Failed to update disposition of {signal}: {source}")]
    Update { signal: Signal, source: Errno },
}

/// Result type for disposition operations.
pub type TrapResult<T> = Result<T, TrapError>;
