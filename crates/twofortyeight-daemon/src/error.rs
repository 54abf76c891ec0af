//! Daemon-level errors.
//!
//! The board/search crates stay effectively infallible -- their
//! preconditions are enforced by the type system and by this crate, not by
//! runtime validation -- so only the daemon carries a real error enum.

use thiserror::Error;

/// The five error kinds named by the daemon's error-handling policy.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// A bad CLI argument or configuration value.
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// An open/lock/read/write failure on the log, snapshot, or control
    /// endpoint.
    #[error("file I/O error: {0}")]
    FileIO(#[from] std::io::Error),

    /// A liveness wait (start or stop) exceeded its deadline.
    #[error("timed out waiting for daemon liveness")]
    Timeout,

    /// The log or snapshot lock is already held by another process.
    #[error("another instance is already running")]
    AlreadyRunning,

    /// A snapshot line could not be parsed.
    #[error("corrupt snapshot line: {0}")]
    Corrupt(String),
}
