//! Store error types.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Errors that can occur in store and engine operations.
///
/// A key that does not exist is never an error: reads report it as `Ok(None)`
/// and deletes as a successful no-op.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing file could not be created or opened.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Another handle kept the file locked for longer than the open timeout.
    #[error("timed out after {timeout:?} waiting for the lock on {}", path.display())]
    LockTimeout {
        /// The file that was locked.
        path: PathBuf,
        /// How long the open waited before giving up.
        timeout: Duration,
    },

    /// A store or bucket name cannot be used.
    #[error("invalid name: {0}")]
    InvalidName(String),

    /// A bucket does not exist.
    #[error("bucket not found: {0}")]
    BucketNotFound(String),

    /// A transaction could not be started or committed.
    #[error("transaction error: {0}")]
    Transaction(String),

    /// A write was attempted inside a read-only transaction.
    #[error("cannot write in a read-only transaction")]
    ReadOnly,

    /// The store has been closed.
    #[error("store is closed")]
    Closed,

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The operation is not supported.
    #[error("operation not supported: {0}")]
    Unsupported(String),

    /// An engine error with no better classification.
    #[error("internal error: {0}")]
    Internal(String),
}

impl StoreError {
    /// Create an internal error from any displayable engine error.
    pub fn internal(err: impl std::fmt::Display) -> Self {
        Self::Internal(err.to_string())
    }

    /// Create a transaction error from any displayable engine error.
    pub fn transaction(err: impl std::fmt::Display) -> Self {
        Self::Transaction(err.to_string())
    }
}

/// A specialized `Result` type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
