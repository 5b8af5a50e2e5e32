//! Session error types

use thiserror::Error;

use crate::store::error::StoreError;

/// Shown whenever a write is attempted without write access
pub const READ_ONLY_MESSAGE: &str = "unable to open writer, index is in readonly mode";

/// Errors raised by the session and the operations built on it
#[derive(Error, Debug)]
pub enum SessionError {
    /// The index could not be opened for reading; no session can exist
    #[error("Unable to open index: {0}")]
    StartupFailure(String),

    /// Write access was requested but cannot be granted
    #[error("{0}")]
    WriterUnavailable(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("segment id must be a number between 0 and {max}, got {value}")]
    InvalidSegment { value: String, max: i64 },

    /// Two commands registered under one name
    #[error("Command already registered: {0}")]
    DuplicateCommand(String),

    #[error("Export failed: {0}")]
    ExportFailure(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl SessionError {
    pub fn read_only() -> Self {
        SessionError::WriterUnavailable(READ_ONLY_MESSAGE.to_string())
    }

    pub fn invalid_segment(value: impl Into<String>, segment_count: usize) -> Self {
        SessionError::InvalidSegment {
            value: value.into(),
            max: segment_count as i64 - 1,
        }
    }
}

/// Result type alias for session operations
pub type SessionResult<T> = Result<T, SessionError>;
