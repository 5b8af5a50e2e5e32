//! Storage engine error types
//!
//! Defines all errors that can occur in the on-disk index store.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur in the index store
#[derive(Error, Debug)]
pub enum StoreError {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization failed
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Compression or decompression failed
    #[error("Compression error: {0}")]
    Compression(String),

    /// Data corruption detected (checksum mismatch, invalid magic, etc.)
    #[error("Corrupt data: {0}")]
    Corruption(String),

    /// Segment file format error
    #[error("Invalid segment format: {0}")]
    InvalidSegment(String),

    /// No commit point exists in the directory
    #[error("No index found in {0:?}")]
    IndexNotFound(PathBuf),

    /// Another writer holds the directory lock
    #[error("Lock held by another writer: {0:?}")]
    LockHeld(PathBuf),

    /// Caller passed an argument the store cannot honour
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Codec name not known to this store
    #[error("Unknown codec: {0}")]
    UnknownCodec(String),
}

impl From<bincode::Error> for StoreError {
    fn from(err: bincode::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Result type alias for store operations
pub type StoreResult<T> = Result<T, StoreError>;
