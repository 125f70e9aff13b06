//! Unified error type for the StrataKV engine.
//!
//! Component crates keep their own narrow error enums; everything crossing
//! the public API is folded into [`Error`] here.

use std::io;

use sstable::SSTableError;
use thiserror::Error;
use wal::WalError;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

/// StrataKV error kinds.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller passed something unusable: an empty directory path, an empty
    /// put value, a range whose start exceeds its end.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The environment is not what the engine needs, e.g. the configured
    /// path exists but is not a directory.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Get miss, or the key is tombstoned.
    #[error("key not found")]
    NotFound,

    /// Filesystem read/write/fsync/rename failure.
    #[error("io error: {0}")]
    Io(#[from] io::Error),

    /// On-disk data did not decode: a bad SSTable body or a WAL record that
    /// is broken mid-stream.
    #[error("corruption: {0}")]
    Corruption(String),

    /// Engine invariant violation.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<WalError> for Error {
    fn from(e: WalError) -> Self {
        match e {
            WalError::Io(e) => Error::Io(e),
            WalError::Corruption(msg) => Error::Corruption(msg),
        }
    }
}

impl From<SSTableError> for Error {
    fn from(e: SSTableError) -> Self {
        match e {
            SSTableError::Io(e) => Error::Io(e),
            SSTableError::Corruption(msg) => Error::Corruption(msg),
        }
    }
}
