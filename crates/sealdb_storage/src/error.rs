//! Error types for storage operations.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The file descriptor has an unknown kind or an out-of-range number.
    #[error("invalid file descriptor")]
    InvalidDescriptor,

    /// A mutation was attempted on a read-only storage.
    #[error("storage is read only")]
    ReadOnly,

    /// The storage (or the reader/writer) is closed.
    #[error("storage is closed")]
    Closed,

    /// The lock is already held.
    #[error("storage is already locked")]
    AlreadyLocked,

    /// No current manifest pointer exists, or it names a missing file.
    #[error("no current manifest pointer found")]
    NotFound,

    /// A pointer file or an encrypted file failed validation.
    #[error("storage corrupted: {message}")]
    Corrupted {
        /// Description of the corruption.
        message: String,
    },

    /// The key does not have a supported length.
    #[error("invalid key size: expected {expected} bytes, got {actual}")]
    InvalidKeySize {
        /// Supported sizes, as text.
        expected: &'static str,
        /// Actual size in bytes.
        actual: usize,
    },

    /// The OS random source could not produce a nonce.
    #[error("unable to generate a nonce")]
    NonceUnavailable,

    /// The storage path exists but is not a directory.
    #[error("not a directory: {}", path.display())]
    NotADirectory {
        /// The offending path.
        path: PathBuf,
    },
}

impl StorageError {
    /// Creates a corruption error.
    pub fn corrupted(message: impl Into<String>) -> Self {
        Self::Corrupted {
            message: message.into(),
        }
    }

    /// Returns true if this is a [`StorageError::Corrupted`].
    #[must_use]
    pub fn is_corrupted(&self) -> bool {
        matches!(self, Self::Corrupted { .. })
    }

    /// Returns true if this is a [`StorageError::NotFound`].
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}
