//! Storage configuration.

use crate::cipher::EncryptionKey;
use std::path::PathBuf;

/// Configuration for opening an [`EncryptedStorage`](crate::EncryptedStorage).
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// Directory holding the database files.
    pub path: PathBuf,

    /// Key every file is sealed with.
    pub key: EncryptionKey,

    /// Open with a shared lock and reject all mutations.
    pub read_only: bool,
}

impl StorageConfig {
    /// Creates a read-write configuration.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, key: EncryptionKey) -> Self {
        Self {
            path: path.into(),
            key,
            read_only: false,
        }
    }

    /// Sets whether the storage is read-only.
    #[must_use]
    pub fn read_only(mut self, value: bool) -> Self {
        self.read_only = value;
        self
    }
}
