//! Test fixtures and storage helpers.
//!
//! Provides convenience functions for setting up encrypted storage in a
//! temporary directory and for moving whole files in and out of it.

use sealdb_storage::{
    EncryptedStorage, EncryptionKey, FileDesc, FileReader, FileWriter, Storage, StorageConfig,
    StorageResult,
};
use std::io::{Read, Write};
use std::path::Path;
use tempfile::TempDir;

/// Fixed 128-bit test key.
pub const TEST_KEY_128: [u8; 16] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
];

/// Fixed 256-bit test key.
pub const TEST_KEY_256: [u8; 32] = [
    0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d, 0x0e, 0x0f,
    0x10, 0x11, 0x12, 0x13, 0x14, 0x15, 0x16, 0x17, 0x18, 0x19, 0x1a, 0x1b, 0x1c, 0x1d, 0x1e, 0x1f,
];

/// Encrypted storage over a temporary directory.
///
/// The directory is removed when the fixture is dropped.
pub struct TestStorage {
    /// The open storage handle.
    pub storage: EncryptedStorage,
    key: EncryptionKey,
    temp_dir: TempDir,
}

impl TestStorage {
    /// Opens read-write storage with [`TEST_KEY_128`].
    pub fn new() -> Self {
        Self::with_key(&TEST_KEY_128)
    }

    /// Opens read-write storage with the given raw key.
    pub fn with_key(key: &[u8]) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let key = EncryptionKey::from_bytes(key).expect("Invalid test key");
        let storage = EncryptedStorage::open(StorageConfig::new(temp_dir.path(), key.clone()))
            .expect("Failed to open storage");
        Self {
            storage,
            key,
            temp_dir,
        }
    }

    /// Returns the storage directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Closes the handle and opens a new one over the same directory.
    pub fn reopen(&mut self, read_only: bool) {
        self.reopen_with(self.key.clone(), read_only);
    }

    /// Closes the handle and opens a new one with a different key.
    pub fn reopen_with(&mut self, key: EncryptionKey, read_only: bool) {
        if !self.storage.is_closed() {
            self.storage.close().expect("Failed to close storage");
        }
        self.storage = EncryptedStorage::open(
            StorageConfig::new(self.temp_dir.path(), key).read_only(read_only),
        )
        .expect("Failed to reopen storage");
    }
}

impl Default for TestStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl std::ops::Deref for TestStorage {
    type Target = EncryptedStorage;

    fn deref(&self) -> &Self::Target {
        &self.storage
    }
}

/// Creates `fd`, writes `data` and closes the writer.
pub fn write_file<S: Storage>(storage: &S, fd: FileDesc, data: &[u8]) -> StorageResult<()> {
    let mut writer = storage.create(fd)?;
    writer.write_all(data)?;
    writer.close()
}

/// Opens `fd` and reads its whole plaintext.
pub fn read_file<S: Storage>(storage: &S, fd: FileDesc) -> StorageResult<Vec<u8>> {
    let mut reader = storage.open(fd)?;
    let mut data = Vec::new();
    reader.read_to_end(&mut data)?;
    reader.close()?;
    Ok(data)
}

/// Runs a test against fresh storage.
///
/// # Example
///
/// ```rust
/// use sealdb_storage::{FileDesc, Storage};
/// use sealdb_testkit::{read_file, with_temp_storage, write_file};
///
/// with_temp_storage(|storage| {
///     write_file(storage, FileDesc::table(1), b"data").unwrap();
///     assert_eq!(read_file(storage, FileDesc::table(1)).unwrap(), b"data");
/// });
/// ```
pub fn with_temp_storage<F, R>(f: F) -> R
where
    F: FnOnce(&EncryptedStorage) -> R,
{
    let test = TestStorage::new();
    f(&test.storage)
}
