//! Storage trait definitions.

use crate::desc::{FileDesc, FileKindSet};
use crate::error::StorageResult;
use std::io::{self, Read, Seek, Write};

/// The file storage a LevelDB-style engine runs on.
///
/// The engine performs all durable I/O through this trait: it opens and
/// creates whole files by [`FileDesc`], lists and removes them, and
/// records which manifest is authoritative.
///
/// # Invariants
///
/// - Descriptors are validated before any I/O
/// - Mutations fail with `ReadOnly` on read-only storage
/// - Every operation fails with `Closed` after [`close`](Self::close)
/// - [`get_meta`](Self::get_meta) distinguishes `NotFound` (new database)
///   from `Corrupted` (unrecoverable metadata)
pub trait Storage: Send + Sync {
    /// Reader returned by [`open`](Self::open).
    type Reader: FileReader;
    /// Writer returned by [`create`](Self::create).
    type Writer: FileWriter;
    /// Guard returned by [`lock`](Self::lock); dropping it unlocks.
    type Lock: Send;

    /// Takes the storage-level advisory lock.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyLocked` if a previous guard is still alive.
    fn lock(&self) -> StorageResult<Self::Lock>;

    /// Returns the authoritative manifest, repairing pointer files if
    /// needed.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if no manifest pointer exists, or `Corrupted` if
    /// pointers exist but none is usable.
    fn get_meta(&self) -> StorageResult<FileDesc>;

    /// Durably makes `fd` the authoritative manifest.
    ///
    /// # Errors
    ///
    /// Returns an error if any step of the commit fails.
    fn set_meta(&self, fd: FileDesc) -> StorageResult<()>;

    /// Lists stored files whose kind is in `kinds`.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be read.
    fn list(&self, kinds: FileKindSet) -> StorageResult<Vec<FileDesc>>;

    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns `Corrupted` if the stored bytes fail authentication.
    fn open(&self, fd: FileDesc) -> StorageResult<Self::Reader>;

    /// Creates (or truncates) a file for writing.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be created.
    fn create(&self, fd: FileDesc) -> StorageResult<Self::Writer>;

    /// Removes a file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be removed.
    fn remove(&self, fd: FileDesc) -> StorageResult<()>;

    /// Renames a file, replacing any file already at `new`.
    ///
    /// # Errors
    ///
    /// Returns an error if the rename fails.
    fn rename(&self, old: FileDesc, new: FileDesc) -> StorageResult<()>;

    /// Closes the storage and releases the directory lock.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if already closed.
    fn close(&self) -> StorageResult<()>;
}

/// A readable view of one stored file's plaintext.
pub trait FileReader: Read + Seek + Send {
    /// Reads into `buf` starting at `offset`, without moving the cursor.
    ///
    /// Returns the number of bytes read; fewer than `buf.len()` means the
    /// end of the file was reached.
    ///
    /// # Errors
    ///
    /// Returns an error if the reader is closed.
    fn read_at(&self, buf: &mut [u8], offset: u64) -> io::Result<usize>;

    /// Plaintext length in bytes.
    fn len(&self) -> u64;

    /// Returns true if the file is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Releases the reader.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if already closed.
    fn close(&mut self) -> StorageResult<()>;
}

/// A writer for one stored file.
///
/// Bytes written are buffered; nothing reaches disk until
/// [`sync`](Self::sync) or [`close`](Self::close) seals the whole buffer.
pub trait FileWriter: Write + Send {
    /// Seals everything written so far and makes it durable.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or any disk step fails.
    fn sync(&mut self) -> StorageResult<()>;

    /// Syncs and releases the writer.
    ///
    /// # Errors
    ///
    /// Returns `Closed` if already closed, or any sync error.
    fn close(&mut self) -> StorageResult<()>;
}
