//! # SealDB Storage
//!
//! Encrypted file storage for LevelDB-style databases.
//!
//! The engine above this crate addresses files by [`FileDesc`] (a kind and a
//! number) and never sees paths, ciphertext, or pointer files. This crate
//! maps descriptors to names, seals every file with AES-GCM, guards the
//! directory with a lock, and keeps the `CURRENT` manifest pointer
//! crash-safe.
//!
//! ## Design Principles
//!
//! - Each file is one authenticated message bound to its descriptor
//! - A failed authentication is always reported as corruption
//! - Pointer updates never leave the database without a valid `CURRENT`
//! - Keys come from the application and are never written to disk
//!
//! ## Directory Layout
//!
//! ```text
//! LOCK              advisory lock, empty
//! CURRENT           "MANIFEST-000042\n", plaintext
//! CURRENT.bak       previous CURRENT, plaintext
//! CURRENT.<n>       pending pointer, transient
//! MANIFEST-000042   encrypted
//! 000043.log        encrypted journal
//! 000044.ldb        encrypted table
//! 000045.tmp        encrypted temporary
//! ```
//!
//! ## Example
//!
//! ```rust
//! use sealdb_storage::{EncryptedStorage, FileDesc, FileReader, FileWriter, Storage};
//! use std::io::{Read, Write};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let storage = EncryptedStorage::open_path(dir.path(), &[1u8; 16], false).unwrap();
//!
//! let fd = FileDesc::table(1);
//! let mut writer = storage.create(fd).unwrap();
//! writer.write_all(b"hello world").unwrap();
//! writer.close().unwrap();
//!
//! let mut reader = storage.open(fd).unwrap();
//! let mut data = Vec::new();
//! reader.read_to_end(&mut data).unwrap();
//! reader.close().unwrap();
//! assert_eq!(data, b"hello world");
//!
//! storage.close().unwrap();
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod backend;
mod cipher;
mod config;
mod current;
mod desc;
mod dir;
mod encrypted;
mod error;
mod file;
mod lock;
mod naming;

pub use backend::{FileReader, FileWriter, Storage};
pub use cipher::{EncryptionKey, FileCipher, KeyStrength, AD_SIZE, NONCE_SIZE, TAG_SIZE};
pub use config::StorageConfig;
pub use desc::{FileDesc, FileKind, FileKindSet, MAX_FILE_NUM};
pub use encrypted::{EncryptedStorage, StorageLock};
pub use error::{StorageError, StorageResult};
pub use file::{EncryptedReader, EncryptedWriter};
pub use lock::{acquire as acquire_dir_lock, DirLock};
pub use naming::{
    file_name, parse_file_name, parse_pending_name, pending_name, CURRENT_BACKUP_FILE,
    CURRENT_FILE, LOCK_FILE,
};
