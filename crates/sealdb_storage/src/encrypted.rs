//! Encrypted directory storage.
//!
//! [`EncryptedStorage`] implements [`Storage`] over one directory. File
//! contents are sealed with [`FileCipher`]. Bookkeeping files (`LOCK`,
//! `CURRENT*`) stay in plaintext so the directory protocol works unchanged.

use crate::backend::Storage;
use crate::cipher::{EncryptionKey, FileCipher};
use crate::config::StorageConfig;
use crate::current;
use crate::desc::{FileDesc, FileKindSet};
use crate::dir::{read_dir_names, rename_replace};
use crate::error::{StorageError, StorageResult};
use crate::file::{EncryptedReader, EncryptedWriter};
use crate::lock::{self, DirLock};
use crate::naming::{file_name, parse_file_name};
use parking_lot::{Mutex, MutexGuard};
use std::fs::{self, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};
use tracing::{debug, warn};

/// State shared between a storage handle and its open files.
#[derive(Debug)]
pub(crate) struct Shared {
    pub(crate) path: PathBuf,
    pub(crate) read_only: bool,
    pub(crate) cipher: FileCipher,
    state: Mutex<State>,
}

#[derive(Debug)]
struct State {
    closed: bool,
    open_files: usize,
    dir_lock: Option<Box<dyn DirLock>>,
    /// Id of the outstanding [`StorageLock`], if any.
    storage_lock: Option<u64>,
    next_lock_id: u64,
}

impl Shared {
    /// Called once by each reader or writer when it is released.
    pub(crate) fn file_closed(&self) {
        let mut state = self.state.lock();
        state.open_files = state.open_files.saturating_sub(1);
    }
}

/// Guard for the storage-level advisory lock.
///
/// The lock is released by [`unlock`](Self::unlock) or on drop. A guard
/// from read-only storage is inert.
#[derive(Debug)]
pub struct StorageLock {
    owner: Option<(Weak<Shared>, u64)>,
}

impl StorageLock {
    /// Releases the lock.
    pub fn unlock(mut self) {
        self.release();
    }

    /// Returns true if this guard does not hold the lock slot.
    #[must_use]
    pub fn is_inert(&self) -> bool {
        self.owner.is_none()
    }

    fn release(&mut self) {
        let Some((shared, id)) = self.owner.take() else {
            return;
        };
        if let Some(shared) = shared.upgrade() {
            let mut state = shared.state.lock();
            if state.storage_lock == Some(id) {
                state.storage_lock = None;
            }
        }
    }
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Storage that encrypts every database file in a directory.
///
/// # Example
///
/// ```no_run
/// use sealdb_storage::{EncryptedStorage, FileDesc, FileWriter, Storage};
/// use std::io::Write;
///
/// let storage = EncryptedStorage::open_path("my_db", &[7u8; 32], false)?;
///
/// let manifest = FileDesc::manifest(1);
/// let mut writer = storage.create(manifest)?;
/// writer.write_all(b"manifest contents")?;
/// writer.close()?;
/// storage.set_meta(manifest)?;
///
/// storage.close()?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
///
/// # Thread Safety
///
/// All operations take `&self` and serialize on one internal mutex.
/// Readers and writers are independent values, each used by one caller
/// at a time.
#[derive(Debug)]
pub struct EncryptedStorage {
    shared: Arc<Shared>,
}

impl EncryptedStorage {
    /// Opens storage over `config.path`.
    ///
    /// A missing directory is created unless the storage is read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The key length is unsupported (`InvalidKeySize`)
    /// - The path exists but is not a directory (`NotADirectory`)
    /// - Another handle holds a conflicting lock (`AlreadyLocked`)
    /// - I/O errors occur
    pub fn open(config: StorageConfig) -> StorageResult<Self> {
        let StorageConfig {
            path,
            key,
            read_only,
        } = config;
        let cipher = FileCipher::new(&key)?;

        match fs::metadata(&path) {
            Ok(meta) if !meta.is_dir() => return Err(StorageError::NotADirectory { path }),
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound && !read_only => {
                fs::create_dir_all(&path)?;
            }
            Err(e) => return Err(e.into()),
        }

        let dir_lock = lock::acquire(&path, read_only)?;
        debug!(path = %path.display(), read_only, ?cipher, "opened encrypted storage");

        Ok(Self {
            shared: Arc::new(Shared {
                path,
                read_only,
                cipher,
                state: Mutex::new(State {
                    closed: false,
                    open_files: 0,
                    dir_lock: Some(dir_lock),
                    storage_lock: None,
                    next_lock_id: 0,
                }),
            }),
        })
    }

    /// Opens storage from a path and raw key bytes.
    ///
    /// # Errors
    ///
    /// See [`open`](Self::open).
    pub fn open_path(path: impl AsRef<Path>, key: &[u8], read_only: bool) -> StorageResult<Self> {
        let key = EncryptionKey::from_bytes(key)?;
        Self::open(StorageConfig::new(path.as_ref(), key).read_only(read_only))
    }

    /// Returns the storage directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.shared.path
    }

    /// Returns true if the storage was opened read-only.
    #[must_use]
    pub fn is_read_only(&self) -> bool {
        self.shared.read_only
    }

    /// Number of readers and writers not yet released.
    #[must_use]
    pub fn open_files(&self) -> usize {
        self.shared.state.lock().open_files
    }

    /// Returns true once [`close`](Storage::close) has succeeded.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.state.lock().closed
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.shared.read_only {
            return Err(StorageError::ReadOnly);
        }
        Ok(())
    }

    /// Locks the shared state, failing if the storage is closed.
    fn state(&self) -> StorageResult<MutexGuard<'_, State>> {
        let state = self.shared.state.lock();
        if state.closed {
            return Err(StorageError::Closed);
        }
        Ok(state)
    }

    fn file_path(&self, fd: FileDesc) -> PathBuf {
        self.shared.path.join(file_name(fd))
    }
}

fn check_valid(fd: FileDesc) -> StorageResult<()> {
    if !fd.is_valid() {
        return Err(StorageError::InvalidDescriptor);
    }
    Ok(())
}

impl Storage for EncryptedStorage {
    type Reader = EncryptedReader;
    type Writer = EncryptedWriter;
    type Lock = StorageLock;

    fn lock(&self) -> StorageResult<StorageLock> {
        let mut state = self.state()?;
        if self.shared.read_only {
            return Ok(StorageLock { owner: None });
        }
        if state.storage_lock.is_some() {
            return Err(StorageError::AlreadyLocked);
        }
        let id = state.next_lock_id;
        state.next_lock_id += 1;
        state.storage_lock = Some(id);
        Ok(StorageLock {
            owner: Some((Arc::downgrade(&self.shared), id)),
        })
    }

    fn get_meta(&self) -> StorageResult<FileDesc> {
        let _state = self.state()?;
        current::get_meta(&self.shared.path, !self.shared.read_only)
    }

    fn set_meta(&self, fd: FileDesc) -> StorageResult<()> {
        check_valid(fd)?;
        self.check_writable()?;
        let _state = self.state()?;
        current::set_meta(&self.shared.path, fd)
    }

    fn list(&self, kinds: FileKindSet) -> StorageResult<Vec<FileDesc>> {
        let _state = self.state()?;
        let mut fds: Vec<FileDesc> = read_dir_names(&self.shared.path)?
            .iter()
            .filter_map(|name| parse_file_name(name))
            .filter(|fd| kinds.contains(fd.kind))
            .collect();
        fds.sort();
        Ok(fds)
    }

    fn open(&self, fd: FileDesc) -> StorageResult<EncryptedReader> {
        check_valid(fd)?;
        let mut state = self.state()?;
        debug!(%fd, "open");

        let stored = fs::read(self.file_path(fd))?;
        let plaintext = self.shared.cipher.open(fd, &stored)?;
        state.open_files += 1;
        Ok(EncryptedReader::new(Arc::clone(&self.shared), fd, plaintext))
    }

    fn create(&self, fd: FileDesc) -> StorageResult<EncryptedWriter> {
        check_valid(fd)?;
        self.check_writable()?;
        let mut state = self.state()?;
        debug!(%fd, "create");

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(self.file_path(fd))?;
        state.open_files += 1;
        Ok(EncryptedWriter::new(Arc::clone(&self.shared), fd, file))
    }

    fn remove(&self, fd: FileDesc) -> StorageResult<()> {
        check_valid(fd)?;
        self.check_writable()?;
        let _state = self.state()?;
        debug!(%fd, "remove");

        fs::remove_file(self.file_path(fd))
            .inspect_err(|e| warn!(error = %e, "remove {fd}"))
            .map_err(StorageError::from)
    }

    fn rename(&self, old: FileDesc, new: FileDesc) -> StorageResult<()> {
        check_valid(old)?;
        check_valid(new)?;
        if old == new {
            return Ok(());
        }
        self.check_writable()?;
        let _state = self.state()?;
        debug!(%old, %new, "rename");

        rename_replace(&self.file_path(old), &self.file_path(new))
            .inspect_err(|e| warn!(error = %e, "rename {old} to {new}"))
            .map_err(StorageError::from)
    }

    fn close(&self) -> StorageResult<()> {
        let mut state = self.state()?;
        if state.open_files > 0 {
            warn!(
                open_files = state.open_files,
                "closing storage with files still open"
            );
        }
        state.closed = true;
        match state.dir_lock.take() {
            Some(mut dir_lock) => dir_lock.release().map_err(StorageError::from),
            None => Ok(()),
        }
    }
}

impl Drop for EncryptedStorage {
    fn drop(&mut self) {
        if !self.is_closed() {
            warn!(path = %self.shared.path.display(), "storage dropped without close");
            if let Err(e) = self.close() {
                warn!(error = %e, "closing dropped storage");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{FileReader, FileWriter};
    use crate::cipher::{KeyStrength, NONCE_SIZE};
    use crate::desc::FileKind;
    use std::io::{Read, Seek, SeekFrom, Write};
    use tempfile::{tempdir, TempDir};

    const KEY: [u8; 16] = [0, 1, 2, 3, 4, 5, 6, 7, 8, 9, 10, 11, 12, 13, 14, 15];

    fn open_rw(temp: &TempDir) -> EncryptedStorage {
        EncryptedStorage::open_path(temp.path(), &KEY, false).unwrap()
    }

    fn write(storage: &EncryptedStorage, fd: FileDesc, data: &[u8]) {
        let mut w = storage.create(fd).unwrap();
        w.write_all(data).unwrap();
        w.close().unwrap();
    }

    fn read(storage: &EncryptedStorage, fd: FileDesc) -> Vec<u8> {
        let mut r = storage.open(fd).unwrap();
        let mut out = Vec::new();
        r.read_to_end(&mut out).unwrap();
        r.close().unwrap();
        out
    }

    #[test]
    fn creates_missing_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("nested").join("db");
        let storage = EncryptedStorage::open_path(&path, &KEY, false).unwrap();
        assert!(path.is_dir());
        assert!(path.join("LOCK").exists());
        storage.close().unwrap();
    }

    #[test]
    fn read_only_does_not_create_directory() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("missing");
        let err = EncryptedStorage::open_path(&path, &KEY, true).unwrap_err();
        assert!(matches!(err, StorageError::Io(e) if e.kind() == io::ErrorKind::NotFound));
        assert!(!path.exists());
    }

    #[test]
    fn rejects_file_path() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("plain");
        fs::write(&path, b"x").unwrap();
        let err = EncryptedStorage::open_path(&path, &KEY, false).unwrap_err();
        assert!(matches!(err, StorageError::NotADirectory { .. }));
    }

    #[test]
    fn rejects_bad_key() {
        let temp = tempdir().unwrap();
        let err = EncryptedStorage::open_path(temp.path(), &[0u8; 24], false).unwrap_err();
        assert!(matches!(err, StorageError::InvalidKeySize { actual: 24, .. }));
    }

    #[test]
    fn write_then_read() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);

        let fd = FileDesc::table(12);
        write(&storage, fd, b"hello encrypted table");
        assert_eq!(read(&storage, fd), b"hello encrypted table");

        let raw = fs::read(temp.path().join("000012.ldb")).unwrap();
        assert!(!raw.windows(5).any(|w| w == b"hello"));
        storage.close().unwrap();
    }

    #[test]
    fn survives_reopen_with_both_key_sizes() {
        for strength in [KeyStrength::Aes128, KeyStrength::Aes256] {
            let temp = tempdir().unwrap();
            let key = crate::cipher::EncryptionKey::generate(strength);
            let fd = FileDesc::journal(3);

            let storage = EncryptedStorage::open(StorageConfig::new(temp.path(), key.clone())).unwrap();
            write(&storage, fd, b"durable");
            storage.close().unwrap();

            let storage = EncryptedStorage::open(StorageConfig::new(temp.path(), key)).unwrap();
            assert_eq!(read(&storage, fd), b"durable");
            storage.close().unwrap();
        }
    }

    #[test]
    fn sync_rewrites_whole_file() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::journal(1);

        let mut w = storage.create(fd).unwrap();
        w.write_all(b"first").unwrap();
        w.sync().unwrap();
        assert_eq!(read(&storage, fd), b"first");

        w.write_all(b" second").unwrap();
        w.sync().unwrap();
        assert_eq!(read(&storage, fd), b"first second");

        let raw = fs::read(temp.path().join("000001.log")).unwrap();
        assert_eq!(raw.len(), NONCE_SIZE + 12 + crate::cipher::TAG_SIZE);
        w.close().unwrap();
    }

    #[test]
    fn unsynced_writes_never_reach_disk() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::journal(2);

        let mut w = storage.create(fd).unwrap();
        w.write_all(b"pending").unwrap();
        w.flush().unwrap();
        assert_eq!(w.buffered(), 7);
        assert_eq!(fs::metadata(temp.path().join("000002.log")).unwrap().len(), 0);
        w.close().unwrap();
    }

    #[test]
    fn flipped_byte_is_corruption() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::table(7);
        write(&storage, fd, b"some table data");

        let path = temp.path().join("000007.ldb");
        let original = fs::read(&path).unwrap();
        for i in [0, NONCE_SIZE, original.len() / 2, original.len() - 1] {
            let mut tampered = original.clone();
            tampered[i] ^= 0x80;
            fs::write(&path, &tampered).unwrap();
            assert!(storage.open(fd).unwrap_err().is_corrupted(), "byte {i}");
        }
        assert_eq!(storage.open_files(), 0);
    }

    #[test]
    fn swapped_files_are_corruption() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::table(1), b"table one");
        write(&storage, FileDesc::table(2), b"table two");

        let a = temp.path().join("000001.ldb");
        let b = temp.path().join("000002.ldb");
        let bytes_a = fs::read(&a).unwrap();
        let bytes_b = fs::read(&b).unwrap();
        fs::write(&a, &bytes_b).unwrap();
        fs::write(&b, &bytes_a).unwrap();

        assert!(storage.open(FileDesc::table(1)).unwrap_err().is_corrupted());
        assert!(storage.open(FileDesc::table(2)).unwrap_err().is_corrupted());
    }

    #[test]
    fn wrong_key_is_corruption() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::manifest(1), b"manifest");
        storage.close().unwrap();

        let other = EncryptedStorage::open_path(temp.path(), &[9u8; 16], false).unwrap();
        assert!(other.open(FileDesc::manifest(1)).unwrap_err().is_corrupted());
    }

    #[test]
    fn reader_seek_and_read_at() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::table(4);
        write(&storage, fd, b"0123456789");

        let mut r = storage.open(fd).unwrap();
        assert_eq!(r.len(), 10);
        assert_eq!(r.fd(), fd);

        let mut buf = [0u8; 4];
        assert_eq!(r.read_at(&mut buf, 3).unwrap(), 4);
        assert_eq!(&buf, b"3456");
        assert_eq!(r.read_at(&mut buf, 8).unwrap(), 2);
        assert_eq!(&buf[..2], b"89");
        assert_eq!(r.read_at(&mut buf, 50).unwrap(), 0);

        r.seek(SeekFrom::Start(6)).unwrap();
        let mut rest = String::new();
        r.read_to_string(&mut rest).unwrap();
        assert_eq!(rest, "6789");
        r.close().unwrap();
    }

    #[test]
    fn open_file_counter() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::table(1);
        write(&storage, fd, b"x");
        assert_eq!(storage.open_files(), 0);

        let mut r1 = storage.open(fd).unwrap();
        let r2 = storage.open(fd).unwrap();
        let w = storage.create(FileDesc::temp(2)).unwrap();
        assert_eq!(storage.open_files(), 3);

        r1.close().unwrap();
        assert!(matches!(r1.close(), Err(StorageError::Closed)));
        assert_eq!(storage.open_files(), 2);

        drop(r2);
        drop(w);
        assert_eq!(storage.open_files(), 0);
    }

    #[test]
    fn dropped_writer_still_seals() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let fd = FileDesc::temp(5);
        {
            let mut w = storage.create(fd).unwrap();
            w.write_all(b"kept").unwrap();
        }
        assert_eq!(read(&storage, fd), b"kept");
    }

    #[test]
    fn closed_writer_rejects_use() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let mut w = storage.create(FileDesc::temp(1)).unwrap();
        w.close().unwrap();

        assert!(w.write_all(b"late").is_err());
        assert!(matches!(w.sync(), Err(StorageError::Closed)));
        assert!(matches!(w.close(), Err(StorageError::Closed)));
    }

    #[test]
    fn invalid_descriptor_rejected_first() {
        let temp = tempdir().unwrap();
        let storage = EncryptedStorage::open_path(temp.path(), &KEY, false).unwrap();
        let bad = FileDesc::table(u64::MAX);
        storage.close().unwrap();

        assert!(matches!(storage.open(bad), Err(StorageError::InvalidDescriptor)));
        assert!(matches!(storage.create(bad), Err(StorageError::InvalidDescriptor)));
        assert!(matches!(storage.remove(bad), Err(StorageError::InvalidDescriptor)));
        assert!(matches!(
            storage.rename(bad, FileDesc::table(1)),
            Err(StorageError::InvalidDescriptor)
        ));
        assert!(matches!(storage.set_meta(bad), Err(StorageError::InvalidDescriptor)));
    }

    #[test]
    fn read_only_rejects_mutations() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::table(1), b"t");
        storage.close().unwrap();

        let ro = EncryptedStorage::open_path(temp.path(), &KEY, true).unwrap();
        assert!(ro.is_read_only());
        assert!(matches!(ro.create(FileDesc::table(2)), Err(StorageError::ReadOnly)));
        assert!(matches!(ro.remove(FileDesc::table(1)), Err(StorageError::ReadOnly)));
        assert!(matches!(
            ro.rename(FileDesc::table(1), FileDesc::table(3)),
            Err(StorageError::ReadOnly)
        ));
        assert!(matches!(ro.set_meta(FileDesc::manifest(1)), Err(StorageError::ReadOnly)));
        assert_eq!(read(&ro, FileDesc::table(1)), b"t");
        ro.close().unwrap();
    }

    #[test]
    fn closed_storage_rejects_everything() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        storage.close().unwrap();
        assert!(storage.is_closed());

        assert!(matches!(storage.close(), Err(StorageError::Closed)));
        assert!(matches!(storage.open(FileDesc::table(1)), Err(StorageError::Closed)));
        assert!(matches!(storage.create(FileDesc::table(1)), Err(StorageError::Closed)));
        assert!(matches!(storage.remove(FileDesc::table(1)), Err(StorageError::Closed)));
        assert!(matches!(storage.list(FileKindSet::ALL), Err(StorageError::Closed)));
        assert!(matches!(storage.get_meta(), Err(StorageError::Closed)));
        assert!(matches!(storage.set_meta(FileDesc::manifest(1)), Err(StorageError::Closed)));
        assert!(matches!(storage.lock(), Err(StorageError::Closed)));
    }

    #[test]
    fn close_with_open_files_succeeds() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        let w = storage.create(FileDesc::journal(1)).unwrap();
        storage.close().unwrap();
        drop(w);

        let _again = open_rw(&temp);
    }

    #[test]
    fn list_filters_by_kind() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::manifest(1), b"m");
        write(&storage, FileDesc::journal(2), b"j");
        write(&storage, FileDesc::table(3), b"t");
        write(&storage, FileDesc::table(4), b"t");
        write(&storage, FileDesc::temp(5), b"x");
        fs::write(temp.path().join("README"), b"ignored").unwrap();
        storage.set_meta(FileDesc::manifest(1)).unwrap();

        assert_eq!(
            storage.list(FileKindSet::only(FileKind::Table)).unwrap(),
            vec![FileDesc::table(3), FileDesc::table(4)]
        );
        assert_eq!(
            storage
                .list(FileKindSet::only(FileKind::Journal).with(FileKind::Manifest))
                .unwrap(),
            vec![FileDesc::manifest(1), FileDesc::journal(2)]
        );
        assert_eq!(storage.list(FileKindSet::ALL).unwrap().len(), 5);
        assert!(storage.list(FileKindSet::EMPTY).unwrap().is_empty());
    }

    #[test]
    fn listed_tables_are_removable() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::table(5), b"t");
        fs::write(temp.path().join("000005.sst"), b"foreign").unwrap();
        fs::write(temp.path().join("000006.sst"), b"foreign").unwrap();

        let listed = storage.list(FileKindSet::only(FileKind::Table)).unwrap();
        assert_eq!(listed, vec![FileDesc::table(5)]);
        for fd in listed {
            storage.remove(fd).unwrap();
        }
        assert!(storage.list(FileKindSet::ALL).unwrap().is_empty());
        assert!(temp.path().join("000006.sst").exists());
    }

    #[test]
    fn remove_and_rename() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        write(&storage, FileDesc::temp(1), b"payload");

        storage.rename(FileDesc::temp(1), FileDesc::temp(1)).unwrap();
        storage.rename(FileDesc::temp(1), FileDesc::temp(2)).unwrap();
        assert!(!temp.path().join("000001.tmp").exists());
        // Renamed bytes are still bound to the old descriptor.
        assert!(storage.open(FileDesc::temp(2)).unwrap_err().is_corrupted());

        storage.remove(FileDesc::temp(2)).unwrap();
        let err = storage.remove(FileDesc::temp(2)).unwrap_err();
        assert!(matches!(err, StorageError::Io(e) if e.kind() == io::ErrorKind::NotFound));
    }

    #[test]
    fn meta_round_trip_through_facade() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);
        assert!(matches!(storage.get_meta(), Err(StorageError::NotFound)));

        for num in [1, 2, 10] {
            let fd = FileDesc::manifest(num);
            write(&storage, fd, b"TEST");
            storage.set_meta(fd).unwrap();
            assert_eq!(storage.get_meta().unwrap(), fd);
        }
    }

    #[test]
    fn storage_lock_is_exclusive_per_handle() {
        let temp = tempdir().unwrap();
        let storage = open_rw(&temp);

        let first = storage.lock().unwrap();
        assert!(!first.is_inert());
        assert!(matches!(storage.lock(), Err(StorageError::AlreadyLocked)));

        first.unlock();
        let second = storage.lock().unwrap();
        drop(second);
        let _third = storage.lock().unwrap();
    }

    #[test]
    fn read_only_storage_lock_is_inert() {
        let temp = tempdir().unwrap();
        open_rw(&temp).close().unwrap();

        let ro = EncryptedStorage::open_path(temp.path(), &KEY, true).unwrap();
        let a = ro.lock().unwrap();
        let b = ro.lock().unwrap();
        assert!(a.is_inert() && b.is_inert());
    }

    #[test]
    fn dropping_storage_releases_directory_lock() {
        let temp = tempdir().unwrap();
        {
            let _storage = open_rw(&temp);
        }
        let storage = open_rw(&temp);
        storage.close().unwrap();
    }
}
