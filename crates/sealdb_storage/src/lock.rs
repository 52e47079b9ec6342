//! Directory locking.
//!
//! A storage directory is guarded by its `LOCK` file:
//!
//! - a read-write handle takes an exclusive lock
//! - a read-only handle takes a shared lock
//!
//! so any number of readers may coexist, but never alongside a writer.
//! The implementation is chosen per target at build time and hidden behind
//! [`DirLock`].

use crate::error::{StorageError, StorageResult};
use crate::naming::LOCK_FILE;
use std::fmt;
use std::io;
use std::path::Path;

/// A held directory lock.
///
/// Releasing is idempotent, and dropping the lock releases it.
pub trait DirLock: Send + Sync + fmt::Debug {
    /// Releases the lock. Calling this again is a no-op.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform fails to release the lock.
    fn release(&mut self) -> io::Result<()>;
}

/// Acquires the lock on `dir` without blocking.
///
/// # Errors
///
/// Returns [`StorageError::AlreadyLocked`] if a conflicting lock is held,
/// and passes other I/O errors through.
pub fn acquire(dir: &Path, read_only: bool) -> StorageResult<Box<dyn DirLock>> {
    platform::acquire(dir, read_only)
}

#[cfg(any(unix, windows))]
mod platform {
    use super::*;
    use fs2::FileExt;
    use std::fs::{File, OpenOptions};

    /// Advisory whole-file lock via `flock`/`LockFileEx`.
    #[derive(Debug)]
    pub(super) struct FileLock {
        file: Option<File>,
    }

    pub(super) fn acquire(dir: &Path, read_only: bool) -> StorageResult<Box<dyn DirLock>> {
        let path = dir.join(LOCK_FILE);
        let file = match OpenOptions::new().read(true).write(!read_only).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                // A read-only handle still needs the marker to lock against.
                OpenOptions::new()
                    .read(true)
                    .write(!read_only)
                    .append(read_only)
                    .create(true)
                    .open(&path)?
            }
            Err(e) => return Err(e.into()),
        };

        // std::fs::File has inherent lock methods of its own; use fs2's.
        let locked = if read_only {
            FileExt::try_lock_shared(&file)
        } else {
            FileExt::try_lock_exclusive(&file)
        };
        match locked {
            Ok(()) => Ok(Box::new(FileLock { file: Some(file) })),
            Err(e) if is_contended(&e) => Err(StorageError::AlreadyLocked),
            Err(e) => Err(e.into()),
        }
    }

    fn is_contended(err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::WouldBlock
            || err.raw_os_error() == fs2::lock_contended_error().raw_os_error()
    }

    impl DirLock for FileLock {
        fn release(&mut self) -> io::Result<()> {
            match self.file.take() {
                Some(file) => FileExt::unlock(&file),
                None => Ok(()),
            }
        }
    }

    impl Drop for FileLock {
        fn drop(&mut self) {
            // Closing the file also drops the OS lock.
            let _ = self.release();
        }
    }
}

/// Create-exclusive locking for targets without advisory file locks.
///
/// A writer owns `LOCK` for as long as it holds the lock. Each reader owns a
/// `LOCK.<pid>-<seq>` marker. Both sides create their own file first and
/// then look for the other side, backing out on conflict, so a writer and a
/// reader racing each other cannot both succeed. Files left behind by a
/// crashed process keep the directory locked until they are removed.
#[cfg_attr(any(unix, windows), allow(dead_code))]
mod exclusive {
    use super::*;
    use std::fs::{self, OpenOptions};
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU64, Ordering};

    const READER_PREFIX: &str = "LOCK.";

    static NEXT_READER: AtomicU64 = AtomicU64::new(0);

    #[derive(Debug)]
    pub(super) struct CreateLock {
        owned: Option<PathBuf>,
    }

    pub(super) fn acquire(dir: &Path, read_only: bool) -> StorageResult<Box<dyn DirLock>> {
        let (path, conflict): (PathBuf, fn(&Path) -> io::Result<bool>) = if read_only {
            let seq = NEXT_READER.fetch_add(1, Ordering::Relaxed);
            let name = format!("{READER_PREFIX}{}-{seq}", std::process::id());
            (dir.join(name), writer_present)
        } else {
            (dir.join(LOCK_FILE), readers_present)
        };

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(_) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(StorageError::AlreadyLocked)
            }
            Err(e) => return Err(e.into()),
        }

        let mut lock = CreateLock { owned: Some(path) };
        match conflict(dir) {
            Ok(false) => Ok(Box::new(lock)),
            Ok(true) => {
                lock.release()?;
                Err(StorageError::AlreadyLocked)
            }
            Err(e) => {
                let _ = lock.release();
                Err(e.into())
            }
        }
    }

    fn writer_present(dir: &Path) -> io::Result<bool> {
        Ok(dir.join(LOCK_FILE).exists())
    }

    fn readers_present(dir: &Path) -> io::Result<bool> {
        for entry in fs::read_dir(dir)? {
            if entry?
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(READER_PREFIX))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    impl DirLock for CreateLock {
        fn release(&mut self) -> io::Result<()> {
            match self.owned.take() {
                Some(path) => fs::remove_file(path),
                None => Ok(()),
            }
        }
    }

    impl Drop for CreateLock {
        fn drop(&mut self) {
            let _ = self.release();
        }
    }

}

#[cfg(not(any(unix, windows)))]
use exclusive as platform;
