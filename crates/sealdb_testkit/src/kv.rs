//! A minimal key-value engine driving [`Storage`] the way a LevelDB-style
//! database does.
//!
//! State lives in memory. Durability comes from three kinds of files:
//!
//! - a journal (`<n>.log`): one JSON record per line, sealed after every
//!   write
//! - a table (`<n>.ldb`): the whole map as JSON, written at checkpoints
//! - a manifest (`MANIFEST-<n>`): names the live table and journal, and is
//!   made current with `set_meta`
//!
//! Opening replays the journal over the table, then checkpoints into fresh
//! files so the old journal can be dropped.

use crate::fixtures::{read_file, write_file};
use sealdb_storage::{FileDesc, FileKindSet, FileWriter, Storage, StorageError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::Write;
use thiserror::Error;
use tracing::{debug, warn};

/// Errors from the mini engine.
#[derive(Debug, Error)]
pub enum KvError {
    /// The storage layer failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A manifest, table or journal did not decode.
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),

    /// The manifest is inconsistent.
    #[error("invalid manifest: {0}")]
    InvalidManifest(String),
}

/// Result type for engine operations.
pub type KvResult<T> = Result<T, KvError>;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct Manifest {
    table: Option<u64>,
    journal: Option<u64>,
    next_file: u64,
}

#[derive(Debug, Serialize, Deserialize)]
struct Record {
    key: String,
    value: Option<String>,
}

/// The engine.
///
/// Files and the lock are released before the storage is dropped.
pub struct MiniKv<S: Storage> {
    data: BTreeMap<String, String>,
    manifest: Manifest,
    journal: Option<S::Writer>,
    lock: Option<S::Lock>,
    storage: S,
}

impl<S: Storage> MiniKv<S> {
    /// Opens the database held by `storage`, creating it if empty.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage is locked, the manifest pointer is
    /// corrupted, or any live file fails to decrypt or decode.
    pub fn open(storage: S) -> KvResult<Self> {
        let lock = storage.lock()?;

        let (manifest, data, replayed) = match storage.get_meta() {
            Ok(fd) => load(&storage, fd)?,
            Err(StorageError::NotFound) => {
                debug!("no manifest, starting empty");
                let manifest = Manifest {
                    table: None,
                    journal: None,
                    next_file: 1,
                };
                (manifest, BTreeMap::new(), 0)
            }
            Err(e) => return Err(e.into()),
        };
        debug!(keys = data.len(), replayed, "loaded database");

        let mut kv = Self {
            data,
            manifest,
            journal: None,
            lock: Some(lock),
            storage,
        };
        kv.checkpoint(true)?;
        Ok(kv)
    }

    /// Returns the value for `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.data.get(key).map(String::as_str)
    }

    /// Iterates over all entries in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.data.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Number of live keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns true if the database has no keys.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns the underlying storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    /// Sets `key` to `value` and makes the change durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be synced.
    pub fn put(&mut self, key: &str, value: &str) -> KvResult<()> {
        self.append(Record {
            key: key.to_string(),
            value: Some(value.to_string()),
        })?;
        self.data.insert(key.to_string(), value.to_string());
        Ok(())
    }

    /// Removes `key` and makes the change durable.
    ///
    /// # Errors
    ///
    /// Returns an error if the journal cannot be synced.
    pub fn delete(&mut self, key: &str) -> KvResult<()> {
        self.append(Record {
            key: key.to_string(),
            value: None,
        })?;
        self.data.remove(key);
        Ok(())
    }

    /// Compacts everything into a table, commits a journal-free manifest
    /// and hands the storage back.
    ///
    /// # Errors
    ///
    /// Returns an error if any file cannot be written or committed.
    pub fn close(mut self) -> KvResult<S> {
        if let Some(mut journal) = self.journal.take() {
            journal.close()?;
        }
        self.checkpoint(false)?;
        self.lock = None;
        Ok(self.storage)
    }

    /// Drops the engine without a checkpoint, as a process crash would.
    ///
    /// Everything acknowledged by [`put`](Self::put) is already in the
    /// journal.
    pub fn crash(mut self) -> S {
        self.journal = None;
        self.lock = None;
        self.storage
    }

    fn append(&mut self, record: Record) -> KvResult<()> {
        let Some(journal) = self.journal.as_mut() else {
            return Err(StorageError::Closed.into());
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');
        journal.write_all(&line).map_err(StorageError::from)?;
        journal.sync()?;
        Ok(())
    }

    fn allocate(&mut self) -> u64 {
        let num = self.manifest.next_file;
        self.manifest.next_file += 1;
        num
    }

    /// Writes the current map as a new table, optionally starts a new
    /// journal, commits a manifest naming them and removes everything else.
    fn checkpoint(&mut self, with_journal: bool) -> KvResult<()> {
        let table = FileDesc::table(self.allocate());
        write_file(&self.storage, table, &serde_json::to_vec(&self.data)?)?;

        let journal = if with_journal {
            let fd = FileDesc::journal(self.allocate());
            let mut writer = self.storage.create(fd)?;
            // An empty journal must still be a valid sealed file.
            writer.sync()?;
            self.journal = Some(writer);
            Some(fd.num)
        } else {
            None
        };

        let manifest_fd = FileDesc::manifest(self.allocate());
        self.manifest.table = Some(table.num);
        self.manifest.journal = journal;
        write_file(
            &self.storage,
            manifest_fd,
            &serde_json::to_vec(&self.manifest)?,
        )?;
        self.storage.set_meta(manifest_fd)?;
        debug!(%manifest_fd, %table, ?journal, "checkpoint committed");

        let mut live = vec![manifest_fd, table];
        live.extend(journal.map(FileDesc::journal));
        for fd in self.storage.list(FileKindSet::ALL)? {
            if !live.contains(&fd) {
                if let Err(e) = self.storage.remove(fd) {
                    warn!(error = %e, %fd, "remove obsolete file");
                }
            }
        }
        Ok(())
    }
}

type Loaded = (Manifest, BTreeMap<String, String>, usize);

fn load<S: Storage>(storage: &S, manifest_fd: FileDesc) -> KvResult<Loaded> {
    let manifest: Manifest = serde_json::from_slice(&read_file(storage, manifest_fd)?)?;
    let max_live = manifest.table.max(manifest.journal).unwrap_or(0);
    if max_live >= manifest.next_file || manifest_fd.num >= manifest.next_file {
        return Err(KvError::InvalidManifest(format!(
            "{manifest_fd} refers to files at or beyond next file {}",
            manifest.next_file
        )));
    }

    let mut data = match manifest.table {
        Some(num) => serde_json::from_slice(&read_file(storage, FileDesc::table(num))?)?,
        None => BTreeMap::new(),
    };

    let mut replayed = 0;
    if let Some(num) = manifest.journal {
        let bytes = read_file(storage, FileDesc::journal(num))?;
        for line in bytes.split(|&b| b == b'\n').filter(|l| !l.is_empty()) {
            let record: Record = serde_json::from_slice(line)?;
            match record.value {
                Some(value) => data.insert(record.key, value),
                None => data.remove(&record.key),
            };
            replayed += 1;
        }
    }
    Ok((manifest, data, replayed))
}
