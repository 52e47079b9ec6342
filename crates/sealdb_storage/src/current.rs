//! Manifest pointer management.
//!
//! The authoritative manifest is named by the `CURRENT` file. Updating it
//! must survive a crash at any point, so a commit goes through three files:
//!
//! ```text
//! CURRENT        authoritative pointer
//! CURRENT.bak    copy of the previous pointer, written before replacing it
//! CURRENT.<n>    pending pointer for manifest <n>, renamed onto CURRENT
//! ```
//!
//! Each pointer file holds one line: the manifest's file name followed by
//! `\n`.
//!
//! Recovery ([`get_meta`]) looks at pending files first (newest first), then
//! `CURRENT`, then `CURRENT.bak`, and skips any pointer that is malformed
//! or names a file that no longer exists.

use crate::desc::FileDesc;
use crate::dir::{read_dir_names, rename_replace, sync_dir, write_file_synced};
use crate::error::{StorageError, StorageResult};
use crate::naming::{
    file_name, parse_file_name, parse_pending_name, pending_name, CURRENT_BACKUP_FILE,
    CURRENT_FILE,
};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{debug, warn};

/// Makes `fd` the authoritative manifest.
///
/// Steps, each durable before the next:
/// 1. If `CURRENT` already names `fd`, return without writing anything
/// 2. Copy `CURRENT` to `CURRENT.bak`
/// 3. Write `CURRENT.<n>`
/// 4. Rename `CURRENT.<n>` onto `CURRENT`
/// 5. Sync the directory
///
/// A failure aborts the commit; files already written are left in place
/// for recovery.
pub(crate) fn set_meta(dir: &Path, fd: FileDesc) -> StorageResult<()> {
    let content = format!("{}\n", file_name(fd));
    let current_path = dir.join(CURRENT_FILE);

    match fs::read(&current_path) {
        Ok(existing) => {
            if existing == content.as_bytes() {
                debug!(%fd, "CURRENT unchanged");
                return Ok(());
            }
            write_file_synced(&dir.join(CURRENT_BACKUP_FILE), &existing)
                .inspect_err(|e| warn!(error = %e, "backup CURRENT"))?;
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound => {}
        Err(e) => {
            warn!(error = %e, "read CURRENT");
            return Err(e.into());
        }
    }

    let pending = pending_name(fd.num);
    let pending_path = dir.join(&pending);
    write_file_synced(&pending_path, content.as_bytes())
        .inspect_err(|e| warn!(error = %e, "create {pending}"))?;
    rename_replace(&pending_path, &current_path)
        .inspect_err(|e| warn!(error = %e, "rename {pending}"))?;
    sync_dir(dir).inspect_err(|e| warn!(error = %e, "sync directory"))?;

    debug!(%fd, "CURRENT updated");
    Ok(())
}

/// A pointer file that parsed and whose target exists.
#[derive(Debug)]
struct Pointer {
    name: String,
    fd: FileDesc,
}

/// Outcome of scanning a list of pointer files.
#[derive(Debug)]
enum Scan {
    Found(Pointer),
    /// Every file was absent or named a missing target.
    Missing,
    /// Nothing usable; the last corruption seen.
    Corrupted(StorageError),
}

/// Recovers the authoritative manifest.
///
/// When `writable`, a pointer recovered from anywhere other than a clean
/// `CURRENT` is committed again with [`set_meta`], and on success the
/// pending files are removed. That cleanup is attempted once per call;
/// leftovers are retried by the next call.
///
/// # Errors
///
/// - [`StorageError::NotFound`] if no pointer names an existing file
/// - [`StorageError::Corrupted`] if none did and some pointer was malformed
/// - any other I/O error, immediately
pub(crate) fn get_meta(dir: &Path, writable: bool) -> StorageResult<FileDesc> {
    let mut pending: Vec<(u64, String)> = read_dir_names(dir)?
        .into_iter()
        .filter_map(|name| parse_pending_name(&name).map(|num| (num, name)))
        .collect();
    pending.sort_by(|a, b| b.0.cmp(&a.0));
    let pending_names: Vec<String> = pending.into_iter().map(|(_, name)| name).collect();

    let pending_scan = scan(dir, &pending_names)?;
    let current_scan = scan(dir, &[CURRENT_FILE, CURRENT_BACKUP_FILE])?;

    // A pending pointer wins only if it is newer than what CURRENT holds;
    // otherwise it is left over from an older commit.
    let chosen = match (pending_scan, current_scan) {
        (Scan::Found(p), Scan::Found(c)) => {
            if p.fd.num > c.fd.num {
                p
            } else {
                c
            }
        }
        (Scan::Found(p), _) => p,
        (_, Scan::Found(c)) => c,
        (Scan::Corrupted(e), _) | (_, Scan::Corrupted(e)) => return Err(e),
        (Scan::Missing, Scan::Missing) => return Err(StorageError::NotFound),
    };

    if writable && (chosen.name != CURRENT_FILE || !pending_names.is_empty()) {
        debug!(fd = %chosen.fd, from = %chosen.name, "restoring CURRENT");
        match set_meta(dir, chosen.fd) {
            Ok(()) => remove_pending(dir, &pending_names),
            Err(e) => warn!(error = %e, "restore CURRENT; keeping pending files"),
        }
    }

    Ok(chosen.fd)
}

/// Tries each pointer file in order and returns the first good one.
fn scan<S: AsRef<str>>(dir: &Path, names: &[S]) -> StorageResult<Scan> {
    let mut last_corruption = None;
    for name in names {
        match read_pointer(dir, name.as_ref()) {
            Ok(pointer) => return Ok(Scan::Found(pointer)),
            Err(StorageError::NotFound) => {}
            Err(e @ StorageError::Corrupted { .. }) => last_corruption = Some(e),
            Err(e) => return Err(e),
        }
    }
    Ok(match last_corruption {
        Some(e) => Scan::Corrupted(e),
        None => Scan::Missing,
    })
}

/// Reads one pointer file and checks its target exists.
fn read_pointer(dir: &Path, name: &str) -> StorageResult<Pointer> {
    let content = match fs::read(dir.join(name)) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Err(StorageError::NotFound),
        Err(e) => return Err(e.into()),
    };

    let fd = content
        .strip_suffix(b"\n")
        .and_then(|line| std::str::from_utf8(line).ok())
        .and_then(parse_file_name);
    let Some(fd) = fd else {
        warn!(
            "{name}: corrupted content: {:?}",
            String::from_utf8_lossy(&content)
        );
        return Err(StorageError::corrupted(format!(
            "{name}: corrupted or incomplete pointer file"
        )));
    };

    match fs::metadata(dir.join(file_name(fd))) {
        Ok(_) => Ok(Pointer {
            name: name.to_string(),
            fd,
        }),
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            warn!("{name}: missing target file: {}", file_name(fd));
            Err(StorageError::NotFound)
        }
        Err(e) => Err(e.into()),
    }
}

fn remove_pending(dir: &Path, names: &[String]) {
    for name in names {
        match fs::remove_file(dir.join(name)) {
            Ok(()) => {}
            // Already consumed by the rename in set_meta.
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => warn!(error = %e, "remove {name}"),
        }
    }
}
