//! Directory-level file helpers.
//!
//! Small durable primitives the rest of the crate is built from: synced
//! whole-file writes, atomic replacing renames, directory fsync, and
//! listing.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

/// Writes `data` to `path`, replacing any previous content, then syncs and
/// closes the file.
///
/// Every step's error is reported; a failed sync is not masked by a
/// successful close.
pub(crate) fn write_file_synced(path: &Path, data: &[u8]) -> io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)?;
    file.write_all(data)?;
    file.sync_all()?;
    drop(file);
    Ok(())
}

/// Renames `from` onto `to`, replacing `to` if it exists.
///
/// `std::fs::rename` replaces the destination atomically on Unix and
/// Windows. Elsewhere the destination is removed first.
pub(crate) fn rename_replace(from: &Path, to: &Path) -> io::Result<()> {
    if cfg!(not(any(unix, windows))) {
        match fs::remove_file(to) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
    }
    fs::rename(from, to)
}

/// Syncs a directory so that creates, renames and removals inside it are
/// durable.
///
/// On Windows, directory fsync is not supported the way it is on Unix; the
/// NTFS journal gives equivalent guarantees for metadata, so this is a
/// no-op there.
#[cfg(unix)]
pub(crate) fn sync_dir(path: &Path) -> io::Result<()> {
    let dir = fs::File::open(path)?;
    dir.sync_all()
}

#[cfg(not(unix))]
pub(crate) fn sync_dir(_path: &Path) -> io::Result<()> {
    Ok(())
}

/// Returns the names of all entries in `path`.
///
/// Names that are not valid UTF-8 cannot belong to the database and are
/// skipped.
pub(crate) fn read_dir_names(path: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(path)? {
        if let Ok(name) = entry?.file_name().into_string() {
            names.push(name);
        }
    }
    Ok(names)
}
