//! On-disk file names.
//!
//! Maps [`FileDesc`] values to the names the database engine expects and
//! back:
//!
//! ```text
//! MANIFEST-000002   manifest #2
//! 000100.log        journal #100
//! 000100.ldb        table #100
//! 000100.tmp        temp #100
//! ```
//!
//! Also names the fixed bookkeeping files (`LOCK`, `CURRENT`, `CURRENT.bak`,
//! `CURRENT.<n>`), which are never descriptors.

use crate::desc::{FileDesc, FileKind, MAX_FILE_NUM};

/// Directory lock marker.
pub const LOCK_FILE: &str = "LOCK";
/// Authoritative manifest pointer.
pub const CURRENT_FILE: &str = "CURRENT";
/// Previous manifest pointer.
pub const CURRENT_BACKUP_FILE: &str = "CURRENT.bak";

const MANIFEST_PREFIX: &str = "MANIFEST-";
const PENDING_PREFIX: &str = "CURRENT.";

/// Returns the on-disk name of `fd`.
#[must_use]
pub fn file_name(fd: FileDesc) -> String {
    match fd.kind {
        FileKind::Manifest => format!("{MANIFEST_PREFIX}{:06}", fd.num),
        FileKind::Journal => format!("{:06}.log", fd.num),
        FileKind::Table => format!("{:06}.ldb", fd.num),
        FileKind::Temp => format!("{:06}.tmp", fd.num),
    }
}

/// Parses an on-disk name back into a descriptor.
///
/// Returns `None` for anything [`file_name`] cannot produce, except that
/// any amount of zero padding is accepted. Every accepted name refers to the
/// same file [`file_name`] gives for the result, so a listed descriptor can
/// always be opened and removed.
#[must_use]
pub fn parse_file_name(name: &str) -> Option<FileDesc> {
    if let Some(digits) = name.strip_prefix(MANIFEST_PREFIX) {
        return parse_num(digits).map(FileDesc::manifest);
    }

    let (digits, suffix) = name.split_once('.')?;
    let kind = match suffix {
        "log" => FileKind::Journal,
        "ldb" => FileKind::Table,
        "tmp" => FileKind::Temp,
        _ => return None,
    };
    parse_num(digits).map(|num| FileDesc::new(kind, num))
}

/// Returns the name of the pending pointer file for manifest number `num`.
#[must_use]
pub fn pending_name(num: u64) -> String {
    format!("{PENDING_PREFIX}{num}")
}

/// Parses a pending pointer file name (`CURRENT.<n>`) into its number.
///
/// `CURRENT.bak` and anything else not ending in a plain decimal number
/// yield `None`.
#[must_use]
pub fn parse_pending_name(name: &str) -> Option<u64> {
    name.strip_prefix(PENDING_PREFIX).and_then(parse_num)
}

/// Parses a plain decimal file number.
///
/// Digits only: no sign, no whitespace, nothing trailing, and no value above
/// [`MAX_FILE_NUM`].
fn parse_num(digits: &str) -> Option<u64> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    digits.parse::<u64>().ok().filter(|&n| n <= MAX_FILE_NUM)
}
