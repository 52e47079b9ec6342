//! Crash layouts for manifest-pointer recovery tests.
//!
//! A crash during `set_meta` can leave any combination of `CURRENT`,
//! `CURRENT.bak` and pending `CURRENT.<n>` files behind, each either intact
//! or cut short. [`PointerLayout`] writes those files directly so tests can
//! reproduce every combination without interrupting a real commit.
//!
//! ## Usage
//!
//! ```rust
//! use sealdb_storage::FileDesc;
//! use sealdb_testkit::crash::{PointerFile, PointerLayout};
//!
//! let dir = tempfile::tempdir().unwrap();
//! let layout = PointerLayout::new(dir.path());
//! layout.point(PointerFile::Current, FileDesc::manifest(1)).unwrap();
//! layout.point(PointerFile::Pending(2), FileDesc::manifest(2)).unwrap();
//! layout.corrupt(PointerFile::Pending(2)).unwrap();
//! ```

use sealdb_storage::{
    file_name, parse_pending_name, pending_name, FileDesc, CURRENT_BACKUP_FILE, CURRENT_FILE,
};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// One of the plaintext pointer files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerFile {
    /// `CURRENT`.
    Current,
    /// `CURRENT.bak`.
    Backup,
    /// `CURRENT.<n>`, left behind by an interrupted commit.
    Pending(u64),
}

impl PointerFile {
    /// File name inside the storage directory.
    pub fn name(self) -> String {
        match self {
            Self::Current => CURRENT_FILE.to_string(),
            Self::Backup => CURRENT_BACKUP_FILE.to_string(),
            Self::Pending(num) => pending_name(num),
        }
    }
}

/// Writes raw pointer files and manifest targets into a directory.
#[derive(Debug, Clone)]
pub struct PointerLayout {
    dir: PathBuf,
}

impl PointerLayout {
    /// Creates a layout over `dir`.
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    fn path(&self, file: PointerFile) -> PathBuf {
        self.dir.join(file.name())
    }

    /// Makes `file` point at `target`, with the trailing newline.
    pub fn point(&self, file: PointerFile, target: FileDesc) -> io::Result<()> {
        self.write_raw(file, format!("{}\n", file_name(target)).as_bytes())
    }

    /// Writes arbitrary bytes into `file`.
    pub fn write_raw(&self, file: PointerFile, content: &[u8]) -> io::Result<()> {
        fs::write(self.path(file), content)
    }

    /// Cuts `file` to half its length, as a torn write would.
    pub fn corrupt(&self, file: PointerFile) -> io::Result<()> {
        let content = fs::read(self.path(file))?;
        self.write_raw(file, &content[..content.len() / 2])
    }

    /// Removes `file` if present.
    pub fn remove(&self, file: PointerFile) -> io::Result<()> {
        match fs::remove_file(self.path(file)) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e),
            _ => Ok(()),
        }
    }

    /// Returns the content of `file`, or `None` if it does not exist.
    pub fn read(&self, file: PointerFile) -> io::Result<Option<Vec<u8>>> {
        match fs::read(self.path(file)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns true if `file` exists.
    pub fn exists(&self, file: PointerFile) -> bool {
        self.path(file).exists()
    }

    /// Creates a placeholder file for `target` so a pointer to it resolves.
    ///
    /// The content is not a valid sealed file; recovery only checks that
    /// the target exists.
    pub fn create_target(&self, target: FileDesc) -> io::Result<()> {
        fs::write(self.dir.join(file_name(target)), b"placeholder")
    }

    /// Numbers of all pending pointer files, ascending.
    pub fn pending(&self) -> io::Result<Vec<u64>> {
        let mut nums = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(num) = entry.file_name().to_str().and_then(parse_pending_name) {
                nums.push(num);
            }
        }
        nums.sort_unstable();
        Ok(nums)
    }
}

/// Condition of one pointer slot in a crash scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    /// The file does not exist.
    Absent,
    /// The file points at a manifest that exists.
    Valid(u64),
    /// The file points at a manifest that was never written.
    Dangling(u64),
    /// The file is cut short.
    Torn(u64),
}

impl Slot {
    /// Writes this slot's state into `file`.
    pub fn apply(self, layout: &PointerLayout, file: PointerFile) -> io::Result<()> {
        match self {
            Self::Absent => layout.remove(file),
            Self::Valid(num) => {
                layout.create_target(FileDesc::manifest(num))?;
                layout.point(file, FileDesc::manifest(num))
            }
            Self::Dangling(num) => layout.point(file, FileDesc::manifest(num)),
            Self::Torn(num) => {
                layout.point(file, FileDesc::manifest(num))?;
                layout.corrupt(file)
            }
        }
    }
}

/// What `get_meta` should report for a scenario.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Recovered {
    /// The given manifest is current.
    Manifest(u64),
    /// No usable pointer, and nothing corrupted.
    NotFound,
    /// No usable pointer, and at least one was corrupted.
    Corrupted,
}

/// A crash scenario: the state of each pointer slot and the expected
/// outcome.
#[derive(Debug, Clone)]
pub struct CrashScenario {
    /// Human-readable name for assertion messages.
    pub name: &'static str,
    /// State of `CURRENT`.
    pub current: Slot,
    /// State of `CURRENT.bak`.
    pub backup: Slot,
    /// Pending files, keyed by their own number.
    pub pending: Vec<(u64, Slot)>,
    /// Expected recovery result.
    pub expected: Recovered,
}

impl CrashScenario {
    /// Writes the scenario's files into `dir`.
    pub fn apply(&self, dir: &Path) -> io::Result<PointerLayout> {
        let layout = PointerLayout::new(dir);
        self.current.apply(&layout, PointerFile::Current)?;
        self.backup.apply(&layout, PointerFile::Backup)?;
        for &(num, slot) in &self.pending {
            slot.apply(&layout, PointerFile::Pending(num))?;
        }
        Ok(layout)
    }
}

/// The recovery table: every interesting combination of pointer states.
pub fn crash_scenarios() -> Vec<CrashScenario> {
    use Recovered as R;
    use Slot::*;

    let scenario = |name, current, backup, pending: &[(u64, Slot)], expected| CrashScenario {
        name,
        current,
        backup,
        pending: pending.to_vec(),
        expected,
    };

    vec![
        scenario("empty directory", Absent, Absent, &[], R::NotFound),
        scenario("clean current", Valid(1), Absent, &[], R::Manifest(1)),
        scenario("current with backup", Valid(2), Valid(1), &[], R::Manifest(2)),
        scenario("torn current, valid backup", Torn(2), Valid(1), &[], R::Manifest(1)),
        scenario("dangling current, valid backup", Dangling(2), Valid(1), &[], R::Manifest(1)),
        scenario("torn current, no backup", Torn(1), Absent, &[], R::Corrupted),
        scenario("dangling current only", Dangling(1), Absent, &[], R::NotFound),
        scenario("newer pending", Valid(1), Absent, &[(2, Valid(2))], R::Manifest(2)),
        scenario("stale pending", Valid(3), Absent, &[(2, Valid(2))], R::Manifest(3)),
        scenario("pending only", Absent, Absent, &[(4, Valid(4))], R::Manifest(4)),
        scenario(
            "torn newest pending falls back to older",
            Valid(1),
            Absent,
            &[(2, Valid(2)), (3, Torn(3))],
            R::Manifest(2),
        ),
        scenario("torn pending only", Absent, Absent, &[(2, Torn(2))], R::Corrupted),
        scenario(
            "dangling pending, valid current",
            Valid(1),
            Absent,
            &[(5, Dangling(5))],
            R::Manifest(1),
        ),
    ]
}
