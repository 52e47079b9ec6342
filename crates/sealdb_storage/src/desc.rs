//! File descriptors: the logical identity of every stored file.

use std::fmt;

/// Largest file number a descriptor may carry.
///
/// Engines in the LevelDB family use signed 64-bit file numbers, so the
/// upper half of `u64` is not representable on disk.
pub const MAX_FILE_NUM: u64 = i64::MAX as u64;

/// The kind of a stored file.
///
/// The discriminants are bit flags; they double as the kind byte bound into
/// each file's associated data and as members of a [`FileKindSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[repr(u8)]
pub enum FileKind {
    /// Database manifest (`MANIFEST-<n>`).
    Manifest = 1,
    /// Write-ahead journal (`<n>.log`).
    Journal = 2,
    /// Sorted table (`<n>.ldb`).
    Table = 4,
    /// Scratch file (`<n>.tmp`).
    Temp = 8,
}

impl FileKind {
    /// All kinds, in tag order.
    pub const ALL: [FileKind; 4] = [
        FileKind::Manifest,
        FileKind::Journal,
        FileKind::Table,
        FileKind::Temp,
    ];

    /// Returns the numeric tag of this kind.
    #[must_use]
    pub const fn tag(self) -> u8 {
        self as u8
    }

    /// Converts a numeric tag back into a kind.
    #[must_use]
    pub const fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(Self::Manifest),
            2 => Some(Self::Journal),
            4 => Some(Self::Table),
            8 => Some(Self::Temp),
            _ => None,
        }
    }
}

impl fmt::Display for FileKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Manifest => "manifest",
            Self::Journal => "journal",
            Self::Table => "table",
            Self::Temp => "temp",
        };
        f.write_str(name)
    }
}

/// A set of file kinds, used to filter directory listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FileKindSet(u8);

impl FileKindSet {
    /// The empty set.
    pub const EMPTY: Self = Self(0);
    /// Every file kind.
    pub const ALL: Self = Self(1 | 2 | 4 | 8);

    /// Returns a set containing only `kind`.
    #[must_use]
    pub const fn only(kind: FileKind) -> Self {
        Self(kind.tag())
    }

    /// Returns this set with `kind` added.
    #[must_use]
    pub const fn with(self, kind: FileKind) -> Self {
        Self(self.0 | kind.tag())
    }

    /// Returns true if `kind` is in the set.
    #[must_use]
    pub const fn contains(self, kind: FileKind) -> bool {
        self.0 & kind.tag() != 0
    }
}

impl From<FileKind> for FileKindSet {
    fn from(kind: FileKind) -> Self {
        Self::only(kind)
    }
}

impl FromIterator<FileKind> for FileKindSet {
    fn from_iter<I: IntoIterator<Item = FileKind>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Identity of one stored file: its kind plus its sequence number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileDesc {
    /// The file kind.
    pub kind: FileKind,
    /// The file number.
    pub num: u64,
}

impl FileDesc {
    /// Creates a descriptor.
    #[must_use]
    pub const fn new(kind: FileKind, num: u64) -> Self {
        Self { kind, num }
    }

    /// Shorthand for a manifest descriptor.
    #[must_use]
    pub const fn manifest(num: u64) -> Self {
        Self::new(FileKind::Manifest, num)
    }

    /// Shorthand for a journal descriptor.
    #[must_use]
    pub const fn journal(num: u64) -> Self {
        Self::new(FileKind::Journal, num)
    }

    /// Shorthand for a table descriptor.
    #[must_use]
    pub const fn table(num: u64) -> Self {
        Self::new(FileKind::Table, num)
    }

    /// Shorthand for a temp descriptor.
    #[must_use]
    pub const fn temp(num: u64) -> Self {
        Self::new(FileKind::Temp, num)
    }

    /// Returns true if the number is within the representable range.
    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.num <= MAX_FILE_NUM
    }
}

impl fmt::Display for FileDesc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.num)
    }
}
