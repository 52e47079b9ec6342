//! Property-based test generators using proptest.
//!
//! Provides strategies for generating descriptors and file contents that
//! respect the storage's invariants.

use proptest::prelude::*;
use sealdb_storage::{FileDesc, FileKind, FileKindSet, MAX_FILE_NUM};

/// Strategy for any file kind.
pub fn file_kind_strategy() -> impl Strategy<Value = FileKind> + Clone {
    prop::sample::select(FileKind::ALL.to_vec())
}

/// Strategy for arbitrary kind masks, including the empty one.
pub fn file_kind_set_strategy() -> impl Strategy<Value = FileKindSet> {
    prop::collection::vec(file_kind_strategy(), 0..=4)
        .prop_map(|kinds| kinds.into_iter().collect())
}

/// Strategy for valid file numbers, biased toward small and boundary values.
pub fn file_num_strategy() -> impl Strategy<Value = u64> {
    prop_oneof![
        4 => 0u64..1_000_000,
        2 => 0..=MAX_FILE_NUM,
        1 => Just(0u64),
        1 => Just(MAX_FILE_NUM),
    ]
}

/// Strategy for valid descriptors.
pub fn file_desc_strategy() -> impl Strategy<Value = FileDesc> {
    (file_kind_strategy(), file_num_strategy()).prop_map(|(kind, num)| FileDesc::new(kind, num))
}

/// Strategy for descriptors whose number is out of range.
pub fn invalid_file_desc_strategy() -> impl Strategy<Value = FileDesc> {
    (file_kind_strategy(), (MAX_FILE_NUM + 1)..=u64::MAX)
        .prop_map(|(kind, num)| FileDesc::new(kind, num))
}

/// Strategy for file contents.
pub fn file_data_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(any::<u8>(), 0..4096)
}

/// Strategy for 16- or 32-byte raw keys.
pub fn key_bytes_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 16),
        prop::collection::vec(any::<u8>(), 32),
    ]
}

/// An operation against storage, for sequence tests.
#[derive(Debug, Clone)]
pub enum FileOperation {
    /// Create a file and write data to it.
    Write {
        /// Target file.
        fd: FileDesc,
        /// Plaintext.
        data: Vec<u8>,
    },
    /// Remove a file if present.
    Remove {
        /// Target file.
        fd: FileDesc,
    },
    /// Make a manifest current.
    SetMeta {
        /// Manifest number.
        num: u64,
    },
}

/// Strategy for a short sequence of operations over a small set of files.
pub fn file_operations_strategy(max_ops: usize) -> impl Strategy<Value = Vec<FileOperation>> {
    let small_fd = (file_kind_strategy(), 1u64..8).prop_map(|(kind, num)| FileDesc::new(kind, num));
    let op = prop_oneof![
        4 => (small_fd.clone(), prop::collection::vec(any::<u8>(), 0..256))
            .prop_map(|(fd, data)| FileOperation::Write { fd, data }),
        1 => small_fd.prop_map(|fd| FileOperation::Remove { fd }),
        1 => (1u64..8).prop_map(|num| FileOperation::SetMeta { num }),
    ];
    prop::collection::vec(op, 1..=max_ops)
}
