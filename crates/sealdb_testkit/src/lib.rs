//! # SealDB Testkit
//!
//! Test utilities for SealDB storage.
//!
//! This crate provides:
//! - Temporary-directory fixtures and fixed test keys
//! - Property-based test generators using proptest
//! - Crash layouts for manifest-pointer recovery
//! - A minimal key-value engine that exercises storage end to end
//!
//! ## Usage
//!
//! ```rust
//! use sealdb_storage::FileDesc;
//! use sealdb_testkit::prelude::*;
//!
//! let test = TestStorage::new();
//! write_file(&*test, FileDesc::journal(1), b"record").unwrap();
//! assert_eq!(read_file(&*test, FileDesc::journal(1)).unwrap(), b"record");
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod crash;
pub mod fixtures;
pub mod generators;
pub mod kv;
pub mod logging;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::crash::*;
    pub use crate::fixtures::*;
    pub use crate::generators::*;
    pub use crate::kv::*;
    pub use crate::logging::*;
}

pub use fixtures::*;
pub use generators::*;
pub use kv::{KvError, KvResult, MiniKv};
pub use logging::init_test_tracing;
