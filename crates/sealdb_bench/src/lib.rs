//! Benchmark helpers for SealDB storage.

pub mod utils;
