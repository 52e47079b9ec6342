//! Benchmark utilities.

use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};

/// 128-bit benchmark key.
pub const SHORT_KEY: [u8; 16] = [
    0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb, 0xc, 0xd, 0xe, 0xf,
];

/// 256-bit benchmark key.
pub const LONG_KEY: [u8; 32] = [
    0x0, 0x1, 0x2, 0x3, 0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb, 0xc, 0xd, 0xe, 0xf, 0x0, 0x1, 0x2,
    0x3, 0x4, 0x5, 0x6, 0x7, 0x8, 0x9, 0xa, 0xb, 0xc, 0xd, 0xe, 0xf,
];

/// Generate random data of the specified size.
pub fn random_data(size: usize) -> Vec<u8> {
    let mut rng = rand::thread_rng();
    (0..size).map(|_| rng.gen()).collect()
}

/// Generate `count` random hex keys from `len` random bytes each.
///
/// The same arguments always give the same keys.
pub fn random_keys(count: usize, len: usize) -> Vec<String> {
    let mut rng = StdRng::seed_from_u64((count + len) as u64);
    (0..count)
        .map(|_| {
            let mut bytes = vec![0u8; len];
            rng.fill_bytes(&mut bytes);
            bytes.iter().map(|b| format!("{b:02x}")).collect()
        })
        .collect()
}
