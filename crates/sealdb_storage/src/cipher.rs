//! Per-file authenticated encryption.
//!
//! ## Format
//!
//! Every stored file is one AES-GCM message:
//!
//! ```text
//! nonce (12 bytes) || ciphertext || tag (16 bytes)
//! ```
//!
//! The file's descriptor is bound in as associated data, so a file copied or
//! renamed into another slot fails authentication.
//!
//! ## Security Model
//!
//! - AES-128-GCM or AES-256-GCM, selected by key length
//! - Fresh nonce from the OS random source on every seal
//! - Keys are zeroized on drop and never printed
//! - Keys are never stored; the application provides them

use crate::desc::FileDesc;
use crate::error::{StorageError, StorageResult};
use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes128Gcm, Aes256Gcm, Nonce,
};
use rand::{rngs::OsRng, RngCore};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of the GCM nonce in bytes.
pub const NONCE_SIZE: usize = 12;
/// Size of the GCM authentication tag in bytes.
pub const TAG_SIZE: usize = 16;
/// Size of the associated data: kind byte plus a varint-width number slot.
pub const AD_SIZE: usize = 1 + 10;

/// Supported key strengths.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyStrength {
    /// 128-bit key, AES-128-GCM.
    Aes128,
    /// 256-bit key, AES-256-GCM.
    Aes256,
}

impl KeyStrength {
    /// Key length in bytes.
    #[must_use]
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    fn from_key_len(len: usize) -> Option<Self> {
        match len {
            16 => Some(Self::Aes128),
            32 => Some(Self::Aes256),
            _ => None,
        }
    }
}

/// Raw key material.
///
/// The key is automatically zeroized when dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey {
    bytes: Vec<u8>,
}

impl EncryptionKey {
    /// Creates a key from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKeySize`] unless the slice is 16 or
    /// 32 bytes long.
    pub fn from_bytes(bytes: &[u8]) -> StorageResult<Self> {
        if KeyStrength::from_key_len(bytes.len()).is_none() {
            return Err(StorageError::InvalidKeySize {
                expected: "16 or 32",
                actual: bytes.len(),
            });
        }
        Ok(Self {
            bytes: bytes.to_vec(),
        })
    }

    /// Generates a new random key of the given strength.
    #[must_use]
    pub fn generate(strength: KeyStrength) -> Self {
        let mut bytes = vec![0u8; strength.key_len()];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Returns the strength implied by the key length.
    #[must_use]
    pub fn strength(&self) -> KeyStrength {
        match self.bytes.len() {
            16 => KeyStrength::Aes128,
            _ => KeyStrength::Aes256,
        }
    }

    /// Returns the raw key bytes.
    ///
    /// # Security
    ///
    /// Don't log or serialize the result.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("strength", &self.strength())
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

enum Algorithm {
    Aes128(Aes128Gcm),
    Aes256(Aes256Gcm),
}

/// Seals and opens whole files, binding each to its descriptor.
///
/// One `FileCipher` is built per storage handle and shared by every reader
/// and writer.
pub struct FileCipher {
    algorithm: Algorithm,
}

impl FileCipher {
    /// Creates a cipher for the given key.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::InvalidKeySize`] if the key length is not
    /// supported.
    pub fn new(key: &EncryptionKey) -> StorageResult<Self> {
        let invalid = |_| StorageError::InvalidKeySize {
            expected: "16 or 32",
            actual: key.as_bytes().len(),
        };
        let algorithm = match key.strength() {
            KeyStrength::Aes128 => {
                Algorithm::Aes128(Aes128Gcm::new_from_slice(key.as_bytes()).map_err(invalid)?)
            }
            KeyStrength::Aes256 => {
                Algorithm::Aes256(Aes256Gcm::new_from_slice(key.as_bytes()).map_err(invalid)?)
            }
        };
        Ok(Self { algorithm })
    }

    /// Encrypts the full contents of the file `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::NonceUnavailable`] if the OS random source
    /// fails.
    pub fn seal(&self, fd: FileDesc, plaintext: &[u8]) -> StorageResult<Vec<u8>> {
        let mut nonce_bytes = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce_bytes)
            .map_err(|_| StorageError::NonceUnavailable)?;
        let nonce = Nonce::from_slice(&nonce_bytes);

        let aad = associated_data(fd);
        let payload = Payload {
            msg: plaintext,
            aad: &aad,
        };
        let sealed = match &self.algorithm {
            Algorithm::Aes128(c) => c.encrypt(nonce, payload),
            Algorithm::Aes256(c) => c.encrypt(nonce, payload),
        }
        .map_err(|_| StorageError::corrupted(format!("failed to seal {fd}")))?;

        let mut out = Vec::with_capacity(NONCE_SIZE + sealed.len());
        out.extend_from_slice(&nonce_bytes);
        out.extend(sealed);
        Ok(out)
    }

    /// Decrypts the stored contents of the file `fd`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Corrupted`] if the data is too short or fails
    /// authentication (tampering, wrong key, or wrong descriptor).
    pub fn open(&self, fd: FileDesc, stored: &[u8]) -> StorageResult<Vec<u8>> {
        if stored.len() < NONCE_SIZE + TAG_SIZE {
            return Err(StorageError::corrupted(format!(
                "{fd}: encrypted file too short ({} bytes)",
                stored.len()
            )));
        }

        let (nonce_bytes, body) = stored.split_at(NONCE_SIZE);
        let nonce = Nonce::from_slice(nonce_bytes);
        let aad = associated_data(fd);
        let payload = Payload { msg: body, aad: &aad };

        match &self.algorithm {
            Algorithm::Aes128(c) => c.decrypt(nonce, payload),
            Algorithm::Aes256(c) => c.decrypt(nonce, payload),
        }
        .map_err(|_| StorageError::corrupted(format!("{fd}: authentication failed")))
    }
}

impl std::fmt::Debug for FileCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self.algorithm {
            Algorithm::Aes128(_) => "Aes128Gcm",
            Algorithm::Aes256(_) => "Aes256Gcm",
        };
        f.debug_struct("FileCipher").field("cipher", &name).finish()
    }
}

/// Builds the associated data binding a ciphertext to `fd`.
fn associated_data(fd: FileDesc) -> [u8; AD_SIZE] {
    let mut ad = [0u8; AD_SIZE];
    ad[0] = fd.kind.tag();
    ad[1..9].copy_from_slice(&fd.num.to_le_bytes());
    ad
}
