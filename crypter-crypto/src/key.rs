//! Symmetric data encryption keys.

use crate::error::{CryptoError, CryptoResult};
use rand::rngs::OsRng;
use rand::TryRngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Size of an AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// A symmetric AES-256 data encryption key (DEK).
///
/// Key material is zeroized on drop and redacted from `Debug` output.
/// Instances are never serialized or written to durable storage; only
/// the KMS-wrapped form of a DEK may be persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; KEY_SIZE],
}

impl SymmetricKey {
    /// Wraps raw key material. Takes ownership of the array; callers
    /// holding copies elsewhere are responsible for zeroizing them.
    pub fn from_bytes(bytes: [u8; KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Builds a key from a slice, validating the AES-256 length.
    pub fn from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self { bytes })
    }

    /// Returns the raw key material.
    ///
    /// The returned slice references memory that is zeroized when this
    /// key is dropped. Do not store copies.
    #[inline]
    pub fn as_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.bytes
    }
}

impl std::fmt::Debug for SymmetricKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymmetricKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

/// Generates a fresh AES-256 DEK from the OS CSPRNG.
///
/// Fails with [`CryptoError::Unavailable`] if the platform cannot supply
/// secure randomness; callers surface this rather than retry.
pub fn generate_data_key() -> CryptoResult<SymmetricKey> {
    let mut bytes = [0u8; KEY_SIZE];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| CryptoError::Unavailable(e.to_string()))?;
    Ok(SymmetricKey::from_bytes(bytes))
}
