//! Key-material error types.

use thiserror::Error;

/// Result type for key-material operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors that can occur while handling key material.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// The platform's secure random source failed. Not retryable: a
    /// broken entropy source will not fix itself mid-process.
    #[error("secure random source unavailable: {0}")]
    Unavailable(String),

    #[error("invalid key length: expected {expected} bytes, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },
}
