//! Envelope-storage error taxonomy.
//!
//! Every failure mode the pipelines can hit is a distinct variant so
//! callers can decide retry vs. surface. Only [`StoreError::KmsUnavailable`]
//! is transient. Error messages never carry key material, plaintext or
//! wrapped.

use thiserror::Error;

/// Result type for envelope-storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur in envelope-storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Required configuration missing or malformed. Raised before any
    /// network call is attempted.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Upload rejected by the extension allow-list. No key material has
    /// been generated when this is raised.
    #[error("unsupported file type: .{extension}")]
    UnsupportedType { extension: String },

    #[error("crypto error: {0}")]
    Crypto(#[from] crypter_crypto::CryptoError),

    /// KMS unreachable or throttling. Transient: callers may retry with
    /// backoff.
    #[error("KMS unavailable: {0}")]
    KmsUnavailable(String),

    /// KMS rejected the caller's identity. Fatal; must not be retried.
    #[error("KMS permission denied: {0}")]
    KmsPermissionDenied(String),

    /// KMS could not decrypt the wrapped key — wrong master key or a
    /// corrupted sidecar, never corrupted object data.
    #[error("KMS decryption failed: {0}")]
    KmsDecryptionFailed(String),

    /// Unexpected KMS response outside the taxonomy above.
    #[error("KMS error: {0}")]
    Kms(String),

    /// The object exists but its wrapped-key sidecar is missing: the
    /// encryption pairing invariant is broken and the object cannot be
    /// decrypted. Distinct from [`StoreError::ObjectNotFound`].
    #[error("wrapped-key sidecar not found for object: {0}")]
    SidecarNotFound(String),

    #[error("object not found: {0}")]
    ObjectNotFound(String),

    /// The DEK supplied on read does not match the key the object was
    /// written with. Never downgraded to a generic storage error.
    #[error("decryption key mismatch for object: {0}")]
    KeyMismatch(String),

    /// Object locator parameter could not be decoded or named no object.
    #[error("invalid object locator: {0}")]
    InvalidLocator(String),

    #[error("storage error: {0}")]
    Storage(String),

    /// Sidecar content is not valid base64.
    #[error("sidecar encoding error: {0}")]
    Encoding(#[from] base64::DecodeError),
}

impl StoreError {
    /// Returns true if the operation may succeed on retry. The upload
    /// pipeline's backoff loop retries only these.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::KmsUnavailable(_))
    }
}
