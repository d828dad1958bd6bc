//! Envelope-encrypted object storage for Crypter.
//!
//! Each stored object is encrypted with a fresh data encryption key
//! (DEK) supplied to the blob store's native encryption parameter. The
//! DEK is wrapped by a remote KMS master key and persisted as a sidecar
//! artifact named `<object>-wDEK.key`; the plaintext DEK never touches
//! durable storage. Provides:
//! - KMS key wrapping/unwrapping behind a `KmsClient` trait
//! - A `BlobStore` trait with an S3 (SSE-C) implementation
//! - The wrapped-key sidecar store
//! - Upload and download pipelines tying the pieces together

pub mod blobstore;
pub mod codec;
pub mod config;
pub mod download;
pub mod error;
pub mod kms;
pub mod sidecar;
pub mod types;
pub mod upload;

pub use config::{CrypterConfig, MasterKeyRef};
pub use download::DownloadPipeline;
pub use error::{StoreError, StoreResult};
pub use types::*;
pub use upload::UploadPipeline;
