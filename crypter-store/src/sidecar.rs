//! Wrapped-key sidecar persistence.
//!
//! The wrapped DEK is stored as a separate `text/plain` artifact named
//! `<object>-wDEK.key`, content base64 of the KMS ciphertext. The
//! artifact is already KMS ciphertext, so it is written without a
//! storage-layer encryption key; base64 is a storage-format concern,
//! not a security property.

use crate::blobstore::BlobStore;
use crate::error::{StoreError, StoreResult};
use crate::types::{sidecar_name, WrappedKey};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::sync::Arc;
use tracing::{debug, warn};

/// Persists and retrieves wrapped DEKs next to their objects.
#[derive(Clone)]
pub struct SidecarStore {
    store: Arc<dyn BlobStore>,
}

impl SidecarStore {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Stores the wrapped key for `object_name`, returning the sidecar's
    /// locator.
    pub async fn store(&self, object_name: &str, wrapped: &WrappedKey) -> StoreResult<String> {
        let name = sidecar_name(object_name);
        let encoded = BASE64.encode(&wrapped.ciphertext);
        let locator = self
            .store
            .write(&name, "text/plain", encoded.into_bytes(), None)
            .await?;
        debug!("stored wrapped-key sidecar {name}");
        Ok(locator)
    }

    /// Fetches and decodes the wrapped key for `object_name`.
    ///
    /// A missing sidecar is reported as [`StoreError::SidecarNotFound`]
    /// when the primary object exists (the pairing invariant is broken)
    /// and as [`StoreError::ObjectNotFound`] when nothing is there at
    /// all.
    pub async fn fetch(&self, object_name: &str) -> StoreResult<Vec<u8>> {
        let name = sidecar_name(object_name);
        let encoded = match self.store.read(&name, None).await {
            Ok(bytes) => bytes,
            Err(StoreError::ObjectNotFound(_)) => {
                return if self.store.exists(object_name).await? {
                    warn!("object {object_name} exists but its sidecar {name} is missing");
                    Err(StoreError::SidecarNotFound(object_name.to_string()))
                } else {
                    Err(StoreError::ObjectNotFound(object_name.to_string()))
                };
            }
            Err(e) => return Err(e),
        };

        let text = String::from_utf8(encoded)
            .map_err(|e| StoreError::Storage(format!("sidecar {name} is not text: {e}")))?;
        Ok(BASE64.decode(text.trim())?)
    }

    /// Deletes the sidecar for `object_name`.
    pub async fn delete(&self, object_name: &str) -> StoreResult<()> {
        self.store.delete(&sidecar_name(object_name)).await
    }
}
