//! Upload orchestration.
//!
//! Drives one upload end to end: extension gate, DEK generation,
//! encrypted object write, KMS wrap (with bounded backoff), sidecar
//! write, locator cleanup. Each failing step returns early, so the
//! pipeline's state machine is the control flow itself.
//!
//! There is no transaction across the object write and the sidecar
//! write. A crash or wrap failure between them leaves a durably stored
//! object that cannot be decrypted; that window is accepted, logged
//! loudly, and recoverable via [`UploadPipeline::delete_object_pair`].

use crate::blobstore::BlobStore;
use crate::codec::ObjectCodec;
use crate::config::CrypterConfig;
use crate::error::{StoreError, StoreResult};
use crate::kms::{KeyWrapper, KmsClient};
use crate::sidecar::SidecarStore;
use crate::types::{strip_query, timestamped_object_name};
use crypter_crypto::generate_data_key;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// File extensions accepted for upload. Matched case-sensitively.
pub const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Backoff policy for KMS wrap calls. Only `KmsUnavailable` is retried;
/// permission errors are surfaced on the first attempt.
#[derive(Clone, Copy, Debug)]
pub struct WrapRetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for WrapRetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl From<&CrypterConfig> for WrapRetryPolicy {
    fn from(config: &CrypterConfig) -> Self {
        Self {
            max_attempts: config.kms_retry_max_attempts,
            base_delay: Duration::from_millis(config.kms_retry_base_delay_ms),
        }
    }
}

/// Orchestrates encrypted uploads.
pub struct UploadPipeline {
    wrapper: Arc<KeyWrapper>,
    store: Arc<dyn BlobStore>,
    codec: ObjectCodec,
    sidecar: SidecarStore,
    retry: WrapRetryPolicy,
}

impl std::fmt::Debug for UploadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadPipeline").finish_non_exhaustive()
    }
}

impl UploadPipeline {
    pub fn new(
        wrapper: Arc<KeyWrapper>,
        store: Arc<dyn BlobStore>,
        retry: WrapRetryPolicy,
    ) -> Self {
        Self {
            wrapper,
            codec: ObjectCodec::new(store.clone()),
            sidecar: SidecarStore::new(store.clone()),
            store,
            retry,
        }
    }

    /// Builds the pipeline from configuration over already-constructed
    /// clients. Re-validates the master key so a config deserialized
    /// from disk fails here, before any network call.
    pub fn from_config(
        config: &CrypterConfig,
        kms: Arc<dyn KmsClient>,
        store: Arc<dyn BlobStore>,
    ) -> StoreResult<Self> {
        config.master_key.validate()?;
        let wrapper = Arc::new(KeyWrapper::new(kms, config.master_key.clone()));
        Ok(Self::new(wrapper, store, WrapRetryPolicy::from(config)))
    }

    /// Uploads one file: encrypts it under a fresh DEK, wraps the DEK
    /// via KMS, stores the wrapped key as a sidecar, and returns the
    /// object's public locator with any signed-URL query string
    /// stripped.
    pub async fn run(
        &self,
        file_name: &str,
        content_type: &str,
        data: Vec<u8>,
    ) -> StoreResult<String> {
        // Gate on the extension before any key material exists, so a
        // rejected upload costs zero KMS calls.
        check_extension(file_name)?;

        let dek = generate_data_key()?;

        let object_name = timestamped_object_name(file_name);
        let stored = self
            .codec
            .put_encrypted(&object_name, content_type, data, &dek)
            .await?;

        let wrapped = match self.wrap_with_backoff(&dek).await {
            Ok(wrapped) => wrapped,
            Err(e) => {
                warn!(
                    "object {object_name} is stored but its DEK could not be wrapped; \
                     the object is undecryptable until removed: {e}"
                );
                return Err(e);
            }
        };
        // The plaintext DEK is no longer needed once the wrapped form
        // exists; it zeroizes on drop at the end of this scope.

        if let Err(e) = self.sidecar.store(&object_name, &wrapped).await {
            warn!(
                "object {object_name} is stored but its sidecar write failed; \
                 the object is undecryptable until removed: {e}"
            );
            return Err(e);
        }

        debug!("upload complete for {object_name}");
        Ok(strip_query(&stored.locator).to_string())
    }

    async fn wrap_with_backoff(
        &self,
        dek: &crypter_crypto::SymmetricKey,
    ) -> StoreResult<crate::types::WrappedKey> {
        let attempts = self.retry.max_attempts.max(1);
        for attempt in 0..attempts {
            match self.wrapper.wrap(dek).await {
                Ok(wrapped) => return Ok(wrapped),
                Err(e) if e.is_transient() && attempt + 1 < attempts => {
                    // Cap the exponent: past 2^16 the delay is already
                    // absurd, and an uncapped shift overflows when the
                    // attempt budget exceeds 32.
                    let backoff = self.retry.base_delay * (1u32 << attempt.min(16));
                    warn!("KMS wrap unavailable, retrying in {backoff:?}: {e}");
                    tokio::time::sleep(backoff).await;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("wrap loop always returns within max_attempts")
    }

    /// Deletes an object together with its sidecar, honoring the
    /// create/delete-as-a-pair invariant. The object goes first so a
    /// partial deletion cannot produce a readable object without a key.
    /// A sidecar already missing is tolerated: the pair was broken
    /// before we got here.
    pub async fn delete_object_pair(&self, object_name: &str) -> StoreResult<()> {
        self.store.delete(object_name).await?;
        match self.sidecar.delete(object_name).await {
            Ok(()) => Ok(()),
            Err(StoreError::ObjectNotFound(_)) => {
                warn!("deleted {object_name}, which had no sidecar");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

fn check_extension(file_name: &str) -> StoreResult<()> {
    let extension = file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .unwrap_or_default();
    if ALLOWED_EXTENSIONS.contains(&extension) {
        Ok(())
    } else {
        Err(StoreError::UnsupportedType {
            extension: extension.to_string(),
        })
    }
}
