//! Download orchestration.
//!
//! Reverses the upload pipeline: locator decode, sidecar fetch, KMS
//! unwrap, decrypting read. The sidecar is always fetched before the
//! object; without the key, the object bytes are useless.

use crate::blobstore::BlobStore;
use crate::codec::ObjectCodec;
use crate::config::CrypterConfig;
use crate::error::{StoreError, StoreResult};
use crate::kms::{KeyWrapper, KmsClient};
use crate::sidecar::SidecarStore;
use crate::types::{object_name_from_locator, ObjectDownload};
use std::sync::Arc;
use tracing::debug;

/// Orchestrates decrypting downloads.
pub struct DownloadPipeline {
    wrapper: Arc<KeyWrapper>,
    codec: ObjectCodec,
    sidecar: SidecarStore,
}

impl std::fmt::Debug for DownloadPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DownloadPipeline").finish_non_exhaustive()
    }
}

impl DownloadPipeline {
    pub fn new(wrapper: Arc<KeyWrapper>, store: Arc<dyn BlobStore>) -> Self {
        Self {
            wrapper,
            codec: ObjectCodec::new(store.clone()),
            sidecar: SidecarStore::new(store),
        }
    }

    /// Builds the pipeline from configuration over already-constructed
    /// clients, re-validating the master key first.
    pub fn from_config(
        config: &CrypterConfig,
        kms: Arc<dyn KmsClient>,
        store: Arc<dyn BlobStore>,
    ) -> StoreResult<Self> {
        config.master_key.validate()?;
        let wrapper = Arc::new(KeyWrapper::new(kms, config.master_key.clone()));
        Ok(Self::new(wrapper, store))
    }

    /// Fetches and decrypts the object named by an URL-encoded locator,
    /// returning its content type and plaintext bytes.
    pub async fn run(&self, encoded_locator: &str) -> StoreResult<ObjectDownload> {
        // Decode exactly once; double-decoding would corrupt names that
        // legitimately contain percent signs.
        let locator = urlencoding::decode(encoded_locator)
            .map_err(|e| StoreError::InvalidLocator(format!("{encoded_locator}: {e}")))?;
        let object_name = object_name_from_locator(&locator)
            .ok_or_else(|| StoreError::InvalidLocator(encoded_locator.to_string()))?;

        let wrapped = self.sidecar.fetch(object_name).await?;
        let dek = self.wrapper.unwrap_key(&wrapped).await?;

        let (content_type, data) = self.codec.get_decrypted(object_name, &dek).await?;
        debug!("download complete for {object_name} ({} bytes)", data.len());
        Ok(ObjectDownload { content_type, data })
    }
}
