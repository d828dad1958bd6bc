//! Object encryption binding.
//!
//! [`ObjectCodec`] is a thin layer over the blob store's native
//! encryption parameter: the DEK is supplied per call to the write/read
//! primitive and never travels in the object's own metadata. Content is
//! not buffered in decrypted form beyond the read/write call itself.

use crate::blobstore::BlobStore;
use crate::error::StoreResult;
use crate::types::StoredObject;
use crypter_crypto::SymmetricKey;
use std::sync::Arc;
use tracing::debug;

/// Encrypts and decrypts object bytes through the blob store.
#[derive(Clone)]
pub struct ObjectCodec {
    store: Arc<dyn BlobStore>,
}

impl ObjectCodec {
    pub fn new(store: Arc<dyn BlobStore>) -> Self {
        Self { store }
    }

    /// Writes `data` under `name`, encrypted with `dek`.
    pub async fn put_encrypted(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        dek: &SymmetricKey,
    ) -> StoreResult<StoredObject> {
        let size = data.len();
        let locator = self.store.write(name, content_type, data, Some(dek)).await?;
        debug!("stored {size} bytes encrypted as {name}");
        Ok(StoredObject {
            name: name.to_string(),
            content_type: content_type.to_string(),
            locator,
        })
    }

    /// Reads `name` decrypted with `dek`, returning its content type and
    /// bytes. A wrong DEK fails with `KeyMismatch`; the store never
    /// returns garbage as success.
    pub async fn get_decrypted(
        &self,
        name: &str,
        dek: &SymmetricKey,
    ) -> StoreResult<(String, Vec<u8>)> {
        let content_type = self.store.read_content_type(name, Some(dek)).await?;
        let data = self.store.read(name, Some(dek)).await?;
        debug!("fetched {} bytes decrypted from {name}", data.len());
        Ok((content_type, data))
    }
}
