//! Shared in-memory fakes for pipeline tests.
//!
//! `MemoryKms` and `MemoryBlobStore` implement the real traits so the
//! pipelines run unmodified. The KMS fake counts calls and supports
//! failure injection; the store fake binds each encrypted object to a
//! fingerprint of its key so a wrong-key read fails the way SSE-C does.

use async_trait::async_trait;
use crypter_store::blobstore::BlobStore;
use crypter_store::config::{CrypterConfig, MasterKeyRef};
use crypter_store::error::{StoreError, StoreResult};
use crypter_store::kms::{KeyWrapper, KmsClient};
use crypter_store::upload::WrapRetryPolicy;
use crypter_store::{DownloadPipeline, UploadPipeline};
use crypter_crypto::SymmetricKey;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

/// In-memory KMS double. Wrap returns an opaque token; unwrap resolves
/// the token back to the plaintext, refusing tokens minted under a
/// different master-key path.
#[derive(Default)]
pub struct MemoryKms {
    wrapped: RwLock<HashMap<Vec<u8>, (String, Vec<u8>)>>,
    token_counter: AtomicU64,
    pub encrypt_calls: AtomicUsize,
    pub decrypt_calls: AtomicUsize,
    /// Next N encrypt calls fail as transient `KmsUnavailable`.
    pub encrypt_outages: AtomicUsize,
    /// All encrypt calls fail as fatal `KmsPermissionDenied`.
    pub deny_encrypt: AtomicBool,
}

impl MemoryKms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn encrypt_call_count(&self) -> usize {
        self.encrypt_calls.load(Ordering::SeqCst)
    }

    pub fn decrypt_call_count(&self) -> usize {
        self.decrypt_calls.load(Ordering::SeqCst)
    }

    pub fn inject_encrypt_outages(&self, count: usize) {
        self.encrypt_outages.store(count, Ordering::SeqCst);
    }

    pub fn deny_all_encrypts(&self) {
        self.deny_encrypt.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl KmsClient for MemoryKms {
    async fn encrypt(&self, key_path: &str, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        self.encrypt_calls.fetch_add(1, Ordering::SeqCst);

        if self.deny_encrypt.load(Ordering::SeqCst) {
            return Err(StoreError::KmsPermissionDenied("caller denied".into()));
        }
        if self
            .encrypt_outages
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(StoreError::KmsUnavailable("injected outage".into()));
        }

        // Opaque token: a hash over path, plaintext, and a nonce. The
        // plaintext is deliberately not recoverable from the token.
        let nonce = self.token_counter.fetch_add(1, Ordering::SeqCst);
        let mut hasher = Sha256::new();
        hasher.update(key_path.as_bytes());
        hasher.update(plaintext);
        hasher.update(nonce.to_le_bytes());
        let token = hasher.finalize().to_vec();

        self.wrapped
            .write()
            .await
            .insert(token.clone(), (key_path.to_string(), plaintext.to_vec()));
        Ok(token)
    }

    async fn decrypt(&self, key_path: &str, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        self.decrypt_calls.fetch_add(1, Ordering::SeqCst);

        let wrapped = self.wrapped.read().await;
        match wrapped.get(ciphertext) {
            Some((path, plaintext)) if path == key_path => Ok(plaintext.clone()),
            Some(_) => Err(StoreError::KmsDecryptionFailed(
                "ciphertext was wrapped under a different master key".into(),
            )),
            None => Err(StoreError::KmsDecryptionFailed(
                "unknown ciphertext".into(),
            )),
        }
    }
}

struct StoredBlob {
    content_type: String,
    data: Vec<u8>,
    key_fingerprint: Option<[u8; 32]>,
}

fn fingerprint(key: &SymmetricKey) -> [u8; 32] {
    Sha256::digest(key.as_bytes()).into()
}

/// In-memory blob store double with signed-URL-style locators and
/// SSE-C-like key binding.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<String, StoredBlob>>,
}

impl MemoryBlobStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Names of everything currently stored.
    pub async fn names(&self) -> Vec<String> {
        self.blobs.read().await.keys().cloned().collect()
    }

    /// Raw stored bytes of every artifact, for secrecy scans.
    pub async fn all_contents(&self) -> Vec<(String, Vec<u8>)> {
        self.blobs
            .read()
            .await
            .iter()
            .map(|(name, blob)| (name.clone(), blob.data.clone()))
            .collect()
    }

    pub async fn raw_bytes(&self, name: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(name).map(|b| b.data.clone())
    }

    /// Drops an artifact out from under the pipelines, bypassing the
    /// trait (simulates external deletion).
    pub async fn remove(&self, name: &str) -> bool {
        self.blobs.write().await.remove(name).is_some()
    }

    /// Overwrites an artifact's bytes in place (simulates corruption or
    /// a swapped sidecar).
    pub async fn overwrite(&self, name: &str, data: Vec<u8>) {
        if let Some(blob) = self.blobs.write().await.get_mut(name) {
            blob.data = data;
        }
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn write(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        encryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String> {
        self.blobs.write().await.insert(
            name.to_string(),
            StoredBlob {
                content_type: content_type.to_string(),
                data,
                key_fingerprint: encryption_key.map(fingerprint),
            },
        );
        Ok(format!(
            "https://blobs.test/crypter-test/{name}?X-Signature=deadbeef&Expires=3600"
        ))
    }

    async fn read(
        &self,
        name: &str,
        decryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<Vec<u8>> {
        let blobs = self.blobs.read().await;
        let blob = blobs
            .get(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        if blob.key_fingerprint != decryption_key.map(fingerprint) {
            return Err(StoreError::KeyMismatch(name.to_string()));
        }
        Ok(blob.data.clone())
    }

    async fn read_content_type(
        &self,
        name: &str,
        decryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String> {
        let blobs = self.blobs.read().await;
        let blob = blobs
            .get(name)
            .ok_or_else(|| StoreError::ObjectNotFound(name.to_string()))?;
        if blob.key_fingerprint != decryption_key.map(fingerprint) {
            return Err(StoreError::KeyMismatch(name.to_string()));
        }
        Ok(blob.content_type.clone())
    }

    async fn exists(&self, name: &str) -> StoreResult<bool> {
        Ok(self.blobs.read().await.contains_key(name))
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.blobs.write().await.remove(name);
        Ok(())
    }
}

pub fn test_master_key() -> MasterKeyRef {
    MasterKeyRef::new("demo-project", "global", "demo-ring", "demo-key")
        .expect("test master key is fully specified")
}

/// A full config over the in-memory fakes, with a fast retry policy.
#[allow(dead_code)]
pub fn test_config() -> CrypterConfig {
    CrypterConfig {
        bucket: "crypter-test".to_string(),
        region: "us-east-1".to_string(),
        master_key: test_master_key(),
        kms_retry_max_attempts: 3,
        kms_retry_base_delay_ms: 5,
        ..CrypterConfig::default()
    }
}

/// Builds both pipelines over shared fakes, with a fast retry policy.
pub fn test_pipelines(
    kms: Arc<MemoryKms>,
    store: Arc<MemoryBlobStore>,
) -> (UploadPipeline, DownloadPipeline) {
    let wrapper = Arc::new(KeyWrapper::new(kms, test_master_key()));
    let retry = WrapRetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(5),
    };
    let upload = UploadPipeline::new(wrapper.clone(), store.clone(), retry);
    let download = DownloadPipeline::new(wrapper, store);
    (upload, download)
}

/// Opt-in tracing for debugging test failures (RUST_LOG=debug).
#[allow(dead_code)]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .try_init();
}
