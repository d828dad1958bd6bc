//! KMS key wrapping and unwrapping.
//!
//! [`KeyWrapper`] sends raw DEK bytes to the KMS encrypt endpoint
//! addressed by the configured master key and reverses the call on
//! download. The concrete transport lives behind the [`KmsClient`]
//! trait; [`HttpKmsClient`] binds the Cloud KMS REST surface with
//! reqwest and JSON base64 bodies.

use crate::config::{CrypterConfig, MasterKeyRef};
use crate::error::{StoreError, StoreResult};
use crate::types::WrappedKey;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crypter_crypto::SymmetricKey;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use zeroize::Zeroize;

/// Remote KMS capability: encrypt/decrypt small payloads under a named
/// master key. Implementations are stateless, thread-safe handles meant
/// to be constructed once and shared across concurrent pipelines.
#[async_trait]
pub trait KmsClient: Send + Sync {
    /// Encrypts `plaintext` under the master key at `key_path`.
    async fn encrypt(&self, key_path: &str, plaintext: &[u8]) -> StoreResult<Vec<u8>>;

    /// Decrypts `ciphertext` under the master key at `key_path`.
    async fn decrypt(&self, key_path: &str, ciphertext: &[u8]) -> StoreResult<Vec<u8>>;
}

#[derive(Deserialize)]
struct EncryptResponse {
    ciphertext: String,
}

#[derive(Deserialize)]
struct DecryptResponse {
    plaintext: String,
}

/// Cloud KMS REST client.
///
/// Calls `POST {endpoint}/v1/{key_path}:encrypt` and `:decrypt` with
/// base64 JSON bodies and bearer-token auth. Built once per
/// configuration; reqwest connection pooling handles the rest.
pub struct HttpKmsClient {
    client: Client,
    endpoint: String,
    access_token: String,
}

impl HttpKmsClient {
    /// Builds the client from configuration.
    pub fn from_config(config: &CrypterConfig) -> Self {
        Self::new(config.kms_endpoint.clone(), config.kms_access_token.clone())
    }

    pub fn new(endpoint: impl Into<String>, access_token: impl Into<String>) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .expect("failed to build HTTP client");

        Self {
            client,
            endpoint: endpoint.into(),
            access_token: access_token.into(),
        }
    }

    async fn post(&self, url: &str, body: serde_json::Value) -> StoreResult<reqwest::Response> {
        self.client
            .post(url)
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| StoreError::KmsUnavailable(format!("KMS request failed: {e}")))
    }
}

/// Maps a non-success KMS status to the error taxonomy. `decrypting`
/// distinguishes a 4xx on `:decrypt` (wrong key or corrupted sidecar)
/// from one on `:encrypt`.
fn kms_status_error(status: StatusCode, body: String, decrypting: bool) -> StoreError {
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::KmsPermissionDenied(body),
        StatusCode::TOO_MANY_REQUESTS => StoreError::KmsUnavailable(body),
        s if s.is_server_error() => StoreError::KmsUnavailable(body),
        s if s.is_client_error() && decrypting => StoreError::KmsDecryptionFailed(body),
        s => StoreError::Kms(format!("unexpected KMS status {s}: {body}")),
    }
}

#[async_trait]
impl KmsClient for HttpKmsClient {
    async fn encrypt(&self, key_path: &str, plaintext: &[u8]) -> StoreResult<Vec<u8>> {
        let url = format!("{}/v1/{key_path}:encrypt", self.endpoint);
        let resp = self
            .post(
                &url,
                serde_json::json!({ "plaintext": BASE64.encode(plaintext) }),
            )
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(kms_status_error(status, body, false));
        }

        let parsed: EncryptResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Kms(format!("malformed KMS encrypt response: {e}")))?;
        BASE64
            .decode(&parsed.ciphertext)
            .map_err(|e| StoreError::Kms(format!("KMS returned invalid base64: {e}")))
    }

    async fn decrypt(&self, key_path: &str, ciphertext: &[u8]) -> StoreResult<Vec<u8>> {
        let url = format!("{}/v1/{key_path}:decrypt", self.endpoint);
        let resp = self
            .post(
                &url,
                serde_json::json!({ "ciphertext": BASE64.encode(ciphertext) }),
            )
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(kms_status_error(status, body, true));
        }

        let parsed: DecryptResponse = resp
            .json()
            .await
            .map_err(|e| StoreError::Kms(format!("malformed KMS decrypt response: {e}")))?;
        BASE64
            .decode(&parsed.plaintext)
            .map_err(|e| StoreError::Kms(format!("KMS returned invalid base64: {e}")))
    }
}

/// Wraps and unwraps DEKs under a single configured master key.
///
/// Wrap and unwrap always address the same resource path; a mismatched
/// master key therefore surfaces as [`StoreError::KmsDecryptionFailed`]
/// from the KMS, never as corrupted object data.
pub struct KeyWrapper {
    kms: Arc<dyn KmsClient>,
    master_key: MasterKeyRef,
}

impl KeyWrapper {
    /// The `MasterKeyRef` is validated at its own construction, so a
    /// wrapper can only exist for a fully specified master key.
    pub fn new(kms: Arc<dyn KmsClient>, master_key: MasterKeyRef) -> Self {
        Self { kms, master_key }
    }

    /// Wraps a DEK. One outbound KMS call.
    pub async fn wrap(&self, dek: &SymmetricKey) -> StoreResult<WrappedKey> {
        let key_path = self.master_key.resource_path();
        let ciphertext = self.kms.encrypt(&key_path, dek.as_bytes()).await?;
        debug!("wrapped DEK under {key_path} ({} ciphertext bytes)", ciphertext.len());
        Ok(WrappedKey {
            ciphertext,
            key_path,
        })
    }

    /// Unwraps wrapped-DEK ciphertext back into a usable key, validating
    /// the recovered material is exactly AES-256 sized.
    pub async fn unwrap_key(&self, wrapped: &[u8]) -> StoreResult<SymmetricKey> {
        let key_path = self.master_key.resource_path();
        let mut plaintext = self.kms.decrypt(&key_path, wrapped).await?;
        let dek = SymmetricKey::from_slice(&plaintext);
        plaintext.zeroize();
        debug!("unwrapped DEK under {key_path}");
        Ok(dek?)
    }
}
