//! Blob store capability and the S3 implementation.
//!
//! The [`BlobStore`] trait is the storage boundary the pipelines work
//! against: write/read with an optional per-call encryption key, plus
//! the metadata and existence probes the sidecar logic needs.
//! [`S3BlobStore`] binds it to S3 using SSE-C, so the DEK is handed to
//! the storage layer per call as customer-supplied key headers and is
//! never placed in object metadata.

use crate::config::CrypterConfig;
use crate::error::{StoreError, StoreResult};
use async_trait::async_trait;
use aws_sdk_s3::error::ProvideErrorMetadata;
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use crypter_crypto::SymmetricKey;
use md5::{Digest, Md5};
use std::time::Duration;
use tracing::debug;

/// Remote blob-store capability.
///
/// Implementations are stateless, thread-safe handles constructed once
/// per configuration and shared across concurrent pipeline runs. When
/// an encryption key is supplied, the store's native encryption-at-rest
/// mechanism is responsible for binding the key to the object; a read
/// with the wrong key must fail with [`StoreError::KeyMismatch`], never
/// return garbage bytes.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Writes an object, optionally encrypted with `encryption_key`.
    /// Returns a public locator for the object.
    async fn write(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        encryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String>;

    /// Reads an object's bytes, decrypting with `decryption_key` if the
    /// object was written encrypted.
    async fn read(&self, name: &str, decryption_key: Option<&SymmetricKey>)
        -> StoreResult<Vec<u8>>;

    /// Reads an object's content type. The key is required here because
    /// SSE-C stores demand it even for metadata requests; keyless stores
    /// ignore it.
    async fn read_content_type(
        &self,
        name: &str,
        decryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String>;

    /// Checks whether an object exists, without reading it.
    async fn exists(&self, name: &str) -> StoreResult<bool>;

    /// Deletes an object. Deleting a missing object is not an error.
    async fn delete(&self, name: &str) -> StoreResult<()>;
}

/// SSE-C header values for a DEK: algorithm, base64 key, base64 key MD5.
fn sse_c_headers(key: &SymmetricKey) -> (String, String) {
    let key_b64 = BASE64.encode(key.as_bytes());
    let key_md5 = BASE64.encode(Md5::digest(key.as_bytes()));
    (key_b64, key_md5)
}

/// S3-backed blob store using SSE-C for per-object encryption.
pub struct S3BlobStore {
    client: S3Client,
    bucket: String,
    /// Lifetime of the presigned locator returned by [`BlobStore::write`].
    locator_expiry: Duration,
}

impl S3BlobStore {
    /// Builds the store from configuration. Credentials stay out of the
    /// serializable config and are supplied by the deployment
    /// environment.
    pub fn from_config(
        config: &CrypterConfig,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Self {
        Self::new(
            config.bucket.clone(),
            config.region.clone(),
            config.endpoint_override.clone(),
            access_key_id,
            secret_access_key,
        )
    }

    /// Builds the S3 client once from explicit configuration; the handle
    /// is reused across all requests.
    pub fn new(
        bucket: String,
        region: String,
        endpoint_override: Option<String>,
        access_key_id: &str,
        secret_access_key: &str,
    ) -> Self {
        let credentials = aws_credential_types::Credentials::new(
            access_key_id,
            secret_access_key,
            None,
            None,
            "crypter-static",
        );

        let mut config_builder = aws_sdk_s3::Config::builder()
            .region(aws_types::region::Region::new(region))
            .credentials_provider(credentials)
            .behavior_version_latest();

        if let Some(endpoint) = endpoint_override {
            config_builder = config_builder.endpoint_url(endpoint).force_path_style(true);
        }

        Self {
            client: S3Client::from_conf(config_builder.build()),
            bucket,
            locator_expiry: Duration::from_secs(3600),
        }
    }

    /// Maps an S3 read failure, distinguishing a missing object from an
    /// SSE-C key rejection when a key was supplied.
    fn map_read_error(name: &str, code: Option<&str>, message: String, keyed: bool) -> StoreError {
        match code {
            Some("NoSuchKey") | Some("NotFound") => StoreError::ObjectNotFound(name.to_string()),
            Some("AccessDenied") | Some("InvalidRequest") | Some("InvalidArgument") if keyed => {
                StoreError::KeyMismatch(name.to_string())
            }
            _ => StoreError::Storage(format!("read failed for {name}: {message}")),
        }
    }
}

#[async_trait]
impl BlobStore for S3BlobStore {
    async fn write(
        &self,
        name: &str,
        content_type: &str,
        data: Vec<u8>,
        encryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String> {
        let size = data.len();
        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(name)
            .content_type(content_type)
            .body(ByteStream::from(data));

        if let Some(key) = encryption_key {
            let (key_b64, key_md5) = sse_c_headers(key);
            request = request
                .sse_customer_algorithm("AES256")
                .sse_customer_key(key_b64)
                .sse_customer_key_md5(key_md5);
        }

        request
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("write failed for {name}: {e}")))?;

        debug!("wrote {size} bytes to s3://{}/{name}", self.bucket);

        let presign = PresigningConfig::expires_in(self.locator_expiry)
            .map_err(|e| StoreError::Storage(format!("presign config: {e}")))?;
        let presigned = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(name)
            .presigned(presign)
            .await
            .map_err(|e| StoreError::Storage(format!("presign failed for {name}: {e}")))?;

        Ok(presigned.uri().to_string())
    }

    async fn read(
        &self,
        name: &str,
        decryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<Vec<u8>> {
        let mut request = self.client.get_object().bucket(&self.bucket).key(name);

        if let Some(key) = decryption_key {
            let (key_b64, key_md5) = sse_c_headers(key);
            request = request
                .sse_customer_algorithm("AES256")
                .sse_customer_key(key_b64)
                .sse_customer_key_md5(key_md5);
        }

        let resp = request.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            Self::map_read_error(
                name,
                service_err.code(),
                service_err.to_string(),
                decryption_key.is_some(),
            )
        })?;

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| StoreError::Storage(format!("failed to read body for {name}: {e}")))?;

        let bytes = body.into_bytes().to_vec();
        debug!("read {} bytes from s3://{}/{name}", bytes.len(), self.bucket);
        Ok(bytes)
    }

    async fn read_content_type(
        &self,
        name: &str,
        decryption_key: Option<&SymmetricKey>,
    ) -> StoreResult<String> {
        let mut request = self.client.head_object().bucket(&self.bucket).key(name);

        if let Some(key) = decryption_key {
            let (key_b64, key_md5) = sse_c_headers(key);
            request = request
                .sse_customer_algorithm("AES256")
                .sse_customer_key(key_b64)
                .sse_customer_key_md5(key_md5);
        }

        let resp = request.send().await.map_err(|e| {
            let service_err = e.into_service_error();
            if service_err.is_not_found() {
                StoreError::ObjectNotFound(name.to_string())
            } else {
                Self::map_read_error(
                    name,
                    service_err.code(),
                    service_err.to_string(),
                    decryption_key.is_some(),
                )
            }
        })?;

        Ok(resp
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string())
    }

    async fn exists(&self, name: &str) -> StoreResult<bool> {
        match self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
        {
            Ok(_) => Ok(true),
            Err(e) => {
                let service_err = e.into_service_error();
                if service_err.is_not_found() {
                    Ok(false)
                } else if service_err.code() == Some("AccessDenied")
                    || service_err.code() == Some("InvalidRequest")
                {
                    // SSE-C objects reject keyless HEADs but the object
                    // is demonstrably there.
                    Ok(true)
                } else {
                    Err(StoreError::Storage(format!(
                        "existence probe failed for {name}: {service_err}"
                    )))
                }
            }
        }
    }

    async fn delete(&self, name: &str) -> StoreResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(name)
            .send()
            .await
            .map_err(|e| StoreError::Storage(format!("delete failed for {name}: {e}")))?;
        debug!("deleted s3://{}/{name}", self.bucket);
        Ok(())
    }
}
