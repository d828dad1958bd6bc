//! Crypter configuration.

use crate::error::{StoreError, StoreResult};
use serde::{Deserialize, Serialize};

/// Identity of the KMS master key that wraps and unwraps DEKs.
///
/// All four fields must be non-empty; [`MasterKeyRef::new`] fails fast
/// so no KMS call is ever attempted with a partial identity. Immutable
/// once constructed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MasterKeyRef {
    project: String,
    key_ring_location: String,
    key_ring_name: String,
    key_name: String,
}

impl MasterKeyRef {
    pub fn new(
        project: impl Into<String>,
        key_ring_location: impl Into<String>,
        key_ring_name: impl Into<String>,
        key_name: impl Into<String>,
    ) -> StoreResult<Self> {
        let master_key = Self {
            project: project.into(),
            key_ring_location: key_ring_location.into(),
            key_ring_name: key_ring_name.into(),
            key_name: key_name.into(),
        };
        master_key.validate()?;
        Ok(master_key)
    }

    /// Checks that every identifying field is present. Also used after
    /// deserializing a config from disk.
    pub fn validate(&self) -> StoreResult<()> {
        let missing = [
            ("project", &self.project),
            ("key_ring_location", &self.key_ring_location),
            ("key_ring_name", &self.key_ring_name),
            ("key_name", &self.key_name),
        ]
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(field, _)| *field)
        .collect::<Vec<_>>();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(StoreError::Config(format!(
                "master key reference missing required fields: {}",
                missing.join(", ")
            )))
        }
    }

    /// Renders the KMS resource path addressed by wrap and unwrap calls.
    pub fn resource_path(&self) -> String {
        format!(
            "projects/{}/locations/{}/keyRings/{}/cryptoKeys/{}",
            self.project, self.key_ring_location, self.key_ring_name, self.key_name
        )
    }
}

/// Configuration for the envelope-encryption pipelines.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CrypterConfig {
    /// Bucket holding both encrypted objects and their sidecars.
    pub bucket: String,

    /// Region for the blob store.
    pub region: String,

    /// Optional blob-store endpoint override (for MinIO in testing).
    pub endpoint_override: Option<String>,

    /// Base URL for the KMS REST API.
    pub kms_endpoint: String,

    /// Bearer token presented to the KMS. Obtaining and refreshing the
    /// token is the deployment environment's concern.
    pub kms_access_token: String,

    /// Master key that wraps every DEK.
    pub master_key: MasterKeyRef,

    /// Maximum wrap attempts when the KMS is unavailable.
    pub kms_retry_max_attempts: u32,

    /// Base delay for the wrap retry backoff, doubled per attempt.
    pub kms_retry_base_delay_ms: u64,
}

impl Default for CrypterConfig {
    fn default() -> Self {
        Self {
            bucket: "crypter-objects".to_string(),
            region: "us-east-1".to_string(),
            endpoint_override: None,
            kms_endpoint: "https://cloudkms.googleapis.com".to_string(),
            kms_access_token: String::new(),
            master_key: MasterKeyRef {
                project: String::new(),
                key_ring_location: String::new(),
                key_ring_name: String::new(),
                key_name: String::new(),
            },
            kms_retry_max_attempts: 3,
            kms_retry_base_delay_ms: 500,
        }
    }
}

impl CrypterConfig {
    /// Creates a config pointing at local test doubles.
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            bucket: "crypter-test".to_string(),
            region: "us-east-1".to_string(),
            endpoint_override: Some("http://localhost:9000".to_string()),
            kms_endpoint: "http://localhost:3003".to_string(),
            kms_access_token: "test-token".to_string(),
            master_key: MasterKeyRef::new("test-project", "global", "test-ring", "test-key")
                .expect("test master key is fully specified"),
            kms_retry_max_attempts: 3,
            kms_retry_base_delay_ms: 10,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::WrapRetryPolicy;
    use std::time::Duration;

    #[test]
    fn test_config_carries_a_valid_master_key() {
        let config = CrypterConfig::test();
        assert!(config.master_key.validate().is_ok());
        assert!(config.endpoint_override.is_some());
    }

    #[test]
    fn retry_policy_is_derived_from_config() {
        let config = CrypterConfig::test();
        let retry = WrapRetryPolicy::from(&config);
        assert_eq!(retry.max_attempts, config.kms_retry_max_attempts);
        assert_eq!(
            retry.base_delay,
            Duration::from_millis(config.kms_retry_base_delay_ms)
        );
    }

    #[test]
    fn default_config_master_key_does_not_validate() {
        // Default exists so a config file can be scaffolded; it must
        // not pass validation until the master key is filled in.
        assert!(CrypterConfig::default().master_key.validate().is_err());
    }
}
