//! Shared types and naming helpers for envelope storage.

use chrono::Utc;

/// Suffix joining an object to its wrapped-key sidecar. Persisted
/// contract; existing sidecars depend on it never changing.
pub const SIDECAR_SUFFIX: &str = "-wDEK.key";

/// A DEK ciphertext produced by the KMS wrap operation, together with
/// the master-key resource path that produced it. Immutable once
/// created; only the ciphertext is persisted (the path is configuration).
#[derive(Clone, Debug)]
pub struct WrappedKey {
    pub ciphertext: Vec<u8>,
    pub key_path: String,
}

/// An object written to the blob store under DEK encryption.
#[derive(Clone, Debug)]
pub struct StoredObject {
    pub name: String,
    pub content_type: String,
    /// Public locator returned by the store, possibly a signed URL.
    pub locator: String,
}

/// A decrypted object as served back to the caller.
#[derive(Clone, Debug)]
pub struct ObjectDownload {
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Names the wrapped-key sidecar for an object.
pub fn sidecar_name(object_name: &str) -> String {
    format!("{object_name}{SIDECAR_SUFFIX}")
}

/// Appends a UTC millisecond timestamp to a file name so repeat uploads
/// of the same file do not collide. Collisions within the same
/// millisecond are accepted as rare rather than actively prevented.
pub fn timestamped_object_name(file_name: &str) -> String {
    let suffix = Utc::now().format("-%Y-%m-%d-%H%M%S%3f");
    format!("{file_name}{suffix}")
}

/// Strips the query string a signed-URL mechanism appends to a locator.
pub fn strip_query(locator: &str) -> &str {
    locator.split_once('?').map_or(locator, |(base, _)| base)
}

/// Extracts the object name from a (decoded) locator: the final path
/// segment, query string excluded. Returns `None` for a locator naming
/// no object.
pub fn object_name_from_locator(locator: &str) -> Option<&str> {
    let path = strip_query(locator);
    let name = path.rsplit('/').next().unwrap_or(path);
    if name.is_empty() {
        None
    } else {
        Some(name)
    }
}
