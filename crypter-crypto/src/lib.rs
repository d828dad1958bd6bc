//! Data encryption key (DEK) primitives for Crypter.
//!
//! A DEK is a freshly generated AES-256 key that encrypts exactly one
//! stored object. It exists in plaintext only between generation and
//! the moment its KMS-wrapped form is durably stored; the types here
//! zeroize key material on drop and never expose it through `Debug`.

mod error;
mod key;

pub use error::{CryptoError, CryptoResult};
pub use key::{generate_data_key, SymmetricKey, KEY_SIZE};
