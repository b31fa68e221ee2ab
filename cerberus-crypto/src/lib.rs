//! Field-level cryptography for Cerberus.
//!
//! Two transforms back the `encrypted` and `hashed` field flags:
//!
//! - [`FieldCipher`]: ChaCha20-Poly1305 authenticated encryption, symmetric,
//!   round-trips on read
//! - [`FieldHasher`]: Argon2id, one-way, verified with [`FieldHasher::verify`]
//!
//! [`FieldCrypto`] bundles both for the mutation pipeline.

mod cipher;
mod error;
mod hash;
mod key;

pub use cipher::{FieldCipher, NONCE_SIZE, TAG_SIZE};
pub use error::{CryptoError, CryptoResult};
pub use hash::{FieldHasher, HashParams};
pub use key::{CipherKey, KEY_SIZE};

/// The cipher and hasher used for one deployment.
#[derive(Clone, Debug)]
pub struct FieldCrypto {
    pub cipher: FieldCipher,
    pub hasher: FieldHasher,
}

impl FieldCrypto {
    pub fn new(key: CipherKey, params: HashParams) -> Self {
        Self {
            cipher: FieldCipher::new(key),
            hasher: FieldHasher::new(params),
        }
    }
}
