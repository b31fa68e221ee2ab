//! One-way hashing of field values using Argon2id.
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...`), so verification reads the
//! parameters back from the stored value and works across parameter changes.

use crate::error::{CryptoError, CryptoResult};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};

/// Argon2id cost parameters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HashParams {
    /// Memory cost in KiB.
    pub memory_cost: u32,
    /// Time cost (iterations).
    pub time_cost: u32,
    /// Parallelism factor.
    pub parallelism: u32,
}

impl Default for HashParams {
    fn default() -> Self {
        // OWASP recommendations for Argon2id (2023)
        Self {
            memory_cost: 19 * 1024, // 19 MiB
            time_cost: 2,
            parallelism: 1,
        }
    }
}

impl HashParams {
    /// Cheap parameters for tests. Never use for stored data.
    pub fn insecure_fast() -> Self {
        Self {
            memory_cost: 1024,
            time_cost: 1,
            parallelism: 1,
        }
    }
}

/// Hashes and verifies field values.
///
/// Argon2 is CPU bound, so both operations run on tokio's blocking pool and
/// are suspension points for the caller.
#[derive(Clone, Debug, Default)]
pub struct FieldHasher {
    params: HashParams,
}

impl FieldHasher {
    pub fn new(params: HashParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &HashParams {
        &self.params
    }

    pub async fn hash(&self, plaintext: String) -> CryptoResult<String> {
        let params = self.params.clone();
        tokio::task::spawn_blocking(move || hash_blocking(&plaintext, &params))
            .await
            .map_err(|e| CryptoError::Hashing(format!("hashing task failed: {e}")))?
    }

    /// Whether `plaintext` matches a hash produced by [`FieldHasher::hash`].
    pub async fn verify(&self, plaintext: String, hash: String) -> CryptoResult<bool> {
        tokio::task::spawn_blocking(move || verify_blocking(&plaintext, &hash))
            .await
            .map_err(|e| CryptoError::Hashing(format!("verification task failed: {e}")))?
    }
}

fn hash_blocking(plaintext: &str, params: &HashParams) -> CryptoResult<String> {
    let argon2_params = Params::new(
        params.memory_cost,
        params.time_cost,
        params.parallelism,
        None,
    )
    .map_err(|e| CryptoError::Hashing(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, argon2_params);

    let salt = SaltString::generate(&mut OsRng);
    argon2
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| CryptoError::Hashing(e.to_string()))
}

fn verify_blocking(plaintext: &str, hash: &str) -> CryptoResult<bool> {
    let parsed = PasswordHash::new(hash).map_err(|e| CryptoError::MalformedHash(e.to_string()))?;
    Ok(Argon2::default()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}
