//! Engine configuration.
//!
//! Loaded from a TOML document (every section optional, missing values take
//! their defaults) and then overridden by `CERBERUS_*` environment pairs.

use crate::error::ConfigError;
use cerberus_cache::CacheConfig;
use cerberus_crypto::{CipherKey, HashParams};
use cerberus_storage::SqliteConfig;
use cerberus_types::QueryLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CerberusConfig {
    pub storage: SqliteConfig,
    pub cache: CacheConfig,
    pub crypto: CryptoConfig,
    pub access: AccessConfig,
}

/// Field encryption key and hashing cost.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CryptoConfig {
    /// Base64-encoded 32-byte key. Without one a random key is generated and
    /// encrypted values do not survive a restart.
    pub key: Option<String>,
    /// Argon2id memory cost in KiB.
    pub memory_cost: u32,
    pub time_cost: u32,
    pub parallelism: u32,
}

impl Default for CryptoConfig {
    fn default() -> Self {
        let params = HashParams::default();
        Self {
            key: None,
            memory_cost: params.memory_cost,
            time_cost: params.time_cost,
            parallelism: params.parallelism,
        }
    }
}

impl std::fmt::Debug for CryptoConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CryptoConfig")
            .field("key", &self.key.as_ref().map(|_| "[REDACTED]"))
            .field("memory_cost", &self.memory_cost)
            .field("time_cost", &self.time_cost)
            .field("parallelism", &self.parallelism)
            .finish()
    }
}

impl CryptoConfig {
    pub fn hash_params(&self) -> HashParams {
        HashParams {
            memory_cost: self.memory_cost,
            time_cost: self.time_cost,
            parallelism: self.parallelism,
        }
    }

    pub fn cipher_key(&self) -> Result<CipherKey, ConfigError> {
        match &self.key {
            Some(encoded) => Ok(CipherKey::from_base64(encoded)?),
            None => {
                warn!("no crypto key configured, generating an ephemeral one");
                Ok(CipherKey::generate())
            }
        }
    }
}

/// Search limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AccessConfig {
    pub default_limit: usize,
    pub max_limit: usize,
}

impl Default for AccessConfig {
    fn default() -> Self {
        let limits = QueryLimits::default();
        Self {
            default_limit: limits.default_limit,
            max_limit: limits.max_limit,
        }
    }
}

impl AccessConfig {
    pub fn limits(&self) -> QueryLimits {
        QueryLimits {
            default_limit: self.default_limit,
            max_limit: self.max_limit,
        }
    }

    /// The limit applied to a search: the default when unset, clamped to
    /// the maximum.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.default_limit).min(self.max_limit)
    }
}

impl CerberusConfig {
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(document)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let config = Self::from_toml_str(&contents)?;
        info!(?path, "loaded configuration");
        Ok(config)
    }

    /// The file at `path` (or the defaults), then the process environment.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(path) => Self::from_path(path)?,
            None => Self::default(),
        };
        config.apply_env(std::env::vars())
    }

    /// Overrides values from `CERBERUS_*` pairs; other keys are ignored.
    pub fn apply_env<I, K, V>(mut self, vars: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        for (key, value) in vars {
            let value = value.as_ref();
            match key.as_ref() {
                "CERBERUS_NAMESPACE" => self.cache.namespace = value.to_string(),
                "CERBERUS_SQLITE_PATH" => {
                    self.storage.path = (!value.is_empty()).then(|| PathBuf::from(value));
                }
                "CERBERUS_CACHE_EXPIRATION" => {
                    self.cache.expiration_secs = parse_number("cache.expiration_secs", value)?;
                }
                "CERBERUS_CRYPTO_KEY" => self.crypto.key = Some(value.to_string()),
                "CERBERUS_LIMIT" => {
                    self.access.default_limit = parse_number("access.default_limit", value)?;
                }
                "CERBERUS_MAX_LIMIT" => {
                    self.access.max_limit = parse_number("access.max_limit", value)?;
                }
                _ => {}
            }
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache.namespace.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "cache.namespace",
                reason: "must not be empty".to_string(),
            });
        }
        if self.cache.nodes == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.nodes",
                reason: "must be > 0".to_string(),
            });
        }
        if self.access.default_limit == 0 {
            return Err(ConfigError::InvalidValue {
                field: "access.default_limit",
                reason: "must be > 0".to_string(),
            });
        }
        if self.access.max_limit < self.access.default_limit {
            return Err(ConfigError::InvalidValue {
                field: "access.max_limit",
                reason: format!(
                    "must be >= access.default_limit ({})",
                    self.access.default_limit
                ),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("expected a number, got {raw:?}"),
    })
}
