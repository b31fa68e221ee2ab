//! Data-access orchestrator of the Cerberus engine.
//!
//! [`DataAccess`] sits between a request layer and the backing stores. Given
//! a [`ModelScope`](cerberus_model::ModelScope) it validates payloads, runs
//! the mutation pipelines, keeps the cache-aside layer consistent with the
//! persistent store and hands out locks, [`Incrementer`]s and [`Limiter`]s.
//!
//! ```toml
//! [storage]
//! path = "cerberus.db"
//!
//! [cache]
//! enabled = true
//! namespace = "cerberus"
//! expiration_secs = 3600
//!
//! [crypto]
//! key = "<base64, 32 bytes>"
//!
//! [access]
//! default_limit = 20
//! max_limit = 100
//! ```

mod access;
mod config;
mod counter;
mod error;

pub use access::DataAccess;
pub use config::{AccessConfig, CerberusConfig, CryptoConfig};
pub use counter::{Incrementer, Limiter};
pub use error::{AccessResult, ConfigError, DataAccessError};
