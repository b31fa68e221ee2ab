//! Cache layer of the Cerberus data-access engine.
//!
//! - [`KvNode`]: the primitives of one key-value node, with [`MemoryNode`]
//!   as the in-process implementation
//! - [`Redlock`]: majority locking across nodes
//! - [`CacheStore`] / [`KvCache`]: cache-aside entries, locks and counters
//!
//! Keys are `{ns}:cache:{model namespace}:{id}`, `{ns}:incr:{name}` and
//! `{ns}:locks:{name}`.

mod error;
mod lock;
mod node;
mod store;

pub use error::{CacheError, CacheResult};
pub use lock::{Lock, Redlock, RedlockConfig};
pub use node::{KvNode, MemoryNode};
pub use store::{CacheConfig, CacheStore, KvCache};
