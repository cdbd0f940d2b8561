//! Generation-scoped cache storage.
//!
//! The cache is a key-value store addressed by generation name, then request
//! key. Exactly one generation is current at any time (named by
//! [`crate::agent::CACHE_NAME`]); older generations are stale and deleted
//! wholesale on activation. The store itself knows nothing about versioning
//! policy - it only provides open/lookup/put/delete/keys primitives.

mod storage;
mod traits;

pub use storage::{MemoryStore, SqliteStore};
pub use traits::{CacheStore, CachedEntry};
