//! Core trait and types for the generation store.

use chrono::{DateTime, Utc};
use color_eyre::Result;

use crate::http::ResponseSnapshot;

/// A single cached entry with its storage timestamp.
#[derive(Debug, Clone)]
pub struct CachedEntry {
  /// The captured response
  pub response: ResponseSnapshot,
  /// When the entry was written
  pub cached_at: DateTime<Utc>,
}

/// Storage backend for cache generations.
///
/// Keys are unique within a generation; writing an existing key overwrites
/// the prior value (last-write-wins). Implementations must be safe to share
/// across concurrently running fetch handlers.
pub trait CacheStore: Send + Sync {
  /// Create the generation if it does not exist yet.
  fn open(&self, generation: &str) -> Result<()>;

  /// Look up an entry by request key.
  fn lookup(&self, generation: &str, key: &str) -> Result<Option<CachedEntry>>;

  /// Store or overwrite an entry.
  fn put(&self, generation: &str, key: &str, response: &ResponseSnapshot) -> Result<()>;

  /// Delete a whole generation and its entries. Returns whether it existed.
  fn delete(&self, generation: &str) -> Result<bool>;

  /// Names of all existing generations.
  fn generation_names(&self) -> Result<Vec<String>>;

  /// Request keys present in a generation.
  fn entry_keys(&self, generation: &str) -> Result<Vec<String>>;
}
