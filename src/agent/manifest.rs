//! The pre-cache manifest: assets guaranteed present after install.

use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::http::FetchRequest;

/// Name of the current cache generation. Bumping the version suffix is the
/// only supported invalidation mechanism: the next activate deletes every
/// other generation.
pub const CACHE_NAME: &str = "checkmate-gp-v1";

/// Assets that must be present in the current generation immediately after
/// install, relative to the agent's scope.
pub const PRECACHE_ASSETS: [&str; 6] = [
  "./",
  "./index.html",
  "./manifest.json",
  "./icons/icon-192.png",
  "./icons/icon-512.png",
  "./icons/apple-touch-icon.png",
];

/// Ordered list of request identities to pre-cache at install time.
#[derive(Debug, Clone)]
pub struct AssetManifest {
  entries: Vec<String>,
}

impl AssetManifest {
  pub fn new(entries: Vec<String>) -> Self {
    Self { entries }
  }

  pub fn entries(&self) -> &[String] {
    &self.entries
  }

  /// Resolve the scope-relative entries against the agent's origin.
  pub fn resolve(&self, origin: &Url) -> Result<Vec<FetchRequest>> {
    self
      .entries
      .iter()
      .map(|entry| {
        let url = origin
          .join(entry)
          .map_err(|e| eyre!("Invalid manifest entry {}: {}", entry, e))?;
        Ok(FetchRequest::get(url))
      })
      .collect()
  }
}

impl Default for AssetManifest {
  fn default() -> Self {
    Self::new(PRECACHE_ASSETS.iter().map(|s| s.to_string()).collect())
  }
}
