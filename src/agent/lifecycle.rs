//! Agent lifecycle: install (pre-cache) and activate (prune stale generations).

use std::sync::{Arc, RwLock};

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use tracing::info;
use url::Url;

use super::manifest::{AssetManifest, CACHE_NAME};
use crate::cache::CacheStore;
use crate::http::FetchRequest;
use crate::net::Fetcher;

/// Lifecycle of the agent, standard for this class of background worker.
/// Fetch interception only happens once `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
  Idle,
  Installing,
  /// Installed and ready to supersede a prior agent. Takeover is forced, so
  /// this state is transient.
  Installed,
  Activating,
  Active,
}

/// Request-interception proxy between the application and the network,
/// backed by the generation store.
///
/// Store and fetcher are injected so tests can substitute fakes; the
/// production pairing is [`crate::cache::SqliteStore`] with
/// [`crate::net::HttpFetcher`].
pub struct CachingAgent<S, F> {
  pub(super) store: Arc<S>,
  pub(super) fetcher: Arc<F>,
  pub(super) origin: Url,
  pub(super) cache_name: String,
  manifest: AssetManifest,
  state: RwLock<LifecycleState>,
}

impl<S: CacheStore + 'static, F: Fetcher> CachingAgent<S, F> {
  /// Create an agent for the given origin with the compiled-in manifest.
  pub fn new(store: S, fetcher: F, origin: Url) -> Self {
    Self {
      store: Arc::new(store),
      fetcher: Arc::new(fetcher),
      origin,
      cache_name: CACHE_NAME.to_string(),
      manifest: AssetManifest::default(),
      state: RwLock::new(LifecycleState::Idle),
    }
  }

  /// Replace the manifest (scope changes, tests).
  #[allow(dead_code)]
  pub fn with_manifest(mut self, manifest: AssetManifest) -> Self {
    self.manifest = manifest;
    self
  }

  pub fn state(&self) -> LifecycleState {
    // A poisoned lock still holds a valid state
    match self.state.read() {
      Ok(guard) => *guard,
      Err(poisoned) => *poisoned.into_inner(),
    }
  }

  pub(super) fn set_state(&self, next: LifecycleState) {
    match self.state.write() {
      Ok(mut guard) => *guard = next,
      Err(poisoned) => *poisoned.into_inner() = next,
    }
  }

  /// Pre-cache the manifest into the current generation.
  ///
  /// All-or-nothing: any asset that fails to fetch or store fails the whole
  /// install and the agent never becomes active. Entries written before the
  /// failure are left in place; a later install overwrites them.
  pub async fn install(&self) -> Result<()> {
    self.set_state(LifecycleState::Installing);
    info!(
      cache = %self.cache_name,
      assets = self.manifest.entries().len(),
      "Installing"
    );

    self.store.open(&self.cache_name)?;

    let requests = self.manifest.resolve(&self.origin)?;
    try_join_all(requests.iter().map(|request| self.precache(request))).await?;

    // Forced takeover: supersede any prior agent without waiting for
    // existing clients to close.
    self.set_state(LifecycleState::Installed);
    info!(cache = %self.cache_name, "Install complete, taking over");
    Ok(())
  }

  async fn precache(&self, request: &FetchRequest) -> Result<()> {
    let response = self
      .fetcher
      .fetch(request)
      .await
      .map_err(|e| eyre!("Failed to pre-cache {}: {}", request.url, e))?;

    // Pre-caching an error page would be served forever while offline
    if !response.is_success() {
      return Err(eyre!(
        "Failed to pre-cache {}: HTTP {}",
        request.url,
        response.status
      ));
    }

    self.store.put(&self.cache_name, &request.key(), &response)
  }

  /// Delete every generation other than the current one, then take control
  /// of all clients immediately, without waiting for a reload.
  pub async fn activate(&self) -> Result<()> {
    self.set_state(LifecycleState::Activating);

    for name in self.store.generation_names()? {
      if name != self.cache_name {
        info!(cache = %name, "Deleting stale cache generation");
        self.store.delete(&name)?;
      }
    }

    self.set_state(LifecycleState::Active);
    info!(cache = %self.cache_name, "Active and controlling clients");
    Ok(())
  }
}
