//! Request interception: classification and the two serving strategies.

use std::sync::Arc;

use color_eyre::Result;
use reqwest::Method;
use tracing::debug;

use super::lifecycle::{CachingAgent, LifecycleState};
use crate::cache::CacheStore;
use crate::http::{FetchRequest, ResponseSnapshot};
use crate::net::Fetcher;

/// Where a served response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
  /// Live network response
  Network,
  /// Previously cached entry
  Cache,
}

/// A response served by the agent, tagged with its source.
#[derive(Debug, Clone)]
pub struct ServedResponse {
  pub response: ResponseSnapshot,
  pub source: ServeSource,
}

/// Outcome of request interception.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
  /// The request is outside the agent's remit; the caller sends it to the
  /// network untouched.
  Bypass,
  Served(ServedResponse),
}

/// Serving strategy for an intercepted request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Strategy {
  NetworkFirst,
  CacheFirst,
}

/// Navigations and HTML documents go network-first so the application picks
/// up updates promptly; everything else is a static asset served cache-first.
fn classify(request: &FetchRequest) -> Strategy {
  if request.is_navigation() || request.url.path().ends_with(".html") {
    Strategy::NetworkFirst
  } else {
    Strategy::CacheFirst
  }
}

impl<S: CacheStore + 'static, F: Fetcher> CachingAgent<S, F> {
  /// Intercept one outgoing request.
  ///
  /// Non-GET and cross-origin requests always bypass, as does everything
  /// until the agent is active.
  pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
    if self.state() != LifecycleState::Active {
      return Ok(FetchOutcome::Bypass);
    }
    if request.method != Method::GET || !request.same_origin_as(&self.origin) {
      debug!(method = %request.method, url = %request.url, "Bypassing request");
      return Ok(FetchOutcome::Bypass);
    }

    let served = match classify(request) {
      Strategy::NetworkFirst => self.network_first(request).await?,
      Strategy::CacheFirst => self.cache_first(request).await?,
    };
    Ok(FetchOutcome::Served(served))
  }

  /// Network-first: the live response wins, the cache is the offline
  /// fallback. With neither, the network error propagates.
  async fn network_first(&self, request: &FetchRequest) -> Result<ServedResponse> {
    match self.fetcher.fetch(request).await {
      Ok(response) => {
        self.spawn_cache_write(request.key(), response.clone());
        Ok(ServedResponse {
          response,
          source: ServeSource::Network,
        })
      }
      Err(err) => match self.store.lookup(&self.cache_name, &request.key())? {
        Some(entry) => {
          debug!(url = %request.url, "Network unavailable, serving cached copy");
          Ok(ServedResponse {
            response: entry.response,
            source: ServeSource::Cache,
          })
        }
        None => Err(err),
      },
    }
  }

  /// Cache-first: a hit never touches the network; a miss fetches and
  /// backfills the cache.
  async fn cache_first(&self, request: &FetchRequest) -> Result<ServedResponse> {
    if let Some(entry) = self.store.lookup(&self.cache_name, &request.key())? {
      debug!(url = %request.url, "Cache hit");
      return Ok(ServedResponse {
        response: entry.response,
        source: ServeSource::Cache,
      });
    }

    let response = self.fetcher.fetch(request).await?;
    self.spawn_cache_write(request.key(), response.clone());
    Ok(ServedResponse {
      response,
      source: ServeSource::Network,
    })
  }

  /// Detached cache write: returning the response never waits on storage.
  /// A request issued immediately after may not observe the entry yet
  /// (last-write-wins).
  fn spawn_cache_write(&self, key: String, response: ResponseSnapshot) {
    let store = Arc::clone(&self.store);
    let cache_name = self.cache_name.clone();
    tokio::spawn(async move {
      if let Err(err) = store.put(&cache_name, &key, &response) {
        debug!(key = %key, error = %err, "Detached cache write failed");
      }
    });
  }
}

#[cfg(test)]
mod tests {
  use std::time::Duration;

  use url::Url;

  use super::*;
  use crate::agent::CACHE_NAME;
  use crate::cache::MemoryStore;
  use crate::net::testing::{text_response, StubFetcher};

  fn origin() -> Url {
    Url::parse("https://checkmate-gp.example/").unwrap()
  }

  fn url(path: &str) -> Url {
    origin().join(path).unwrap()
  }

  async fn active_agent(store: MemoryStore, stub: StubFetcher) -> CachingAgent<MemoryStore, StubFetcher> {
    let agent = CachingAgent::new(store, stub, origin());
    agent.activate().await.unwrap();
    agent
  }

  /// The detached write settles shortly after the response is returned.
  async fn settle() {
    tokio::time::sleep(Duration::from_millis(10)).await;
  }

  #[test]
  fn test_classification() {
    assert_eq!(classify(&FetchRequest::navigation(url("/"))), Strategy::NetworkFirst);
    assert_eq!(classify(&FetchRequest::get(url("/index.html"))), Strategy::NetworkFirst);
    // A plain GET for the root is not a navigation
    assert_eq!(classify(&FetchRequest::get(url("/"))), Strategy::CacheFirst);
    assert_eq!(
      classify(&FetchRequest::get(url("/icons/icon-192.png"))),
      Strategy::CacheFirst
    );
    assert_eq!(classify(&FetchRequest::get(url("/app.js"))), Strategy::CacheFirst);
  }

  #[tokio::test]
  async fn test_navigation_serves_network_and_backfills_cache() {
    let stub = StubFetcher::new().serve(url("/index.html").as_str(), text_response("fresh"));
    let agent = active_agent(MemoryStore::new(), stub).await;
    let request = FetchRequest::navigation(url("/index.html"));

    let outcome = agent.handle_fetch(&request).await.unwrap();
    let FetchOutcome::Served(served) = outcome else {
      panic!("expected a served response");
    };
    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(served.response.body, b"fresh");

    settle().await;
    let entry = agent.store.lookup(CACHE_NAME, &request.key()).unwrap().unwrap();
    assert_eq!(entry.response, served.response);
  }

  #[tokio::test]
  async fn test_navigation_falls_back_to_cache_when_offline() {
    let store = MemoryStore::new();
    let request = FetchRequest::navigation(url("/index.html"));
    store
      .put(CACHE_NAME, &request.key(), &text_response("cached"))
      .unwrap();

    let agent = active_agent(store, StubFetcher::new()).await;
    let outcome = agent.handle_fetch(&request).await.unwrap();

    let FetchOutcome::Served(served) = outcome else {
      panic!("expected a served response");
    };
    assert_eq!(served.source, ServeSource::Cache);
    assert_eq!(served.response.body, b"cached");
  }

  #[tokio::test]
  async fn test_network_first_overwrites_stale_entry() {
    let store = MemoryStore::new();
    let request = FetchRequest::navigation(url("/index.html"));
    store
      .put(CACHE_NAME, &request.key(), &text_response("stale"))
      .unwrap();

    let stub = StubFetcher::new().serve(url("/index.html").as_str(), text_response("fresh"));
    let agent = active_agent(store, stub).await;

    let outcome = agent.handle_fetch(&request).await.unwrap();
    let FetchOutcome::Served(served) = outcome else {
      panic!("expected a served response");
    };
    assert_eq!(served.source, ServeSource::Network);

    settle().await;
    let entry = agent.store.lookup(CACHE_NAME, &request.key()).unwrap().unwrap();
    assert_eq!(entry.response.body, b"fresh");
  }

  #[tokio::test]
  async fn test_static_asset_cache_hit_skips_network() {
    let store = MemoryStore::new();
    let request = FetchRequest::get(url("/icons/icon-192.png"));
    store
      .put(CACHE_NAME, &request.key(), &text_response("png"))
      .unwrap();

    let stub = StubFetcher::new();
    let agent = active_agent(store, stub.clone()).await;

    // Repeated requests keep serving from cache without network activity
    for _ in 0..3 {
      let outcome = agent.handle_fetch(&request).await.unwrap();
      let FetchOutcome::Served(served) = outcome else {
        panic!("expected a served response");
      };
      assert_eq!(served.source, ServeSource::Cache);
      assert_eq!(served.response.body, b"png");
    }
    assert_eq!(stub.calls(), 0);
  }

  #[tokio::test]
  async fn test_static_asset_miss_fetches_and_backfills() {
    let stub = StubFetcher::new().serve(url("/app.js").as_str(), text_response("js"));
    let agent = active_agent(MemoryStore::new(), stub.clone()).await;
    let request = FetchRequest::get(url("/app.js"));

    let outcome = agent.handle_fetch(&request).await.unwrap();
    let FetchOutcome::Served(served) = outcome else {
      panic!("expected a served response");
    };
    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(stub.calls(), 1);

    settle().await;

    // Second request hits the backfilled cache
    let outcome = agent.handle_fetch(&request).await.unwrap();
    let FetchOutcome::Served(served) = outcome else {
      panic!("expected a served response");
    };
    assert_eq!(served.source, ServeSource::Cache);
    assert_eq!(stub.calls(), 1);
  }

  #[tokio::test]
  async fn test_non_get_and_cross_origin_bypass() {
    let stub = StubFetcher::new();
    let agent = active_agent(MemoryStore::new(), stub.clone()).await;

    let post = FetchRequest::new(Method::POST, url("/moves"));
    assert!(matches!(
      agent.handle_fetch(&post).await.unwrap(),
      FetchOutcome::Bypass
    ));

    let cross_origin = FetchRequest::get(Url::parse("https://api.lichess.example/puzzle").unwrap());
    assert!(matches!(
      agent.handle_fetch(&cross_origin).await.unwrap(),
      FetchOutcome::Bypass
    ));

    assert_eq!(stub.calls(), 0);
  }

  #[tokio::test]
  async fn test_requests_bypass_until_active() {
    let agent = CachingAgent::new(MemoryStore::new(), StubFetcher::new(), origin());
    let request = FetchRequest::get(url("/app.js"));

    assert!(matches!(
      agent.handle_fetch(&request).await.unwrap(),
      FetchOutcome::Bypass
    ));
  }

  #[tokio::test]
  async fn test_total_unavailability_propagates() {
    let agent = active_agent(MemoryStore::new(), StubFetcher::new()).await;

    let navigation = FetchRequest::navigation(url("/index.html"));
    assert!(agent.handle_fetch(&navigation).await.is_err());

    let asset = FetchRequest::get(url("/app.js"));
    assert!(agent.handle_fetch(&asset).await.is_err());
  }
}
