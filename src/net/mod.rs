//! Network seam.
//!
//! The agent treats the network as an opaque fetch with a success or failure
//! outcome; everything it needs from a response is captured into a
//! [`ResponseSnapshot`] up front.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};

use crate::http::{FetchRequest, ResponseSnapshot};

/// Performs outgoing requests on behalf of the agent.
#[async_trait]
pub trait Fetcher: Send + Sync {
  /// Perform the request and capture the response.
  ///
  /// An `Err` means a transport-level failure (network down, DNS, timeout);
  /// HTTP error statuses come back as a successful snapshot.
  async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot>;
}

/// reqwest-backed fetcher, the production network layer.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("checkmate-agent/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

#[async_trait]
impl Fetcher for HttpFetcher {
  async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot> {
    let response = self
      .client
      .request(request.method.clone(), request.url.clone())
      .send()
      .await
      .map_err(|e| eyre!("Network fetch failed for {}: {}", request.url, e))?;

    let status = response.status().as_u16();
    let headers = response
      .headers()
      .iter()
      .map(|(name, value)| {
        (
          name.as_str().to_string(),
          String::from_utf8_lossy(value.as_bytes()).into_owned(),
        )
      })
      .collect();
    let body = response
      .bytes()
      .await
      .map_err(|e| eyre!("Failed to read response body from {}: {}", request.url, e))?
      .to_vec();

    Ok(ResponseSnapshot::new(status, headers, body))
  }
}

#[cfg(test)]
pub(crate) mod testing {
  use std::collections::HashMap;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::{Arc, Mutex};

  use async_trait::async_trait;
  use color_eyre::{eyre::eyre, Result};

  use super::Fetcher;
  use crate::http::{FetchRequest, ResponseSnapshot};

  /// Scripted fetcher: serves canned responses by URL and counts calls.
  /// A URL with no canned response fails like an unreachable network, so an
  /// empty stub behaves as fully offline.
  #[derive(Clone, Default)]
  pub struct StubFetcher {
    responses: Arc<Mutex<HashMap<String, ResponseSnapshot>>>,
    calls: Arc<AtomicUsize>,
  }

  impl StubFetcher {
    pub fn new() -> Self {
      Self::default()
    }

    pub fn serve(self, url: &str, response: ResponseSnapshot) -> Self {
      self
        .responses
        .lock()
        .unwrap()
        .insert(url.to_string(), response);
      self
    }

    pub fn forget(&self, url: &str) {
      self.responses.lock().unwrap().remove(url);
    }

    /// Number of fetches attempted, including failed ones.
    pub fn calls(&self) -> usize {
      self.calls.load(Ordering::SeqCst)
    }
  }

  #[async_trait]
  impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<ResponseSnapshot> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      self
        .responses
        .lock()
        .unwrap()
        .get(request.url.as_str())
        .cloned()
        .ok_or_else(|| eyre!("connection refused: {}", request.url))
    }
  }

  pub fn text_response(body: &str) -> ResponseSnapshot {
    ResponseSnapshot::new(
      200,
      vec![("content-type".to_string(), "text/html".to_string())],
      body.as_bytes().to_vec(),
    )
  }
}
