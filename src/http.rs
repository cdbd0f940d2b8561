//! Request and response model for the caching agent.
//!
//! Requests are identified by method + URL; only same-origin GETs are ever
//! handled. Responses are captured as self-contained snapshots so they can be
//! stored and replayed without holding any network resources.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// How the application issued a request. Mirrors the platform request modes;
/// only `Navigate` affects routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RequestMode {
  /// A top-level page navigation
  Navigate,
  #[default]
  SameOrigin,
  Cors,
  NoCors,
}

/// An outgoing request as seen by the agent.
#[derive(Debug, Clone)]
pub struct FetchRequest {
  pub method: Method,
  pub url: Url,
  pub mode: RequestMode,
}

impl FetchRequest {
  pub fn new(method: Method, url: Url) -> Self {
    Self {
      method,
      url,
      mode: RequestMode::default(),
    }
  }

  /// A plain GET, the common case for asset requests.
  pub fn get(url: Url) -> Self {
    Self::new(Method::GET, url)
  }

  /// A GET issued as a page navigation.
  pub fn navigation(url: Url) -> Self {
    Self {
      method: Method::GET,
      url,
      mode: RequestMode::Navigate,
    }
  }

  /// Cache identity for this request.
  pub fn key(&self) -> String {
    format!("{} {}", self.method, self.url)
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Whether this request targets the given origin (scheme + host + port).
  pub fn same_origin_as(&self, origin: &Url) -> bool {
    self.url.scheme() == origin.scheme()
      && self.url.host_str() == origin.host_str()
      && self.url.port_or_known_default() == origin.port_or_known_default()
  }
}

/// A captured response: status, headers and body, detached from the network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseSnapshot {
  pub status: u16,
  /// Header name/value pairs in response order
  pub headers: Vec<(String, String)>,
  pub body: Vec<u8>,
}

impl ResponseSnapshot {
  pub fn new(status: u16, headers: Vec<(String, String)>, body: Vec<u8>) -> Self {
    Self {
      status,
      headers,
      body,
    }
  }

  pub fn is_success(&self) -> bool {
    (200..300).contains(&self.status)
  }

  /// Case-insensitive header lookup; returns the first match.
  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(n, _)| n.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }

  /// SHA256 of the body, hex-encoded. Used by the status command.
  pub fn body_digest(&self) -> String {
    hex::encode(Sha256::digest(&self.body))
  }
}
