//! The caching agent.
//!
//! A request-interception proxy between the Checkmate GP application and the
//! network, backed by the generation store. Three async lifecycle handlers:
//! install pre-caches the asset manifest, activate prunes stale generations,
//! and fetch serves intercepted requests network-first (navigations/HTML) or
//! cache-first (static assets).

mod fetch;
mod lifecycle;
mod manifest;

pub use fetch::{FetchOutcome, ServeSource, ServedResponse};
pub use lifecycle::{CachingAgent, LifecycleState};
pub use manifest::{AssetManifest, CACHE_NAME, PRECACHE_ASSETS};
