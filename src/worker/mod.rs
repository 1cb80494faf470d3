//! The offline cache manager for one deployed version.
//!
//! A [`Worker`] is built once per version from an immutable [`Config`]. It moves
//! through install and activate (see `lifecycle`), intercepts requests while
//! active, and answers control-channel events (see `control`).

mod control;
mod lifecycle;

use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, error};
use url::Url;

use crate::cache::{BucketNames, CacheLayer, CacheResult, CacheStorage};
use crate::classify::{Classifier, Route};
use crate::config::{Config, NotificationConfig};
use crate::host::Host;
use crate::http::{Request, Response};
use crate::network::Network;

pub use control::{ClickAction, HostMessage, NotificationClick, ReplyPort, VersionReply, SYNC_TAG};
pub use lifecycle::WorkerState;

/// Paths tried, in order, when a navigation fails.
const NAVIGATION_FALLBACKS: [&str; 2] = ["/", "/index.html"];

pub struct Worker<S: CacheStorage> {
  origin: Url,
  manifest: Vec<Url>,
  classifier: Classifier,
  cache: CacheLayer<S>,
  network: Arc<dyn Network>,
  host: Arc<dyn Host>,
  notifications: NotificationConfig,
  state: RwLock<WorkerState>,
  skip_requested: AtomicBool,
}

impl<S: CacheStorage> Worker<S> {
  pub fn new(
    config: &Config,
    storage: Arc<S>,
    network: Arc<dyn Network>,
    host: Arc<dyn Host>,
  ) -> Result<Self> {
    if config.cache.version.trim().is_empty() {
      return Err(eyre!("Cache version must not be empty"));
    }

    Ok(Self {
      origin: config.origin_url()?,
      manifest: config.precache_urls()?,
      classifier: Classifier::new(config.dynamic_prefixes.iter().cloned()),
      cache: CacheLayer::new(storage, config.bucket_names()),
      network,
      host,
      notifications: config.notifications.clone(),
      state: RwLock::new(WorkerState::Parsed),
      skip_requested: AtomicBool::new(false),
    })
  }

  pub fn version(&self) -> &str {
    self.cache.buckets().version()
  }

  pub fn buckets(&self) -> &BucketNames {
    self.cache.buckets()
  }

  pub fn origin(&self) -> &Url {
    &self.origin
  }

  pub fn state(&self) -> WorkerState {
    *self.state.read().unwrap_or_else(PoisonError::into_inner)
  }

  fn set_state(&self, next: WorkerState) {
    *self.state.write().unwrap_or_else(PoisonError::into_inner) = next;
  }

  /// Move from `expected` to `next`, failing if the worker is elsewhere.
  fn transition(&self, expected: WorkerState, next: WorkerState) -> Result<()> {
    let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
    if *state != expected {
      return Err(eyre!(
        "Worker {} cannot move to {:?} while {:?}",
        self.version(),
        next,
        *state
      ));
    }
    *state = next;
    Ok(())
  }

  pub fn route(&self, request: &Request) -> Route {
    self.classifier.classify(request)
  }

  /// Intercept a request.
  ///
  /// Returns `None` for requests that are not intercepted (non-GET, non-http);
  /// the caller hands those to the transport untouched. Every intercepted
  /// request gets a response: strategy failures end in the offline fallback.
  pub async fn handle_fetch(&self, request: &Request) -> Option<CacheResult<Response>> {
    let outcome = match self.route(request) {
      Route::Skip => return None,
      Route::Static => {
        self
          .cache
          .cache_first(request, || self.network.fetch(request))
          .await
      }
      Route::Dynamic => {
        self
          .cache
          .network_first(request, || self.network.fetch(request))
          .await
      }
    };

    match outcome {
      Ok(result) => Some(result),
      Err(e) => {
        error!(url = %request.url, "Fetch error: {}", e);
        Some(self.offline_fallback(request))
      }
    }
  }

  fn offline_fallback(&self, request: &Request) -> CacheResult<Response> {
    if !request.destination.is_navigation() {
      return CacheResult::synthesized(Response::offline_unavailable());
    }

    for path in NAVIGATION_FALLBACKS {
      let Ok(url) = request.url.join(path) else {
        continue;
      };
      if let Some(cached) = self.cache.lookup(&Request::get(url)) {
        debug!(path, "serving cached shell for offline navigation");
        return CacheResult::offline(cached.response, cached.cached_at);
      }
    }

    CacheResult::synthesized(Response::offline_document())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::cache::{CacheSource, MemoryStorage};
  use crate::test_support::{test_config, url, RecordingHost, ScriptedNetwork};
  use reqwest::Method;

  fn setup() -> (Worker<MemoryStorage>, Arc<MemoryStorage>, Arc<ScriptedNetwork>) {
    let storage = Arc::new(MemoryStorage::new());
    let network = Arc::new(ScriptedNetwork::new());
    let worker = Worker::new(
      &test_config(),
      storage.clone(),
      network.clone(),
      Arc::new(RecordingHost::new()),
    )
    .unwrap();
    (worker, storage, network)
  }

  #[tokio::test]
  async fn test_non_get_not_intercepted() {
    let (worker, storage, network) = setup();
    let request = Request::get(url("/api/data")).with_method(Method::POST);

    assert!(worker.handle_fetch(&request).await.is_none());
    assert!(network.calls().is_empty());
    assert!(storage.bucket_names().unwrap().is_empty());
  }

  #[tokio::test]
  async fn test_static_asset_cached_then_served_from_cache() {
    let (worker, storage, network) = setup();
    let icon = url("/icons/icon-192x192.png");
    network.respond(icon.as_str(), Response::new(200, "png-bytes"));
    let request = Request::get(icon.clone());

    let first = worker.handle_fetch(&request).await.unwrap();
    assert_eq!(first.source, CacheSource::Network);
    assert!(storage
      .get(worker.buckets().static_name(), &request)
      .unwrap()
      .is_some());

    let second = worker.handle_fetch(&request).await.unwrap();
    assert_eq!(second.source, CacheSource::Cache);
    assert_eq!(second.data.body, b"png-bytes");
    assert_eq!(network.calls_to(icon.as_str()), 1);
  }

  #[tokio::test]
  async fn test_dynamic_offline_with_cached_entry() {
    let (worker, storage, network) = setup();
    let request = Request::get(url("/api/data"));
    storage
      .put(
        worker.buckets().dynamic_name(),
        &request,
        &Response::new(200, "[1,2,3]"),
      )
      .unwrap();
    network.set_offline(true);

    let result = worker.handle_fetch(&request).await.unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.body, b"[1,2,3]");
    assert_eq!(network.calls_to(request.url.as_str()), 1);
  }

  #[tokio::test]
  async fn test_dynamic_offline_without_cache_yields_503() {
    let (worker, _storage, network) = setup();
    network.set_offline(true);

    let result = worker
      .handle_fetch(&Request::get(url("/api/data")))
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Synthesized);
    assert_eq!(result.data.status, 503);
    assert_eq!(result.data.status_text, "Service Unavailable");
  }

  #[tokio::test]
  async fn test_offline_navigation_without_cache_yields_offline_page() {
    let (worker, _storage, network) = setup();
    network.set_offline(true);

    let result = worker
      .handle_fetch(&Request::navigate(url("/relatorios")))
      .await
      .unwrap();
    assert_eq!(result.data.status, 200);
    assert_eq!(
      result.data.header("Content-Type"),
      Some("text/html; charset=utf-8")
    );
    assert!(String::from_utf8_lossy(&result.data.body).contains("offline"));
  }

  #[tokio::test]
  async fn test_offline_navigation_serves_cached_shell() {
    let (worker, storage, network) = setup();
    storage
      .put(
        worker.buckets().static_name(),
        &Request::get(url("/index.html")),
        &Response::new(200, "<html>shell</html>"),
      )
      .unwrap();
    network.set_offline(true);

    let result = worker
      .handle_fetch(&Request::navigate(url("/novo-registro")))
      .await
      .unwrap();
    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.data.body, b"<html>shell</html>");
  }

  #[tokio::test]
  async fn test_cross_bucket_lookup_for_static() {
    // A static request served from an entry stored by the network-first path
    let (worker, storage, network) = setup();
    let request = Request::get(url("/shared.json"));
    storage
      .put(worker.buckets().dynamic_name(), &request, &Response::new(200, "x"))
      .unwrap();

    let result = worker.handle_fetch(&request).await.unwrap();
    assert_eq!(result.source, CacheSource::Cache);
    assert!(network.calls().is_empty());
  }

  #[test]
  fn test_rejects_empty_version() {
    let mut config = test_config();
    config.cache.version = "  ".to_string();
    let result = Worker::new(
      &config,
      Arc::new(MemoryStorage::new()),
      Arc::new(ScriptedNetwork::new()),
      Arc::new(RecordingHost::new()),
    );
    assert!(result.is_err());
  }
}
