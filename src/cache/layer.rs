//! Cache layer that orchestrates caching strategies with network fetching.

use color_eyre::Result;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::buckets::BucketNames;
use super::traits::{CacheResult, CacheStorage, CachedResponse};
use crate::http::{Request, Response};

/// Strategy executor for one cache generation.
///
/// Lookups consult the generation's recognized buckets; writes go to the static
/// bucket (cache-first) or the dynamic bucket (network-first). A failed write is
/// logged and otherwise ignored: the response already in hand is still returned.
pub struct CacheLayer<S: CacheStorage> {
  storage: Arc<S>,
  buckets: BucketNames,
}

impl<S: CacheStorage> CacheLayer<S> {
  /// Create a new cache layer over the given storage backend.
  pub fn new(storage: Arc<S>, buckets: BucketNames) -> Self {
    Self { storage, buckets }
  }

  pub fn storage(&self) -> &Arc<S> {
    &self.storage
  }

  pub fn buckets(&self) -> &BucketNames {
    &self.buckets
  }

  /// Look up a request in the current bucket set. Storage errors count as a miss.
  pub fn lookup(&self, request: &Request) -> Option<CachedResponse> {
    match self.storage.match_request(&self.buckets.recognized(), request) {
      Ok(hit) => hit,
      Err(e) => {
        warn!(url = %request.url, "Cache lookup failed: {}", e);
        None
      }
    }
  }

  fn store_copy(&self, bucket: &str, request: &Request, response: &Response) {
    match self.storage.put(bucket, request, response) {
      Ok(()) => debug!(bucket, url = %request.url, "stored response"),
      Err(e) => warn!(bucket, url = %request.url, "Failed to cache response: {}", e),
    }
  }

  /// Cache-first strategy for static assets.
  ///
  /// 1. Check cache - on a hit, return it without touching the network
  /// 2. On a miss, fetch from network
  /// 3. Store ok responses in the static bucket
  /// 4. A failed fetch is returned to the caller as-is
  pub async fn cache_first<F, Fut>(&self, request: &Request, fetcher: F) -> Result<CacheResult<Response>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response>>,
  {
    if let Some(cached) = self.lookup(request) {
      debug!(url = %request.url, "cache hit");
      return Ok(CacheResult::from_cache(cached.response, cached.cached_at));
    }

    let response = fetcher().await?;
    if response.is_ok() {
      self.store_copy(self.buckets.static_name(), request, &response);
    }
    Ok(CacheResult::from_network(response))
  }

  /// Network-first strategy for dynamic endpoints.
  ///
  /// The network is always tried first. Ok responses are copied into the
  /// dynamic bucket. Only a failed fetch (not a non-ok status) falls back to the
  /// cache; if that misses too, the original error is returned.
  pub async fn network_first<F, Fut>(&self, request: &Request, fetcher: F) -> Result<CacheResult<Response>>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<Response>>,
  {
    match fetcher().await {
      Ok(response) => {
        if response.is_ok() {
          self.store_copy(self.buckets.dynamic_name(), request, &response);
        }
        Ok(CacheResult::from_network(response))
      }
      Err(err) => {
        warn!(url = %request.url, "Network failed, trying cache: {}", err);
        match self.lookup(request) {
          Some(cached) => Ok(CacheResult::offline(cached.response, cached.cached_at)),
          None => Err(err),
        }
      }
    }
  }
}

impl<S: CacheStorage> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      buckets: self.buckets.clone(),
    }
  }
}
