//! Core traits and types for the bucket store.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use sha2::{Digest, Sha256};

use crate::http::{Request, Response};

/// A stored response together with its insertion time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedResponse {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Named-bucket key/value store for response snapshots.
///
/// Buckets are created on first `open` or `put`, listed in creation order, and
/// only ever removed whole. Within a bucket an entry is identified by
/// [`entry_key`]; writing the same key again replaces the previous snapshot.
pub trait CacheStorage: Send + Sync {
  /// Create the bucket if it does not exist yet.
  fn open(&self, bucket: &str) -> Result<()>;

  fn has_bucket(&self, bucket: &str) -> Result<bool>;

  /// All bucket names, oldest first.
  fn bucket_names(&self) -> Result<Vec<String>>;

  /// Delete a bucket and every entry in it. Returns whether it existed.
  fn delete_bucket(&self, bucket: &str) -> Result<bool>;

  /// Store a single response, creating the bucket if needed.
  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()>;

  /// Store a batch of responses atomically: either all are written or none.
  fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()>;

  /// Look up a request in one bucket.
  fn get(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>>;

  /// URLs stored in a bucket, in insertion order.
  fn entries(&self, bucket: &str) -> Result<Vec<String>>;

  /// Look up a request across several buckets, first hit wins.
  fn match_request(&self, buckets: &[&str], request: &Request) -> Result<Option<CachedResponse>> {
    for bucket in buckets {
      if let Some(hit) = self.get(bucket, request)? {
        return Ok(Some(hit));
      }
    }
    Ok(None)
  }
}

/// Stable, fixed-length identity for a request within a bucket.
pub fn entry_key(request: &Request) -> String {
  let input = format!("{} {}", request.method, request.cache_url());

  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

/// Only GET requests may be stored.
pub fn ensure_cacheable(request: &Request) -> Result<()> {
  if request.method != Method::GET {
    return Err(eyre!(
      "Request method '{}' is unsupported for caching",
      request.method
    ));
  }
  Ok(())
}

/// Result from a strategy, including where the response came from.
#[derive(Debug, Clone)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was cached (if from cache)
  pub cached_at: Option<DateTime<Utc>>,
}

impl<T> CacheResult<T> {
  /// Fresh data straight from the network.
  pub fn from_network(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      cached_at: None,
    }
  }

  /// A cache hit that short-circuited the network.
  pub fn from_cache(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Cache,
      cached_at: Some(cached_at),
    }
  }

  /// Cached data served because the network failed.
  pub fn offline(data: T, cached_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Offline,
      cached_at: Some(cached_at),
    }
  }

  /// Data generated locally because neither network nor cache could answer.
  pub fn synthesized(data: T) -> Self {
    Self {
      data,
      source: CacheSource::Synthesized,
      cached_at: None,
    }
  }
}

/// Indicates where a response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Cache hit, network not consulted
  Cache,
  /// Network unavailable, serving cached data
  Offline,
  /// Offline fallback built by the manager
  Synthesized,
}

impl std::fmt::Display for CacheSource {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let name = match self {
      CacheSource::Network => "network",
      CacheSource::Cache => "cache",
      CacheSource::Offline => "offline",
      CacheSource::Synthesized => "synthesized",
    };
    f.write_str(name)
  }
}
