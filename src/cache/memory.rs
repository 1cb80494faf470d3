//! In-memory bucket store for tests.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use super::traits::{ensure_cacheable, entry_key, CacheStorage, CachedResponse};
use crate::http::{Request, Response};

struct MemoryEntry {
  key: String,
  url: String,
  cached: CachedResponse,
}

/// In-memory bucket store with the same semantics as [`super::SqliteStorage`].
///
/// Writes can be made to fail, to exercise quota/unavailable-storage paths.
#[derive(Default)]
pub struct MemoryStorage {
  buckets: Mutex<Vec<(String, Vec<MemoryEntry>)>>,
  fail_writes: AtomicBool,
}

impl MemoryStorage {
  pub fn new() -> Self {
    Self::default()
  }

  /// Make every subsequent write fail (or succeed again).
  pub fn set_fail_writes(&self, fail: bool) {
    self.fail_writes.store(fail, Ordering::SeqCst);
  }

  fn check_writable(&self) -> Result<()> {
    if self.fail_writes.load(Ordering::SeqCst) {
      return Err(eyre!("Quota exceeded"));
    }
    Ok(())
  }

  fn upsert(entries: &mut Vec<MemoryEntry>, request: &Request, response: &Response) {
    let key = entry_key(request);
    let cached = CachedResponse {
      response: response.clone(),
      cached_at: Utc::now(),
    };

    match entries.iter_mut().find(|e| e.key == key) {
      Some(existing) => existing.cached = cached,
      None => entries.push(MemoryEntry {
        key,
        url: request.cache_url(),
        cached,
      }),
    }
  }
}

impl CacheStorage for MemoryStorage {
  fn open(&self, bucket: &str) -> Result<()> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    if !buckets.iter().any(|(name, _)| name == bucket) {
      buckets.push((bucket.to_string(), Vec::new()));
    }
    Ok(())
  }

  fn has_bucket(&self, bucket: &str) -> Result<bool> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(buckets.iter().any(|(name, _)| name == bucket))
  }

  fn bucket_names(&self) -> Result<Vec<String>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(buckets.iter().map(|(name, _)| name.clone()).collect())
  }

  fn delete_bucket(&self, bucket: &str) -> Result<bool> {
    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let before = buckets.len();
    buckets.retain(|(name, _)| name != bucket);
    Ok(buckets.len() != before)
  }

  fn put(&self, bucket: &str, request: &Request, response: &Response) -> Result<()> {
    self.put_all(bucket, &[(request.clone(), response.clone())])
  }

  fn put_all(&self, bucket: &str, entries: &[(Request, Response)]) -> Result<()> {
    self.check_writable()?;
    for (request, _) in entries {
      ensure_cacheable(request)?;
    }

    let mut buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let index = match buckets.iter().position(|(name, _)| name == bucket) {
      Some(index) => index,
      None => {
        buckets.push((bucket.to_string(), Vec::new()));
        buckets.len() - 1
      }
    };

    for (request, response) in entries {
      Self::upsert(&mut buckets[index].1, request, response);
    }
    Ok(())
  }

  fn get(&self, bucket: &str, request: &Request) -> Result<Option<CachedResponse>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let key = entry_key(request);

    Ok(
      buckets
        .iter()
        .find(|(name, _)| name == bucket)
        .and_then(|(_, entries)| entries.iter().find(|e| e.key == key))
        .map(|e| e.cached.clone()),
    )
  }

  fn entries(&self, bucket: &str) -> Result<Vec<String>> {
    let buckets = self
      .buckets
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    Ok(
      buckets
        .iter()
        .find(|(name, _)| name == bucket)
        .map(|(_, entries)| entries.iter().map(|e| e.url.clone()).collect())
        .unwrap_or_default(),
    )
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use url::Url;

  fn request(path: &str) -> Request {
    Request::get(Url::parse("https://app.test").unwrap().join(path).unwrap())
  }

  #[test]
  fn test_memory_fail_writes() {
    let storage = MemoryStorage::new();
    storage.set_fail_writes(true);
    assert!(storage.put("b", &request("/"), &Response::new(200, "")).is_err());
    storage.set_fail_writes(false);
    assert!(storage.put("b", &request("/"), &Response::new(200, "")).is_ok());
  }

  #[test]
  fn test_failed_write_leaves_bucket_untouched() {
    let storage = MemoryStorage::new();
    storage.put("b", &request("/"), &Response::new(200, "first")).unwrap();
    storage.set_fail_writes(true);

    assert!(storage.put("b", &request("/"), &Response::new(200, "second")).is_err());
    let hit = storage.get("b", &request("/")).unwrap().unwrap();
    assert_eq!(hit.response.body, b"first");
  }
}
