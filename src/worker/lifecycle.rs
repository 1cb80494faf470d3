//! Install and activate: populating this version's buckets and retiring older ones.

use color_eyre::{eyre::eyre, Result};
use futures::future::try_join_all;
use std::sync::atomic::Ordering;
use tracing::{error, info, warn};

use super::Worker;
use crate::cache::CacheStorage;
use crate::http::Request;

/// Where a worker is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  /// Constructed, install not started
  Parsed,
  Installing,
  /// Static bucket populated; waiting to be activated
  Installed,
  Activating,
  /// Serving requests
  Activated,
  /// Install failed or superseded by a newer version
  Redundant,
}

impl<S: CacheStorage> Worker<S> {
  /// Fetch every manifest asset and store them in the static bucket.
  ///
  /// All-or-nothing: one failed or non-ok fetch aborts the install, nothing is
  /// stored, and the worker becomes redundant. On success the worker asks the
  /// host to skip waiting.
  pub async fn install(&self) -> Result<()> {
    self.transition(WorkerState::Parsed, WorkerState::Installing)?;
    info!(version = self.version(), "Installing");

    match self.precache().await {
      Ok(count) => {
        self.set_state(WorkerState::Installed);
        info!(version = self.version(), count, "Cached static assets");
        self.skip_waiting().await;
        Ok(())
      }
      Err(e) => {
        self.set_state(WorkerState::Redundant);
        error!(version = self.version(), "Error during install: {}", e);
        Err(e)
      }
    }
  }

  async fn precache(&self) -> Result<usize> {
    let fetches = self.manifest.iter().map(|url| async move {
      let request = Request::get(url.clone());
      let response = self.network.fetch(&request).await?;
      if !response.is_ok() {
        return Err(eyre!(
          "Precache of {} failed with status {}",
          url,
          response.status
        ));
      }
      Ok((request, response))
    });

    let entries = try_join_all(fetches).await?;
    self
      .cache
      .storage()
      .put_all(self.buckets().static_name(), &entries)?;

    Ok(entries.len())
  }

  /// Delete every bucket this version does not recognize, then claim all clients.
  pub async fn activate(&self) -> Result<()> {
    self.transition(WorkerState::Installed, WorkerState::Activating)?;
    info!(version = self.version(), "Activating");

    let removed = match self.purge_stale() {
      Ok(removed) => removed,
      Err(e) => {
        self.set_state(WorkerState::Installed);
        return Err(e);
      }
    };

    if let Err(e) = self.host.claim_clients().await {
      self.set_state(WorkerState::Installed);
      return Err(e);
    }

    self.set_state(WorkerState::Activated);
    info!(
      version = self.version(),
      removed = removed.len(),
      "Activated"
    );
    Ok(())
  }

  fn purge_stale(&self) -> Result<Vec<String>> {
    let storage = self.cache.storage();
    let mut removed = Vec::new();

    for name in storage.bucket_names()? {
      if self.buckets().is_current(&name) {
        continue;
      }
      info!(bucket = %name, "Deleting old cache");
      storage.delete_bucket(&name)?;
      removed.push(name);
    }

    Ok(removed)
  }

  /// Pick up a version installed by an earlier process.
  ///
  /// Returns `false` (and leaves the worker untouched) when this version's
  /// static bucket does not exist, i.e. it was never installed.
  pub fn restore(&self) -> Result<bool> {
    if !self
      .cache
      .storage()
      .has_bucket(self.buckets().static_name())?
    {
      return Ok(false);
    }

    self.transition(WorkerState::Parsed, WorkerState::Installed)?;
    info!(version = self.version(), "Restored installed version");
    Ok(true)
  }

  /// Ask to be activated without waiting for existing pages to close.
  pub async fn skip_waiting(&self) {
    self.skip_requested.store(true, Ordering::SeqCst);
    if let Err(e) = self.host.skip_waiting().await {
      warn!(version = self.version(), "Host rejected skip-waiting: {}", e);
    }
  }

  pub fn wants_skip_waiting(&self) -> bool {
    self.skip_requested.load(Ordering::SeqCst)
  }

  /// Retire this worker after a newer version took over.
  pub fn mark_redundant(&self) {
    self.set_state(WorkerState::Redundant);
  }
}
