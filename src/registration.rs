//! Host-side scheduling of worker versions.
//!
//! A [`Registration`] owns at most one active and one waiting worker. It runs
//! install strictly before activate, keeps the previous version serving while a
//! new one installs (and after that install fails), and never lets activation
//! overlap in-flight interceptions. Lifecycle operations run one at a time;
//! fetches never wait on them.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::{CacheResult, CacheStorage};
use crate::http::{Request, Response};
use crate::network::Network;
use crate::worker::{HostMessage, NotificationClick, ReplyPort, Worker};

pub struct Registration<S: CacheStorage> {
  active: RwLock<Option<Arc<Worker<S>>>>,
  waiting: Mutex<Option<Arc<Worker<S>>>>,
  /// Held for the whole of register, resume and skip-waiting
  lifecycle: Mutex<()>,
  network: Arc<dyn Network>,
}

impl<S: CacheStorage> Registration<S> {
  /// `network` serves every request no active worker intercepts.
  pub fn new(network: Arc<dyn Network>) -> Self {
    Self {
      active: RwLock::new(None),
      waiting: Mutex::new(None),
      lifecycle: Mutex::new(()),
      network,
    }
  }

  /// Install a new version and activate it when allowed.
  ///
  /// The worker activates right away if it asked to skip waiting or nothing is
  /// active yet; otherwise it waits for a `skip-waiting` message.
  pub async fn register(&self, worker: Arc<Worker<S>>) -> Result<()> {
    let _lifecycle = self.lifecycle.lock().await;
    self.install_and_promote(worker).await
  }

  /// Start a worker whose version may already be installed from an earlier run.
  pub async fn resume(&self, worker: Arc<Worker<S>>) -> Result<()> {
    let _lifecycle = self.lifecycle.lock().await;
    if worker.restore()? {
      self.set_waiting(worker).await;
      self.promote_waiting().await
    } else {
      self.install_and_promote(worker).await
    }
  }

  async fn install_and_promote(&self, worker: Arc<Worker<S>>) -> Result<()> {
    if let Err(e) = worker.install().await {
      match self.active_version().await {
        Some(active) => warn!(
          failed = worker.version(),
          active = %active,
          "Install failed, previous version keeps serving"
        ),
        None => warn!(failed = worker.version(), "Install failed, nothing active"),
      }
      return Err(e);
    }

    self.set_waiting(worker.clone()).await;

    let nothing_active = self.active.read().await.is_none();
    if worker.wants_skip_waiting() || nothing_active {
      self.promote_waiting().await?;
    }
    Ok(())
  }

  async fn set_waiting(&self, worker: Arc<Worker<S>>) {
    let mut waiting = self.waiting.lock().await;
    if let Some(previous) = waiting.replace(worker) {
      // A newer install supersedes a version that never got to activate
      previous.mark_redundant();
    }
  }

  /// Activate the waiting worker, if any.
  ///
  /// Holding the write side of `active` waits out every interception still
  /// running against the previous version.
  async fn promote_waiting(&self) -> Result<()> {
    let Some(worker) = self.waiting.lock().await.take() else {
      return Ok(());
    };

    let mut active = self.active.write().await;
    if let Err(e) = worker.activate().await {
      // Put it back so a later skip-waiting can retry
      *self.waiting.lock().await = Some(worker);
      return Err(e);
    }

    info!(version = worker.version(), "Now serving");
    if let Some(previous) = active.replace(worker) {
      previous.mark_redundant();
    }
    Ok(())
  }

  pub async fn active_version(&self) -> Option<String> {
    self
      .active
      .read()
      .await
      .as_ref()
      .map(|w| w.version().to_string())
  }

  pub async fn waiting_version(&self) -> Option<String> {
    self
      .waiting
      .lock()
      .await
      .as_ref()
      .map(|w| w.version().to_string())
  }

  async fn active_worker(&self) -> Option<Arc<Worker<S>>> {
    self.active.read().await.clone()
  }

  /// Serve a request from a page.
  ///
  /// The active worker handles what it intercepts; everything else goes
  /// straight to the network.
  pub async fn fetch(&self, request: &Request) -> Result<CacheResult<Response>> {
    {
      let active = self.active.read().await;
      if let Some(worker) = active.as_ref() {
        if let Some(result) = worker.handle_fetch(request).await {
          return Ok(result);
        }
      }
    }

    let response = self.network.fetch(request).await?;
    Ok(CacheResult::from_network(response))
  }

  /// Deliver a page message.
  ///
  /// `skip-waiting` goes to the waiting worker (and promotes it);
  /// `get-version` is answered by the active worker, or the waiting one if
  /// nothing is active yet.
  pub async fn post_message(&self, message: HostMessage, reply: Option<ReplyPort>) -> Result<()> {
    match message {
      HostMessage::SkipWaiting => {
        let _lifecycle = self.lifecycle.lock().await;
        let waiting = self.waiting.lock().await.clone();
        match waiting {
          Some(worker) => {
            worker.handle_message(message, reply).await;
            self.promote_waiting().await
          }
          None => match self.active_worker().await {
            Some(worker) => {
              worker.handle_message(message, reply).await;
              Ok(())
            }
            None => Err(eyre!("No worker registered")),
          },
        }
      }
      HostMessage::GetVersion => {
        let target = match self.active_worker().await {
          Some(worker) => Some(worker),
          None => self.waiting.lock().await.clone(),
        };
        let worker = target.ok_or_else(|| eyre!("No worker registered"))?;
        worker.handle_message(message, reply).await;
        Ok(())
      }
    }
  }

  pub async fn push(&self, payload: Option<&str>) -> Result<()> {
    match self.active_worker().await {
      Some(worker) => worker.handle_push(payload).await,
      None => Err(eyre!("No active worker to receive push")),
    }
  }

  pub async fn notification_click(&self, click: &NotificationClick) -> Result<()> {
    match self.active_worker().await {
      Some(worker) => worker.handle_notification_click(click).await,
      None => Err(eyre!("No active worker to receive notification click")),
    }
  }

  pub async fn sync(&self, tag: &str) -> Result<()> {
    match self.active_worker().await {
      Some(worker) => {
        worker.handle_sync(tag).await;
        Ok(())
      }
      None => Err(eyre!("No active worker to receive sync")),
    }
  }
}
