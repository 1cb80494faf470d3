//! Event delivery from the host environment to the cache manager.
//!
//! Each event carries a completion channel; the sender awaits it the way a host
//! keeps an event pending until the manager's work is done. Lifecycle events
//! (register, resume, `skip-waiting`) go to a second loop that handles them one
//! at a time, in arrival order. Everything else runs on its own task, so page
//! traffic keeps flowing while a new version installs.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::cache::{CacheResult, CacheStorage};
use crate::http::{Request, Response};
use crate::registration::Registration;
use crate::worker::{HostMessage, NotificationClick, VersionReply, Worker};

type Done<T> = oneshot::Sender<Result<T>>;

/// Events delivered to the cache manager
pub enum Event<S: CacheStorage> {
  /// Install a new version, then activate it when allowed
  Register { worker: Arc<Worker<S>>, done: Done<()> },
  /// Start a version that may already be installed
  Resume { worker: Arc<Worker<S>>, done: Done<()> },
  /// A page request
  Fetch {
    request: Request,
    done: Done<CacheResult<Response>>,
  },
  /// A posted page message; `get-version` answers on `reply`
  Message {
    message: HostMessage,
    reply: Option<oneshot::Sender<VersionReply>>,
    done: Done<()>,
  },
  Push { payload: Option<String>, done: Done<()> },
  NotificationClick { click: NotificationClick, done: Done<()> },
  Sync { tag: String, done: Done<()> },
}

impl<S: CacheStorage> Event<S> {
  /// Events that change which version is installed or active.
  fn is_lifecycle(&self) -> bool {
    matches!(
      self,
      Event::Register { .. }
        | Event::Resume { .. }
        | Event::Message {
          message: HostMessage::SkipWaiting,
          ..
        }
    )
  }
}

/// Sends events to a dispatch loop running on its own task.
pub struct EventSender<S: CacheStorage> {
  tx: mpsc::UnboundedSender<Event<S>>,
}

impl<S: CacheStorage> Clone for EventSender<S> {
  fn clone(&self) -> Self {
    Self {
      tx: self.tx.clone(),
    }
  }
}

impl<S: CacheStorage + 'static> EventSender<S> {
  /// Spawn the dispatch loop for `registration`.
  pub fn spawn(registration: Arc<Registration<S>>) -> Self {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event<S>>();
    let (lifecycle_tx, mut lifecycle_rx) = mpsc::unbounded_channel::<Event<S>>();

    let lifecycle_registration = Arc::clone(&registration);
    tokio::spawn(async move {
      while let Some(event) = lifecycle_rx.recv().await {
        dispatch(&lifecycle_registration, event).await;
      }
      debug!("lifecycle loop stopped");
    });

    tokio::spawn(async move {
      while let Some(event) = rx.recv().await {
        if event.is_lifecycle() {
          if lifecycle_tx.send(event).is_err() {
            debug!("lifecycle loop gone, dropping event");
          }
          continue;
        }

        let registration = Arc::clone(&registration);
        tokio::spawn(async move {
          dispatch(&registration, event).await;
        });
      }
      debug!("event loop stopped");
    });

    Self { tx }
  }

  fn send(&self, event: Event<S>) -> Result<()> {
    self
      .tx
      .send(event)
      .map_err(|_| eyre!("Event loop is not running"))
  }

  async fn request<T>(&self, make: impl FnOnce(Done<T>) -> Event<S>) -> Result<T> {
    let (done, rx) = oneshot::channel();
    self.send(make(done))?;
    rx.await
      .map_err(|_| eyre!("Event dropped before completion"))?
  }

  pub async fn register(&self, worker: Arc<Worker<S>>) -> Result<()> {
    self.request(|done| Event::Register { worker, done }).await
  }

  pub async fn resume(&self, worker: Arc<Worker<S>>) -> Result<()> {
    self.request(|done| Event::Resume { worker, done }).await
  }

  pub async fn fetch(&self, request: Request) -> Result<CacheResult<Response>> {
    self.request(|done| Event::Fetch { request, done }).await
  }

  /// Post a message and wait until it is handled.
  pub async fn post_message(
    &self,
    message: HostMessage,
    reply: Option<oneshot::Sender<VersionReply>>,
  ) -> Result<()> {
    self
      .request(|done| Event::Message {
        message,
        reply,
        done,
      })
      .await
  }

  /// Ask for the current version over a fresh reply port.
  pub async fn get_version(&self) -> Result<VersionReply> {
    let (reply, rx) = oneshot::channel();
    self.post_message(HostMessage::GetVersion, Some(reply)).await?;
    rx.await
      .map_err(|_| eyre!("Worker did not reply to get-version"))
  }

  pub async fn push(&self, payload: Option<String>) -> Result<()> {
    self.request(|done| Event::Push { payload, done }).await
  }

  pub async fn notification_click(&self, click: NotificationClick) -> Result<()> {
    self
      .request(|done| Event::NotificationClick { click, done })
      .await
  }

  pub async fn sync(&self, tag: String) -> Result<()> {
    self.request(|done| Event::Sync { tag, done }).await
  }
}

async fn dispatch<S: CacheStorage>(registration: &Registration<S>, event: Event<S>) {
  match event {
    Event::Register { worker, done } => {
      let _ = done.send(registration.register(worker).await);
    }
    Event::Resume { worker, done } => {
      let _ = done.send(registration.resume(worker).await);
    }
    Event::Message {
      message,
      reply,
      done,
    } => {
      let _ = done.send(registration.post_message(message, reply).await);
    }
    Event::Fetch { request, done } => {
      let _ = done.send(registration.fetch(&request).await);
    }
    Event::Push { payload, done } => {
      let _ = done.send(registration.push(payload.as_deref()).await);
    }
    Event::NotificationClick { click, done } => {
      let _ = done.send(registration.notification_click(&click).await);
    }
    Event::Sync { tag, done } => {
      let _ = done.send(registration.sync(&tag).await);
    }
  }
}
