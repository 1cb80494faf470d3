//! Fakes shared by the unit tests.

use async_trait::async_trait;
use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;
use url::Url;

use crate::config::Config;
use crate::host::{Host, Notification, WindowClient};
use crate::http::{Request, Response};
use crate::network::Network;

pub const ORIGIN: &str = "https://app.test";

pub fn url(path: &str) -> Url {
  Url::parse(ORIGIN).unwrap().join(path).unwrap()
}

pub fn test_config() -> Config {
  let mut config = Config {
    origin: ORIGIN.to_string(),
    ..Config::default()
  };
  config.cache.version = "v-test".to_string();
  config
}

pub fn config_for_version(version: &str, precache: &[&str]) -> Config {
  let mut config = test_config();
  config.cache.version = version.to_string();
  config.precache = precache.iter().map(|p| p.to_string()).collect();
  config
}

/// Network that answers from a fixed table. Unknown URLs get a 404.
#[derive(Default)]
pub struct ScriptedNetwork {
  routes: Mutex<HashMap<String, Response>>,
  failing: Mutex<HashSet<String>>,
  offline: AtomicBool,
  gates: Mutex<HashMap<String, Arc<Notify>>>,
  calls: Mutex<Vec<String>>,
}

impl ScriptedNetwork {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn respond(&self, url: &str, response: Response) {
    self.failing.lock().unwrap().remove(url);
    self.routes.lock().unwrap().insert(url.to_string(), response);
  }

  /// Make requests to `url` fail as if the connection dropped.
  pub fn fail(&self, url: &str) {
    self.failing.lock().unwrap().insert(url.to_string());
  }

  /// Hold requests to `url` until the returned gate is notified.
  pub fn gate(&self, url: &str) -> Arc<Notify> {
    let gate = Arc::new(Notify::new());
    self
      .gates
      .lock()
      .unwrap()
      .insert(url.to_string(), gate.clone());
    gate
  }

  pub fn set_offline(&self, offline: bool) {
    self.offline.store(offline, Ordering::SeqCst);
  }

  pub fn calls(&self) -> Vec<String> {
    self.calls.lock().unwrap().clone()
  }

  pub fn calls_to(&self, url: &str) -> usize {
    self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
  }
}

#[async_trait]
impl Network for ScriptedNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response> {
    let url = request.url.to_string();
    self.calls.lock().unwrap().push(url.clone());

    let gate = self.gates.lock().unwrap().get(&url).cloned();
    if let Some(gate) = gate {
      gate.notified().await;
    }

    if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
      return Err(eyre!("network unreachable: {}", url));
    }

    Ok(
      self
        .routes
        .lock()
        .unwrap()
        .get(&url)
        .cloned()
        .unwrap_or_else(|| Response::new(404, "not found")),
    )
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
  SkipWaiting,
  ClaimClients,
  Focus(String),
  OpenWindow(String),
  ShowNotification(String),
  CloseNotification(String),
}

/// Host that records every request made of it.
pub struct RecordingHost {
  calls: Mutex<Vec<HostCall>>,
  shown: Mutex<Vec<Notification>>,
  windows: Mutex<Vec<WindowClient>>,
  notifications_supported: AtomicBool,
  fail_claim: AtomicBool,
}

impl RecordingHost {
  pub fn new() -> Self {
    Self {
      calls: Mutex::new(Vec::new()),
      shown: Mutex::new(Vec::new()),
      windows: Mutex::new(Vec::new()),
      notifications_supported: AtomicBool::new(true),
      fail_claim: AtomicBool::new(false),
    }
  }

  pub fn calls(&self) -> Vec<HostCall> {
    self.calls.lock().unwrap().clone()
  }

  pub fn notifications(&self) -> Vec<Notification> {
    self.shown.lock().unwrap().clone()
  }

  pub fn add_window(&self, id: &str, url: Url) {
    self.windows.lock().unwrap().push(WindowClient {
      id: id.to_string(),
      url,
    });
  }

  pub fn set_notifications_supported(&self, supported: bool) {
    self.notifications_supported.store(supported, Ordering::SeqCst);
  }

  pub fn fail_claim(&self, fail: bool) {
    self.fail_claim.store(fail, Ordering::SeqCst);
  }

  fn record(&self, call: HostCall) {
    self.calls.lock().unwrap().push(call);
  }
}

#[async_trait]
impl Host for RecordingHost {
  async fn skip_waiting(&self) -> Result<()> {
    self.record(HostCall::SkipWaiting);
    Ok(())
  }

  async fn claim_clients(&self) -> Result<()> {
    if self.fail_claim.load(Ordering::SeqCst) {
      return Err(eyre!("claim failed"));
    }
    self.record(HostCall::ClaimClients);
    Ok(())
  }

  async fn match_windows(&self) -> Result<Vec<WindowClient>> {
    Ok(self.windows.lock().unwrap().clone())
  }

  async fn focus(&self, client_id: &str) -> Result<()> {
    self.record(HostCall::Focus(client_id.to_string()));
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    self.record(HostCall::OpenWindow(url.to_string()));
    Ok(())
  }

  fn supports_notifications(&self) -> bool {
    self.notifications_supported.load(Ordering::SeqCst)
  }

  async fn show_notification(&self, notification: Notification) -> Result<()> {
    self.record(HostCall::ShowNotification(notification.body.clone()));
    self.shown.lock().unwrap().push(notification);
    Ok(())
  }

  async fn close_notification(&self, tag: &str) -> Result<()> {
    self.record(HostCall::CloseNotification(tag.to_string()));
    Ok(())
  }
}
