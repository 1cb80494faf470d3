//! What the cache manager needs from the environment it runs in.

use async_trait::async_trait;
use color_eyre::Result;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;

/// An open application window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
  pub id: String,
  pub url: Url,
}

/// A user action offered on a notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationAction {
  pub action: String,
  pub title: String,
  pub icon: String,
}

/// A notification ready to be displayed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
  pub title: String,
  pub body: String,
  pub icon: String,
  pub badge: String,
  pub vibrate: Vec<u32>,
  pub tag: String,
  pub actions: Vec<NotificationAction>,
}

/// Host environment of a cache manager.
///
/// Every method is a request to the host; the manager awaits each one so the
/// triggering event stays pending until the host has done its part.
#[async_trait]
pub trait Host: Send + Sync {
  /// The installed version wants to take over without waiting for pages to close.
  async fn skip_waiting(&self) -> Result<()>;

  /// Route every open page through the calling version from now on.
  async fn claim_clients(&self) -> Result<()>;

  async fn match_windows(&self) -> Result<Vec<WindowClient>>;

  async fn focus(&self, client_id: &str) -> Result<()>;

  async fn open_window(&self, url: &Url) -> Result<()>;

  /// Whether push/notification events can be delivered at all.
  fn supports_notifications(&self) -> bool;

  async fn show_notification(&self, notification: Notification) -> Result<()>;

  async fn close_notification(&self, tag: &str) -> Result<()>;
}

/// Host for the command-line driver: no windows, notifications go to stdout.
#[derive(Debug, Default, Clone)]
pub struct ConsoleHost;

#[async_trait]
impl Host for ConsoleHost {
  async fn skip_waiting(&self) -> Result<()> {
    debug!("skip-waiting requested");
    Ok(())
  }

  async fn claim_clients(&self) -> Result<()> {
    debug!("claiming clients");
    Ok(())
  }

  async fn match_windows(&self) -> Result<Vec<WindowClient>> {
    Ok(Vec::new())
  }

  async fn focus(&self, client_id: &str) -> Result<()> {
    println!("focus window {}", client_id);
    Ok(())
  }

  async fn open_window(&self, url: &Url) -> Result<()> {
    info!(%url, "opening window");
    println!("open window {}", url);
    Ok(())
  }

  fn supports_notifications(&self) -> bool {
    true
  }

  async fn show_notification(&self, notification: Notification) -> Result<()> {
    println!("[{}] {}", notification.title, notification.body);
    for action in &notification.actions {
      println!("  ({}) {}", action.action, action.title);
    }
    Ok(())
  }

  async fn close_notification(&self, tag: &str) -> Result<()> {
    debug!(tag, "closing notification");
    Ok(())
  }
}
