//! Out-of-band input: host messages, push, notification clicks and background sync.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use super::Worker;
use crate::cache::CacheStorage;
use crate::host::{Notification, NotificationAction};

/// Tag of the background-sync event registered by the entry pages.
pub const SYNC_TAG: &str = "background-sync-registros";

/// One-shot port a `get-version` sender listens on.
pub type ReplyPort = oneshot::Sender<VersionReply>;

/// Messages a page can post to the cache manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum HostMessage {
  /// Activate the installed version without waiting for pages to close
  #[serde(rename = "skip-waiting", alias = "SKIP_WAITING")]
  SkipWaiting,
  /// Reply with the current cache name, e.g. `agenda-bravo-v1.0.0`
  #[serde(rename = "get-version", alias = "GET_VERSION")]
  GetVersion,
}

impl HostMessage {
  /// Parse a posted message; anything unrecognized is `None`.
  pub fn parse(data: &serde_json::Value) -> Option<Self> {
    serde_json::from_value(data.clone()).ok()
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VersionReply {
  pub version: String,
}

/// Which part of a notification the user clicked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickAction {
  /// The notification body
  Default,
  Open,
  Dismiss,
  Other(String),
}

impl ClickAction {
  pub fn parse(action: Option<&str>) -> Self {
    match action {
      None | Some("") => ClickAction::Default,
      Some("open") => ClickAction::Open,
      Some("dismiss") => ClickAction::Dismiss,
      Some(other) => ClickAction::Other(other.to_string()),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationClick {
  pub tag: String,
  pub action: ClickAction,
}

impl<S: CacheStorage> Worker<S> {
  /// Handle a message posted by a page.
  ///
  /// `get-version` is answered before this function first suspends.
  pub async fn handle_message(&self, message: HostMessage, reply: Option<ReplyPort>) {
    info!(?message, "received message");

    match message {
      HostMessage::SkipWaiting => self.skip_waiting().await,
      HostMessage::GetVersion => match reply {
        Some(port) => {
          let reply = VersionReply {
            version: self.buckets().umbrella_name().to_string(),
          };
          if port.send(reply).is_err() {
            debug!("get-version sender went away before the reply");
          }
        }
        None => warn!("get-version message without a reply port"),
      },
    }
  }

  /// The notification shown for a push with the given payload.
  pub fn notification_for(&self, payload: Option<&str>) -> Notification {
    let n = &self.notifications;
    let action = |id: &str, title: &str| NotificationAction {
      action: id.to_string(),
      title: title.to_string(),
      icon: n.action_icon.clone(),
    };

    Notification {
      title: n.title.clone(),
      body: payload.map_or_else(|| n.default_body.clone(), str::to_string),
      icon: n.icon.clone(),
      badge: n.badge.clone(),
      vibrate: n.vibrate.clone(),
      tag: n.tag.clone(),
      actions: vec![
        action("open", &n.open_label),
        action("dismiss", &n.dismiss_label),
      ],
    }
  }

  /// Show a notification for a push event. A no-op where notifications are unsupported.
  pub async fn handle_push(&self, payload: Option<&str>) -> Result<()> {
    if !self.host.supports_notifications() {
      debug!("notifications unsupported, ignoring push");
      return Ok(());
    }

    info!(has_payload = payload.is_some(), "Push notification received");
    self.host.show_notification(self.notification_for(payload)).await
  }

  /// Close the notification; for `open` or a body click, focus or open the app.
  pub async fn handle_notification_click(&self, click: &NotificationClick) -> Result<()> {
    info!(action = ?click.action, "Notification clicked");
    self.host.close_notification(&click.tag).await?;

    match click.action {
      ClickAction::Default | ClickAction::Open => self.focus_or_open().await,
      ClickAction::Dismiss | ClickAction::Other(_) => Ok(()),
    }
  }

  async fn focus_or_open(&self) -> Result<()> {
    let origin = self.origin.origin();
    let windows = self.host.match_windows().await?;

    if let Some(client) = windows.iter().find(|c| c.url.origin() == origin) {
      return self.host.focus(&client.id).await;
    }

    let root = self
      .origin
      .join("/")
      .map_err(|e| eyre!("Failed to resolve app root: {}", e))?;
    self.host.open_window(&root).await
  }

  /// Background sync. Entries live in local storage, so there is nothing to replay yet.
  pub async fn handle_sync(&self, tag: &str) {
    if tag == SYNC_TAG {
      info!("Syncing offline registros");
    } else {
      debug!(tag, "ignoring unknown sync tag");
    }
  }
}
