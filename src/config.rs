use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::{BucketNames, SqliteStorage};

/// Version tag baked in at build time; deployments override it in config.
pub const DEFAULT_VERSION: &str = concat!("v", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// Origin the application is served from
  pub origin: String,
  pub cache: CacheConfig,
  /// Critical assets fetched at install time (paths resolve against `origin`)
  pub precache: Vec<String>,
  /// Path prefixes served network-first
  pub dynamic_prefixes: Vec<String>,
  pub notifications: NotificationConfig,
  pub log: LogConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      origin: "http://localhost:5173".to_string(),
      cache: CacheConfig::default(),
      precache: [
        "/",
        "/index.html",
        "/manifest.json",
        "/icons/icon-192x192.png",
        "/icons/icon-512x512.png",
      ]
      .map(String::from)
      .to_vec(),
      dynamic_prefixes: [
        "/api/",
        "/login",
        "/cadastro",
        "/novo-registro",
        "/relatorios",
        "/configuracoes",
      ]
      .map(String::from)
      .to_vec(),
      notifications: NotificationConfig::default(),
      log: LogConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Common prefix of every bucket name
  pub prefix: String,
  /// Cache generation; a new value means a new deployment
  pub version: String,
  /// SQLite database location (defaults to the XDG data directory)
  pub database: Option<PathBuf>,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      prefix: "agenda-bravo".to_string(),
      version: DEFAULT_VERSION.to_string(),
      database: None,
    }
  }
}

impl CacheConfig {
  pub fn database_path(&self) -> Result<PathBuf> {
    match &self.database {
      Some(path) => Ok(path.clone()),
      None => SqliteStorage::default_path(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NotificationConfig {
  pub title: String,
  /// Body used when a push arrives without payload
  pub default_body: String,
  pub icon: String,
  pub badge: String,
  pub tag: String,
  pub vibrate: Vec<u32>,
  pub open_label: String,
  pub dismiss_label: String,
  pub action_icon: String,
}

impl Default for NotificationConfig {
  fn default() -> Self {
    Self {
      title: "Agenda Bravo".to_string(),
      default_body: "Novo registro disponível".to_string(),
      icon: "/icons/icon-192x192.png".to_string(),
      badge: "/icons/icon-72x72.png".to_string(),
      tag: "agenda-bravo-notification".to_string(),
      vibrate: vec![200, 100, 200],
      open_label: "Abrir App".to_string(),
      dismiss_label: "Dispensar".to_string(),
      action_icon: "/icons/icon-96x96.png".to_string(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// Filter directive used when RUST_LOG is unset
  pub level: String,
  /// When set, logs are also written to a daily-rolling file here
  pub directory: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      directory: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./bravo-offline.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/bravo-offline/config.yaml
  ///
  /// With no file found, the built-in defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("bravo-offline.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("bravo-offline").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    config.origin_url()?;
    Ok(config)
  }

  pub fn origin_url(&self) -> Result<Url> {
    let url =
      Url::parse(&self.origin).map_err(|e| eyre!("Invalid origin '{}': {}", self.origin, e))?;
    if !matches!(url.scheme(), "http" | "https") {
      return Err(eyre!("Origin must be http or https: {}", self.origin));
    }
    Ok(url)
  }

  /// Install manifest resolved against the origin.
  pub fn precache_urls(&self) -> Result<Vec<Url>> {
    let origin = self.origin_url()?;
    self
      .precache
      .iter()
      .map(|entry| {
        origin
          .join(entry)
          .map_err(|e| eyre!("Invalid precache entry '{}': {}", entry, e))
      })
      .collect()
  }

  pub fn bucket_names(&self) -> BucketNames {
    BucketNames::new(&self.cache.prefix, &self.cache.version)
  }
}
