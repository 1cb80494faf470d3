use bravo_offline::cache::{CacheStorage, SqliteStorage};
use bravo_offline::config::{Config, LogConfig};
use bravo_offline::event::EventSender;
use bravo_offline::host::ConsoleHost;
use bravo_offline::http::{Destination, Request};
use bravo_offline::network::HttpNetwork;
use bravo_offline::registration::Registration;
use bravo_offline::worker::{ClickAction, HostMessage, NotificationClick, Worker};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use reqwest::Method;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::warn;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "bravo-offline")]
#[command(about = "Offline cache manager for the Agenda Bravo app")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/bravo-offline/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Origin the app is served from
  #[arg(short, long)]
  origin: Option<String>,

  /// Cache version to run as
  #[arg(long = "cache-version")]
  cache_version: Option<String>,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Install this version (precache the manifest) and activate it
  Install,
  /// Run a request through the cache manager
  Fetch {
    /// Path (resolved against the origin) or absolute URL
    target: String,
    /// Treat the request as a full-page navigation
    #[arg(long)]
    navigate: bool,
    #[arg(short = 'X', long, default_value = "GET")]
    method: String,
    /// Write the response body to stdout
    #[arg(long)]
    body: bool,
  },
  /// Ask the active version for its cache name
  Version,
  /// List buckets and their entries
  Buckets,
  /// Deliver a push event
  Push { payload: Option<String> },
  /// Deliver a notification click
  Click {
    /// open, dismiss, or omit for a body click
    #[arg(long)]
    action: Option<String>,
  },
  /// Post a raw JSON message, e.g. '{"type":"skip-waiting"}'
  Message { json: String },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  // Load configuration
  let mut config = Config::load(args.config.as_deref())?;
  if let Some(origin) = args.origin {
    config.origin = origin;
  }
  if let Some(version) = args.cache_version {
    config.cache.version = version;
  }
  config.origin_url()?;

  let _log_guard = init_logging(&config.log)?;

  let storage = Arc::new(SqliteStorage::open(&config.cache.database_path()?)?);
  let network = Arc::new(HttpNetwork::new()?);
  let worker = Arc::new(Worker::new(
    &config,
    storage.clone(),
    network.clone(),
    Arc::new(ConsoleHost),
  )?);
  let events = EventSender::spawn(Arc::new(Registration::new(network)));

  match args.command {
    Command::Buckets => list_buckets(storage.as_ref()),
    Command::Install => {
      events.register(worker.clone()).await?;
      println!("installed {}", worker.version());
      list_buckets(storage.as_ref())
    }
    command => {
      if let Err(e) = events.resume(worker).await {
        warn!("Running without an active cache: {}", e);
      }
      run(command, &config, &events).await
    }
  }
}

async fn run(command: Command, config: &Config, events: &EventSender<SqliteStorage>) -> Result<()> {
  match command {
    Command::Fetch {
      target,
      navigate,
      method,
      body,
    } => {
      let url = config
        .origin_url()?
        .join(&target)
        .map_err(|e| eyre!("Invalid target '{}': {}", target, e))?;
      let method = Method::from_bytes(method.to_uppercase().as_bytes())
        .map_err(|e| eyre!("Invalid method '{}': {}", method, e))?;
      let destination = if navigate {
        Destination::Document
      } else {
        Destination::Other
      };

      let request = Request::get(url)
        .with_method(method)
        .with_destination(destination);
      let result = events.fetch(request).await?;

      if body {
        std::io::stdout()
          .write_all(&result.data.body)
          .map_err(|e| eyre!("Failed to write body: {}", e))?;
      } else {
        println!(
          "{} {} ({}, {} bytes)",
          result.data.status,
          result.data.status_text,
          result.source,
          result.data.body.len()
        );
      }
    }
    Command::Version => {
      let reply = events.get_version().await?;
      println!("{}", reply.version);
    }
    Command::Push { payload } => events.push(payload).await?,
    Command::Click { action } => {
      let click = NotificationClick {
        tag: config.notifications.tag.clone(),
        action: ClickAction::parse(action.as_deref()),
      };
      events.notification_click(click).await?;
    }
    Command::Message { json } => {
      let data: serde_json::Value =
        serde_json::from_str(&json).map_err(|e| eyre!("Invalid message JSON: {}", e))?;
      match HostMessage::parse(&data) {
        Some(HostMessage::GetVersion) => {
          let reply = events.get_version().await?;
          println!("{}", serde_json::to_string(&reply)?);
        }
        Some(message) => events.post_message(message, None).await?,
        None => warn!("Ignoring unknown message: {}", json),
      }
    }
    // Handled before resuming
    Command::Install | Command::Buckets => {}
  }

  Ok(())
}

fn list_buckets(storage: &dyn CacheStorage) -> Result<()> {
  for name in storage.bucket_names()? {
    let entries = storage.entries(&name)?;
    println!("{} ({} entries)", name, entries.len());
    for url in entries {
      println!("  {}", url);
    }
  }
  Ok(())
}

/// Log to stderr, and to a daily file when a log directory is configured.
fn init_logging(log: &LogConfig) -> Result<Option<WorkerGuard>> {
  let filter = EnvFilter::try_from_default_env()
    .or_else(|_| EnvFilter::try_new(&log.level))
    .map_err(|e| eyre!("Invalid log level '{}': {}", log.level, e))?;

  let stderr_layer = fmt::layer().with_writer(std::io::stderr);

  match &log.directory {
    Some(dir) => {
      let appender = tracing_appender::rolling::daily(dir, "bravo-offline.log");
      let (writer, guard) = tracing_appender::non_blocking(appender);
      tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(fmt::layer().with_ansi(false).with_writer(writer))
        .init();
      Ok(Some(guard))
    }
    None => {
      tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .init();
      Ok(None)
    }
  }
}
