use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use offline_dispatch::config::Config;
use offline_dispatch::connectivity::ManualSignal;
use offline_dispatch::{Dispatcher, Method, RequestOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "offline-dispatch")]
#[command(about = "Offline-first API client with a durable request queue and response cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/offline-dispatch/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Behave as if there were no network connection
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// Send one request through the dispatcher
  Request {
    /// GET, POST, PUT, PATCH or DELETE
    method: Method,
    /// Endpoint relative to api.base_url (e.g. /items)
    endpoint: String,
    /// JSON request body
    #[arg(short, long)]
    body: Option<String>,
  },
  /// List queued mutations
  Queue,
  /// Replay queued mutations against the API
  Sync,
  /// Show the cached response for an endpoint
  Cache { endpoint: String },
  /// Delete cached responses older than cache.max_age_secs
  Purge,
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();
  let _log_guard = init_logging()?;

  let config = Config::load(args.config.as_deref())?;
  let signal = Arc::new(ManualSignal::new(!args.offline));
  let dispatcher = Dispatcher::from_config(&config, signal)?;

  match args.command {
    Command::Request {
      method,
      endpoint,
      body,
    } => {
      let mut options = RequestOptions::new(method);
      if let Some(body) = body {
        let body = serde_json::from_str(&body).map_err(|e| eyre!("Invalid JSON body: {}", e))?;
        options = options.with_body(body);
      }

      let response = dispatcher.request(&endpoint, options).await?;
      dispatcher.settle().await;

      println!(
        "{} {} ({:?})",
        response.status, response.status_text, response.source
      );
      match response.json::<serde_json::Value>() {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{}", response.text()),
      }
    }
    Command::Queue => {
      let pending = dispatcher.queue().pending()?;
      if pending.is_empty() {
        println!("Queue is empty");
      }
      for request in pending {
        println!(
          "#{} {} {} retries={} queued={}",
          request.id, request.method, request.endpoint, request.retry_count, request.created_at
        );
        println!("  {}", request.body);
      }
    }
    Command::Sync => {
      let report = dispatcher.replayer().replay().await?;
      println!(
        "replayed={} failed={} remaining={}",
        report.replayed, report.failed, report.remaining
      );
    }
    Command::Cache { endpoint } => {
      let url = dispatcher.preparer().resolve(&endpoint)?;
      match dispatcher.cache().get(url.as_str())? {
        Some(entry) => {
          println!("{} (cached {})", entry.key, entry.cached_at);
          println!("{}", serde_json::to_string_pretty(&entry.data)?);
        }
        None => println!("Nothing cached for {}", url),
      }
    }
    Command::Purge => {
      if config.cache.max_age().is_none() {
        return Err(eyre!("cache.max_age_secs is not set; cached responses never expire"));
      }
      let removed = dispatcher.cache().purge_expired()?;
      println!("Removed {} expired responses", removed);
    }
  }

  Ok(())
}

/// Log to a daily file under the data directory; stdout is for command output.
fn init_logging() -> Result<WorkerGuard> {
  let log_dir = dirs::data_dir()
    .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
    .ok_or_else(|| eyre!("Could not determine data directory"))?
    .join("offline-dispatch")
    .join("logs");
  std::fs::create_dir_all(&log_dir)
    .map_err(|e| eyre!("Failed to create log directory: {}", e))?;

  let appender = tracing_appender::rolling::daily(&log_dir, "offline-dispatch.log");
  let (writer, guard) = tracing_appender::non_blocking(appender);

  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("offline_dispatch=info")),
    )
    .with_writer(writer)
    .with_ansi(false)
    .init();

  Ok(guard)
}
