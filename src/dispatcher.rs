//! Network-aware request dispatcher.
//!
//! Every API call goes through `Dispatcher::request`:
//! 1. If the platform reports no connectivity, skip straight to the offline path
//! 2. Otherwise send it; anything below 500 is returned as-is and a 2xx GET
//!    body is cached in the background
//! 3. A 5xx or transport failure counts as lost connectivity and falls
//!    through to the offline path with the original request
//!
//! The offline path serves GETs from cache, queues POST/PATCH, and refuses
//! PUT/DELETE.

use chrono::Duration;
use color_eyre::eyre::eyre;
use serde::{de::DeserializeOwned, Serialize};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::auth::EnvToken;
use crate::config::Config;
use crate::connectivity::{ConnectivityMonitor, ConnectivitySignal, ManualSignal};
use crate::error::{DispatchError, Result};
use crate::events::{EventBus, NetworkEvent, NetworkObserver};
use crate::http::{Method, PreparedRequest, RequestOptions, Response, ResponseSource};
use crate::offline::{OfflineQueue, OptimisticPatcher, ResponseCache, RouteTable};
use crate::store::{LocalStore, SqliteStore};
use crate::sync::Replayer;
use crate::transport::{HttpTransport, RequestPreparer, Transport};

/// Message returned to callers when a mutation was stored for later.
pub const OFFLINE_SAVED_MESSAGE: &str = "Guardado sin conexión";

pub struct Dispatcher<S: LocalStore + 'static> {
  transport: Arc<dyn Transport>,
  preparer: RequestPreparer,
  cache: ResponseCache<S>,
  queue: OfflineQueue<S>,
  monitor: Arc<ConnectivityMonitor>,
  events: Arc<EventBus>,
  /// Cache writes still in flight
  background: Mutex<JoinSet<()>>,
}

/// Builder for `Dispatcher`. The connectivity signal defaults to always
/// online and the route table to empty.
pub struct DispatcherBuilder<S: LocalStore + 'static> {
  store: Arc<S>,
  transport: Arc<dyn Transport>,
  preparer: RequestPreparer,
  signal: Arc<dyn ConnectivitySignal>,
  routes: RouteTable,
  cache_max_age: Option<Duration>,
}

impl<S: LocalStore + 'static> DispatcherBuilder<S> {
  pub fn signal(mut self, signal: Arc<dyn ConnectivitySignal>) -> Self {
    self.signal = signal;
    self
  }

  pub fn routes(mut self, routes: RouteTable) -> Self {
    self.routes = routes;
    self
  }

  pub fn cache_max_age(mut self, max_age: Option<Duration>) -> Self {
    self.cache_max_age = max_age;
    self
  }

  pub fn build(self) -> Dispatcher<S> {
    let events = Arc::new(EventBus::new());
    let patcher = OptimisticPatcher::new(
      Arc::clone(&self.store),
      Arc::new(self.routes),
      self.preparer.clone(),
    );

    Dispatcher {
      transport: self.transport,
      preparer: self.preparer,
      cache: ResponseCache::new(Arc::clone(&self.store)).with_max_age(self.cache_max_age),
      queue: OfflineQueue::new(self.store, patcher, Arc::clone(&events)),
      monitor: Arc::new(ConnectivityMonitor::new(self.signal)),
      events,
      background: Mutex::new(JoinSet::new()),
    }
  }
}

impl Dispatcher<SqliteStore> {
  /// Dispatcher backed by SQLite and `reqwest`, configured from file.
  pub fn from_config(
    config: &Config,
    signal: Arc<dyn ConnectivitySignal>,
  ) -> color_eyre::Result<Self> {
    let store = match &config.storage.path {
      Some(path) => SqliteStore::open(path)?,
      None => SqliteStore::open_default()?,
    };
    let transport = HttpTransport::new(config.transport.timeout())
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;
    let preparer = RequestPreparer::new(&config.api.base_url, Arc::new(EnvToken::default()))
      .map_err(|e| eyre!("Invalid api.base_url: {}", e))?;

    Ok(
      Dispatcher::builder(Arc::new(store), Arc::new(transport), preparer)
        .signal(signal)
        .routes(RouteTable::new(&config.routes))
        .cache_max_age(config.cache.max_age())
        .build(),
    )
  }
}

impl<S: LocalStore + 'static> Dispatcher<S> {
  pub fn builder(
    store: Arc<S>,
    transport: Arc<dyn Transport>,
    preparer: RequestPreparer,
  ) -> DispatcherBuilder<S> {
    DispatcherBuilder {
      store,
      transport,
      preparer,
      signal: Arc::new(ManualSignal::default()),
      routes: RouteTable::default(),
      cache_max_age: None,
    }
  }

  /// Send a request, falling back to the cache or the offline queue when the
  /// API cannot be reached.
  pub async fn request(&self, endpoint: &str, options: RequestOptions) -> Result<Response> {
    let request = self.preparer.prepare(endpoint, options)?;

    if !self.monitor.signal_online() {
      debug!(method = %request.method, url = %request.url, "No connectivity, skipping network");
      if self.monitor.record_failure() {
        self.events.offline();
      }
      return self.serve_offline(request);
    }

    match self.transport.send(&request).await {
      Ok(response) if !response.is_server_error() => {
        self.monitor.record_success();
        self.events.online();

        if request.method == Method::Get && response.ok() {
          self.cache_in_background(request.cache_key(), &response);
        }
        Ok(response)
      }
      Ok(response) => {
        warn!(
          status = response.status,
          method = %request.method,
          url = %request.url,
          "Server unavailable, using offline path"
        );
        self.monitor.record_failure();
        self.events.offline();
        self.serve_offline(request)
      }
      Err(e) => {
        warn!(
          error = %e,
          method = %request.method,
          url = %request.url,
          "Request failed, using offline path"
        );
        self.monitor.record_failure();
        self.events.offline();
        self.serve_offline(request)
      }
    }
  }

  /// GET an endpoint and decode the body.
  pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
    let response = self.request(endpoint, RequestOptions::get()).await?;
    decode(response)
  }

  /// Send a typed body and decode the response.
  pub async fn send_json<B, T>(&self, method: Method, endpoint: &str, body: &B) -> Result<T>
  where
    B: Serialize,
    T: DeserializeOwned,
  {
    let options = RequestOptions::new(method).with_body(serde_json::to_value(body)?);
    let response = self.request(endpoint, options).await?;
    decode(response)
  }

  fn serve_offline(&self, request: PreparedRequest) -> Result<Response> {
    match request.method {
      Method::Get => {
        let entry = self
          .cache
          .get(request.cache_key())
          .map_err(|e| DispatchError::Storage(e.to_string()))?;

        match entry {
          Some(entry) => {
            debug!(url = %request.url, cached_at = %entry.cached_at, "Serving cached response");
            Ok(Response::synthesized(&entry.data, ResponseSource::Cache))
          }
          None => Err(DispatchError::no_cache(request.url.as_str())),
        }
      }
      Method::Post | Method::Patch => {
        let body = request.body.unwrap_or(Value::Null);
        self
          .queue
          .enqueue(&request.endpoint, request.method, body)
          .map_err(|e| DispatchError::OfflineQueueWriteFailed(e.to_string()))?;

        Ok(Response::synthesized(
          &json!({
            "success": true,
            "offline": true,
            "message": OFFLINE_SAVED_MESSAGE,
          }),
          ResponseSource::Queued,
        ))
      }
      Method::Put | Method::Delete => Err(DispatchError::connectivity_required(
        request.method,
        request.endpoint,
      )),
    }
  }

  fn cache_in_background(&self, key: &str, response: &Response) {
    let data: Value = match response.json() {
      Ok(data) => data,
      Err(e) => {
        debug!(key = %key, error = %e, "Response is not JSON, not caching");
        return;
      }
    };

    let Ok(mut tasks) = self.background.lock() else {
      return;
    };
    // Reap finished writes
    while tasks.try_join_next().is_some() {}

    let cache = self.cache.clone();
    let key = key.to_string();
    tasks.spawn_blocking(move || match cache.put(&key, &data) {
      Ok(()) => debug!(key = %key, "Cached response"),
      Err(e) => warn!(key = %key, error = %e, "Failed to cache response"),
    });
  }

  /// Wait for background cache writes started so far.
  pub async fn settle(&self) {
    let mut tasks = match self.background.lock() {
      Ok(mut guard) => std::mem::take(&mut *guard),
      Err(_) => return,
    };
    while tasks.join_next().await.is_some() {}
  }

  pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
    self.events.subscribe()
  }

  pub fn register_observer(&self, observer: Arc<dyn NetworkObserver>) {
    self.events.register(observer);
  }

  pub fn connectivity(&self) -> &ConnectivityMonitor {
    &self.monitor
  }

  pub fn queue(&self) -> &OfflineQueue<S> {
    &self.queue
  }

  pub fn cache(&self) -> &ResponseCache<S> {
    &self.cache
  }

  pub fn preparer(&self) -> &RequestPreparer {
    &self.preparer
  }

  /// Replayer for the queued mutations, sharing this dispatcher's transport
  /// and connectivity state.
  pub fn replayer(&self) -> Replayer<S> {
    Replayer::new(
      self.queue.clone(),
      Arc::clone(&self.transport),
      self.preparer.clone(),
      Arc::clone(&self.monitor),
      Arc::clone(&self.events),
    )
  }
}

fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
  if !response.ok() {
    return Err(DispatchError::Rejected {
      status: response.status,
      body: response.text(),
    });
  }
  Ok(response.json()?)
}
