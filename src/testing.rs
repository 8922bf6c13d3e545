//! Shared test doubles.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::auth::StaticToken;
use crate::connectivity::ManualSignal;
use crate::dispatcher::Dispatcher;
use crate::error::TransportError;
use crate::http::{PreparedRequest, Response};
use crate::offline::{RouteConfig, RouteTable};
use crate::store::{CacheEntry, LocalStore, NewQueuedRequest, QueuedRequest, SqliteStore};
use crate::transport::{RequestPreparer, Transport};

pub const BASE: &str = "https://api.test";

pub fn url(endpoint: &str) -> String {
  format!("{}{}", BASE, endpoint)
}

/// Transport that answers from a script and records what it was sent.
#[derive(Default)]
pub struct MockTransport {
  replies: Mutex<VecDeque<std::result::Result<Response, String>>>,
  sent: Mutex<Vec<PreparedRequest>>,
}

impl MockTransport {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn reply(self, status: u16, body: Value) -> Self {
    let response = Response::from_network(status, "", serde_json::to_vec(&body).unwrap());
    self.replies.lock().unwrap().push_back(Ok(response));
    self
  }

  pub fn reply_raw(self, status: u16, body: &[u8]) -> Self {
    let response = Response::from_network(status, "", body.to_vec());
    self.replies.lock().unwrap().push_back(Ok(response));
    self
  }

  pub fn fail(self) -> Self {
    self
      .replies
      .lock()
      .unwrap()
      .push_back(Err("connection refused".to_string()));
    self
  }

  pub fn sent(&self) -> Vec<PreparedRequest> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl Transport for MockTransport {
  async fn send(&self, request: &PreparedRequest) -> std::result::Result<Response, TransportError> {
    self.sent.lock().unwrap().push(request.clone());
    match self.replies.lock().unwrap().pop_front() {
      Some(Ok(response)) => Ok(response),
      Some(Err(message)) => Err(TransportError::other(message)),
      None => Err(TransportError::other("no scripted reply")),
    }
  }
}

/// Store whose queue writes always fail.
pub struct QueueWriteFails(pub SqliteStore);

impl LocalStore for QueueWriteFails {
  fn put_response(&self, key: &str, data: &Value, cached_at: DateTime<Utc>) -> Result<()> {
    self.0.put_response(key, data, cached_at)
  }

  fn get_response(&self, key: &str) -> Result<Option<CacheEntry>> {
    self.0.get_response(key)
  }

  fn delete_responses_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    self.0.delete_responses_before(cutoff)
  }

  fn clear_responses(&self) -> Result<usize> {
    self.0.clear_responses()
  }

  fn append_request(&self, _request: &NewQueuedRequest) -> Result<QueuedRequest> {
    Err(eyre!("database is locked"))
  }

  fn list_requests(&self) -> Result<Vec<QueuedRequest>> {
    self.0.list_requests()
  }

  fn delete_request(&self, id: i64) -> Result<bool> {
    self.0.delete_request(id)
  }

  fn increment_retry(&self, id: i64) -> Result<()> {
    self.0.increment_retry(id)
  }
}

pub fn items_routes() -> RouteTable {
  RouteTable::new(&[RouteConfig {
    pattern: "/items/{id}".into(),
    collections: vec!["/items".into()],
  }])
}

pub struct Harness<S: LocalStore + 'static> {
  pub store: Arc<S>,
  pub transport: Arc<MockTransport>,
  pub signal: Arc<ManualSignal>,
  pub dispatcher: Dispatcher<S>,
}

pub fn harness(transport: MockTransport) -> Harness<SqliteStore> {
  harness_with_store(SqliteStore::open_in_memory().unwrap(), transport)
}

pub fn harness_with_store<S: LocalStore + 'static>(store: S, transport: MockTransport) -> Harness<S> {
  let store = Arc::new(store);
  let transport = Arc::new(transport);
  let signal = Arc::new(ManualSignal::default());
  let preparer = RequestPreparer::new(BASE, Arc::new(StaticToken::new("tok"))).unwrap();
  let dispatcher = Dispatcher::builder(store.clone(), transport.clone(), preparer)
    .signal(signal.clone())
    .routes(items_routes())
    .build();

  Harness {
    store,
    transport,
    signal,
    dispatcher,
  }
}
