//! Core traits and records for the local store.

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::http::Method;

/// A cached GET response body.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
  /// Full resolved request URL
  pub key: String,
  /// The response payload as returned by the server
  pub data: Value,
  /// When the payload was stored
  pub cached_at: DateTime<Utc>,
}

/// A mutation waiting to be replayed against the remote API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedRequest {
  /// Store-assigned, strictly increasing
  pub id: i64,
  /// Endpoint relative to the API base URL
  pub endpoint: String,
  pub method: Method,
  pub body: Value,
  pub created_at: DateTime<Utc>,
  pub retry_count: u32,
}

/// A mutation before the store has assigned it an id.
#[derive(Debug, Clone)]
pub struct NewQueuedRequest {
  pub endpoint: String,
  pub method: Method,
  pub body: Value,
  pub created_at: DateTime<Utc>,
}

/// Trait for local store backends.
///
/// Each call is atomic for the single record it touches. There is no
/// transaction spanning several calls.
pub trait LocalStore: Send + Sync {
  /// Insert or overwrite the cached payload for a key.
  fn put_response(&self, key: &str, data: &Value, cached_at: DateTime<Utc>) -> Result<()>;

  /// Get the cached payload for a key.
  fn get_response(&self, key: &str) -> Result<Option<CacheEntry>>;

  /// Delete cached payloads stored before the cutoff. Returns the number removed.
  fn delete_responses_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;

  /// Delete every cached payload. Returns the number removed.
  fn clear_responses(&self) -> Result<usize>;

  /// Append a mutation to the queue and return it with its assigned id.
  fn append_request(&self, request: &NewQueuedRequest) -> Result<QueuedRequest>;

  /// All queued mutations, oldest first.
  fn list_requests(&self) -> Result<Vec<QueuedRequest>>;

  /// Remove a queued mutation. Returns false if it was not present.
  fn delete_request(&self, id: i64) -> Result<bool>;

  /// Increment the retry counter of a queued mutation.
  fn increment_retry(&self, id: i64) -> Result<()>;
}
