//! Response cache keyed by resolved request URL.

use chrono::{Duration, Utc};
use color_eyre::Result;
use serde_json::Value;
use std::sync::Arc;

use crate::store::{CacheEntry, LocalStore};

/// Cache of successful GET responses, used to serve reads while offline.
///
/// Entries never expire unless a maximum age is set. With a maximum age,
/// older entries are treated as missing and can be purged.
pub struct ResponseCache<S: LocalStore> {
  store: Arc<S>,
  max_age: Option<Duration>,
}

impl<S: LocalStore> ResponseCache<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self {
      store,
      max_age: None,
    }
  }

  /// Set the maximum age for cached responses.
  pub fn with_max_age(mut self, max_age: Option<Duration>) -> Self {
    self.max_age = max_age;
    self
  }

  fn is_expired(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    match self.max_age {
      Some(max_age) => Utc::now() - cached_at > max_age,
      None => false,
    }
  }

  /// Insert or overwrite the payload for a key.
  pub fn put(&self, key: &str, data: &Value) -> Result<()> {
    self.store.put_response(key, data, Utc::now())
  }

  /// Get the payload for a key, if present and not expired.
  pub fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
    Ok(
      self
        .store
        .get_response(key)?
        .filter(|entry| !self.is_expired(entry.cached_at)),
    )
  }

  /// Delete entries older than the maximum age. No-op without one.
  pub fn purge_expired(&self) -> Result<usize> {
    match self.max_age {
      Some(max_age) => self.store.delete_responses_before(Utc::now() - max_age),
      None => Ok(0),
    }
  }

  pub fn clear(&self) -> Result<usize> {
    self.store.clear_responses()
  }
}

impl<S: LocalStore> Clone for ResponseCache<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      max_age: self.max_age,
    }
  }
}
