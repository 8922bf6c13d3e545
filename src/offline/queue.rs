//! Durable FIFO of mutations made while offline.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

use super::patcher::OptimisticPatcher;
use crate::events::EventBus;
use crate::http::Method;
use crate::store::{LocalStore, NewQueuedRequest, QueuedRequest};

/// Queue of POST/PATCH requests waiting for connectivity.
///
/// Entries are never deduplicated: queuing the same payload twice replays it
/// twice.
pub struct OfflineQueue<S: LocalStore> {
  store: Arc<S>,
  patcher: Arc<OptimisticPatcher<S>>,
  events: Arc<EventBus>,
}

impl<S: LocalStore> OfflineQueue<S> {
  pub fn new(store: Arc<S>, patcher: OptimisticPatcher<S>, events: Arc<EventBus>) -> Self {
    Self {
      store,
      patcher: Arc::new(patcher),
      events,
    }
  }

  /// Persist a mutation for later replay.
  ///
  /// On success the cached lists it affects are patched and `OfflineSaved` is
  /// published. On failure nothing else happens.
  pub fn enqueue(&self, endpoint: &str, method: Method, body: Value) -> Result<QueuedRequest> {
    if !method.is_queueable() {
      return Err(eyre!("{} requests cannot be queued for offline replay", method));
    }

    let queued = self.store.append_request(&NewQueuedRequest {
      endpoint: endpoint.to_string(),
      method,
      body,
      created_at: Utc::now(),
    })?;

    info!(id = queued.id, method = %method, endpoint = %endpoint, "Queued request for offline replay");

    self.patcher.apply(&queued);
    self.events.offline_saved(&queued);

    Ok(queued)
  }

  /// Queued mutations, oldest first.
  pub fn pending(&self) -> Result<Vec<QueuedRequest>> {
    self.store.list_requests()
  }

  pub fn len(&self) -> Result<usize> {
    Ok(self.pending()?.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Drop an entry after a confirmed replay.
  pub fn remove(&self, id: i64) -> Result<bool> {
    self.store.delete_request(id)
  }

  /// Keep an entry for a later pass, counting the failed attempt.
  pub fn record_failure(&self, id: i64) -> Result<()> {
    self.store.increment_retry(id)
  }
}

impl<S: LocalStore> Clone for OfflineQueue<S> {
  fn clone(&self) -> Self {
    Self {
      store: Arc::clone(&self.store),
      patcher: Arc::clone(&self.patcher),
      events: Arc::clone(&self.events),
    }
  }
}
