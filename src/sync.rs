//! Replay of queued mutations once connectivity returns.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::connectivity::ConnectivityMonitor;
use crate::events::EventBus;
use crate::http::RequestOptions;
use crate::offline::OfflineQueue;
use crate::store::LocalStore;
use crate::transport::{RequestPreparer, Transport};

/// Outcome of one replay pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplayReport {
  /// Entries confirmed by the server and removed
  pub replayed: usize,
  /// Entries that failed and stay queued with a bumped retry count
  pub failed: usize,
  /// Entries still queued after the pass
  pub remaining: usize,
}

/// Sends queued mutations to the API in FIFO order.
///
/// A 2xx removes the entry. Any other answer keeps it with its retry count
/// incremented. A 5xx or transport failure also ends the pass, so later
/// entries are never sent ahead of an earlier one that is still pending.
pub struct Replayer<S: LocalStore> {
  queue: OfflineQueue<S>,
  transport: Arc<dyn Transport>,
  preparer: RequestPreparer,
  monitor: Arc<ConnectivityMonitor>,
  events: Arc<EventBus>,
}

impl<S: LocalStore> Replayer<S> {
  pub fn new(
    queue: OfflineQueue<S>,
    transport: Arc<dyn Transport>,
    preparer: RequestPreparer,
    monitor: Arc<ConnectivityMonitor>,
    events: Arc<EventBus>,
  ) -> Self {
    Self {
      queue,
      transport,
      preparer,
      monitor,
      events,
    }
  }

  pub async fn replay(&self) -> Result<ReplayReport> {
    let mut report = ReplayReport::default();

    if !self.monitor.signal_online() {
      report.remaining = self.queue.len()?;
      return Ok(report);
    }

    for queued in self.queue.pending()? {
      let mut options = RequestOptions::new(queued.method);
      if !queued.body.is_null() {
        options = options.with_body(queued.body.clone());
      }

      let request = match self.preparer.prepare(&queued.endpoint, options) {
        Ok(request) => request,
        Err(e) => {
          warn!(id = queued.id, error = %e, "Queued request cannot be prepared");
          self.queue.record_failure(queued.id)?;
          report.failed += 1;
          continue;
        }
      };

      match self.transport.send(&request).await {
        Ok(response) if response.ok() => {
          self.queue.remove(queued.id)?;
          report.replayed += 1;
          info!(id = queued.id, method = %queued.method, endpoint = %queued.endpoint, "Replayed queued request");
          if self.monitor.record_success() {
            self.events.online();
          }
        }
        Ok(response) if !response.is_server_error() => {
          warn!(id = queued.id, status = response.status, "Server rejected queued request");
          self.queue.record_failure(queued.id)?;
          report.failed += 1;
        }
        Ok(response) => {
          warn!(id = queued.id, status = response.status, "Server unavailable, stopping replay");
          self.stop(queued.id, &mut report)?;
          break;
        }
        Err(e) => {
          warn!(id = queued.id, error = %e, "Request failed, stopping replay");
          self.stop(queued.id, &mut report)?;
          break;
        }
      }
    }

    report.remaining = self.queue.len()?;
    Ok(report)
  }

  fn stop(&self, id: i64, report: &mut ReplayReport) -> Result<()> {
    self.queue.record_failure(id)?;
    report.failed += 1;
    if self.monitor.record_failure() {
      self.events.offline();
    }
    Ok(())
  }
}
