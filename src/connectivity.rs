//! Connectivity detection.
//!
//! Two inputs decide whether the API is reachable: the platform signal (is a
//! network interface up at all) and the outcome of the most recent request.
//! Only the signal can short-circuit a request; the derived state is what
//! status indicators read.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Platform-level "is online" signal.
pub trait ConnectivitySignal: Send + Sync {
  fn is_online(&self) -> bool;
}

/// Signal that is flipped by hand: CLI flag, tests, or an embedding app that
/// receives OS network notifications.
#[derive(Debug)]
pub struct ManualSignal {
  online: AtomicBool,
}

impl ManualSignal {
  pub fn new(online: bool) -> Self {
    Self {
      online: AtomicBool::new(online),
    }
  }

  pub fn set(&self, online: bool) {
    self.online.store(online, Ordering::SeqCst);
  }
}

impl Default for ManualSignal {
  fn default() -> Self {
    Self::new(true)
  }
}

impl ConnectivitySignal for ManualSignal {
  fn is_online(&self) -> bool {
    self.online.load(Ordering::SeqCst)
  }
}

/// Connectivity as derived from request outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
  Online,
  Offline,
}

/// Tracks connectivity for one dispatcher.
pub struct ConnectivityMonitor {
  signal: Arc<dyn ConnectivitySignal>,
  online: AtomicBool,
}

impl ConnectivityMonitor {
  pub fn new(signal: Arc<dyn ConnectivitySignal>) -> Self {
    let online = signal.is_online();
    Self {
      signal,
      online: AtomicBool::new(online),
    }
  }

  /// Whether the platform reports any connectivity.
  pub fn signal_online(&self) -> bool {
    self.signal.is_online()
  }

  pub fn state(&self) -> ConnectivityState {
    if self.online.load(Ordering::SeqCst) {
      ConnectivityState::Online
    } else {
      ConnectivityState::Offline
    }
  }

  /// Record a response below 500. Returns true if the state changed.
  pub fn record_success(&self) -> bool {
    !self.online.swap(true, Ordering::SeqCst)
  }

  /// Record a 5xx or transport failure. Returns true if the state changed.
  pub fn record_failure(&self) -> bool {
    self.online.swap(false, Ordering::SeqCst)
  }
}
