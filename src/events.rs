//! Connectivity notifications.
//!
//! Interested parties either register a `NetworkObserver` (called inline, in
//! publish order) or subscribe to the broadcast channel and receive
//! `NetworkEvent`s on their own task.

use std::sync::{Arc, RwLock};
use tokio::sync::broadcast;

use crate::http::Method;
use crate::store::QueuedRequest;

const CHANNEL_CAPACITY: usize = 64;

/// Events published by the dispatcher and the offline queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NetworkEvent {
  /// A request reached the server
  Online,
  /// A request failed with 5xx or never reached the server
  Offline,
  /// A mutation was stored for later replay
  OfflineSaved {
    id: i64,
    method: Method,
    endpoint: String,
  },
}

/// Callbacks for connectivity changes. All methods default to no-ops.
pub trait NetworkObserver: Send + Sync {
  fn on_online(&self) {}

  fn on_offline(&self) {}

  fn on_offline_saved(&self, _request: &QueuedRequest) {}
}

/// Fan-out point for `NetworkEvent`s.
pub struct EventBus {
  tx: broadcast::Sender<NetworkEvent>,
  observers: RwLock<Vec<Arc<dyn NetworkObserver>>>,
}

impl EventBus {
  pub fn new() -> Self {
    let (tx, _rx) = broadcast::channel(CHANNEL_CAPACITY);
    Self {
      tx,
      observers: RwLock::new(Vec::new()),
    }
  }

  /// Receive every event published from now on.
  pub fn subscribe(&self) -> broadcast::Receiver<NetworkEvent> {
    self.tx.subscribe()
  }

  pub fn register(&self, observer: Arc<dyn NetworkObserver>) {
    if let Ok(mut observers) = self.observers.write() {
      observers.push(observer);
    }
  }

  pub fn online(&self) {
    self.each_observer(|o| o.on_online());
    self.send(NetworkEvent::Online);
  }

  pub fn offline(&self) {
    self.each_observer(|o| o.on_offline());
    self.send(NetworkEvent::Offline);
  }

  pub fn offline_saved(&self, request: &QueuedRequest) {
    self.each_observer(|o| o.on_offline_saved(request));
    self.send(NetworkEvent::OfflineSaved {
      id: request.id,
      method: request.method,
      endpoint: request.endpoint.clone(),
    });
  }

  fn each_observer(&self, f: impl Fn(&dyn NetworkObserver)) {
    // Snapshot so an observer may register another without deadlocking
    let observers = match self.observers.read() {
      Ok(observers) => observers.clone(),
      Err(_) => return,
    };
    for observer in &observers {
      f(observer.as_ref());
    }
  }

  fn send(&self, event: NetworkEvent) {
    // No receivers is fine
    let _ = self.tx.send(event);
  }
}

impl Default for EventBus {
  fn default() -> Self {
    Self::new()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::Utc;
  use serde_json::json;
  use std::sync::Mutex;

  #[derive(Default)]
  struct Recorder {
    calls: Mutex<Vec<String>>,
  }

  impl NetworkObserver for Recorder {
    fn on_online(&self) {
      self.calls.lock().unwrap().push("online".into());
    }

    fn on_offline(&self) {
      self.calls.lock().unwrap().push("offline".into());
    }

    fn on_offline_saved(&self, request: &QueuedRequest) {
      self
        .calls
        .lock()
        .unwrap()
        .push(format!("saved:{}", request.id));
    }
  }

  #[test]
  fn test_observers_and_subscribers_see_the_same_events() {
    let bus = EventBus::new();
    let recorder = Arc::new(Recorder::default());
    bus.register(recorder.clone());
    let mut rx = bus.subscribe();

    let request = QueuedRequest {
      id: 7,
      endpoint: "/items".into(),
      method: Method::Post,
      body: json!({}),
      created_at: Utc::now(),
      retry_count: 0,
    };
    bus.offline();
    bus.offline_saved(&request);
    bus.online();

    assert_eq!(
      *recorder.calls.lock().unwrap(),
      vec!["offline", "saved:7", "online"]
    );
    assert_eq!(rx.try_recv().unwrap(), NetworkEvent::Offline);
    assert_eq!(
      rx.try_recv().unwrap(),
      NetworkEvent::OfflineSaved {
        id: 7,
        method: Method::Post,
        endpoint: "/items".into()
      }
    );
    assert_eq!(rx.try_recv().unwrap(), NetworkEvent::Online);
  }

  #[test]
  fn test_publish_without_subscribers_does_not_panic() {
    let bus = EventBus::default();
    bus.online();
    bus.offline();
  }
}
