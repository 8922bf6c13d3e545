//! Optimistic patching of cached lists for queued mutations.
//!
//! The patch is speculative. Multiple queued mutations on the same entity are
//! applied in the order they were queued with no causal tracking, and a replay
//! that later fails does not roll the patch back.

use color_eyre::Result;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{debug, warn};

use super::routes::RouteTable;
use crate::http::Method;
use crate::store::{LocalStore, QueuedRequest};
use crate::transport::RequestPreparer;

/// Prefix of client-side ids given to items created while offline.
pub const TEMP_ID_PREFIX: &str = "temp_";

/// Applies queued mutations to cached list responses so readers see them
/// before the server does.
pub struct OptimisticPatcher<S: LocalStore> {
  store: Arc<S>,
  routes: Arc<RouteTable>,
  preparer: RequestPreparer,
}

impl<S: LocalStore> OptimisticPatcher<S> {
  pub fn new(store: Arc<S>, routes: Arc<RouteTable>, preparer: RequestPreparer) -> Self {
    Self {
      store,
      routes,
      preparer,
    }
  }

  /// Patch every affected cache entry. Never fails; returns how many entries
  /// were rewritten.
  pub fn apply(&self, request: &QueuedRequest) -> usize {
    match self.try_apply(request) {
      Ok(patched) => patched,
      Err(e) => {
        warn!(
          id = request.id,
          endpoint = %request.endpoint,
          error = %e,
          "Optimistic cache update failed"
        );
        0
      }
    }
  }

  fn try_apply(&self, request: &QueuedRequest) -> Result<usize> {
    let route = self.routes.resolve(&request.endpoint);

    match request.method {
      Method::Post => {
        let collections = match route {
          Some(m) => m.collections,
          None => vec![request.endpoint.clone()],
        };
        let item = offline_item(request);
        self.patch_each(&collections, |list| {
          list.push(item.clone());
          true
        })
      }
      Method::Patch | Method::Put => {
        let Some((collections, id)) = route.and_then(|m| m.item_id.map(|id| (m.collections, id)))
        else {
          debug!(endpoint = %request.endpoint, "No declared route for update, cache left as is");
          return Ok(0);
        };
        self.patch_each(&collections, |list| {
          match list.iter_mut().find(|item| id_matches(item, &id)) {
            Some(item) => shallow_merge(item, &request.body),
            None => false,
          }
        })
      }
      Method::Get | Method::Delete => Ok(0),
    }
  }

  fn patch_each<F>(&self, collections: &[String], mut edit: F) -> Result<usize>
  where
    F: FnMut(&mut Vec<Value>) -> bool,
  {
    let mut patched = 0;
    for collection in collections {
      let key = match self.preparer.resolve(collection) {
        Ok(url) => url.to_string(),
        Err(e) => {
          warn!(collection = %collection, error = %e, "Skipping unresolvable collection");
          continue;
        }
      };

      let Some(mut entry) = self.store.get_response(&key)? else {
        debug!(key = %key, "Nothing cached to patch");
        continue;
      };
      let Some(list) = list_mut(&mut entry.data) else {
        debug!(key = %key, "Cached payload is not a list");
        continue;
      };

      if edit(list) {
        // Keep the original timestamp so the patch does not extend the entry's age
        self.store.put_response(&key, &entry.data, entry.cached_at)?;
        patched += 1;
      }
    }
    Ok(patched)
  }
}

/// The list inside a cached payload: a bare array or an envelope's `data` array.
fn list_mut(data: &mut Value) -> Option<&mut Vec<Value>> {
  match data {
    Value::Array(list) => Some(list),
    Value::Object(map) => map.get_mut("data").and_then(Value::as_array_mut),
    _ => None,
  }
}

fn offline_item(request: &QueuedRequest) -> Value {
  let mut item = match &request.body {
    Value::Object(map) => map.clone(),
    _ => Map::new(),
  };
  item.insert(
    "id".to_string(),
    Value::String(format!(
      "{}{}",
      TEMP_ID_PREFIX,
      request.created_at.timestamp_millis()
    )),
  );
  item.insert("offline".to_string(), Value::Bool(true));
  Value::Object(item)
}

/// Loose id comparison: `5` matches `"5"`.
fn id_matches(item: &Value, id: &str) -> bool {
  match item.get("id") {
    Some(Value::String(s)) => s == id,
    Some(Value::Number(n)) => n.to_string() == id,
    _ => false,
  }
}

fn shallow_merge(item: &mut Value, body: &Value) -> bool {
  match (item, body) {
    (Value::Object(target), Value::Object(changes)) => {
      for (k, v) in changes {
        target.insert(k.clone(), v.clone());
      }
      true
    }
    _ => false,
  }
}
