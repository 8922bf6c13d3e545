//! SQLite implementation of the local store.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::traits::{CacheEntry, LocalStore, NewQueuedRequest, QueuedRequest};
use crate::http::Method;

/// SQLite-based local store.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open_default() -> Result<Self> {
    let path = Self::default_path()?;
    Self::open(&path)
  }

  /// Open or create the store at the given path.
  pub fn open(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    Self::with_connection(conn)
  }

  /// Open a throwaway store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("offline-dispatch").join("store.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
    self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))
  }
}

/// Schema for the cache and queue tables.
const STORE_SCHEMA: &str = r#"
-- Response cache: one row per resolved URL
CREATE TABLE IF NOT EXISTS response_cache (
    key_hash TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    data BLOB NOT NULL,
    cached_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_response_cache_cached_at
    ON response_cache(cached_at);

-- Offline mutation queue, replayed in id order
CREATE TABLE IF NOT EXISTS request_queue (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    endpoint TEXT NOT NULL,
    method TEXT NOT NULL,
    body BLOB NOT NULL,
    created_at TEXT NOT NULL,
    retry_count INTEGER NOT NULL DEFAULT 0
);
"#;

impl LocalStore for SqliteStore {
  fn put_response(&self, key: &str, data: &Value, cached_at: DateTime<Utc>) -> Result<()> {
    let conn = self.lock()?;
    let bytes = serde_json::to_vec(data).map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO response_cache (key_hash, url, data, cached_at)
         VALUES (?, ?, ?, ?)",
        params![key_hash(key), key, bytes, format_datetime(cached_at)],
      )
      .map_err(|e| eyre!("Failed to store cached response: {}", e))?;

    Ok(())
  }

  fn get_response(&self, key: &str) -> Result<Option<CacheEntry>> {
    let conn = self.lock()?;

    let row: Option<(Vec<u8>, String)> = conn
      .query_row(
        "SELECT data, cached_at FROM response_cache WHERE key_hash = ?",
        params![key_hash(key)],
        |row| Ok((row.get(0)?, row.get(1)?)),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read cached response: {}", e))?;

    match row {
      Some((data, cached_at_str)) => {
        let data: Value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize cached response: {}", e))?;
        Ok(Some(CacheEntry {
          key: key.to_string(),
          data,
          cached_at: parse_datetime(&cached_at_str)?,
        }))
      }
      None => Ok(None),
    }
  }

  fn delete_responses_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
    let conn = self.lock()?;

    conn
      .execute(
        "DELETE FROM response_cache WHERE cached_at < ?",
        params![format_datetime(cutoff)],
      )
      .map_err(|e| eyre!("Failed to purge cached responses: {}", e))
  }

  fn clear_responses(&self) -> Result<usize> {
    let conn = self.lock()?;

    conn
      .execute("DELETE FROM response_cache", [])
      .map_err(|e| eyre!("Failed to clear cached responses: {}", e))
  }

  fn append_request(&self, request: &NewQueuedRequest) -> Result<QueuedRequest> {
    let conn = self.lock()?;
    let body =
      serde_json::to_vec(&request.body).map_err(|e| eyre!("Failed to serialize body: {}", e))?;

    conn
      .execute(
        "INSERT INTO request_queue (endpoint, method, body, created_at, retry_count)
         VALUES (?, ?, ?, ?, 0)",
        params![
          request.endpoint,
          request.method.as_str(),
          body,
          format_datetime(request.created_at)
        ],
      )
      .map_err(|e| eyre!("Failed to queue request: {}", e))?;

    Ok(QueuedRequest {
      id: conn.last_insert_rowid(),
      endpoint: request.endpoint.clone(),
      method: request.method,
      body: request.body.clone(),
      created_at: request.created_at,
      retry_count: 0,
    })
  }

  fn list_requests(&self) -> Result<Vec<QueuedRequest>> {
    let conn = self.lock()?;

    let mut stmt = conn
      .prepare(
        "SELECT id, endpoint, method, body, created_at, retry_count FROM request_queue
         ORDER BY id",
      )
      .map_err(|e| eyre!("Failed to prepare queue query: {}", e))?;

    let rows: Vec<(i64, String, String, Vec<u8>, String, u32)> = stmt
      .query_map([], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
          row.get(5)?,
        ))
      })
      .map_err(|e| eyre!("Failed to query queue: {}", e))?
      .collect::<rusqlite::Result<_>>()
      .map_err(|e| eyre!("Failed to read queue row: {}", e))?;

    rows
      .into_iter()
      .map(|(id, endpoint, method, body, created_at, retry_count)| -> Result<QueuedRequest> {
        let method: Method = method
          .parse()
          .map_err(|e| eyre!("Corrupt queue entry {}: {}", id, e))?;
        let body: Value = serde_json::from_slice(&body)
          .map_err(|e| eyre!("Corrupt queue entry {}: {}", id, e))?;
        Ok(QueuedRequest {
          id,
          endpoint,
          method,
          body,
          created_at: parse_datetime(&created_at)?,
          retry_count,
        })
      })
      .collect()
  }

  fn delete_request(&self, id: i64) -> Result<bool> {
    let conn = self.lock()?;

    let removed = conn
      .execute("DELETE FROM request_queue WHERE id = ?", params![id])
      .map_err(|e| eyre!("Failed to remove queued request {}: {}", id, e))?;

    Ok(removed > 0)
  }

  fn increment_retry(&self, id: i64) -> Result<()> {
    let conn = self.lock()?;

    conn
      .execute(
        "UPDATE request_queue SET retry_count = retry_count + 1 WHERE id = ?",
        params![id],
      )
      .map_err(|e| eyre!("Failed to update queued request {}: {}", id, e))?;

    Ok(())
  }
}

/// SHA256 of the cache key for a stable, fixed-length primary key.
fn key_hash(key: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(key.as_bytes());
  hex::encode(hasher.finalize())
}

// Fixed-width UTC so stored timestamps compare correctly as text.
fn format_datetime(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
