//! Durable local storage for offline support.
//!
//! Two namespaces live in one store:
//! - the response cache, keyed by resolved request URL and overwritten on every
//!   successful GET
//! - the mutation queue, an append-only FIFO of writes waiting for replay

mod sqlite;
mod traits;

pub use sqlite::SqliteStore;
pub use traits::{CacheEntry, LocalStore, NewQueuedRequest, QueuedRequest};
