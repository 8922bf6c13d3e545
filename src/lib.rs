//! Offline-first request dispatching for a REST API.
//!
//! - `Dispatcher` wraps every call and decides between the network and the
//!   offline path
//! - `offline` holds the response cache, the mutation queue and the
//!   optimistic patcher
//! - `sync::Replayer` sends queued mutations once the API is reachable again

pub mod auth;
pub mod config;
pub mod connectivity;
pub mod dispatcher;
pub mod error;
pub mod events;
pub mod http;
pub mod offline;
pub mod store;
pub mod sync;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use dispatcher::{Dispatcher, DispatcherBuilder, OFFLINE_SAVED_MESSAGE};
pub use error::{DispatchError, TransportError};
pub use http::{Method, RequestOptions, Response, ResponseSource};
