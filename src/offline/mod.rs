//! Offline support: response cache, mutation queue and optimistic patching.
//!
//! - GET responses are cached by resolved URL and served when the API is
//!   unreachable
//! - POST/PATCH requests made without connectivity are queued for replay
//! - queued mutations are reflected in cached lists right away

mod cache;
mod patcher;
mod queue;
mod routes;

pub use cache::ResponseCache;
pub use patcher::{OptimisticPatcher, TEMP_ID_PREFIX};
pub use queue::OfflineQueue;
pub use routes::{RouteConfig, RouteMatch, RouteTable};
