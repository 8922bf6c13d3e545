//! Error types surfaced by the dispatcher and transports.

use thiserror::Error;

use crate::http::Method;

/// Result type alias for dispatcher operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Errors a caller of `Dispatcher::request` can observe.
///
/// Server errors (5xx) and transport failures never show up here directly:
/// they are reclassified as lost connectivity and resolved through the
/// offline path, which produces one of these variants if it cannot serve the
/// request either.
#[derive(Debug, Error)]
pub enum DispatchError {
  /// Offline GET with nothing cached for the URL
  #[error("No connection and no cached data for {url}")]
  NoConnectionNoCache { url: String },

  /// The mutation could not be written to the offline queue
  #[error("Failed to save request for offline replay: {0}")]
  OfflineQueueWriteFailed(String),

  /// PUT/DELETE attempted without a connection
  #[error("{method} {endpoint} requires an internet connection; editing and deleting are not available offline")]
  ConnectivityRequired { method: Method, endpoint: String },

  /// Endpoint could not be resolved against the base URL
  #[error("Invalid request URL: {0}")]
  InvalidUrl(String),

  /// Local store failed while serving the offline path
  #[error("Local storage error: {0}")]
  Storage(String),

  /// Non-2xx answer where the typed helpers expected a payload
  #[error("Request rejected with status {status}: {body}")]
  Rejected { status: u16, body: String },

  /// Typed payload could not be encoded or decoded
  #[error("JSON error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl DispatchError {
  pub fn no_cache(url: impl Into<String>) -> Self {
    Self::NoConnectionNoCache { url: url.into() }
  }

  pub fn connectivity_required(method: Method, endpoint: impl Into<String>) -> Self {
    Self::ConnectivityRequired {
      method,
      endpoint: endpoint.into(),
    }
  }

  /// Whether a retry after connectivity returns could succeed.
  pub fn is_connectivity(&self) -> bool {
    matches!(
      self,
      Self::NoConnectionNoCache { .. } | Self::ConnectivityRequired { .. }
    )
  }
}

/// Failure below the HTTP layer: DNS, refused connection, timeout, TLS.
#[derive(Debug, Error)]
pub enum TransportError {
  #[error("HTTP error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Transport error: {0}")]
  Other(String),
}

impl TransportError {
  pub fn other(message: impl Into<String>) -> Self {
    Self::Other(message.into())
  }
}
