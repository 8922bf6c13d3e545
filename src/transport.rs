//! Network transport and request preparation.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use url::Url;

use crate::auth::TokenSource;
use crate::error::{DispatchError, TransportError};
use crate::http::{has_header, PreparedRequest, RequestOptions, Response};

/// Sends a prepared request to the remote API.
///
/// Implementations return `Ok` for any HTTP status; only failures below the
/// HTTP layer are errors.
#[async_trait]
pub trait Transport: Send + Sync {
  async fn send(&self, request: &PreparedRequest) -> Result<Response, TransportError>;
}

/// `reqwest`-backed transport.
#[derive(Clone)]
pub struct HttpTransport {
  client: reqwest::Client,
}

impl HttpTransport {
  pub fn new(timeout: Duration) -> Result<Self, TransportError> {
    let client = reqwest::Client::builder()
      .timeout(timeout)
      .user_agent(concat!("offline-dispatch/", env!("CARGO_PKG_VERSION")))
      .build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Transport for HttpTransport {
  async fn send(&self, request: &PreparedRequest) -> Result<Response, TransportError> {
    let mut builder = self
      .client
      .request(request.method.into(), request.url.clone());

    for (name, value) in &request.headers {
      builder = builder.header(name.as_str(), value.as_str());
    }

    if let Some(body) = &request.body {
      let bytes = serde_json::to_vec(body)
        .map_err(|e| TransportError::other(format!("Failed to encode body: {}", e)))?;
      builder = builder.body(bytes);
    }

    let response = builder.send().await?;
    let status = response.status();
    let body = response.bytes().await?;

    Ok(Response::from_network(
      status.as_u16(),
      status.canonical_reason().unwrap_or_default(),
      body.to_vec(),
    ))
  }
}

/// Resolves endpoints against the API base URL and applies default headers.
#[derive(Clone)]
pub struct RequestPreparer {
  base: Url,
  token: Arc<dyn TokenSource>,
}

impl RequestPreparer {
  pub fn new(base_url: &str, token: Arc<dyn TokenSource>) -> Result<Self, DispatchError> {
    let base = Url::parse(base_url)
      .map_err(|e| DispatchError::InvalidUrl(format!("{}: {}", base_url, e)))?;
    Ok(Self { base, token })
  }

  /// Resolve an endpoint to a full URL.
  ///
  /// Relative endpoints are appended to the base path, so `/items` under
  /// `https://host/api` becomes `https://host/api/items`. Absolute URLs pass
  /// through unchanged.
  pub fn resolve(&self, endpoint: &str) -> Result<Url, DispatchError> {
    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
      return Url::parse(endpoint)
        .map_err(|e| DispatchError::InvalidUrl(format!("{}: {}", endpoint, e)));
    }

    let joined = format!(
      "{}/{}",
      self.base.as_str().trim_end_matches('/'),
      endpoint.trim_start_matches('/')
    );
    Url::parse(&joined).map_err(|e| DispatchError::InvalidUrl(format!("{}: {}", joined, e)))
  }

  pub fn prepare(
    &self,
    endpoint: &str,
    options: RequestOptions,
  ) -> Result<PreparedRequest, DispatchError> {
    let url = self.resolve(endpoint)?;
    let mut headers = options.headers;

    if let Some(token) = self.token.token() {
      if !has_header(&headers, "Authorization") {
        headers.push(("Authorization".to_string(), format!("Bearer {}", token)));
      }
    }
    if options.body.is_some() && !has_header(&headers, "Content-Type") {
      headers.push(("Content-Type".to_string(), "application/json".to_string()));
    }
    if !has_header(&headers, "Accept") {
      headers.push(("Accept".to_string(), "application/json".to_string()));
    }

    Ok(PreparedRequest {
      method: options.method,
      endpoint: endpoint.to_string(),
      url,
      headers,
      body: options.body,
    })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::auth::StaticToken;
  use crate::http::Method;
  use serde_json::json;

  fn preparer(token: StaticToken) -> RequestPreparer {
    RequestPreparer::new("https://erp.test/api/", Arc::new(token)).unwrap()
  }

  #[test]
  fn test_resolve_appends_to_base_path() {
    let p = preparer(StaticToken::none());
    assert_eq!(
      p.resolve("/items?page=2").unwrap().as_str(),
      "https://erp.test/api/items?page=2"
    );
    assert_eq!(
      p.resolve("items/5").unwrap().as_str(),
      "https://erp.test/api/items/5"
    );
    assert_eq!(
      p.resolve("https://other.test/x").unwrap().as_str(),
      "https://other.test/x"
    );
  }

  #[test]
  fn test_invalid_base_url_is_rejected() {
    let result = RequestPreparer::new("not a url", Arc::new(StaticToken::none()));
    assert!(matches!(result, Err(DispatchError::InvalidUrl(_))));
  }

  #[test]
  fn test_prepare_attaches_token_and_json_headers() {
    let p = preparer(StaticToken::new("secret"));
    let req = p
      .prepare(
        "/items",
        RequestOptions::new(Method::Post).with_body(json!({"name": "y"})),
      )
      .unwrap();

    assert_eq!(req.header("authorization"), Some("Bearer secret"));
    assert_eq!(req.header("content-type"), Some("application/json"));
    assert_eq!(req.header("accept"), Some("application/json"));
    assert_eq!(req.cache_key(), "https://erp.test/api/items");
  }

  #[test]
  fn test_prepare_keeps_caller_content_type() {
    let p = preparer(StaticToken::none());
    let req = p
      .prepare(
        "/items",
        RequestOptions::new(Method::Post)
          .with_body(json!("raw"))
          .with_header("content-type", "text/plain"),
      )
      .unwrap();

    assert_eq!(req.header("Content-Type"), Some("text/plain"));
    assert_eq!(
      req
        .headers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case("content-type"))
        .count(),
      1
    );
    assert_eq!(req.header("Authorization"), None);
  }

  #[test]
  fn test_get_without_body_has_no_content_type() {
    let p = preparer(StaticToken::none());
    let req = p.prepare("/items", RequestOptions::get()).unwrap();
    assert_eq!(req.header("Content-Type"), None);
  }
}
