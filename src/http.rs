//! Request and response types shared by the dispatcher, transport and replayer.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use url::Url;

/// HTTP verbs recognized by the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
  Get,
  Post,
  Put,
  Patch,
  Delete,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Patch => "PATCH",
      Method::Delete => "DELETE",
    }
  }

  /// Whether a request with this verb may be stored for later replay.
  ///
  /// PUT and DELETE always need a live connection.
  pub fn is_queueable(&self) -> bool {
    matches!(self, Method::Post | Method::Patch)
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Method {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_ascii_uppercase().as_str() {
      "GET" => Ok(Method::Get),
      "POST" => Ok(Method::Post),
      "PUT" => Ok(Method::Put),
      "PATCH" => Ok(Method::Patch),
      "DELETE" => Ok(Method::Delete),
      other => Err(format!("unsupported method: {}", other)),
    }
  }
}

impl From<Method> for reqwest::Method {
  fn from(method: Method) -> Self {
    match method {
      Method::Get => reqwest::Method::GET,
      Method::Post => reqwest::Method::POST,
      Method::Put => reqwest::Method::PUT,
      Method::Patch => reqwest::Method::PATCH,
      Method::Delete => reqwest::Method::DELETE,
    }
  }
}

/// Options accepted by `Dispatcher::request`.
#[derive(Debug, Clone)]
pub struct RequestOptions {
  pub method: Method,
  pub body: Option<Value>,
  pub headers: Vec<(String, String)>,
}

impl Default for RequestOptions {
  fn default() -> Self {
    Self {
      method: Method::Get,
      body: None,
      headers: Vec::new(),
    }
  }
}

impl RequestOptions {
  pub fn new(method: Method) -> Self {
    Self {
      method,
      ..Self::default()
    }
  }

  pub fn get() -> Self {
    Self::new(Method::Get)
  }

  pub fn with_body(mut self, body: Value) -> Self {
    self.body = Some(body);
    self
  }

  pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
    self.headers.push((name.into(), value.into()));
    self
  }

  /// Case-insensitive header presence check.
  pub fn has_header(&self, name: &str) -> bool {
    has_header(&self.headers, name)
  }
}

pub(crate) fn has_header(headers: &[(String, String)], name: &str) -> bool {
  headers.iter().any(|(k, _)| k.eq_ignore_ascii_case(name))
}

/// A fully resolved request, ready for a transport.
#[derive(Debug, Clone)]
pub struct PreparedRequest {
  pub method: Method,
  /// Endpoint as given by the caller, before resolution
  pub endpoint: String,
  pub url: Url,
  pub headers: Vec<(String, String)>,
  pub body: Option<Value>,
}

impl PreparedRequest {
  /// Cache key for this request: the full resolved URL.
  pub fn cache_key(&self) -> &str {
    self.url.as_str()
  }

  pub fn header(&self, name: &str) -> Option<&str> {
    self
      .headers
      .iter()
      .find(|(k, _)| k.eq_ignore_ascii_case(name))
      .map(|(_, v)| v.as_str())
  }
}

/// Where a response body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
  /// Live response from the remote API
  Network,
  /// Served from the local response cache while offline
  Cache,
  /// Synthesized after a mutation was stored in the offline queue
  Queued,
}

/// Response returned to callers, whether it came from the network or not.
#[derive(Debug, Clone)]
pub struct Response {
  pub status: u16,
  pub status_text: String,
  pub body: Vec<u8>,
  pub source: ResponseSource,
}

impl Response {
  pub fn from_network(status: u16, status_text: impl Into<String>, body: Vec<u8>) -> Self {
    Self {
      status,
      status_text: status_text.into(),
      body,
      source: ResponseSource::Network,
    }
  }

  /// Synthesized `200 OK` carrying a JSON value.
  pub(crate) fn synthesized(data: &Value, source: ResponseSource) -> Self {
    Self {
      status: 200,
      status_text: "OK".to_string(),
      body: serde_json::to_vec(data).unwrap_or_default(),
      source,
    }
  }

  pub fn ok(&self) -> bool {
    (200..300).contains(&self.status)
  }

  pub fn is_server_error(&self) -> bool {
    self.status >= 500
  }

  /// Decode the body into the caller's type.
  pub fn json<T: DeserializeOwned>(&self) -> serde_json::Result<T> {
    serde_json::from_slice(&self.body)
  }

  pub fn text(&self) -> String {
    String::from_utf8_lossy(&self.body).into_owned()
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_method_parse_is_case_insensitive() {
    assert_eq!("patch".parse::<Method>(), Ok(Method::Patch));
    assert_eq!("DELETE".parse::<Method>(), Ok(Method::Delete));
    assert!("HEAD".parse::<Method>().is_err());
  }

  #[test]
  fn test_only_post_and_patch_are_queueable() {
    assert!(Method::Post.is_queueable());
    assert!(Method::Patch.is_queueable());
    assert!(!Method::Get.is_queueable());
    assert!(!Method::Put.is_queueable());
    assert!(!Method::Delete.is_queueable());
  }

  #[test]
  fn test_header_lookup_ignores_case() {
    let opts = RequestOptions::get().with_header("content-type", "text/plain");
    assert!(opts.has_header("Content-Type"));
    assert!(!opts.has_header("Authorization"));
  }

  #[test]
  fn test_synthesized_response_decodes() {
    let resp = Response::synthesized(&json!([{"id": 1}]), ResponseSource::Cache);
    assert!(resp.ok());
    assert_eq!(resp.status_text, "OK");
    let data: Value = resp.json().unwrap();
    assert_eq!(data, json!([{"id": 1}]));
  }
}
