//! Bearer token sources.

/// Supplies the bearer token attached to outgoing requests.
///
/// Read on every request so a token refreshed elsewhere takes effect
/// immediately.
pub trait TokenSource: Send + Sync {
  fn token(&self) -> Option<String>;
}

/// A fixed token, or none at all.
#[derive(Debug, Clone, Default)]
pub struct StaticToken(Option<String>);

impl StaticToken {
  pub fn new(token: impl Into<String>) -> Self {
    Self(Some(token.into()))
  }

  pub fn none() -> Self {
    Self(None)
  }
}

impl TokenSource for StaticToken {
  fn token(&self) -> Option<String> {
    self.0.clone()
  }
}

/// Reads the token from environment variables.
///
/// Checks OFFLINE_DISPATCH_TOKEN first, then API_TOKEN as fallback.
#[derive(Debug, Clone)]
pub struct EnvToken {
  vars: Vec<String>,
}

impl EnvToken {
  pub fn new(vars: impl IntoIterator<Item = impl Into<String>>) -> Self {
    Self {
      vars: vars.into_iter().map(Into::into).collect(),
    }
  }
}

impl Default for EnvToken {
  fn default() -> Self {
    Self::new(["OFFLINE_DISPATCH_TOKEN", "API_TOKEN"])
  }
}

impl TokenSource for EnvToken {
  fn token(&self) -> Option<String> {
    self
      .vars
      .iter()
      .filter_map(|var| std::env::var(var).ok())
      .find(|value| !value.trim().is_empty())
  }
}
