use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::offline::RouteConfig;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
  pub api: ApiConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub transport: TransportConfig,
  /// Mutation endpoints and the cached collections they affect
  #[serde(default)]
  pub routes: Vec<RouteConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
  /// Base URL that relative endpoints are appended to
  pub base_url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// Store database path (defaults to the user data directory)
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Cached responses older than this are ignored. Unset means they never expire.
  pub max_age_secs: Option<u64>,
}

impl CacheConfig {
  pub fn max_age(&self) -> Option<chrono::Duration> {
    self
      .max_age_secs
      .and_then(|secs| i64::try_from(secs).ok())
      .map(chrono::Duration::seconds)
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TransportConfig {
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self {
      timeout_secs: default_timeout_secs(),
    }
  }
}

impl TransportConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

fn default_timeout_secs() -> u64 {
  30
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./offline-dispatch.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/offline-dispatch/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(eyre!(
        "No configuration file found. Create one at ~/.config/offline-dispatch/config.yaml"
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("offline-dispatch.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("offline-dispatch").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents).map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  pub fn parse(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents).map_err(|e| eyre!("{}", e))?;
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_minimal_config_uses_defaults() {
    let config = Config::parse("api:\n  base_url: https://erp.test/api\n").unwrap();

    assert_eq!(config.api.base_url, "https://erp.test/api");
    assert!(config.storage.path.is_none());
    assert!(config.cache.max_age().is_none());
    assert_eq!(config.transport.timeout(), Duration::from_secs(30));
    assert!(config.routes.is_empty());
  }

  #[test]
  fn test_full_config() {
    let yaml = r#"
api:
  base_url: https://erp.test/api
storage:
  path: /tmp/store.db
cache:
  max_age_secs: 3600
transport:
  timeout_secs: 5
routes:
  - pattern: /items/{id}
    collections: [/items]
"#;
    let config = Config::parse(yaml).unwrap();

    assert_eq!(config.storage.path, Some(PathBuf::from("/tmp/store.db")));
    assert_eq!(config.cache.max_age(), Some(chrono::Duration::hours(1)));
    assert_eq!(config.transport.timeout_secs, 5);
    assert_eq!(
      config.routes,
      vec![RouteConfig {
        pattern: "/items/{id}".into(),
        collections: vec!["/items".into()],
      }]
    );
  }

  #[test]
  fn test_missing_base_url_is_an_error() {
    assert!(Config::parse("cache:\n  max_age_secs: 10\n").is_err());
  }

  #[test]
  fn test_explicit_missing_path_is_an_error() {
    let err = Config::load(Some(Path::new("/nonexistent/offline-dispatch.yaml"))).unwrap_err();
    assert!(err.to_string().contains("Config file not found"));
  }
}
