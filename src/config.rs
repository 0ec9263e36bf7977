use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

const DEFAULT_TTL_MS: u64 = 30_000;
const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

/// Configuration for the data layer.
///
/// Only three inputs are recognized: the API base URL, the default cache
/// TTL, and the per-request timeout. Everything else (endpoints, cache keys)
/// is owned by the client itself.
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
  /// Base URL of the marketplace REST API, e.g. `https://api.homenest.app/`.
  pub base_url: String,
  /// Default staleness window for cached reads, in milliseconds.
  #[serde(default = "default_ttl_ms")]
  pub default_ttl_ms: u64,
  /// Bound on a single HTTP round-trip, in milliseconds.
  #[serde(default = "default_request_timeout_ms")]
  pub request_timeout_ms: u64,
}

fn default_ttl_ms() -> u64 {
  DEFAULT_TTL_MS
}

fn default_request_timeout_ms() -> u64 {
  DEFAULT_REQUEST_TIMEOUT_MS
}

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
  #[error("config file not found: {0}")]
  NotFound(String),
  #[error("failed to read config file {path}: {source}")]
  Io {
    path: String,
    #[source]
    source: std::io::Error,
  },
  #[error("failed to parse config file {path}: {source}")]
  Parse {
    path: String,
    #[source]
    source: serde_yaml::Error,
  },
  #[error("invalid base URL {url}: {reason}")]
  InvalidBaseUrl { url: String, reason: String },
  #[error("failed to build HTTP transport: {0}")]
  Transport(String),
}

impl ClientConfig {
  /// Create a configuration with defaults for everything but the base URL.
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      default_ttl_ms: DEFAULT_TTL_MS,
      request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
    }
  }

  /// Set the default TTL for cached reads.
  pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
    self.default_ttl_ms = ttl.as_millis() as u64;
    self
  }

  /// Set the per-request timeout.
  pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
    self.request_timeout_ms = timeout.as_millis() as u64;
    self
  }

  /// Default staleness window as a [`Duration`].
  pub fn default_ttl(&self) -> Duration {
    Duration::from_millis(self.default_ttl_ms)
  }

  /// Request timeout as a [`Duration`].
  pub fn request_timeout(&self) -> Duration {
    Duration::from_millis(self.request_timeout_ms)
  }

  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./homenest.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/homenest/config.yaml
  /// 4. ~/.config/homenest/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(p.display().to_string()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Err(ConfigError::NotFound(
        "no homenest.yaml in the current directory or XDG config directory".to_string(),
      )),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("homenest.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("homenest").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
      path: path.display().to_string(),
      source: e,
    })?;

    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
      path: path.display().to_string(),
      source: e,
    })
  }
}
