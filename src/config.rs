use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use url::Url;

/// Overrides the configured endpoint when set.
pub const ENDPOINT_ENV: &str = "RECOBOARD_ENDPOINT";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
  /// GraphQL endpoint of the recommendation service
  pub endpoint: String,
  /// User whose view the CLI shows when `--user` is not given
  pub default_user: Option<String>,
  pub cache: CacheConfig,
  pub transport: TransportConfig,
  pub logging: LoggingConfig,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      endpoint: "http://127.0.0.1:8080/graphql".to_string(),
      default_user: None,
      cache: CacheConfig::default(),
      transport: TransportConfig::default(),
      logging: LoggingConfig::default(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  /// Seconds a fetched list is served without asking the server again
  pub stale_secs: u64,
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self { stale_secs: 300 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
  pub timeout_secs: u64,
}

impl Default for TransportConfig {
  fn default() -> Self {
    Self { timeout_secs: 10 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  /// Filter directive, e.g. "info" or "recoboard=debug". `RUST_LOG` wins.
  pub level: String,
  /// Log to this file instead of stderr
  pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    Self {
      level: "info".to_string(),
      file: None,
    }
  }
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./recoboard.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/recoboard/config.yaml
  ///
  /// Without any file the defaults are used. `RECOBOARD_ENDPOINT` overrides
  /// the file's endpoint.
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

    let config = match path {
      Some(p) => Self::load_from_path(&p)?,
      None => Self::default(),
    };

    Ok(config.with_env(|key| std::env::var(key).ok()))
  }

  /// Apply environment overrides on top of the file settings.
  fn with_env(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
    if let Some(endpoint) = lookup(ENDPOINT_ENV) {
      self.endpoint = endpoint;
    }
    self
  }

  /// Apply command-line overrides, which win over file and environment.
  pub fn with_overrides(mut self, endpoint: Option<String>) -> Self {
    if let Some(endpoint) = endpoint {
      self.endpoint = endpoint;
    }
    self
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("recoboard.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("recoboard").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> Result<Self, serde_yaml::Error> {
    // An empty file deserializes to null, not to an empty mapping.
    if contents.trim().is_empty() {
      return Ok(Self::default());
    }
    serde_yaml::from_str(contents)
  }

  pub fn endpoint_url(&self) -> Result<Url> {
    Url::parse(&self.endpoint).map_err(|e| eyre!("Invalid endpoint {}: {}", self.endpoint, e))
  }

  pub fn stale_time(&self) -> chrono::Duration {
    let secs = i64::try_from(self.cache.stale_secs).unwrap_or(i64::MAX);
    chrono::Duration::seconds(secs.min(i64::MAX / 1000))
  }

  pub fn request_timeout(&self) -> std::time::Duration {
    std::time::Duration::from_secs(self.transport.timeout_secs)
  }
}
