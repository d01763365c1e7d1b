//! Configuration Module - TOML-based Collector Configuration
//!
//! Loads and validates configuration from `config.toml` with
//! environment variable overrides for the credential and data directory.
//! The tracked repository list lives here too; it is read once at start
//! and never changes during a run.

pub mod loader;

use std::num::NonZeroU32;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::adapters::github::GitHubClientConfig;

/// Top-level configuration.
///
/// Loaded from `config.toml` at startup. All fields are validated
/// before any request is made.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
  /// Log level (trace, debug, info, warn, error).
  #[serde(default = "default_log_level")]
  pub log_level: String,
  /// Log output format.
  #[serde(default)]
  pub log_format: LogFormat,
  /// GitHub API access.
  #[serde(default)]
  pub github: GitHubConfig,
  /// Where the Parquet store lives.
  #[serde(default)]
  pub storage: StorageConfig,
  /// Collection run behaviour.
  #[serde(default)]
  pub collect: CollectConfig,
  /// Values applied to repo entries that omit them.
  #[serde(default)]
  pub defaults: RepoDefaults,
  /// Raw repository entries, see [`AppConfig::repos`].
  #[serde(default, rename = "repos")]
  pub repo_entries: Vec<RepoEntry>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
  /// Human-readable lines.
  #[default]
  Pretty,
  /// One JSON object per event.
  Json,
}

/// GitHub API configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct GitHubConfig {
  /// Personal access token. `GHSTATS_GITHUB_TOKEN` takes precedence.
  #[serde(default)]
  pub token: Option<String>,
  /// REST API base URL.
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// `X-GitHub-Api-Version` header value.
  #[serde(default = "default_api_version")]
  pub api_version: String,
  /// Request timeout in seconds.
  #[serde(default = "default_timeout")]
  pub timeout_seconds: u64,
  /// Attempts per request, including the first.
  #[serde(default = "default_max_attempts")]
  pub max_attempts: u32,
  /// First retry delay; doubles per retry.
  #[serde(default = "default_retry_delay")]
  pub retry_base_delay_ms: u64,
  /// Client-side pacing; 0 disables it.
  #[serde(default = "default_rps")]
  pub requests_per_second: u32,
  /// Maximum in-flight requests.
  #[serde(default = "default_max_concurrent")]
  pub max_concurrent: usize,
  /// Overrides the default `ghstats/<version>` user agent.
  #[serde(default)]
  pub user_agent: Option<String>,
}

/// Persistence configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
  /// Base data directory. `GHSTATS_DATA_DIR` takes precedence.
  #[serde(default = "default_data_dir")]
  pub data_dir: PathBuf,
  /// Parquet file name inside `data_dir`.
  #[serde(default = "default_file_name")]
  pub file_name: String,
  /// Parquet codec: none, snappy, lz4, zstd.
  #[serde(default = "default_compression")]
  pub compression: String,
}

/// Collection run configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CollectConfig {
  /// Repositories collected at once; 1 keeps runs sequential.
  #[serde(default = "default_concurrency")]
  pub concurrency: usize,
  /// Prometheus textfile written after each run.
  #[serde(default)]
  pub metrics_file: Option<PathBuf>,
}

/// Defaults applied to repository entries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RepoDefaults {
  /// Owner used when an entry has none.
  #[serde(default)]
  pub owner: Option<String>,
}

/// One `[[repos]]` entry as written in the file.
#[derive(Debug, Clone, Deserialize)]
pub struct RepoEntry {
  pub owner: Option<String>,
  pub name: String,
  pub docs_url: Option<String>,
  pub ga_property_id: Option<String>,
}

/// Static identity of a tracked repository.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoConfig {
  pub owner: String,
  pub name: String,
  pub docs_url: Option<String>,
  pub ga_property_id: Option<String>,
}

impl RepoConfig {
  pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
    Self {
      owner: owner.into(),
      name: name.into(),
      docs_url: None,
      ga_property_id: None,
    }
  }

  /// `owner/name`.
  pub fn full_name(&self) -> String {
    format!("{}/{}", self.owner, self.name)
  }
}

impl AppConfig {
  /// Repository list with `[defaults]` applied.
  pub fn repos(&self) -> Vec<RepoConfig> {
    let default_owner = self.defaults.owner.clone().unwrap_or_default();
    self
      .repo_entries
      .iter()
      .map(|entry| RepoConfig {
        owner: entry.owner.clone().unwrap_or_else(|| default_owner.clone()),
        name: entry.name.clone(),
        docs_url: entry.docs_url.clone(),
        ga_property_id: entry.ga_property_id.clone(),
      })
      .collect()
  }

  /// Full path of the Parquet store.
  pub fn stats_path(&self) -> PathBuf {
    self.storage.data_dir.join(&self.storage.file_name)
  }

  /// HTTP client settings derived from `[github]`.
  pub fn client_config(&self) -> GitHubClientConfig {
    let gh = &self.github;
    let mut config = GitHubClientConfig {
      base_url: gh.base_url.clone(),
      api_version: gh.api_version.clone(),
      timeout: Duration::from_secs(gh.timeout_seconds),
      max_attempts: gh.max_attempts,
      retry_base_delay: Duration::from_millis(gh.retry_base_delay_ms),
      requests_per_second: NonZeroU32::new(gh.requests_per_second),
      max_concurrent: gh.max_concurrent,
      ..GitHubClientConfig::default()
    };
    if let Some(agent) = &gh.user_agent {
      config.user_agent.clone_from(agent);
    }
    config
  }
}

impl Default for GitHubConfig {
  fn default() -> Self {
    Self {
      token: None,
      base_url: default_base_url(),
      api_version: default_api_version(),
      timeout_seconds: default_timeout(),
      max_attempts: default_max_attempts(),
      retry_base_delay_ms: default_retry_delay(),
      requests_per_second: default_rps(),
      max_concurrent: default_max_concurrent(),
      user_agent: None,
    }
  }
}

impl Default for StorageConfig {
  fn default() -> Self {
    Self {
      data_dir: default_data_dir(),
      file_name: default_file_name(),
      compression: default_compression(),
    }
  }
}

impl Default for CollectConfig {
  fn default() -> Self {
    Self {
      concurrency: default_concurrency(),
      metrics_file: None,
    }
  }
}

// Default value functions for serde

fn default_log_level() -> String {
  "info".to_string()
}

fn default_base_url() -> String {
  "https://api.github.com".to_string()
}

fn default_api_version() -> String {
  "2022-11-28".to_string()
}

const fn default_timeout() -> u64 {
  30
}

const fn default_max_attempts() -> u32 {
  3
}

const fn default_retry_delay() -> u64 {
  1000
}

const fn default_rps() -> u32 {
  10
}

const fn default_max_concurrent() -> usize {
  10
}

fn default_data_dir() -> PathBuf {
  PathBuf::from("data")
}

fn default_file_name() -> String {
  "stats.parquet".to_string()
}

fn default_compression() -> String {
  "snappy".to_string()
}

const fn default_concurrency() -> usize {
  1
}
