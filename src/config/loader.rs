//! Configuration Loader - File Loading, Env Overrides, Validation
//!
//! Handles loading `config.toml`, applying `GHSTATS_*` environment
//! overrides, validating all parameters, and providing clear error
//! messages for misconfiguration.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::AppConfig;
use crate::adapters::storage::Compression;

/// Env var holding the GitHub token.
pub const TOKEN_ENV: &str = "GHSTATS_GITHUB_TOKEN";
/// Env var overriding `storage.data_dir`.
pub const DATA_DIR_ENV: &str = "GHSTATS_DATA_DIR";

/// Load and validate configuration from a TOML file.
///
/// # Errors
/// Returns detailed error if:
/// - File doesn't exist or can't be read
/// - TOML parsing fails
/// - Validation rules are violated
pub fn load_config(path: impl AsRef<Path>) -> Result<AppConfig> {
  let path = path.as_ref();

  let content = std::fs::read_to_string(path)
    .with_context(|| format!("Failed to read config file: {}", path.display()))?;

  let config = parse_config(&content, |key| std::env::var(key).ok())
    .with_context(|| format!("Invalid config file: {}", path.display()))?;

  Ok(config)
}

/// Parse TOML, apply overrides from `env`, and validate.
pub fn parse_config(content: &str, env: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
  let mut config: AppConfig = toml::from_str(content).context("Failed to parse TOML")?;
  apply_env_overrides(&mut config, env);
  validate_config(&config)?;
  Ok(config)
}

/// Environment wins over the file for the token and data directory.
fn apply_env_overrides(config: &mut AppConfig, env: impl Fn(&str) -> Option<String>) {
  if let Some(token) = env(TOKEN_ENV).filter(|t| !t.trim().is_empty()) {
    config.github.token = Some(token);
  }
  if let Some(dir) = env(DATA_DIR_ENV).filter(|d| !d.trim().is_empty()) {
    config.storage.data_dir = PathBuf::from(dir);
  }
}

/// Validate all configuration parameters.
///
/// Checks for:
/// - Every repository resolving to a non-empty owner and name
/// - Sensible retry, timeout, and concurrency settings
/// - A known compression codec
fn validate_config(config: &AppConfig) -> Result<()> {
  for (i, repo) in config.repos().iter().enumerate() {
    anyhow::ensure!(
      !repo.name.trim().is_empty(),
      "Repository {} has an empty name",
      i
    );
    anyhow::ensure!(
      !repo.owner.trim().is_empty(),
      "Repository {} ({}) has no owner and no [defaults] owner is set",
      i,
      repo.name
    );
  }

  anyhow::ensure!(
    config.github.max_attempts >= 1,
    "github.max_attempts must be at least 1, got {}",
    config.github.max_attempts
  );
  anyhow::ensure!(
    config.github.timeout_seconds > 0,
    "github.timeout_seconds must be positive"
  );
  anyhow::ensure!(
    config.github.max_concurrent > 0,
    "github.max_concurrent must be positive"
  );
  anyhow::ensure!(
    !config.github.base_url.is_empty(),
    "github.base_url must not be empty"
  );

  anyhow::ensure!(
    config.collect.concurrency >= 1,
    "collect.concurrency must be at least 1, got {}",
    config.collect.concurrency
  );

  anyhow::ensure!(
    Compression::parse(&config.storage.compression).is_some(),
    "Unknown storage.compression {:?} (expected none, snappy, lz4, zstd)",
    config.storage.compression
  );
  anyhow::ensure!(
    !config.storage.file_name.is_empty(),
    "storage.file_name must not be empty"
  );

  Ok(())
}
