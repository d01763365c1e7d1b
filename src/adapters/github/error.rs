//! GitHub API error family.
//!
//! One enum covers every failure a request can end in, so callers can
//! match narrowly on a variant or treat the whole family as one error.

use chrono::{DateTime, Utc};

/// Errors returned by the GitHub traffic client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GitHubError {
  /// Bad or expired credential, or insufficient scope (401, non-rate-limit 403).
  #[error("authentication failed: {message}")]
  Authentication { message: String },

  /// Primary rate limit exhausted (403 with `X-RateLimit-Remaining: 0`).
  #[error("rate limit exceeded, resets at {}", .reset_at.map_or_else(|| "unknown".to_string(), |t| t.to_rfc3339()))]
  RateLimited { reset_at: Option<DateTime<Utc>> },

  /// Repository missing or not visible to the credential (404).
  #[error("repository not found or no access: {path}")]
  NotFound { path: String },

  /// Any other failure: unexpected status, undecodable body, or a network
  /// failure after retries ran out (`status` is `None` in that case).
  #[error("API error{}: {message}", .status.map(|s| format!(" {s}")).unwrap_or_default())]
  Api { status: Option<u16>, message: String },
}

impl GitHubError {
  /// Whether the request executor may try again after this error.
  ///
  /// Only transport failures and 5xx responses qualify.
  pub fn is_retryable(&self) -> bool {
    match self {
      Self::Api { status: None, .. } => true,
      Self::Api { status: Some(s), .. } => *s >= 500,
      _ => false,
    }
  }

  pub const fn is_rate_limited(&self) -> bool {
    matches!(self, Self::RateLimited { .. })
  }

  /// Reset time carried by a rate-limit error.
  pub const fn reset_at(&self) -> Option<DateTime<Utc>> {
    match self {
      Self::RateLimited { reset_at } => *reset_at,
      _ => None,
    }
  }

  /// Short label for metrics and logs.
  pub const fn kind(&self) -> &'static str {
    match self {
      Self::Authentication { .. } => "auth",
      Self::RateLimited { .. } => "rate_limited",
      Self::NotFound { .. } => "not_found",
      Self::Api { status: None, .. } => "network",
      Self::Api { .. } => "api",
    }
  }
}

impl From<reqwest::Error> for GitHubError {
  fn from(e: reqwest::Error) -> Self {
    Self::Api {
      status: None,
      message: format!("request failed: {e}"),
    }
  }
}
