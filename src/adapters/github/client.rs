//! GitHub HTTP Client - Authenticated Traffic API Access
//!
//! Wraps reqwest with bearer auth, client-side pacing, bounded retries, and
//! status classification for the four read endpoints the collector uses.
//!
//! Lifetime is explicit: a [`GitHubClient`] only holds the credential and
//! settings. [`GitHubClient::open`] acquires the connection pool as a
//! [`GitHubSession`]; every request is a session method, and closing or
//! dropping the session releases the pool. [`GitHubClient::scoped`] wraps
//! open/close around an async body so release happens on every path.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use tokio::sync::Semaphore;
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

use super::error::GitHubError;
use super::types::{ClonesResponse, ReleaseResponse, RepoResponse, ViewsResponse};
use crate::adapters::metrics::CollectorMetrics;
use crate::domain::{Release, RepoStats, TrafficData};
use crate::ports::{MAX_RELEASES_PAGE, TrafficSource};

const RATE_LIMIT_REMAINING: &str = "x-ratelimit-remaining";
const RATE_LIMIT_RESET: &str = "x-ratelimit-reset";
const API_VERSION_HEADER: &str = "x-github-api-version";

/// Configuration for the GitHub HTTP client.
#[derive(Debug, Clone)]
pub struct GitHubClientConfig {
  /// Base URL for the REST API.
  pub base_url: String,
  /// Value of the `X-GitHub-Api-Version` header.
  pub api_version: String,
  /// `User-Agent` header (GitHub rejects requests without one).
  pub user_agent: String,
  /// Per-request timeout.
  pub timeout: Duration,
  /// Total attempts per request, including the first.
  pub max_attempts: u32,
  /// Delay before the first retry; doubles on each further retry.
  pub retry_base_delay: Duration,
  /// Client-side pacing; `None` disables it.
  pub requests_per_second: Option<NonZeroU32>,
  /// Maximum in-flight requests per session.
  pub max_concurrent: usize,
}

impl Default for GitHubClientConfig {
  fn default() -> Self {
    Self {
      base_url: "https://api.github.com".to_string(),
      api_version: "2022-11-28".to_string(),
      user_agent: concat!("ghstats/", env!("CARGO_PKG_VERSION")).to_string(),
      timeout: Duration::from_secs(30),
      max_attempts: 3,
      retry_base_delay: Duration::from_secs(1),
      requests_per_second: NonZeroU32::new(10),
      max_concurrent: 10,
    }
  }
}

/// Unopened GitHub client: credential plus settings, no connections.
pub struct GitHubClient {
  /// Bearer token (opaque).
  token: String,
  /// Client configuration.
  config: GitHubClientConfig,
  /// Optional metrics sink shared with the collector.
  metrics: Option<Arc<CollectorMetrics>>,
}

impl std::fmt::Debug for GitHubClient {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("GitHubClient")
      .field("token", &"<redacted>")
      .field("config", &self.config)
      .finish_non_exhaustive()
  }
}

impl GitHubClient {
  /// Create a client for the given bearer credential.
  pub fn new(token: impl Into<String>, config: GitHubClientConfig) -> Self {
    Self {
      token: token.into(),
      config,
      metrics: None,
    }
  }

  /// Attach a metrics registry; sessions opened afterwards report into it.
  #[must_use]
  pub fn with_metrics(mut self, metrics: Arc<CollectorMetrics>) -> Self {
    self.metrics = Some(metrics);
    self
  }

  pub const fn config(&self) -> &GitHubClientConfig {
    &self.config
  }

  /// Acquire the connection pool and return an open session.
  pub fn open(&self) -> Result<GitHubSession, GitHubError> {
    let mut headers = HeaderMap::new();
    headers.insert(ACCEPT, HeaderValue::from_static("application/vnd.github+json"));

    let mut auth = HeaderValue::from_str(&format!("Bearer {}", self.token)).map_err(|_| {
      GitHubError::Authentication {
        message: "token contains characters not allowed in a header".to_string(),
      }
    })?;
    auth.set_sensitive(true);
    headers.insert(AUTHORIZATION, auth);

    let version = HeaderValue::from_str(&self.config.api_version).map_err(|_| GitHubError::Api {
      status: None,
      message: format!("invalid API version header: {}", self.config.api_version),
    })?;
    headers.insert(API_VERSION_HEADER, version);

    let http = Client::builder()
      .default_headers(headers)
      .user_agent(self.config.user_agent.clone())
      .timeout(self.config.timeout)
      .pool_max_idle_per_host(5)
      .build()?;

    let limiter = self
      .config
      .requests_per_second
      .map(|rps| RateLimiter::direct(Quota::per_second(rps)));

    debug!(base_url = %self.config.base_url, "GitHub session opened");

    Ok(GitHubSession {
      http,
      base_url: self.config.base_url.trim_end_matches('/').to_string(),
      max_attempts: self.config.max_attempts,
      retry_base_delay: self.config.retry_base_delay,
      semaphore: Semaphore::new(self.config.max_concurrent.max(1)),
      limiter,
      metrics: self.metrics.clone(),
    })
  }

  /// Run `body` with an open session, closing it afterwards whether the
  /// body succeeded or not.
  pub async fn scoped<T, E>(
    &self,
    body: impl AsyncFnOnce(&GitHubSession) -> Result<T, E>,
  ) -> Result<T, E>
  where
    E: From<GitHubError>,
  {
    let session = self.open()?;
    let result = body(&session).await;
    session.close();
    result
  }
}

/// Open GitHub session. Owns the connection pool for its lifetime.
pub struct GitHubSession {
  /// Underlying HTTP client (pool owner).
  http: Client,
  /// Base URL without trailing slash.
  base_url: String,
  max_attempts: u32,
  retry_base_delay: Duration,
  /// Concurrency limiter.
  semaphore: Semaphore,
  /// Client-side request pacing.
  limiter: Option<DefaultDirectRateLimiter>,
  metrics: Option<Arc<CollectorMetrics>>,
}

impl GitHubSession {
  /// Release the connection pool.
  pub fn close(self) {
    self.semaphore.close();
    debug!("GitHub session closed");
  }

  /// Backoff before retry number `retry` (1-based): base, 2×base, 4×base, …
  fn backoff(&self, retry: u32) -> Duration {
    self
      .retry_base_delay
      .saturating_mul(2u32.saturating_pow(retry.saturating_sub(1)))
  }

  /// GET `path` and decode the JSON body, recording the outcome.
  async fn get_json<T: DeserializeOwned>(
    &self,
    endpoint: &'static str,
    path: &str,
  ) -> Result<T, GitHubError> {
    let result = self.fetch_with_retry(endpoint, path).await;

    if let Some(metrics) = &self.metrics {
      let outcome = result.as_ref().map_or_else(GitHubError::kind, |_| "ok");
      metrics.observe_request(endpoint, outcome);
    }

    result
  }

  /// Execute a GET with pacing, concurrency limiting, and retries, and
  /// decode the body.
  ///
  /// The body is read inside the attempt, so a timeout or reset while it
  /// streams is retried like any other transport failure. Transport
  /// failures and 5xx responses are retried up to `max_attempts` in total;
  /// every other failure, including a body that is not valid JSON,
  /// returns immediately.
  async fn fetch_with_retry<T: DeserializeOwned>(
    &self,
    endpoint: &str,
    path: &str,
  ) -> Result<T, GitHubError> {
    let _permit = self.semaphore.acquire().await.map_err(|_| GitHubError::Api {
      status: None,
      message: "session closed".to_string(),
    })?;

    let url = format!("{}{}", self.base_url, path);
    let mut last_error = None;

    for attempt in 0..self.max_attempts {
      if attempt > 0 {
        let delay = self.backoff(attempt);
        debug!(endpoint, attempt, delay_ms = delay.as_millis(), "Retrying request");
        if let Some(metrics) = &self.metrics {
          metrics.observe_retry(endpoint);
        }
        sleep(delay).await;
      }

      if let Some(limiter) = &self.limiter {
        limiter.until_ready().await;
      }

      let response = match self.http.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
          warn!(endpoint, attempt, error = %e, "Request failed");
          last_error = Some(e.into());
          continue;
        }
      };

      let response = match classify(response, path).await {
        Ok(response) => response,
        Err(e) if e.is_retryable() => {
          warn!(endpoint, attempt, error = %e, "Server error, will retry");
          last_error = Some(e);
          continue;
        }
        Err(e) => return Err(e),
      };

      match response.bytes().await {
        Ok(body) => {
          return serde_json::from_slice(&body).map_err(|e| GitHubError::Api {
            status: Some(StatusCode::OK.as_u16()),
            message: format!("invalid response body: {e}"),
          });
        }
        Err(e) => {
          warn!(endpoint, attempt, error = %e, "Response body interrupted");
          last_error = Some(e.into());
        }
      }
    }

    Err(last_error.unwrap_or_else(|| GitHubError::Api {
      status: None,
      message: "request failed after retries".to_string(),
    }))
  }
}

/// Map a response to success or to the error family.
async fn classify(response: Response, path: &str) -> Result<Response, GitHubError> {
  match response.status() {
    StatusCode::OK => Ok(response),
    StatusCode::UNAUTHORIZED => Err(GitHubError::Authentication {
      message: "invalid or expired token".to_string(),
    }),
    StatusCode::FORBIDDEN => {
      let remaining = header_str(&response, RATE_LIMIT_REMAINING);
      if remaining == Some("0") {
        let reset_at = header_str(&response, RATE_LIMIT_RESET)
          .and_then(|v| v.trim().parse::<i64>().ok())
          .and_then(parse_reset);
        Err(GitHubError::RateLimited { reset_at })
      } else {
        Err(GitHubError::Authentication {
          message: "access forbidden - check token permissions".to_string(),
        })
      }
    }
    StatusCode::NOT_FOUND => Err(GitHubError::NotFound { path: path.to_string() }),
    status => {
      let body = response.text().await.unwrap_or_default();
      let message = if status.is_server_error() {
        format!("server error: {body}")
      } else {
        body
      };
      Err(GitHubError::Api {
        status: Some(status.as_u16()),
        message,
      })
    }
  }
}

fn header_str<'r>(response: &'r Response, name: &str) -> Option<&'r str> {
  response.headers().get(name).and_then(|v| v.to_str().ok())
}

/// Unix-epoch seconds from `X-RateLimit-Reset` to a UTC instant.
fn parse_reset(epoch_seconds: i64) -> Option<DateTime<Utc>> {
  Utc.timestamp_opt(epoch_seconds, 0).single()
}

#[async_trait]
impl TrafficSource for GitHubSession {
  #[instrument(skip(self))]
  async fn get_views(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError> {
    let path = format!("/repos/{owner}/{name}/traffic/views");
    let views: ViewsResponse = self.get_json("views", &path).await?;
    Ok(views.into())
  }

  #[instrument(skip(self))]
  async fn get_clones(&self, owner: &str, name: &str) -> Result<TrafficData, GitHubError> {
    let path = format!("/repos/{owner}/{name}/traffic/clones");
    let clones: ClonesResponse = self.get_json("clones", &path).await?;
    Ok(clones.into())
  }

  #[instrument(skip(self))]
  async fn get_repo_stats(&self, owner: &str, name: &str) -> Result<RepoStats, GitHubError> {
    let path = format!("/repos/{owner}/{name}");
    let repo: RepoResponse = self.get_json("repo", &path).await?;
    Ok(repo.into())
  }

  #[instrument(skip(self))]
  async fn get_releases(
    &self,
    owner: &str,
    name: &str,
    per_page: u8,
  ) -> Result<Vec<Release>, GitHubError> {
    let per_page = per_page.clamp(1, MAX_RELEASES_PAGE);
    let path = format!("/repos/{owner}/{name}/releases?per_page={per_page}");
    let releases: Vec<ReleaseResponse> = self.get_json("releases", &path).await?;

    let releases: Vec<Release> = releases
      .into_iter()
      .filter_map(ReleaseResponse::into_release)
      .collect();
    debug!(count = releases.len(), "Releases fetched");
    Ok(releases)
  }
}
