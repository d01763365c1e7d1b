//! Prometheus Metrics Registry - Collection Observability
//!
//! Counts API requests, retries, per-repository collection outcomes, and
//! stored rows. A collection run is a short-lived process, so instead of
//! serving `/metrics` the registry renders text exposition that the CLI
//! drops into a node_exporter textfile directory.

use std::path::Path;

use anyhow::Context;
use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use tracing::{info, instrument};

/// Centralized Prometheus metrics for a collection run.
///
/// All metrics follow the naming convention `ghstats_*`.
pub struct CollectorMetrics {
    /// Prometheus registry.
    registry: Registry,
    /// API requests by endpoint and outcome (`ok`, `auth`, `rate_limited`, ...).
    pub api_requests: IntCounterVec,
    /// Retried API attempts by endpoint.
    pub api_retries: IntCounterVec,
    /// Repository collections by outcome (`ok`, `failed`).
    pub repo_collections: IntCounterVec,
    /// Records handed to the store's upsert.
    pub records_upserted: IntCounter,
    /// Rows in the store after the last write.
    pub store_rows: IntGauge,
}

impl CollectorMetrics {
    /// Create and register all Prometheus metrics.
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let api_requests = IntCounterVec::new(
            Opts::new("ghstats_api_requests_total", "GitHub API requests by outcome"),
            &["endpoint", "outcome"],
        )?;

        let api_retries = IntCounterVec::new(
            Opts::new("ghstats_api_retries_total", "GitHub API attempts that were retried"),
            &["endpoint"],
        )?;

        let repo_collections = IntCounterVec::new(
            Opts::new(
                "ghstats_repo_collections_total",
                "Per-repository collection attempts by outcome",
            ),
            &["outcome"],
        )?;

        let records_upserted = IntCounter::new(
            "ghstats_records_upserted_total",
            "Traffic records submitted to the store",
        )?;

        let store_rows = IntGauge::new("ghstats_store_rows", "Rows in the traffic store")?;

        registry.register(Box::new(api_requests.clone()))?;
        registry.register(Box::new(api_retries.clone()))?;
        registry.register(Box::new(repo_collections.clone()))?;
        registry.register(Box::new(records_upserted.clone()))?;
        registry.register(Box::new(store_rows.clone()))?;

        Ok(Self {
            registry,
            api_requests,
            api_retries,
            repo_collections,
            records_upserted,
            store_rows,
        })
    }

    /// Record the final outcome of one API call.
    pub fn observe_request(&self, endpoint: &str, outcome: &str) {
        self.api_requests.with_label_values(&[endpoint, outcome]).inc();
    }

    pub fn observe_retry(&self, endpoint: &str) {
        self.api_retries.with_label_values(&[endpoint]).inc();
    }

    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .context("Failed to encode metrics")?;
        String::from_utf8(buffer).context("Metrics output is not UTF-8")
    }

    /// Write the text exposition to `path` (tmp file, then rename).
    #[instrument(skip(self))]
    pub fn write_textfile(&self, path: &Path) -> anyhow::Result<()> {
        let body = self.render()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let tmp = path.with_extension("prom.tmp");
        std::fs::write(&tmp, body).context("Failed to write metrics tmp file")?;
        std::fs::rename(&tmp, path).context("Failed to rename metrics file")?;
        info!(path = %path.display(), "Metrics written");
        Ok(())
    }
}
