//! ghstats - Entry Point
//!
//! Command-line front end over the collector and the stats store.
//!
//! Wiring sequence:
//! 1. Parse arguments, load config.toml + env overrides, validate
//! 2. Init tracing (pretty or JSON, to stderr)
//! 3. Dispatch the subcommand; collection and release lookups open one
//!    GitHub session for their whole run and close it afterwards

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use ghstats::adapters::github::{GitHubClient, GitHubSession};
use ghstats::adapters::metrics::CollectorMetrics;
use ghstats::adapters::storage::{Compression, StatsFilter, StatsStore, TrafficFrame};
use ghstats::config::loader::{TOKEN_ENV, load_config};
use ghstats::config::{AppConfig, LogFormat, RepoConfig};
use ghstats::usecases::{CollectOptions, collect_all, fetch_releases, summarize};

#[derive(Debug, Parser)]
#[command(name = "ghstats", version, about = "Collect and query GitHub repository traffic")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Fetch traffic for the configured repositories and upsert it.
    Collect {
        /// Only collect these repositories (by name). Repeatable.
        #[arg(short = 'r', long = "repo")]
        repos: Vec<String>,
        /// List what would be collected without calling the API.
        #[arg(long)]
        dry_run: bool,
    },
    /// Print per-repository totals over a trailing window.
    Show {
        #[arg(short = 'r', long = "repo")]
        repo: Option<String>,
        /// Trailing window in days.
        #[arg(short, long, default_value_t = 30)]
        days: u32,
    },
    /// Dump the whole store as CSV or JSON.
    Export {
        #[arg(short, long, value_enum)]
        format: ExportFormat,
        /// Output file; stdout when omitted.
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// List published releases.
    Releases {
        #[arg(short = 'r', long = "repo")]
        repo: Option<String>,
    },
    /// List configured repositories.
    List,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum ExportFormat {
    Csv,
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── 1. Load configuration ───────────────────────────────
    let config = load_config(&cli.config).context("Failed to load configuration")?;

    // ── 2. Initialize logging ───────────────────────────────
    // Nothing before this point can log; load errors surface through `?`.
    init_tracing(&config);

    info!(
        config = %cli.config.display(),
        repos = config.repo_entries.len(),
        data_dir = %config.storage.data_dir.display(),
        "Configuration loaded successfully"
    );
    info!(version = env!("CARGO_PKG_VERSION"), "Starting ghstats");

    // ── 3. Dispatch ─────────────────────────────────────────
    match cli.command {
        Command::Collect { repos, dry_run } => run_collect(&config, &repos, dry_run).await,
        Command::Show { repo, days } => run_show(&config, repo, days),
        Command::Export { format, output } => run_export(&config, format, output),
        Command::Releases { repo } => run_releases(&config, repo).await,
        Command::List => {
            run_list(&config);
            Ok(())
        }
    }
}

fn init_tracing(config: &AppConfig) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.pretty().init(),
    }
}

/// Token from env or config, required for any API call.
fn resolve_token(config: &AppConfig) -> Result<String> {
    config
        .github
        .token
        .clone()
        .filter(|t| !t.trim().is_empty())
        .with_context(|| format!("No GitHub token: set {TOKEN_ENV} or github.token"))
}

fn open_store(config: &AppConfig) -> Result<StatsStore> {
    let compression = Compression::parse(&config.storage.compression)
        .with_context(|| format!("Unknown compression {:?}", config.storage.compression))?;
    Ok(StatsStore::new(config.stats_path()).with_compression(compression))
}

/// Configured repositories, narrowed to `names` when any are given.
fn select_repos(config: &AppConfig, names: &[String]) -> Result<Vec<RepoConfig>> {
    let all = config.repos();
    if names.is_empty() {
        return Ok(all);
    }
    for name in names {
        if !all.iter().any(|r| &r.name == name) {
            bail!("Repository {name:?} is not configured");
        }
    }
    Ok(all.into_iter().filter(|r| names.contains(&r.name)).collect())
}

async fn run_collect(config: &AppConfig, names: &[String], dry_run: bool) -> Result<()> {
    let repos = select_repos(config, names)?;
    let store = open_store(config)?;
    let options = CollectOptions {
        concurrency: config.collect.concurrency,
        dry_run,
    };

    // A dry run opens a session but never sends a request.
    let token = if dry_run {
        config.github.token.clone().unwrap_or_default()
    } else {
        resolve_token(config)?
    };

    let metrics = Arc::new(CollectorMetrics::new()?);
    let client = GitHubClient::new(token, config.client_config()).with_metrics(Arc::clone(&metrics));

    let summary = client
        .scoped(async |session: &GitHubSession| {
            collect_all(session, &repos, &store, options, Some(&metrics)).await
        })
        .await?;

    if dry_run {
        println!("Dry run: {} repositories would be collected", summary.repos_total);
        return Ok(());
    }

    if let Some(path) = &config.collect.metrics_file {
        metrics.write_textfile(path)?;
    }

    println!(
        "Collected {} records from {}/{} repositories",
        summary.records_stored,
        summary.repos_total - summary.repos_failed,
        summary.repos_total
    );

    if summary.repos_total > 0 && summary.repos_failed == summary.repos_total {
        bail!("Every repository failed to collect");
    }
    Ok(())
}

fn run_show(config: &AppConfig, repo: Option<String>, days: u32) -> Result<()> {
    let store = open_store(config)?;
    let since = Utc::now().date_naive() - Duration::days(i64::from(days));
    let mut filter = StatsFilter::default().since(since);
    if let Some(name) = repo {
        filter = filter.repo(name);
    }

    let frame = store.get_stats(&filter)?;
    if frame.is_empty() {
        println!("No traffic recorded in the last {days} days");
        return Ok(());
    }

    let mut out = io::stdout().lock();
    writeln!(
        out,
        "{:<40} {:>5} {:>10} {:>10} {:>10} {:>10} {:>8} {:>8}",
        "repository", "days", "views", "uniq", "clones", "uniq", "stars", "forks"
    )?;
    for s in summarize(&frame) {
        writeln!(
            out,
            "{:<40} {:>5} {:>10} {:>10} {:>10} {:>10} {:>8} {:>8}",
            format!("{}/{}", s.repo_owner, s.repo_name),
            s.days,
            s.views_total,
            s.views_unique,
            s.clones_total,
            s.clones_unique,
            s.stars.map_or_else(|| "-".to_string(), |v| v.to_string()),
            s.forks.map_or_else(|| "-".to_string(), |v| v.to_string()),
        )?;
    }
    Ok(())
}

fn run_export(config: &AppConfig, format: ExportFormat, output: Option<PathBuf>) -> Result<()> {
    let frame = open_store(config)?.read()?;

    match output {
        Some(path) => {
            let file = File::create(&path)
                .with_context(|| format!("Failed to create {}", path.display()))?;
            write_frame(&frame, format, BufWriter::new(file))?;
            info!(path = %path.display(), rows = frame.len(), "Export written");
        }
        None => write_frame(&frame, format, io::stdout().lock())?,
    }
    Ok(())
}

fn write_frame<W: Write>(frame: &TrafficFrame, format: ExportFormat, mut writer: W) -> Result<()> {
    match format {
        ExportFormat::Csv => frame.write_csv(&mut writer)?,
        ExportFormat::Json => frame.write_json(&mut writer)?,
    }
    writer.flush()?;
    Ok(())
}

async fn run_releases(config: &AppConfig, repo: Option<String>) -> Result<()> {
    let names: Vec<String> = repo.into_iter().collect();
    let repos = select_repos(config, &names)?;
    let client = GitHubClient::new(resolve_token(config)?, config.client_config());

    let releases = client
        .scoped(async |session: &GitHubSession| {
            anyhow::Ok(fetch_releases(session, &repos).await)
        })
        .await?;

    for (name, list) in releases {
        println!("{name}");
        for release in list {
            println!(
                "  {}  {}  {}",
                release.published_at,
                release.tag_name,
                release.name
            );
        }
    }
    Ok(())
}

fn run_list(config: &AppConfig) {
    for repo in config.repos() {
        match &repo.docs_url {
            Some(url) => println!("{}  {url}", repo.full_name()),
            None => println!("{}", repo.full_name()),
        }
    }
}
