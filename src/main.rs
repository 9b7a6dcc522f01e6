//! Pagepack main entry point
//!
//! This is the command-line interface for the Pagepack web archiver.

use anyhow::Context;
use clap::Parser;
use pagepack::archive::{default_archive_name, write_bundle};
use pagepack::config::{load_tuning, Tuning};
use pagepack::crawler::run_crawl;
use pagepack::fetch::build_http_client;
use pagepack::{normalize_url, CrawlBudget, CrawlOptions};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use url::Url;

/// Pagepack: archive a web site into a single replayable bundle
///
/// Pagepack crawls a site breadth-first within a page/depth budget,
/// localizes every referenced asset, rewrites all references to point at
/// the local copies, and packs the result plus a manifest into one
/// `.page` archive.
#[derive(Parser, Debug)]
#[command(name = "pagepack")]
#[command(version)]
#[command(about = "Archive a web site into a single replayable bundle", long_about = None)]
struct Cli {
    /// Entry URL to archive
    #[arg(value_name = "URL", required_unless_present = "url_file")]
    url: Option<String>,

    /// Read entry URLs from a file, one per line (# starts a comment)
    #[arg(long, value_name = "FILE", conflicts_with = "url")]
    url_file: Option<PathBuf>,

    /// Output directory for the archive(s)
    #[arg(short, long, value_name = "DIR", default_value = ".")]
    output: PathBuf,

    /// Maximum number of HTML pages to fetch
    #[arg(long, value_name = "N", default_value_t = 20)]
    max_pages: u32,

    /// Maximum link depth from the entry page
    #[arg(long, value_name = "N", default_value_t = 1)]
    max_depth: u32,

    /// Do not fetch assets (images, stylesheets, scripts, fonts)
    #[arg(long)]
    skip_assets: bool,

    /// Path to an optional TOML tuning file
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    if cli.max_pages == 0 {
        anyhow::bail!("--max-pages must be at least 1");
    }

    let tuning = match &cli.config {
        Some(path) => {
            tracing::info!("Loading tuning from: {}", path.display());
            load_tuning(path)?
        }
        None => Tuning::default(),
    };

    let options = CrawlOptions {
        budget: CrawlBudget {
            max_pages: cli.max_pages,
            max_depth: cli.max_depth,
        },
        skip_assets: cli.skip_assets,
        tuning,
    };

    let entries = collect_entries(&cli)?;
    let client = build_http_client(&options.tuning)?;
    let browser = launch_browser(&options).await;

    let mut failures = 0usize;
    for entry in &entries {
        tracing::info!("Archiving {}", entry);
        let output = cli.output.join(default_archive_name(entry));

        match run_crawl(entry, &options, &client, browser.clone()).await {
            Ok(outcome) => {
                write_bundle(&output, &outcome, &options)?;
                println!("{} -> {}", entry, output.display());
            }
            Err(e) => {
                tracing::error!("Failed to archive {}: {}", entry, e);
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{} of {} archive(s) failed", failures, entries.len());
    }
    Ok(())
}

/// Resolves the entry URL(s) from the command line
fn collect_entries(cli: &Cli) -> anyhow::Result<Vec<Url>> {
    let raw: Vec<String> = if let Some(path) = &cli.url_file {
        std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(str::to_string)
            .collect()
    } else {
        cli.url.iter().cloned().collect()
    };

    if raw.is_empty() {
        anyhow::bail!("no entry URLs given");
    }

    let mut entries = Vec::with_capacity(raw.len());
    for r in &raw {
        entries.push(normalize_url(r, None)?);
    }
    Ok(entries)
}

/// Launches the headless-browser fallback when it is compiled in
#[cfg(feature = "browser")]
async fn launch_browser(
    options: &CrawlOptions,
) -> Option<Arc<dyn pagepack::browser::BrowserBackend>> {
    use std::time::Duration;

    match pagepack::browser::ChromiumBackend::launch(Duration::from_secs(
        options.tuning.fetch.timeout_secs,
    ))
    .await
    {
        Ok(backend) => Some(Arc::new(backend)),
        Err(e) => {
            tracing::warn!("Browser fallback unavailable: {}", e);
            None
        }
    }
}

#[cfg(not(feature = "browser"))]
async fn launch_browser(
    _options: &CrawlOptions,
) -> Option<Arc<dyn pagepack::browser::BrowserBackend>> {
    None
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("pagepack=info,warn"),
            1 => EnvFilter::new("pagepack=debug,info"),
            2 => EnvFilter::new("pagepack=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}
