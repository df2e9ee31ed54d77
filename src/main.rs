//! Repo-Sift main entry point
//!
//! This is the command-line interface for the Repo-Sift incremental
//! repository crawler.

use anyhow::Context;
use clap::Parser;
use repo_sift::config::load_config;
use repo_sift::crawler::CancelFlag;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Repo-Sift: an incremental repository file-search crawler
///
/// Repo-Sift searches a fixed list of repositories for a named manifest
/// file, caching every outcome on disk so interrupted crawls resume where
/// they left off. Matched files are downloaded in a separate resumable
/// pass and analyzed into tab-separated reports.
#[derive(Parser, Debug)]
#[command(name = "repo-sift")]
#[command(version = "1.0.0")]
#[command(about = "An incremental repository file-search crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Download matched files for cached outcomes instead of searching
    #[arg(long, conflicts_with_all = ["report", "stats", "dry_run"])]
    download: bool,

    /// Generate TSV reports from the cache and exit
    #[arg(long, conflicts_with_all = ["download", "stats", "dry_run"])]
    report: bool,

    /// Show statistics from the cache and exit
    #[arg(long, conflicts_with_all = ["download", "report", "dry_run"])]
    stats: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long, conflicts_with_all = ["download", "report", "stats"])]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let config = load_config(&cli.config)
        .with_context(|| format!("failed to load configuration from {}", cli.config.display()))?;

    // Handle different modes
    if cli.dry_run {
        handle_dry_run(&config)?;
    } else if cli.stats {
        handle_stats(&config)?;
    } else if cli.report {
        handle_report(&config)?;
    } else if cli.download {
        handle_download(config).await?;
    } else {
        handle_crawl(config).await?;
    }

    Ok(())
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("repo_sift=info,warn"),
            1 => EnvFilter::new("repo_sift=debug,info"),
            2 => EnvFilter::new("repo_sift=trace,debug"),
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

/// Creates a cancellation flag wired to Ctrl-C.
fn cancel_on_ctrl_c() -> CancelFlag {
    let cancel = CancelFlag::new();
    let flag = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Cancellation requested, finishing in-flight repositories");
            flag.cancel();
        }
    });
    cancel
}

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &repo_sift::Config) -> anyhow::Result<()> {
    use repo_sift::repo::load_candidate_list;
    use std::path::Path;

    println!("=== Repo-Sift Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Search filename: {}", config.crawler.search_filename);
    println!(
        "  Max concurrent searches: {}",
        config.crawler.max_concurrent_searches
    );
    println!("  Max retry attempts: {}", config.crawler.max_retry_attempts);
    println!(
        "  Retry base delay: {}ms",
        config.crawler.retry_base_delay_ms
    );
    println!("  Results per page: {}", config.crawler.results_per_page);

    println!("\nRemote API:");
    println!("  API base URL: {}", config.api.api_base_url);
    println!("  Raw base URL: {}", config.api.raw_base_url);
    match config.api.resolve_token() {
        Some(_) => println!("  Credentials: access token found"),
        None => println!("  Credentials: none (unauthenticated mode)"),
    }

    println!("\nStorage:");
    println!("  Cache root: {}", config.storage.root);
    println!("  Candidate list: {}", config.storage.repo_list);

    println!("\nReport:");
    println!("  Stats file: {}", config.report.stats_path);
    println!("  Properties file: {}", config.report.properties_path);
    println!("  Flagged owners: {}", config.report.flagged_owners.len());

    let candidates = load_candidate_list(Path::new(&config.storage.repo_list))
        .context("failed to load candidate list")?;

    println!("\n✓ Configuration is valid");
    println!("✓ Would crawl {} candidate repositories", candidates.len());

    Ok(())
}

/// Handles the --stats mode: shows statistics from the cache
fn handle_stats(config: &repo_sift::Config) -> anyhow::Result<()> {
    use repo_sift::repo::load_candidate_list;
    use repo_sift::report::{load_statistics, print_statistics};
    use repo_sift::FsStore;
    use std::path::Path;

    println!("Cache root: {}\n", config.storage.root);

    let store = FsStore::new(&config.storage.root);
    let candidates = load_candidate_list(Path::new(&config.storage.repo_list))
        .context("failed to load candidate list")?;

    let stats = load_statistics(&store, &candidates)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles the --report mode: generates TSV reports from the cache
fn handle_report(config: &repo_sift::Config) -> anyhow::Result<()> {
    use repo_sift::report::{generate_report, print_statistics};
    use repo_sift::FsStore;

    println!("=== Generating Analysis Report ===\n");
    println!("Cache root: {}", config.storage.root);
    println!("Stats file: {}", config.report.stats_path);
    println!("Properties file: {}", config.report.properties_path);
    println!();

    let store = FsStore::new(&config.storage.root);
    let stats = generate_report(config, &store)?;
    print_statistics(&stats);

    println!("\n✓ Report exported to: {}", config.report.stats_path);

    Ok(())
}

/// Handles the --download mode: fetches matched files for cached outcomes
async fn handle_download(config: repo_sift::Config) -> anyhow::Result<()> {
    let cancel = cancel_on_ctrl_c();

    match repo_sift::crawler::download(config, cancel).await {
        Ok(totals) => {
            tracing::info!(
                "Download pass completed: {} fetched, {} already cached, {} failed",
                totals.downloaded,
                totals.cached,
                totals.failed
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Download pass failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles the main crawl operation
async fn handle_crawl(config: repo_sift::Config) -> anyhow::Result<()> {
    tracing::info!("Starting crawl (will resume from cached outcomes)");

    let cancel = cancel_on_ctrl_c();

    match repo_sift::crawler::crawl(config, cancel).await {
        Ok(totals) => {
            tracing::info!(
                "Crawl completed: {} resolved, {} skipped, {} renames, {} degraded",
                totals.resolved,
                totals.skipped,
                totals.renames,
                totals.degraded
            );
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
