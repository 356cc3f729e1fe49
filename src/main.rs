//! Shelf-Sweep main entry point
//!
//! This is the command-line interface for the Shelf-Sweep product harvester.

use anyhow::Context;
use clap::Parser;
use shelf_sweep::config::{resolve_config, Config, Overrides};
use shelf_sweep::crawler::Coordinator;
use shelf_sweep::output::print_statistics;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Shelf-Sweep: a partitioned product-catalog harvester
///
/// Shelf-Sweep walks a storefront's sitemap index, processes only the slice
/// of leaf sitemaps given by --offset/--count, and writes one CSV row per
/// product variant. Many runs with disjoint slices can cover a site in
/// parallel.
#[derive(Parser, Debug)]
#[command(name = "shelf-sweep")]
#[command(version = "1.0.0")]
#[command(about = "A partitioned product-catalog harvester", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Site base URL
    #[arg(long, env = "CURR_URL")]
    base_url: Option<String>,

    /// Index of the first leaf sitemap this run processes
    #[arg(long, env = "SITEMAP_OFFSET")]
    offset: Option<usize>,

    /// Number of leaf sitemaps to process (0 = through the end)
    #[arg(long, env = "MAX_SITEMAPS")]
    count: Option<usize>,

    /// Maximum product URLs taken from each sitemap (0 = no cap)
    #[arg(long, env = "MAX_URLS_PER_SITEMAP")]
    max_urls: Option<usize>,

    /// Directory the CSV file is written to
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Concurrent page extractions within a sitemap
    #[arg(long)]
    workers: Option<usize>,

    /// Keep every sitemap URL instead of only product-like paths
    #[arg(long)]
    no_filter: bool,

    /// Validate config and show the partition plan without fetching anything
    #[arg(long)]
    dry_run: bool,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            base_url: self.base_url.clone(),
            offset: self.offset,
            count: self.count,
            max_urls_per_sitemap: self.max_urls,
            output_dir: self.output_dir.clone(),
            workers: self.workers,
            no_filter: self.no_filter,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load, merge and validate configuration
    if let Some(path) = &cli.config {
        tracing::info!("Loading configuration from: {}", path.display());
    }
    let (config, config_hash) =
        resolve_config(cli.config.as_deref(), &cli.overrides()).context("Invalid configuration")?;
    if let Some(hash) = &config_hash {
        tracing::info!("Configuration loaded successfully (hash: {})", hash);
    }

    if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_harvest(config).await?;
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
            0 => EnvFilter::new("shelf_sweep=info,warn"),
            1 => EnvFilter::new("shelf_sweep=debug,info"),
            2 => EnvFilter::new("shelf_sweep=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows the partition plan
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    let index_url = config.sitemap_index_url().context("Invalid sitemap index URL")?;

    println!("=== Shelf-Sweep Dry Run ===\n");

    println!("Site:");
    println!("  Base URL: {}", config.site.base_url);
    println!("  Sitemap index: {}", index_url);
    match config.product_filter() {
        Some(paths) => println!("  Product paths: {}", paths.join(", ")),
        None => println!("  Product paths: (filter disabled)"),
    }

    println!("\nPartition:");
    println!(
        "  Sitemaps: {}",
        shelf_sweep::Partition::from_config(&config.partition)
    );
    match config.partition.max_urls_per_sitemap {
        0 => println!("  URLs per sitemap: unlimited"),
        cap => println!("  URLs per sitemap: {}", cap),
    }

    println!("\nTransport:");
    println!("  Max attempts: {}", config.transport.max_attempts);
    println!(
        "  Backoff: {}ms base, {}ms cap, {}ms jitter",
        config.transport.backoff_base_ms, config.transport.backoff_cap_ms, config.transport.jitter_ms
    );
    println!("  Requests/sec: {}", config.transport.requests_per_second);
    println!(
        "  Browser escalation: {}",
        if config.transport.escalate { "on" } else { "off" }
    );
    println!("  Workers: {}", config.crawler.workers);

    println!("\nOutput:");
    println!("  File: {}", config.output_path().display());

    println!("\n✓ Configuration is valid");

    Ok(())
}

/// Handles the main harvest operation
async fn handle_harvest(config: Config) -> anyhow::Result<()> {
    let coordinator = Coordinator::new(config).context("Failed to initialize harvester")?;

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping the run");
            signal_token.cancel();
        }
    });

    tracing::info!(
        "Harvesting {} (partition {})",
        coordinator.index_url(),
        coordinator.partition()
    );

    match coordinator.run(cancel).await {
        Ok(stats) => {
            print_statistics(&stats);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e).context("Harvest aborted")
        }
    }
}
