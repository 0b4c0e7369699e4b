//! Linkscout main entry point
//!
//! This is the command-line interface for the Linkscout crawler.

use anyhow::Context;
use clap::Parser;
use linkscout::config::{load_config_with_hash, Config};
use linkscout::crawler::{crawl, Frontier, PriorityPolicy, RunOptions};
use linkscout::output::{load_statistics, print_report, print_statistics};
use linkscout::storage::{lock_storage, open_storage};
use linkscout::{FrontierStatus, Normalizer};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Linkscout: a priority-ordered, resumable news crawler
///
/// Linkscout crawls a site from its seed URLs, counts how often a search
/// term appears in each article and records which of those mentions already
/// carry a link.
#[derive(Parser, Debug)]
#[command(name = "linkscout")]
#[command(version)]
#[command(about = "A priority-ordered, resumable news crawler", long_about = None)]
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

    /// Clear the frontier before seeding; stored records are kept
    #[arg(long)]
    fresh: bool,

    /// Validate config and show what would be crawled without actually crawling
    #[arg(long, conflicts_with_all = ["stats", "requeue_errors", "recover_stale"])]
    dry_run: bool,

    /// Show statistics from the database and exit
    #[arg(long, conflicts_with_all = ["dry_run", "requeue_errors", "recover_stale"])]
    stats: bool,

    /// Move every errored URL back to pending and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "recover_stale"])]
    requeue_errors: bool,

    /// Move URLs left in progress by a crashed crawler back to pending and exit
    #[arg(long, conflicts_with_all = ["dry_run", "stats", "requeue_errors"])]
    recover_stale: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = load_config_with_hash(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    if cli.dry_run {
        handle_dry_run(&config)
    } else if cli.stats {
        handle_stats(&config)
    } else if cli.requeue_errors {
        handle_requeue(&config, FrontierStatus::Error)
    } else if cli.recover_stale {
        handle_requeue(&config, FrontierStatus::InProgress)
    } else {
        handle_crawl(config, cli.fresh, config_hash).await
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("linkscout=info,warn"),
            1 => EnvFilter::new("linkscout=debug,info"),
            2 => EnvFilter::new("linkscout=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be crawled
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Linkscout Dry Run ===\n");

    let crawler = &config.crawler;
    println!("Crawler Configuration:");
    println!("  URL limit: {}", crawler.url_limit);
    println!("  Batch size: {}", crawler.batch_size);
    println!("  Concurrent tasks: {}", crawler.concurrent_tasks);
    println!("  Request timeout: {}ms", crawler.request_timeout);
    println!("  Max redirects: {}", crawler.max_redirects);
    println!(
        "  Attempts: {} (backoff {}ms..{}ms)",
        crawler.max_attempts, crawler.retry_base_delay, crawler.retry_max_delay
    );
    match crawler.max_depth {
        Some(depth) => println!("  Max depth: {}", depth),
        None => println!("  Max depth: unlimited"),
    }
    println!("  Respect robots.txt: {}", crawler.respect_robots);

    println!("\nUser Agent:");
    println!("  Name: {}", config.user_agent.crawler_name);
    println!("  Version: {}", config.user_agent.crawler_version);
    println!("  Contact URL: {}", config.user_agent.contact_url);
    println!("  Contact Email: {}", config.user_agent.contact_email);

    println!("\nExtraction:");
    println!("  Search string: {:?}", config.extract.search_string);
    println!("  Content selector: {}", config.extract.content_selector);
    println!("  Skipped tags: {}", config.extract.skip_tags.join(", "));

    println!("\nOutput:");
    println!("  Database: {}", config.output.database_path);
    println!("  Flush size: {}", config.output.flush_size);
    println!("  On conflict: {:?}", config.output.on_conflict);

    println!("\nAllowed Hosts ({}):", config.scope.allowed_hosts.len());
    for host in &config.scope.allowed_hosts {
        println!("  - {}", host);
    }
    if !config.scope.denied_hosts.is_empty() {
        println!("\nDenied Hosts ({}):", config.scope.denied_hosts.len());
        for host in &config.scope.denied_hosts {
            println!("  - {}", host);
        }
    }

    let normalizer = Normalizer::from_config(&config.scope);
    let policy = PriorityPolicy::from_config(&config.priority);
    println!("\nSeeds ({}):", config.scope.seeds.len());
    for seed in &config.scope.seeds {
        let canonical = normalizer
            .normalize(seed, None)
            .with_context(|| format!("seed {} is not crawlable", seed))?;
        println!(
            "  * {} (priority {})",
            canonical,
            policy.priority(canonical.as_url())
        );
    }

    println!("\n✓ Configuration is valid");
    Ok(())
}

/// Handles the --stats mode: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    println!("Database: {}\n", config.output.database_path);

    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open the database")?;
    let stats = {
        let guard = lock_storage(&storage)?;
        load_statistics(&*guard)?
    };

    print_statistics(&stats);
    Ok(())
}

/// Handles --requeue-errors and --recover-stale
fn handle_requeue(config: &Config, from: FrontierStatus) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.output.database_path))
        .context("failed to open the database")?;
    let frontier = Frontier::new(storage, PriorityPolicy::from_config(&config.priority));

    let moved = frontier.requeue(from)?;
    println!("✓ Moved {} {} URLs back to pending", moved, from);
    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, fresh: bool, config_hash: String) -> anyhow::Result<()> {
    if fresh {
        tracing::info!("Starting fresh crawl (frontier will be cleared)");
    } else {
        tracing::info!("Starting crawl (resuming any pending frontier)");
    }
    tracing::info!(
        "Seeds: {}, allowed hosts: {}, URL limit: {}",
        config.scope.seeds.len(),
        config.scope.allowed_hosts.len(),
        config.crawler.url_limit
    );

    let options = RunOptions {
        fresh,
        config_hash: Some(config_hash),
    };
    let report = crawl(config, options).await.context("crawl failed")?;

    print_report(&report);
    Ok(())
}
