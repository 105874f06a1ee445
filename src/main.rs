//! site2graph main entry point
//!
//! This is the command-line interface for the site2graph crawler. Events go to
//! stdout (or the configured output file); logs always go to stderr.

use clap::Parser;
use site2graph::config::{load_config_with_hash, validate, Config, OutputFormat};
use site2graph::crawler::run_crawl;
use site2graph::output::{load_statistics, print_statistics};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// site2graph: map the link graph of a single web site
///
/// Crawls from a start URL, follows in-scope links, and emits one event per
/// response, header set, page metadata record, link, and transport error.
#[derive(Parser, Debug)]
#[command(name = "site2graph")]
#[command(version)]
#[command(about = "Map the link graph of a single web site", long_about = None)]
struct Cli {
    /// URL to start crawling from (overrides scope.start-url)
    #[arg(value_name = "START_URL")]
    start_url: Option<String>,

    /// Path to TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Follow only URLs matching this pattern (anchored at the start)
    #[arg(long, value_name = "RE")]
    include_url_re: Option<String>,

    /// Never follow URLs matching this pattern (anchored at the start)
    #[arg(long, value_name = "RE")]
    exclude_url_re: Option<String>,

    /// Output path, "-" for stdout
    #[arg(short, long, value_name = "PATH")]
    output: Option<String>,

    /// Output format
    #[arg(long, value_enum)]
    format: Option<OutputFormat>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Validate config and show the effective settings without crawling
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from a SQLite output file and exit
    #[arg(long, value_name = "DB", conflicts_with = "dry_run")]
    stats: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Some(db) = &cli.stats {
        return handle_stats(db);
    }

    // Load configuration, then layer command-line overrides on top
    let (mut config, config_hash) = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            match load_config_with_hash(path) {
                Ok((cfg, hash)) => {
                    tracing::info!("Configuration loaded successfully (hash: {})", hash);
                    (cfg, Some(hash))
                }
                Err(e) => {
                    tracing::error!("Failed to load configuration: {}", e);
                    return Err(e.into());
                }
            }
        }
        None => (Config::default(), None),
    };
    apply_overrides(&mut config, &cli);

    if let Err(e) = validate(&config) {
        tracing::error!("Invalid configuration: {}", e);
        return Err(e.into());
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(&config, config_hash.as_deref()).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("site2graph=info,warn"),
            1 => EnvFilter::new("site2graph=debug,info"),
            2 => EnvFilter::new("site2graph=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(url) = &cli.start_url {
        config.scope.start_url = Some(url.clone());
    }
    if let Some(re) = &cli.include_url_re {
        config.scope.include_url_re = Some(re.clone());
    }
    if let Some(re) = &cli.exclude_url_re {
        config.scope.exclude_url_re = Some(re.clone());
    }
    if let Some(path) = &cli.output {
        config.output.path = path.clone();
    }
    if let Some(format) = cli.format {
        config.output.format = format;
    }
}

/// Handles the --dry-run mode: shows the effective settings
fn handle_dry_run(config: &Config) {
    println!("=== site2graph Dry Run ===\n");

    println!("Scope:");
    println!("  Start URL: {}", config.start_url().unwrap_or("-"));
    println!(
        "  Include pattern: {}",
        config.scope.include_url_re.as_deref().unwrap_or("(same origin)")
    );
    println!(
        "  Exclude pattern: {}",
        config.scope.exclude_url_re.as_deref().unwrap_or("(none)")
    );

    println!("\nFetcher:");
    println!("  User agent: {}", config.fetcher.user_agent);
    println!("  Request timeout: {}s", config.fetcher.request_timeout);
    println!("  Connect timeout: {}s", config.fetcher.connect_timeout);
    println!("  Max redirects: {}", config.fetcher.max_redirects);
    println!("  Retry times: {}", config.fetcher.retry_times);

    println!("\nScheduler:");
    println!(
        "  Max concurrent requests: {}",
        config.scheduler.max_concurrent_requests
    );
    match config.scheduler.max_depth {
        0 => println!("  Max depth: unlimited"),
        depth => println!("  Max depth: {}", depth),
    }
    println!("  Max URL length: {}", config.scheduler.max_url_length);
    println!("  Download delay: {}ms", config.scheduler.download_delay);

    println!("\nOutput:");
    println!("  Format: {:?}", config.output.format);
    println!("  Path: {}", config.output.path);

    println!("\n✓ Configuration is valid");
}

/// Handles the --stats mode: shows statistics from a SQLite output file
fn handle_stats(db: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if !db.exists() {
        return Err(format!("database not found: {}", db.display()).into());
    }

    println!("Database: {}\n", db.display());

    let (run, stats) = load_statistics(db)?;

    println!("Run {} ({})", run.id, run.start_url);
    println!("  Started: {}", run.started_at);
    println!(
        "  Finished: {}",
        run.finished_at.as_deref().unwrap_or("(interrupted)")
    );
    if let Some(hash) = &run.config_hash {
        println!("  Config hash: {}", hash);
    }
    println!();

    print_statistics(&stats);

    Ok(())
}

/// Handles the main crawl operation
async fn handle_crawl(
    config: &Config,
    config_hash: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    tracing::info!(
        "Crawling {} (max {} concurrent requests)",
        config.start_url().unwrap_or_default(),
        config.scheduler.max_concurrent_requests
    );

    match run_crawl(config, config_hash).await {
        Ok(_) => {
            tracing::info!("Crawl completed successfully");
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}
