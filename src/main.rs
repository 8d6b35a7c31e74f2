//! MX-Harvest main entry point
//!
//! This is the command-line interface for the MX-Harvest directory harvester.

use clap::Parser;
use mx_harvest::config::{load_config_with_hash, resolve_targets, Config};
use mx_harvest::egress::profiles_from_config;
use mx_harvest::output::{load_log_statistics, print_log_statistics, print_run_summary};
use mx_harvest::{Harvester, HarvestError};
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use tracing_subscriber::EnvFilter;

/// MX-Harvest: a quota-driven directory harvester
///
/// MX-Harvest walks paginated business directories through a rotating set of
/// egress profiles and keeps the company domains whose mail is routed through
/// a known provider family.
#[derive(Parser, Debug)]
#[command(name = "mx-harvest")]
#[command(version)]
#[command(about = "A quota-driven directory harvester", long_about = None)]
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

    /// Validate config and show what would be harvested without fetching anything
    #[arg(long, conflicts_with = "stats")]
    dry_run: bool,

    /// Show statistics from the dedup and accepted logs and exit
    #[arg(long, conflicts_with = "dry_run")]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    // Load and validate configuration
    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok((cfg, hash)) => {
            tracing::info!("Configuration loaded successfully (hash: {})", hash);
            (cfg, hash)
        }
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    if cli.stats {
        handle_stats(&config)?;
    } else if cli.dry_run {
        handle_dry_run(&config)?;
    } else {
        handle_harvest(config, config_hash).await?;
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
            0 => EnvFilter::new("mx_harvest=info,warn"),
            1 => EnvFilter::new("mx_harvest=debug,info"),
            2 => EnvFilter::new("mx_harvest=trace,debug"),
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

/// Handles the --dry-run mode: validates config and shows what would be harvested
fn handle_dry_run(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let targets = resolve_targets(config)?;

    println!("=== MX-Harvest Dry Run ===\n");

    println!("Crawler Configuration:");
    println!("  Max pages: {}", config.crawler.max_pages);
    println!("  Retry budget: {}", config.crawler.retry_budget);
    println!("  Page timeout: {}s", config.crawler.page_timeout_secs);
    println!("  Entity path pattern: {}", config.crawler.entity_path_pattern);
    println!("  Website selector: {}", config.crawler.website_selector);

    println!("\nClassifier:");
    println!("  DNS timeout: {}s", config.classifier.dns_timeout_secs);
    println!(
        "  Concurrent lookups: {}",
        config.classifier.max_concurrent_lookups
    );
    println!(
        "  Affiliate patterns: {}",
        config.classifier.affiliate_patterns.len()
    );

    let profiles = profiles_from_config(&config.egress);
    println!(
        "\nEgress ({}, {} profiles):",
        config.egress.provider,
        profiles.len()
    );
    for profile in &profiles {
        println!("  - {} ({})", profile.name, profile.locator);
    }

    println!("\nOutput:");
    println!(
        "  Dedup log: {} ({:?})",
        config.output.dedup_log_path, config.output.dedup_backend
    );
    println!("  Accepted log: {}", config.output.accepted_log_path);
    println!("  Report: {}", config.output.report_path);

    println!("\nTargets ({}):", targets.len());
    for target in &targets {
        println!(
            "  - {} (quota {}, from page {})",
            target.label(),
            target.quota,
            target.start_page
        );
    }

    if targets.is_empty() {
        return Err(HarvestError::NoTargets.into());
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would harvest {} domains across {} targets",
        targets.iter().map(|t| t.quota as u64).sum::<u64>(),
        targets.len()
    );

    Ok(())
}

/// Handles the --stats mode: shows statistics from the history logs
fn handle_stats(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let stats = load_log_statistics(&config.output)?;
    print_log_statistics(&stats);

    Ok(())
}

/// Handles the main harvest run
async fn handle_harvest(
    config: Config,
    config_hash: String,
) -> Result<(), Box<dyn std::error::Error>> {
    let targets = resolve_targets(&config)?;
    if targets.is_empty() {
        let e = HarvestError::NoTargets;
        tracing::error!("{}", e);
        return Err(e.into());
    }

    let harvester = Harvester::new(config, config_hash)?;

    // Stop at the next page boundary on Ctrl-C
    let stop = harvester.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, stopping after the current page");
            stop.store(true, Ordering::SeqCst);
        }
    });

    match harvester.run(targets).await {
        Ok(report) => {
            print_run_summary(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Harvest failed: {}", e);
            Err(e.into())
        }
    }
}
