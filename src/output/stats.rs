//! Console statistics
//!
//! This module prints the end-of-run summary, and the `--stats` view computed
//! from the dedup log and the accepted-domain log without crawling.

use crate::config::{DedupBackend, OutputConfig};
use crate::output::report::{ProfileStatus, RunReport, TargetOutcome};
use crate::storage::{open_domain_log, SqliteDomainLog};
use crate::Result;
use std::collections::HashSet;
use std::path::Path;

/// Statistics over the harvest history files
#[derive(Debug, Clone, Default)]
pub struct LogStatistics {
    /// Description of the dedup log
    pub dedup_log: String,

    /// Domains ever submitted for classification
    pub known_domains: u64,

    /// Lines in the accepted-domain log
    pub accepted_lines: u64,

    /// Distinct domains in the accepted-domain log
    pub accepted_unique: u64,

    /// Most recently recorded domains (SQLite backend only)
    pub recent: Vec<(String, String)>,
}

/// Loads statistics from the configured logs
///
/// Missing files count as empty.
pub fn load_log_statistics(config: &OutputConfig) -> Result<LogStatistics> {
    let mut stats = LogStatistics::default();

    let dedup_path = Path::new(&config.dedup_log_path);
    if dedup_path.exists() {
        let log = open_domain_log(config.dedup_backend, dedup_path)?;
        let unique: HashSet<String> = log.load_domains()?.into_iter().collect();
        stats.known_domains = unique.len() as u64;
        stats.dedup_log = log.describe();

        if config.dedup_backend == DedupBackend::Sqlite {
            stats.recent = SqliteDomainLog::open(dedup_path)?.recent_domains(10)?;
        }
    } else {
        stats.dedup_log = format!("{} (missing)", config.dedup_log_path);
    }

    let accepted_path = Path::new(&config.accepted_log_path);
    if accepted_path.exists() {
        let content = std::fs::read_to_string(accepted_path)?;
        let lines: Vec<&str> = content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .collect();
        stats.accepted_lines = lines.len() as u64;
        stats.accepted_unique = lines.iter().collect::<HashSet<_>>().len() as u64;
    }

    Ok(stats)
}

/// Prints log statistics to stdout
pub fn print_log_statistics(stats: &LogStatistics) {
    println!("=== Harvest Statistics ===\n");

    println!("Dedup log: {}", stats.dedup_log);
    println!("  Known domains: {}", stats.known_domains);
    println!();

    println!("Accepted domains:");
    println!("  Lines: {}", stats.accepted_lines);
    println!("  Unique: {}", stats.accepted_unique);

    let acceptance = if stats.known_domains > 0 {
        (stats.accepted_unique as f64 / stats.known_domains as f64) * 100.0
    } else {
        0.0
    };
    println!("  Acceptance rate: {:.1}% of known domains", acceptance);

    if !stats.recent.is_empty() {
        println!();
        println!("Recently recorded:");
        for (domain, recorded_at) in &stats.recent {
            println!("  {}  {}", recorded_at, domain);
        }
    }
}

/// Prints the end-of-run summary to stdout
pub fn print_run_summary(report: &RunReport) {
    println!("=== Run Summary ===\n");

    if let Some(duration) = report.duration_seconds() {
        println!("Duration: {} seconds", duration);
    }
    if report.interrupted {
        println!("Run was interrupted");
    }
    println!(
        "Accepted: {} of {} requested",
        report.total_accepted(),
        report.total_quota()
    );
    println!();

    println!("Targets:");
    for target in &report.targets {
        let marker = match target.outcome {
            TargetOutcome::Satisfied => "ok",
            TargetOutcome::Exhausted => "short",
            TargetOutcome::Incomplete => "open",
        };
        println!(
            "  [{}] {}: {}/{} ({})",
            marker, target.target, target.accepted, target.quota, target.outcome
        );
        if !target.failed_pages.is_empty() {
            println!("        failed pages: {:?}", target.failed_pages);
        }
    }
    println!();

    let used = report
        .profiles
        .iter()
        .filter(|p| !matches!(p.status, ProfileStatus::Skipped(_)))
        .count();
    println!("Egress profiles used: {} of {}", used, report.profiles.len());
    for profile in &report.profiles {
        if matches!(profile.status, ProfileStatus::Completed) {
            continue;
        }
        println!("  {}: {}", profile.name, profile.status);
    }
}
