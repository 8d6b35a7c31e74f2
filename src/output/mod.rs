//! Output module for harvest results and reports
//!
//! This module handles:
//! - The append-only log of accepted domains
//! - Aggregating per-target and per-session outcomes into a run report
//! - Rendering the report as markdown and as a console summary

mod accepted_log;
mod markdown;
mod report;
pub mod stats;
mod traits;

pub use accepted_log::AcceptedLog;
pub use markdown::{format_markdown_report, write_markdown_report};
pub use report::{
    ProfileReport, ProfileStatus, RunReport, SessionTargetReport, TargetOutcome, TargetReport,
};
pub use stats::{load_log_statistics, print_log_statistics, print_run_summary, LogStatistics};
pub use traits::{OutputError, OutputResult};

use std::path::Path;

/// Writes the markdown report, logging instead of failing
///
/// Returns true when the report was written.
pub fn publish_report(report: &RunReport, path: &Path) -> bool {
    match write_markdown_report(report, path) {
        Ok(()) => {
            tracing::info!("Report written to {}", path.display());
            true
        }
        Err(e) => {
            tracing::warn!("Failed to write report to {}: {}", path.display(), e);
            false
        }
    }
}
