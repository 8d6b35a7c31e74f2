//! Markdown run report
//!
//! This module renders a [`RunReport`] as a human-readable markdown document:
//! run metadata, one table row per target, per-target detail and one section
//! per egress session.

use crate::output::report::{ProfileStatus, RunReport, TargetOutcome};
use crate::output::traits::OutputResult;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// Writes the markdown report to `output_path`
///
/// # Arguments
///
/// * `report` - The finished run report
/// * `output_path` - Path where the markdown file should be written
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote the report
/// * `Err(OutputError)` - Failed to write the report
pub fn write_markdown_report(report: &RunReport, output_path: &Path) -> OutputResult<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let markdown = format_markdown_report(report);
    let mut file = File::create(output_path)?;
    file.write_all(markdown.as_bytes())?;

    Ok(())
}

/// Formats a run report as markdown
pub fn format_markdown_report(report: &RunReport) -> String {
    let mut md = String::new();

    md.push_str("# MX-Harvest Run Report\n\n");

    // Run metadata
    md.push_str("## Run Information\n\n");
    md.push_str(&format!("- **Started**: {}\n", report.started_at.to_rfc3339()));
    if let Some(finished) = &report.finished_at {
        md.push_str(&format!("- **Finished**: {}\n", finished.to_rfc3339()));
    }
    if let Some(duration) = report.duration_seconds() {
        md.push_str(&format!(
            "- **Duration**: {} seconds ({:.2} minutes)\n",
            duration,
            duration as f64 / 60.0
        ));
    }
    if report.interrupted {
        md.push_str("- **Status**: interrupted\n");
    }
    md.push_str(&format!("- **Config Hash**: {}\n", report.config_hash));
    md.push_str(&format!("- **Known Domains**: {}\n\n", report.known_domains));

    // Totals
    md.push_str("## Totals\n\n");
    md.push_str(&format!(
        "- **Accepted**: {} of {} requested\n",
        report.total_accepted(),
        report.total_quota()
    ));
    md.push_str(&format!(
        "- **Satisfied**: {}\n",
        report.count_outcome(TargetOutcome::Satisfied)
    ));
    md.push_str(&format!(
        "- **Exhausted**: {}\n",
        report.count_outcome(TargetOutcome::Exhausted)
    ));
    md.push_str(&format!(
        "- **Incomplete**: {}\n\n",
        report.count_outcome(TargetOutcome::Incomplete)
    ));

    // Targets
    md.push_str("## Targets\n\n");
    md.push_str("| Target | Accepted | Quota | Outcome | Failed Pages |\n");
    md.push_str("|--------|----------|-------|---------|--------------|\n");
    for target in &report.targets {
        md.push_str(&format!(
            "| {} | {} | {} | {} | {} |\n",
            target.target,
            target.accepted,
            target.quota,
            target.outcome,
            format_pages(&target.failed_pages)
        ));
    }
    md.push('\n');

    for target in &report.targets {
        let c = &target.counters;
        md.push_str(&format!("### {}\n\n", target.target));
        if target.outcome != TargetOutcome::Satisfied {
            md.push_str(&format!(
                "- **Shortfall**: {} (next page {})\n",
                target.shortfall(),
                target.next_page
            ));
        }
        md.push_str(&format!(
            "- **Pages**: {} fetched, {} empty, {} failed fetches\n",
            c.pages_fetched, c.empty_pages, c.fetch_failures
        ));
        md.push_str(&format!(
            "- **Gaps**: {} retries, {} abandoned, {} session yields\n",
            c.gap_retries, c.abandoned_gaps, c.session_yields
        ));
        md.push_str(&format!(
            "- **Entities**: {} visited, {} failed, {} without website, {} unusable website, {} already seen\n",
            c.entities_visited,
            c.entity_fetch_failures,
            c.missing_website,
            c.invalid_website,
            c.duplicates_skipped
        ));
        md.push_str(&format!(
            "- **Classification**: {} affiliated, {} beyond quota, {} not affiliated\n",
            c.affiliated, c.surplus_affiliates, c.not_affiliated
        ));
        md.push_str(&format!(
            "- **Indeterminate**: {} timeouts, {} errors\n",
            c.indeterminate_timeouts, c.indeterminate_errors
        ));
        if !target.errors.is_empty() {
            md.push_str("- **Errors**:\n");
            for error in &target.errors {
                md.push_str(&format!("  - {}\n", error));
            }
        }
        md.push('\n');
    }

    // Egress sessions
    if !report.profiles.is_empty() {
        md.push_str("## Egress Sessions\n\n");
        for profile in &report.profiles {
            md.push_str(&format!("### {}\n\n", profile.name));
            md.push_str(&format!("- **Status**: {}\n", profile.status));
            if let ProfileStatus::Skipped(_) = profile.status {
                md.push('\n');
                continue;
            }

            md.push_str(&format!(
                "- **Egress Identity**: {}\n",
                profile.egress_identity.as_deref().unwrap_or("unknown")
            ));
            md.push_str(&format!(
                "- **Window**: {} to {}\n",
                profile.started_at.format("%H:%M:%S"),
                profile.finished_at.format("%H:%M:%S")
            ));

            if !profile.targets.is_empty() {
                md.push_str("\n| Target | Accepted | Phase After | Error |\n");
                md.push_str("|--------|----------|-------------|-------|\n");
                for session in &profile.targets {
                    md.push_str(&format!(
                        "| {} | {} | {} | {} |\n",
                        session.target,
                        session.accepted,
                        session.phase,
                        session.error.as_deref().unwrap_or("")
                    ));
                }
            }
            md.push('\n');
        }
    }

    md
}

/// Renders a sorted page list compactly: `1-3, 7, 9-10`
fn format_pages(pages: &[u32]) -> String {
    if pages.is_empty() {
        return "-".to_string();
    }

    let mut ranges: Vec<String> = Vec::new();
    let mut start = pages[0];
    let mut end = pages[0];

    for &page in &pages[1..] {
        if page == end + 1 {
            end = page;
        } else {
            ranges.push(render_range(start, end));
            start = page;
            end = page;
        }
    }
    ranges.push(render_range(start, end));

    ranges.join(", ")
}

fn render_range(start: u32, end: u32) -> String {
    if start == end {
        start.to_string()
    } else {
        format!("{}-{}", start, end)
    }
}
