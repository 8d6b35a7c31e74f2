//! The egress session loop
//!
//! Profiles are consumed in order. Each acquired profile gets one fetcher and
//! runs the quota controller over every unfinished target; crawl state carries
//! over from one profile to the next.

use crate::crawler::{CrawlState, FetcherFactory, PageFetcher, QuotaCrawler, Target};
use crate::egress::session::{panic_message, with_egress, SessionOutcome};
use crate::egress::{EgressProfile, EgressProvider, EgressRoute};
use crate::output::{ProfileReport, ProfileStatus, RunReport, SessionTargetReport};
use chrono::Utc;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const IDENTITY_PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Drives targets through a sequence of egress profiles
pub struct EgressRotation {
    provider: Arc<dyn EgressProvider>,
    profiles: Vec<EgressProfile>,
    fetchers: Arc<dyn FetcherFactory>,
    crawler: QuotaCrawler,
    acquire_timeout: Duration,
    identity_probe_url: Option<String>,
    stop: Arc<AtomicBool>,
}

impl EgressRotation {
    pub fn new(
        provider: Arc<dyn EgressProvider>,
        profiles: Vec<EgressProfile>,
        fetchers: Arc<dyn FetcherFactory>,
        crawler: QuotaCrawler,
        acquire_timeout: Duration,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            provider,
            profiles,
            fetchers,
            crawler,
            acquire_timeout,
            identity_probe_url: None,
            stop,
        }
    }

    /// Enables the advisory egress identity probe
    pub fn with_identity_probe(mut self, url: impl Into<String>) -> Self {
        let url = url.into();
        self.identity_probe_url = (!url.trim().is_empty()).then_some(url);
        self
    }

    /// Runs every profile in order against `targets`
    ///
    /// `states` is indexed like `targets`. Each profile's session is recorded
    /// on `report`.
    pub async fn run(&self, targets: &[Target], states: &mut [CrawlState], report: &mut RunReport) {
        for (index, profile) in self.profiles.iter().enumerate() {
            if self.stop.load(Ordering::SeqCst) {
                report.interrupted = true;
                for remaining in &self.profiles[index..] {
                    report.record_profile(ProfileReport::skipped(&remaining.name, "stop requested"));
                }
                break;
            }

            if states.iter().all(CrawlState::is_terminal) {
                tracing::info!("All targets finished, not acquiring remaining egress profiles");
                for remaining in &self.profiles[index..] {
                    report.record_profile(ProfileReport::skipped(
                        &remaining.name,
                        "all targets finished",
                    ));
                }
                break;
            }

            tracing::info!(
                "Egress profile {}/{}: {}",
                index + 1,
                self.profiles.len(),
                profile.name
            );

            // Only hand a struggling target over when another egress follows
            let can_yield = index + 1 < self.profiles.len();

            let mut profile_report = ProfileReport::new(&profile.name);
            let outcome = with_egress(
                self.provider.as_ref(),
                profile,
                self.acquire_timeout,
                |route| {
                    self.run_session(route, targets, &mut *states, &mut profile_report, can_yield)
                },
            )
            .await;

            profile_report.status = match outcome {
                SessionOutcome::Completed(status) => status,
                SessionOutcome::AcquireFailed(reason) => ProfileStatus::AcquireFailed(reason),
                SessionOutcome::Panicked(reason) => ProfileStatus::Panicked(reason),
            };
            profile_report.finished_at = Utc::now();

            tracing::info!(
                "Egress {} {}: {} accepted",
                profile.name,
                profile_report.status,
                profile_report.accepted()
            );
            report.record_profile(profile_report);
        }

        if self.stop.load(Ordering::SeqCst) {
            report.interrupted = true;
        }
    }

    /// Body of one egress session
    async fn run_session(
        &self,
        route: EgressRoute,
        targets: &[Target],
        states: &mut [CrawlState],
        profile_report: &mut ProfileReport,
        can_yield: bool,
    ) -> ProfileStatus {
        let fetcher = match self.fetchers.build(&route) {
            Ok(fetcher) => fetcher,
            Err(e) => {
                tracing::warn!("No fetcher for egress {}: {}", route.profile, e);
                return ProfileStatus::FetcherFailed(e.to_string());
            }
        };

        if let Some(url) = &self.identity_probe_url {
            profile_report.egress_identity = probe_identity(fetcher.as_ref(), url).await;
            match &profile_report.egress_identity {
                Some(identity) => tracing::info!("Egress {} identity: {}", route.profile, identity),
                None => tracing::info!("Egress {} identity unknown", route.profile),
            }
        }

        for (target, state) in targets.iter().zip(states.iter_mut()) {
            if state.is_terminal() {
                continue;
            }
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            tracing::info!(
                "{}: {}/{} accepted, resuming at page {}",
                target.label(),
                state.accepted_count,
                state.quota,
                state.current_page
            );

            let before = state.accepted_count;
            let result = AssertUnwindSafe(self.crawler.run(target, state, fetcher.as_ref(), can_yield))
                .catch_unwind()
                .await;

            let error = match result {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(panic) => Some(format!("panicked: {}", panic_message(panic.as_ref()))),
            };

            if let Some(message) = &error {
                tracing::error!("{} failed on {}: {}", target.label(), route.profile, message);
                state.record_error(format!("{}: {}", route.profile, message));
            }

            profile_report.targets.push(SessionTargetReport {
                target: target.label().to_string(),
                accepted: state.accepted_count.saturating_sub(before),
                phase: state.phase,
                error,
            });
        }

        ProfileStatus::Completed
    }
}

/// Asks `url` for the public address of the current egress
///
/// Advisory: any failure yields None.
pub async fn probe_identity(fetcher: &dyn PageFetcher, url: &str) -> Option<String> {
    match fetcher.fetch(url, IDENTITY_PROBE_TIMEOUT).await {
        Ok(page) => page
            .html
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(|line| line.chars().take(64).collect()),
        Err(e) => {
            tracing::debug!("Identity probe {} failed: {}", url, e);
            None
        }
    }
}
