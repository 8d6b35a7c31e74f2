//! Quota crawl controller
//!
//! Drives one target through its directory pages until the quota is met or the
//! page budget runs out. Missed pages are retried when a later page turns out
//! to be reachable, within a per-target retry budget.
//!
//! # Page loop
//!
//! | Observation | Action |
//! |-------------|--------|
//! | Fetch error | mark page failed, move forward |
//! | No entity links | mark page failed, move forward |
//! | Links, pages skipped, budget left | jump back to the first skipped page |
//! | Links, pages skipped, no budget | abandon the gap, process this page |
//! | Links, no gap | process this page |
//!
//! Processing visits every entity page, collects unseen websites and
//! classifies them through a bounded pool of concurrent MX lookups.

use crate::classify::{ClassificationResult, Classifier, IndeterminateReason};
use crate::config::{ClassifierConfig, CrawlerConfig};
use crate::crawler::fetcher::PageFetcher;
use crate::crawler::parser::PageParser;
use crate::crawler::state::{CrawlState, Phase};
use crate::crawler::Target;
use crate::output::AcceptedLog;
use crate::storage::DedupStore;
use crate::url::{normalize_domain, CanonicalDomain};
use crate::Result;
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

/// Tunables of the page loop
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Highest page number requested
    pub max_pages: u32,
    pub page_timeout: Duration,
    pub entity_path_pattern: String,
    pub website_selector: String,
    /// Consecutive directory failures before yielding the session (0 disables)
    pub failure_streak_limit: u32,
    pub max_concurrent_lookups: usize,
}

impl CrawlSettings {
    pub fn from_config(crawler: &CrawlerConfig, classifier: &ClassifierConfig) -> Self {
        Self {
            max_pages: crawler.max_pages,
            page_timeout: Duration::from_secs(crawler.page_timeout_secs),
            entity_path_pattern: crawler.entity_path_pattern.clone(),
            website_selector: crawler.website_selector.clone(),
            failure_streak_limit: crawler.failure_streak_limit,
            max_concurrent_lookups: classifier.max_concurrent_lookups,
        }
    }
}

/// Runs targets against whatever fetcher the current egress session provides
pub struct QuotaCrawler {
    settings: CrawlSettings,
    parser: Arc<dyn PageParser>,
    classifier: Classifier,
    dedup: DedupStore,
    accepted: Arc<AcceptedLog>,
    stop: Arc<AtomicBool>,
}

impl QuotaCrawler {
    pub fn new(
        settings: CrawlSettings,
        parser: Arc<dyn PageParser>,
        classifier: Classifier,
        dedup: DedupStore,
        accepted: Arc<AcceptedLog>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            parser,
            classifier,
            dedup,
            accepted,
            stop,
        }
    }

    fn stop_requested(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    /// Advances `target` using `fetcher` until it is terminal or yields
    ///
    /// Returns early, leaving the state resumable, when a stop is requested or,
    /// if `can_yield` is set, when the failure streak limit is hit. Without a
    /// later egress to yield to, failed pages only mark the page and the scan
    /// moves on. The only error is a failed write to the accepted-domain log.
    pub async fn run(
        &self,
        target: &Target,
        state: &mut CrawlState,
        fetcher: &dyn PageFetcher,
        can_yield: bool,
    ) -> Result<()> {
        state.reset_streak();

        loop {
            if state.is_terminal() {
                return Ok(());
            }

            if state.quota_met() {
                self.finish(target, state, Phase::Satisfied);
                return Ok(());
            }

            if self.stop_requested() {
                tracing::info!(
                    "Stop requested, leaving {} at page {}",
                    target.label(),
                    state.current_page
                );
                return Ok(());
            }

            if state.current_page > self.settings.max_pages {
                self.finish(target, state, Phase::Exhausted);
                return Ok(());
            }

            let page = state.current_page;
            let url = target.page_url(page);
            tracing::debug!("Fetching {}", url);

            let fetched = match fetcher.fetch(&url, self.settings.page_timeout).await {
                Ok(fetched) => fetched,
                Err(e) => {
                    state.counters.fetch_failures += 1;
                    state.failed_pages.insert(page);
                    state.current_page += 1;
                    tracing::warn!("{} page {} failed: {}", target.label(), page, e);

                    let streak = state.note_fetch_failure(page);
                    let limit = self.settings.failure_streak_limit;
                    if can_yield && limit > 0 && streak >= limit {
                        let resume = state.streak_start.unwrap_or(page);
                        state.current_page = resume;
                        state.counters.session_yields += 1;
                        state.reset_streak();
                        tracing::warn!(
                            "{}: {} consecutive page failures, yielding to the next egress at page {}",
                            target.label(),
                            limit,
                            resume
                        );
                        return Ok(());
                    }
                    continue;
                }
            };

            state.reset_streak();
            state.counters.pages_fetched += 1;

            let base = Url::parse(&fetched.final_url).unwrap_or_else(|_| target.base_url.clone());
            let links =
                self.parser
                    .extract_links(&fetched.html, &base, &self.settings.entity_path_pattern);

            if links.is_empty() {
                state.counters.empty_pages += 1;
                state.failed_pages.insert(page);
                if page == state.last_successful_page + 1 {
                    state.last_successful_page = page;
                }
                tracing::info!("{} page {}: no entity links", target.label(), page);
                state.current_page += 1;
                continue;
            }

            if state.gap_before(page) > 0 {
                let first = state.last_successful_page + 1;

                if state.retry_budget > 0 {
                    state.retry_budget -= 1;
                    state.counters.gap_retries += 1;
                    state.phase = Phase::Retrying {
                        first,
                        last: page - 1,
                    };
                    state.resume_page = Some(page);
                    state.current_page = first;
                    tracing::info!(
                        "{}: page {} reachable, going back for missed pages {}-{} ({} retries left)",
                        target.label(),
                        page,
                        first,
                        page - 1,
                        state.retry_budget
                    );
                    continue;
                }

                state.counters.abandoned_gaps += 1;
                state.phase = Phase::Scanning;
                state.resume_page = None;
                tracing::warn!(
                    "{}: retry budget exhausted, abandoning pages {}-{}",
                    target.label(),
                    first,
                    page - 1
                );
            }

            tracing::info!(
                "{} page {}: {} entity links",
                target.label(),
                page,
                links.len()
            );

            let candidates = self.collect_candidates(state, fetcher, &links).await;
            self.classify_candidates(target, state, candidates).await?;
            state.complete_page(page);

            if state.quota_met() {
                self.finish(target, state, Phase::Satisfied);
                return Ok(());
            }

            state.current_page += 1;
        }
    }

    /// Visits entity pages and returns the unseen websites, in link order
    async fn collect_candidates(
        &self,
        state: &mut CrawlState,
        fetcher: &dyn PageFetcher,
        links: &[String],
    ) -> Vec<CanonicalDomain> {
        let mut candidates: Vec<CanonicalDomain> = Vec::new();

        for link in links {
            state.counters.entities_visited += 1;

            let html = match fetcher.fetch(link, self.settings.page_timeout).await {
                Ok(fetched) => fetched.html,
                Err(e) => {
                    state.counters.entity_fetch_failures += 1;
                    tracing::debug!("Entity page {} failed: {}", link, e);
                    continue;
                }
            };

            let Some(raw) = self
                .parser
                .extract_field(&html, &self.settings.website_selector)
            else {
                state.counters.missing_website += 1;
                tracing::debug!("{}: no website", link);
                continue;
            };

            let domain = normalize_domain(&raw);
            if !domain.is_valid() {
                state.counters.invalid_website += 1;
                tracing::debug!("{}: unusable website '{}'", link, raw);
                continue;
            }

            if self.dedup.seen(&domain) || candidates.contains(&domain) {
                state.counters.duplicates_skipped += 1;
                tracing::debug!("{}: {} already seen", link, domain);
                continue;
            }

            candidates.push(domain);
        }

        candidates
    }

    /// Classifies candidates with at most `max_concurrent_lookups` in flight
    ///
    /// Nothing new is submitted once the quota is met or an accepted-log write
    /// has failed; lookups already in flight are always drained and applied,
    /// and the first write error is returned afterwards.
    async fn classify_candidates(
        &self,
        target: &Target,
        state: &mut CrawlState,
        candidates: Vec<CanonicalDomain>,
    ) -> Result<()> {
        let workers = self.settings.max_concurrent_lookups.max(1);
        let mut pending = candidates.into_iter();
        let mut in_flight = FuturesUnordered::new();
        let mut write_error = None;

        loop {
            while write_error.is_none() && in_flight.len() < workers && !state.quota_met() {
                let Some(domain) = pending.next() else {
                    break;
                };

                if !self.dedup.record(&domain) {
                    state.counters.duplicates_skipped += 1;
                    continue;
                }

                let classifier = &self.classifier;
                in_flight.push(async move {
                    let result = classifier.classify(&domain).await;
                    (domain, result)
                });
            }

            let Some((domain, result)) = in_flight.next().await else {
                break;
            };
            if let Err(e) = self.apply_result(target, state, &domain, result) {
                tracing::error!("{}: could not log {}: {}", target.label(), domain, e);
                write_error.get_or_insert(e);
            }
        }

        match write_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn apply_result(
        &self,
        target: &Target,
        state: &mut CrawlState,
        domain: &CanonicalDomain,
        result: ClassificationResult,
    ) -> Result<()> {
        match result {
            ClassificationResult::Affiliated => {
                let counted = state.record_affiliated();
                self.accepted.append(domain.as_str())?;
                if counted {
                    tracing::info!(
                        "{} [{}/{}] accepted {}",
                        target.label(),
                        state.accepted_count,
                        state.quota,
                        domain
                    );
                } else {
                    tracing::info!("{}: {} accepted beyond quota", target.label(), domain);
                }
            }
            ClassificationResult::NotAffiliated => {
                state.counters.not_affiliated += 1;
                tracing::debug!("{} not affiliated", domain);
            }
            ClassificationResult::Indeterminate(IndeterminateReason::Timeout) => {
                state.counters.indeterminate_timeouts += 1;
            }
            ClassificationResult::Indeterminate(reason) => {
                state.counters.indeterminate_errors += 1;
                tracing::debug!("{} indeterminate: {}", domain, reason);
            }
        }

        Ok(())
    }

    fn finish(&self, target: &Target, state: &mut CrawlState, phase: Phase) {
        state.phase = phase;
        match phase {
            Phase::Satisfied => tracing::info!(
                "{} satisfied: {}/{} accepted",
                target.label(),
                state.accepted_count,
                state.quota
            ),
            _ => tracing::info!(
                "{} {}: {}/{} accepted after page {}",
                target.label(),
                phase,
                state.accepted_count,
                state.quota,
                self.settings.max_pages
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{AffiliationMatcher, LookupError};
    use crate::config::{ClassifierConfig, CrawlerConfig};
    use crate::crawler::fetcher::FetchError;
    use crate::crawler::parser::HtmlParser;
    use crate::crawler::testing::{
        entity_url, page, ScriptedFetcher, StaticResolver, DIR, PATTERN, SELECTOR,
    };
    use crate::HarvestError;
    use std::io::Write;
    use tempfile::TempDir;

    const AFFILIATED_MX: &[&str] = &["tenant.mail.protection.outlook.com."];

    struct Harness {
        crawler: QuotaCrawler,
        dedup: DedupStore,
        resolver: Arc<StaticResolver>,
        stop: Arc<AtomicBool>,
        dir: TempDir,
    }

    impl Harness {
        fn accepted_lines(&self) -> Vec<String> {
            std::fs::read_to_string(self.dir.path().join("accepted.txt"))
                .unwrap()
                .lines()
                .map(String::from)
                .collect()
        }
    }

    fn settings() -> CrawlSettings {
        CrawlSettings {
            max_pages: 20,
            page_timeout: Duration::from_secs(1),
            entity_path_pattern: PATTERN.to_string(),
            website_selector: SELECTOR.to_string(),
            failure_streak_limit: 5,
            max_concurrent_lookups: 4,
        }
    }

    fn harness_with(settings: CrawlSettings, resolver: StaticResolver) -> Harness {
        let dir = tempfile::tempdir().unwrap();
        let accepted = AcceptedLog::open(&dir.path().join("accepted.txt")).unwrap();
        let resolver = Arc::new(resolver);
        let classifier = Classifier::new(
            resolver.clone(),
            AffiliationMatcher::default(),
            Duration::from_millis(500),
        );
        let dedup = DedupStore::in_memory();
        let stop = Arc::new(AtomicBool::new(false));

        let crawler = QuotaCrawler::new(
            settings,
            Arc::new(HtmlParser),
            classifier,
            dedup.clone(),
            Arc::new(accepted),
            stop.clone(),
        );

        Harness {
            crawler,
            dedup,
            resolver,
            stop,
            dir,
        }
    }

    fn target(quota: u32) -> Target {
        Target::new(DIR, quota, None).unwrap()
    }

    #[tokio::test]
    async fn test_first_page_classification() {
        let mut s = settings();
        s.max_pages = 1;
        let h = harness_with(
            s,
            StaticResolver::new()
                .mx("foo.com", &["mail.protection.outlook.com."])
                .mx("bar.com", &["mail.bar.com."]),
        );
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "foo.com"), ("b", "bar.com")]);

        let target = target(2);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.current_page, 2);
        assert_eq!(state.last_successful_page, 1);
        assert!(state.failed_pages.is_empty());
        assert_eq!(state.counters.affiliated, 1);
        assert_eq!(state.counters.not_affiliated, 1);
        assert_eq!(state.phase, Phase::Exhausted);
        assert_eq!(h.accepted_lines(), vec!["foo.com".to_string()]);
        assert_eq!(h.dedup.len(), 2);
    }

    #[tokio::test]
    async fn test_gap_retried_until_budget_exhausted() {
        let mut s = settings();
        s.max_pages = 2;
        let h = harness_with(s, StaticResolver::new().mx("two.com", AFFILIATED_MX));
        let fetcher = ScriptedFetcher::new()
            .script(page(1), vec![Err(FetchError::Timeout)])
            .directory(2, &[("two", "two.com")]);

        let target = target(5);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        // Initial attempt plus one per retry
        assert_eq!(fetcher.requests_for(&page(1)), 4);
        assert_eq!(fetcher.requests_for(&page(2)), 4);
        assert_eq!(state.counters.gap_retries, 3);
        assert_eq!(state.counters.abandoned_gaps, 1);
        assert_eq!(state.failed_pages.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(state.last_successful_page, 2);
        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.phase, Phase::Exhausted);
        // The trigger page was processed only once
        assert_eq!(fetcher.requests_for(&entity_url("two")), 1);
        assert_eq!(h.resolver.calls_for("two.com"), 1);
    }

    #[tokio::test]
    async fn test_gap_recovered_on_retry() {
        let mut s = settings();
        s.max_pages = 2;
        let h = harness_with(
            s,
            StaticResolver::new()
                .mx("one.com", AFFILIATED_MX)
                .mx("two.com", AFFILIATED_MX),
        );
        let fetcher = ScriptedFetcher::new()
            .directory(1, &[("one", "one.com")])
            .script(
                page(1),
                vec![
                    Err(FetchError::Network("reset".to_string())),
                    Ok(crate::crawler::testing::directory_html(&["one"])),
                ],
            )
            .directory(2, &[("two", "two.com")]);

        let target = target(5);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.counters.gap_retries, 1);
        assert_eq!(state.counters.abandoned_gaps, 0);
        assert!(state.failed_pages.is_empty());
        assert_eq!(state.accepted_count, 2);
        assert_eq!(state.retry_budget, 3);
        assert_eq!(fetcher.requests_for(&page(2)), 2);
    }

    #[tokio::test]
    async fn test_empty_page_is_not_a_gap() {
        let mut s = settings();
        s.max_pages = 2;
        let h = harness_with(s, StaticResolver::new().mx("two.com", AFFILIATED_MX));
        let fetcher = ScriptedFetcher::new()
            .html(page(1), "<html><body>No results</body></html>".to_string())
            .directory(2, &[("two", "two.com")]);

        let target = target(5);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.counters.empty_pages, 1);
        assert_eq!(state.counters.gap_retries, 0);
        assert_eq!(state.failed_pages.iter().copied().collect::<Vec<_>>(), vec![1]);
        assert_eq!(fetcher.requests_for(&page(1)), 1);
        assert_eq!(state.accepted_count, 1);
    }

    #[tokio::test]
    async fn test_seen_domain_is_not_classified_again() {
        let mut s = settings();
        s.max_pages = 1;
        let h = harness_with(s, StaticResolver::new().mx("foo.com", AFFILIATED_MX));
        h.dedup.record(&normalize_domain("foo.com"));
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "foo.com"), ("b", "foo.com")]);

        let target = target(2);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.accepted_count, 0);
        assert_eq!(state.counters.duplicates_skipped, 2);
        assert_eq!(h.resolver.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_same_website_twice_on_one_page() {
        let mut s = settings();
        s.max_pages = 1;
        let h = harness_with(s, StaticResolver::new().mx("foo.com", AFFILIATED_MX));
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "foo.com"), ("b", "FOO.com")]);

        let target = target(2);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.counters.duplicates_skipped, 1);
        assert_eq!(h.resolver.calls_for("foo.com"), 1);
    }

    #[tokio::test]
    async fn test_timeout_does_not_count() {
        let mut s = settings();
        s.max_pages = 1;
        let h = harness_with(
            s,
            StaticResolver::new().failing("timeout.com", LookupError::Timeout),
        );
        let fetcher = ScriptedFetcher::new().directory(1, &[("t", "timeout.com")]);

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.accepted_count, 0);
        assert_eq!(state.counters.indeterminate_timeouts, 1);
        assert!(h.dedup.seen(&normalize_domain("timeout.com")));
        assert!(h.accepted_lines().is_empty());
    }

    #[tokio::test]
    async fn test_quota_met_mid_page_drains_surplus() {
        let h = harness_with(
            settings(),
            StaticResolver::new()
                .mx("a.com", AFFILIATED_MX)
                .mx("b.com", AFFILIATED_MX)
                .mx("c.com", AFFILIATED_MX),
        );
        let fetcher = ScriptedFetcher::new().directory(
            1,
            &[("a", "a.com"), ("b", "b.com"), ("c", "c.com")],
        );

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.phase, Phase::Satisfied);
        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.counters.surplus_affiliates, 2);
        assert_eq!(state.current_page, 1);
        assert_eq!(h.accepted_lines().len(), 3);
        assert_eq!(fetcher.requests_for(&page(2)), 0);
    }

    #[tokio::test]
    async fn test_single_worker_stops_submitting_at_quota() {
        let mut s = settings();
        s.max_concurrent_lookups = 1;
        let h = harness_with(
            s,
            StaticResolver::new()
                .mx("a.com", AFFILIATED_MX)
                .mx("b.com", AFFILIATED_MX),
        );
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "a.com"), ("b", "b.com")]);

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.counters.surplus_affiliates, 0);
        assert_eq!(h.resolver.calls_for("b.com"), 0);
        // Never submitted, so still available to a later page or target
        assert!(!h.dedup.seen(&normalize_domain("b.com")));
    }

    #[tokio::test]
    async fn test_missing_and_invalid_websites_are_skipped() {
        let mut s = settings();
        s.max_pages = 1;
        let h = harness_with(s, StaticResolver::new().mx("ok.com", AFFILIATED_MX));
        let fetcher = ScriptedFetcher::new()
            .html(
                page(1),
                crate::crawler::testing::directory_html(&["none", "bad", "gone", "ok"]),
            )
            .html(entity_url("none"), "<html><body>No website listed</body></html>".to_string())
            .html(
                entity_url("bad"),
                r#"<a id="hero-company-link" href="mailto:sales@bad.com">Email</a>"#.to_string(),
            )
            .html(entity_url("ok"), crate::crawler::testing::entity_html("ok.com"));

        let target = target(3);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.counters.entities_visited, 4);
        assert_eq!(state.counters.missing_website, 1);
        assert_eq!(state.counters.invalid_website, 1);
        assert_eq!(state.counters.entity_fetch_failures, 1);
        assert_eq!(state.accepted_count, 1);
    }

    #[tokio::test]
    async fn test_failure_streak_yields_session() {
        let mut s = settings();
        s.failure_streak_limit = 2;
        let h = harness_with(s, StaticResolver::new());
        let fetcher = ScriptedFetcher::new();

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(fetcher.total_requests(), 2);
        assert_eq!(state.current_page, 1);
        assert!(!state.is_terminal());
        assert_eq!(state.failed_pages.len(), 2);
        assert_eq!(state.counters.session_yields, 1);

        // The next session resumes at the same page
        let fetcher = ScriptedFetcher::new()
            .html(page(1), "<html></html>".to_string())
            .html(page(2), "<html></html>".to_string());
        let mut s = settings();
        s.max_pages = 2;
        let h = harness_with(s, StaticResolver::new());
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();
        assert_eq!(fetcher.requests_for(&page(1)), 1);
        assert_eq!(state.phase, Phase::Exhausted);
    }

    #[tokio::test]
    async fn test_stop_flag_leaves_state_untouched() {
        let h = harness_with(settings(), StaticResolver::new());
        h.stop.store(true, Ordering::SeqCst);
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "a.com")]);

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(fetcher.total_requests(), 0);
        assert_eq!(state.current_page, 1);
        assert_eq!(state.phase, Phase::Scanning);
    }

    #[tokio::test]
    async fn test_terminal_target_is_left_alone() {
        let h = harness_with(settings(), StaticResolver::new());
        let fetcher = ScriptedFetcher::new();

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        state.phase = Phase::Exhausted;
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(fetcher.total_requests(), 0);
    }

    #[tokio::test]
    async fn test_start_page_beyond_budget_is_exhausted() {
        let h = harness_with(settings(), StaticResolver::new());
        let fetcher = ScriptedFetcher::new();

        let target = Target::new(DIR, 1, Some(21)).unwrap();
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, true).await.unwrap();

        assert_eq!(state.phase, Phase::Exhausted);
        assert_eq!(fetcher.total_requests(), 0);
    }

    struct BrokenWriter;

    impl Write for BrokenWriter {
        fn write(&mut self, _buf: &[u8]) -> std::io::Result<usize> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk gone"))
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_accepted_log_failure_propagates() {
        let resolver = Arc::new(StaticResolver::new().mx("foo.com", AFFILIATED_MX));
        let crawler = QuotaCrawler::new(
            settings(),
            Arc::new(HtmlParser),
            Classifier::new(resolver, AffiliationMatcher::default(), Duration::from_millis(500)),
            DedupStore::in_memory(),
            Arc::new(AcceptedLog::from_writer(Box::new(BrokenWriter), "broken")),
            Arc::new(AtomicBool::new(false)),
        );
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "foo.com")]);

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        let result = crawler.run(&target, &mut state, &fetcher, true).await;

        assert!(matches!(result, Err(HarvestError::Output(_))));
        assert_eq!(state.accepted_count, 1);
    }

    #[tokio::test]
    async fn test_accepted_log_failure_drains_in_flight_lookups() {
        let resolver = Arc::new(
            StaticResolver::new()
                .mx("a.com", AFFILIATED_MX)
                .mx("b.com", AFFILIATED_MX),
        );
        let dedup = DedupStore::in_memory();
        let crawler = QuotaCrawler::new(
            settings(),
            Arc::new(HtmlParser),
            Classifier::new(
                resolver.clone(),
                AffiliationMatcher::default(),
                Duration::from_millis(500),
            ),
            dedup.clone(),
            Arc::new(AcceptedLog::from_writer(Box::new(BrokenWriter), "broken")),
            Arc::new(AtomicBool::new(false)),
        );
        let fetcher = ScriptedFetcher::new().directory(1, &[("a", "a.com"), ("b", "b.com")]);

        let target = target(2);
        let mut state = CrawlState::new(&target, 3);
        let result = crawler.run(&target, &mut state, &fetcher, true).await;

        assert!(matches!(result, Err(HarvestError::Output(_))));
        // Both lookups were recorded, so both results must be applied
        assert!(dedup.seen(&normalize_domain("a.com")));
        assert!(dedup.seen(&normalize_domain("b.com")));
        assert_eq!(resolver.calls_for("a.com"), 1);
        assert_eq!(resolver.calls_for("b.com"), 1);
        assert_eq!(state.counters.affiliated, 2);
        assert_eq!(state.accepted_count, 2);
    }

    #[tokio::test]
    async fn test_failure_streak_without_later_egress_keeps_scanning() {
        let h = harness_with(
            CrawlSettings::from_config(&CrawlerConfig::default(), &ClassifierConfig::default()),
            StaticResolver::new().mx("six.com", AFFILIATED_MX),
        );
        // Pages 1-5 are not served at all
        let fetcher = ScriptedFetcher::new().directory(6, &[("six", "six.com")]);

        let target = target(1);
        let mut state = CrawlState::new(&target, 3);
        h.crawler.run(&target, &mut state, &fetcher, false).await.unwrap();

        assert_eq!(state.phase, Phase::Satisfied);
        assert_eq!(state.accepted_count, 1);
        assert_eq!(state.counters.session_yields, 0);
        assert_eq!(state.counters.gap_retries, 3);
        assert_eq!(state.counters.abandoned_gaps, 1);
        assert_eq!(
            state.failed_pages.iter().copied().collect::<Vec<_>>(),
            vec![1, 2, 3, 4, 5]
        );
        assert_eq!(fetcher.requests_for(&page(1)), 4);
        assert_eq!(h.accepted_lines(), vec!["six.com".to_string()]);
    }
}
