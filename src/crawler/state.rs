//! Per-target crawl state
//!
//! A [`CrawlState`] lives for the whole run and survives egress rotations; the
//! controller is its only writer.

use crate::crawler::Target;
use std::collections::BTreeSet;
use std::fmt;

/// Where a target is in its crawl
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Moving forward through directory pages
    Scanning,

    /// Re-requesting skipped pages `first..=last`
    Retrying { first: u32, last: u32 },

    /// Quota met
    Satisfied,

    /// Page budget used up before the quota was met
    Exhausted,
}

impl Phase {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Satisfied | Self::Exhausted)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scanning => write!(f, "scanning"),
            Self::Retrying { first, last } if first == last => write!(f, "retrying page {}", first),
            Self::Retrying { first, last } => write!(f, "retrying pages {}-{}", first, last),
            Self::Satisfied => write!(f, "satisfied"),
            Self::Exhausted => write!(f, "exhausted"),
        }
    }
}

/// Running totals for one target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TargetCounters {
    pub pages_fetched: u64,
    pub empty_pages: u64,
    pub fetch_failures: u64,
    pub entities_visited: u64,
    pub entity_fetch_failures: u64,
    pub missing_website: u64,
    pub invalid_website: u64,
    pub duplicates_skipped: u64,
    pub affiliated: u64,
    pub not_affiliated: u64,
    pub indeterminate_timeouts: u64,
    pub indeterminate_errors: u64,
    pub surplus_affiliates: u64,
    pub gap_retries: u64,
    pub abandoned_gaps: u64,
    pub session_yields: u64,
}

/// Crawl progress of one target
#[derive(Debug, Clone)]
pub struct CrawlState {
    pub quota: u32,
    pub accepted_count: u32,
    pub current_page: u32,
    pub last_successful_page: u32,
    pub retry_budget: u32,
    pub retry_cap: u32,
    pub failed_pages: BTreeSet<u32>,
    pub phase: Phase,

    /// Page that triggered the current retry
    pub resume_page: Option<u32>,

    /// Consecutive directory fetch failures in the current session
    pub failure_streak: u32,
    pub streak_start: Option<u32>,

    pub counters: TargetCounters,
    pub errors: Vec<String>,
}

impl CrawlState {
    /// Creates the initial state for `target`
    pub fn new(target: &Target, retry_cap: u32) -> Self {
        Self {
            quota: target.quota,
            accepted_count: 0,
            current_page: target.start_page,
            last_successful_page: target.start_page.saturating_sub(1),
            retry_budget: retry_cap,
            retry_cap,
            failed_pages: BTreeSet::new(),
            phase: Phase::Scanning,
            resume_page: None,
            failure_streak: 0,
            streak_start: None,
            counters: TargetCounters::default(),
            errors: Vec::new(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    pub fn quota_met(&self) -> bool {
        self.accepted_count >= self.quota
    }

    /// Counts one affiliated domain toward the quota
    ///
    /// Returns false, counting it as surplus instead, once the quota is met.
    pub fn record_affiliated(&mut self) -> bool {
        if self.quota_met() {
            self.counters.surplus_affiliates += 1;
            false
        } else {
            self.accepted_count += 1;
            self.counters.affiliated += 1;
            true
        }
    }

    pub fn record_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    /// Clears the per-session failure streak
    pub fn reset_streak(&mut self) {
        self.failure_streak = 0;
        self.streak_start = None;
    }

    /// Notes a failed directory fetch of `page`; returns the streak length
    pub fn note_fetch_failure(&mut self, page: u32) -> u32 {
        if self.failure_streak == 0 {
            self.streak_start = Some(page);
        }
        self.failure_streak += 1;
        self.failure_streak
    }

    /// Marks `page` as processed successfully
    pub fn complete_page(&mut self, page: u32) {
        self.last_successful_page = page;
        self.retry_budget = self.retry_cap;
        self.failed_pages.remove(&page);

        if self.resume_page.map_or(true, |resume| page >= resume) {
            self.phase = Phase::Scanning;
            self.resume_page = None;
        }
    }

    /// Number of directory pages the gap before `page` spans
    pub fn gap_before(&self, page: u32) -> u32 {
        page.saturating_sub(self.last_successful_page + 1)
    }
}
