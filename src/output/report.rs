//! Run report aggregation
//!
//! Collects what happened per egress session and per target so it can be
//! rendered once the run is over.

use crate::crawler::{CrawlState, Phase, Target, TargetCounters};
use chrono::{DateTime, Utc};
use std::fmt;

/// How one egress profile was used
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProfileStatus {
    /// Every unfinished target was attempted
    Completed,

    /// The profile could not be established
    AcquireFailed(String),

    /// The profile came up but no fetcher could be built on it
    FetcherFailed(String),

    /// The session panicked outside any single target
    Panicked(String),

    /// Never acquired: every target was already finished or a stop was requested
    Skipped(String),
}

impl fmt::Display for ProfileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::AcquireFailed(reason) => write!(f, "acquire failed: {}", reason),
            Self::FetcherFailed(reason) => write!(f, "fetcher failed: {}", reason),
            Self::Panicked(reason) => write!(f, "panicked: {}", reason),
            Self::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

/// What one session did for one target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTargetReport {
    pub target: String,
    /// Domains accepted during this session
    pub accepted: u32,
    /// Phase after the session
    pub phase: Phase,
    pub error: Option<String>,
}

/// One egress profile's session
#[derive(Debug, Clone)]
pub struct ProfileReport {
    pub name: String,
    pub status: ProfileStatus,
    /// Public address reported by the identity probe
    pub egress_identity: Option<String>,
    pub targets: Vec<SessionTargetReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ProfileReport {
    pub fn new(name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            name: name.into(),
            status: ProfileStatus::Completed,
            egress_identity: None,
            targets: Vec::new(),
            started_at: now,
            finished_at: now,
        }
    }

    /// A profile that was never acquired
    pub fn skipped(name: impl Into<String>, reason: impl Into<String>) -> Self {
        let mut report = Self::new(name);
        report.status = ProfileStatus::Skipped(reason.into());
        report
    }

    pub fn accepted(&self) -> u32 {
        self.targets.iter().map(|t| t.accepted).sum()
    }
}

/// Final outcome of a target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetOutcome {
    Satisfied,
    Exhausted,
    /// The run ended before the target reached a terminal state
    Incomplete,
}

impl fmt::Display for TargetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Satisfied => write!(f, "Satisfied"),
            Self::Exhausted => write!(f, "Exhausted"),
            Self::Incomplete => write!(f, "Incomplete"),
        }
    }
}

/// Final state of one target
#[derive(Debug, Clone)]
pub struct TargetReport {
    pub target: String,
    pub quota: u32,
    pub accepted: u32,
    pub outcome: TargetOutcome,
    /// Next page the target would have requested
    pub next_page: u32,
    /// Sorted ascending
    pub failed_pages: Vec<u32>,
    pub counters: TargetCounters,
    pub errors: Vec<String>,
}

impl TargetReport {
    pub fn from_state(target: &Target, state: &CrawlState) -> Self {
        let outcome = match state.phase {
            Phase::Satisfied => TargetOutcome::Satisfied,
            Phase::Exhausted => TargetOutcome::Exhausted,
            Phase::Scanning | Phase::Retrying { .. } => TargetOutcome::Incomplete,
        };

        Self {
            target: target.label().to_string(),
            quota: state.quota,
            accepted: state.accepted_count,
            outcome,
            next_page: state.current_page,
            failed_pages: state.failed_pages.iter().copied().collect(),
            counters: state.counters.clone(),
            errors: state.errors.clone(),
        }
    }

    pub fn shortfall(&self) -> u32 {
        self.quota.saturating_sub(self.accepted)
    }
}

/// Everything the reporter knows about a run
#[derive(Debug, Clone)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub config_hash: String,
    pub profiles: Vec<ProfileReport>,
    pub targets: Vec<TargetReport>,
    /// Set when a stop was requested
    pub interrupted: bool,
    /// Size of the dedup store at the end of the run
    pub known_domains: usize,
}

impl RunReport {
    pub fn new(config_hash: impl Into<String>) -> Self {
        Self {
            started_at: Utc::now(),
            finished_at: None,
            config_hash: config_hash.into(),
            profiles: Vec::new(),
            targets: Vec::new(),
            interrupted: false,
            known_domains: 0,
        }
    }

    pub fn record_profile(&mut self, profile: ProfileReport) {
        self.profiles.push(profile);
    }

    /// Snapshots the final target states and stamps the finish time
    pub fn finish(&mut self, targets: &[Target], states: &[CrawlState]) {
        self.targets = targets
            .iter()
            .zip(states)
            .map(|(target, state)| TargetReport::from_state(target, state))
            .collect();
        self.finished_at = Some(Utc::now());
    }

    pub fn duration_seconds(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.started_at).num_seconds())
    }

    pub fn total_accepted(&self) -> u32 {
        self.targets.iter().map(|t| t.accepted).sum()
    }

    pub fn total_quota(&self) -> u32 {
        self.targets.iter().map(|t| t.quota).sum()
    }

    pub fn count_outcome(&self, outcome: TargetOutcome) -> usize {
        self.targets.iter().filter(|t| t.outcome == outcome).count()
    }
}
