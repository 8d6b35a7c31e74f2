//! Classification of candidate domains
//!
//! A domain is *affiliated* when at least one of its MX exchanges belongs to a
//! known mail-hosting family. This module contains:
//! - the classification result types
//! - the affiliate pattern matcher
//! - the resolver seam and its hickory-backed implementation
//! - the gate that combines them under a timeout and error policy

mod gate;
mod resolver;

pub use gate::Classifier;
pub use resolver::{HickoryMxResolver, LookupError, MxResolver};

use std::fmt;

/// Mail-hosting domains treated as affiliated by default
pub const DEFAULT_AFFILIATE_PATTERNS: &[&str] = &[
    "outlook.com",
    "office365.com",
    "microsoft.com",
    "microsoftonline.com",
    "hotmail.com",
    "msn.com",
    "exchange.microsoft.com",
    "sharepoint.com",
    "azure.com",
    "onmicrosoft.com",
    "skype.com",
    "teams.microsoft.com",
    "mail.protection.outlook.com",
    "protection.outlook.com",
    "mail.microsoft.com",
    "outbound.protection.outlook.com",
    "cloudapp.net",
    "trafficmanager.net",
    "windows.net",
    "azureedge.net",
    "msecnd.net",
];

/// Why a classification could not be decided
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndeterminateReason {
    /// The MX lookup did not finish within the configured timeout
    Timeout,

    /// The lookup failed for another reason
    Error(String),

    /// The candidate did not normalize to a domain
    InvalidDomain,
}

impl fmt::Display for IndeterminateReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Timeout => write!(f, "timeout"),
            Self::Error(msg) => write!(f, "error: {}", msg),
            Self::InvalidDomain => write!(f, "invalid domain"),
        }
    }
}

/// Outcome of classifying one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassificationResult {
    Affiliated,
    NotAffiliated,
    Indeterminate(IndeterminateReason),
}

impl ClassificationResult {
    /// Only affiliated domains count toward a quota
    pub fn is_affiliated(&self) -> bool {
        matches!(self, Self::Affiliated)
    }

    pub fn is_indeterminate(&self) -> bool {
        matches!(self, Self::Indeterminate(_))
    }
}

impl fmt::Display for ClassificationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Affiliated => write!(f, "affiliated"),
            Self::NotAffiliated => write!(f, "not affiliated"),
            Self::Indeterminate(reason) => write!(f, "indeterminate ({})", reason),
        }
    }
}

/// Matches MX exchange hosts against affiliate patterns
///
/// An exchange matches a pattern when, after lowercasing and dropping a
/// trailing root dot, it equals the pattern or ends with `.` + pattern.
#[derive(Debug, Clone)]
pub struct AffiliationMatcher {
    patterns: Vec<String>,
}

impl AffiliationMatcher {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| clean_host(p.as_ref()))
            .filter(|p| !p.is_empty())
            .collect();

        Self { patterns }
    }

    /// Returns the first pattern that `exchange` falls under
    pub fn matching_pattern(&self, exchange: &str) -> Option<&str> {
        let host = clean_host(exchange);
        if host.is_empty() {
            return None;
        }

        self.patterns
            .iter()
            .find(|pattern| {
                host == **pattern
                    || (host.len() > pattern.len()
                        && host.ends_with(pattern.as_str())
                        && host.as_bytes()[host.len() - pattern.len() - 1] == b'.')
            })
            .map(String::as_str)
    }

    pub fn matches(&self, exchange: &str) -> bool {
        self.matching_pattern(exchange).is_some()
    }

    pub fn patterns(&self) -> &[String] {
        &self.patterns
    }
}

impl Default for AffiliationMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_AFFILIATE_PATTERNS)
    }
}

fn clean_host(host: &str) -> String {
    host.trim().trim_end_matches('.').to_lowercase()
}
