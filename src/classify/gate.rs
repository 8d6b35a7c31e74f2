//! The classification gate
//!
//! Turns an MX lookup into a [`ClassificationResult`]. Lookup failures never
//! escape: missing records and non-existent domains are negatives, anything
//! else is indeterminate.

use crate::classify::resolver::{HickoryMxResolver, LookupError, MxResolver};
use crate::classify::{AffiliationMatcher, ClassificationResult, IndeterminateReason};
use crate::config::ClassifierConfig;
use crate::url::CanonicalDomain;
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

/// Classifies canonical domains by their MX records
#[derive(Clone)]
pub struct Classifier {
    resolver: Arc<dyn MxResolver>,
    matcher: AffiliationMatcher,
    timeout: Duration,
}

impl Classifier {
    /// Creates a classifier over an arbitrary resolver
    ///
    /// # Arguments
    ///
    /// * `resolver` - Source of MX exchanges
    /// * `matcher` - Affiliate patterns to test exchanges against
    /// * `timeout` - Upper bound for a single lookup
    pub fn new(resolver: Arc<dyn MxResolver>, matcher: AffiliationMatcher, timeout: Duration) -> Self {
        Self {
            resolver,
            matcher,
            timeout,
        }
    }

    /// Creates the production classifier from configuration
    pub fn from_config(config: &ClassifierConfig) -> Self {
        let timeout = Duration::from_secs(config.dns_timeout_secs);
        let resolver = HickoryMxResolver::new(timeout);
        Self::new(
            Arc::new(resolver),
            AffiliationMatcher::new(&config.affiliate_patterns),
            timeout,
        )
    }

    /// Classifies one domain
    ///
    /// Never fails. `Invalid` is indeterminate without a lookup.
    pub async fn classify(&self, domain: &CanonicalDomain) -> ClassificationResult {
        let CanonicalDomain::Valid(name) = domain else {
            return ClassificationResult::Indeterminate(IndeterminateReason::InvalidDomain);
        };

        let lookup = AssertUnwindSafe(tokio::time::timeout(
            self.timeout,
            self.resolver.mx_exchanges(name),
        ))
        .catch_unwind()
        .await;

        let exchanges = match lookup {
            Ok(Ok(Ok(exchanges))) => exchanges,
            Ok(Ok(Err(LookupError::NoRecords))) => {
                tracing::debug!("{}: no MX records", name);
                return ClassificationResult::NotAffiliated;
            }
            Ok(Ok(Err(LookupError::NxDomain))) => {
                tracing::debug!("{}: domain does not exist", name);
                return ClassificationResult::NotAffiliated;
            }
            Ok(Ok(Err(LookupError::Timeout))) | Ok(Err(_)) => {
                tracing::warn!("MX lookup for {} timed out after {:?}", name, self.timeout);
                return ClassificationResult::Indeterminate(IndeterminateReason::Timeout);
            }
            Ok(Ok(Err(LookupError::Failed(message)))) => {
                tracing::warn!("MX lookup for {} failed: {}", name, message);
                return ClassificationResult::Indeterminate(IndeterminateReason::Error(message));
            }
            Err(_) => {
                tracing::warn!("MX lookup for {} panicked", name);
                return ClassificationResult::Indeterminate(IndeterminateReason::Error(
                    "resolver panicked".to_string(),
                ));
            }
        };

        for exchange in &exchanges {
            if let Some(pattern) = self.matcher.matching_pattern(exchange) {
                tracing::debug!("{}: MX {} matches {}", name, exchange, pattern);
                return ClassificationResult::Affiliated;
            }
        }

        tracing::debug!("{}: {} MX records, none affiliated", name, exchanges.len());
        ClassificationResult::NotAffiliated
    }
}
