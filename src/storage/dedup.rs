//! The dedup store
//!
//! Every canonical domain the harvester has ever submitted for classification
//! lives here. The in-memory set is authoritative for the run; the optional
//! durable log lets a later run pick up where this one left off.

use crate::storage::traits::{DomainLog, StorageResult};
use crate::url::CanonicalDomain;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};

struct Inner {
    domains: HashSet<String>,
    log: Option<Box<dyn DomainLog>>,
}

/// Shared, append-only set of canonical domains
///
/// Cloning a `DedupStore` yields another handle to the same set. A single
/// mutex guards both the set and its log, so the first `record` of a domain
/// wins and is written to the log exactly once.
#[derive(Clone)]
pub struct DedupStore {
    inner: Arc<Mutex<Inner>>,
}

impl DedupStore {
    /// Creates a store backed by `log`, preloading every domain it holds
    ///
    /// Entries in the log are normalized again on load, so a history file
    /// written by hand (or by an older tool) still dedups correctly. Entries
    /// that do not normalize are ignored.
    pub fn open(log: Box<dyn DomainLog>) -> StorageResult<Self> {
        let mut domains = HashSet::new();

        for raw in log.load_domains()? {
            if let CanonicalDomain::Valid(domain) = crate::url::normalize_domain(&raw) {
                domains.insert(domain);
            }
        }

        tracing::info!(
            "Loaded {} known domains from {}",
            domains.len(),
            log.describe()
        );

        Ok(Self {
            inner: Arc::new(Mutex::new(Inner {
                domains,
                log: Some(log),
            })),
        })
    }

    /// Creates a store with no durable log
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                domains: HashSet::new(),
                log: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The set is only ever inserted into, so a poisoned guard is still consistent
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Returns true when `domain` has already been recorded
    ///
    /// `Invalid` is never seen.
    pub fn seen(&self, domain: &CanonicalDomain) -> bool {
        match domain {
            CanonicalDomain::Valid(d) => self.lock().domains.contains(d),
            CanonicalDomain::Invalid => false,
        }
    }

    /// Records `domain`, returning true if it was not present before
    ///
    /// `Invalid` is never recorded. A failed log append is logged and does not
    /// change the result.
    pub fn record(&self, domain: &CanonicalDomain) -> bool {
        let CanonicalDomain::Valid(d) = domain else {
            return false;
        };

        let mut inner = self.lock();
        if !inner.domains.insert(d.clone()) {
            return false;
        }

        if let Some(log) = inner.log.as_mut() {
            if let Err(e) = log.append_domain(d) {
                tracing::warn!("Failed to persist {} to {}: {}", d, log.describe(), e);
            }
        }

        true
    }

    /// Number of domains currently known
    pub fn len(&self) -> usize {
        self.lock().domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Description of the backing log, if any
    pub fn describe(&self) -> String {
        self.lock()
            .log
            .as_ref()
            .map(|log| log.describe())
            .unwrap_or_else(|| "memory".to_string())
    }
}

impl std::fmt::Debug for DedupStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupStore")
            .field("len", &self.len())
            .field("log", &self.describe())
            .finish()
    }
}
