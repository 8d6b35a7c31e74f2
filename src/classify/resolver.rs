//! MX record lookups

use async_trait::async_trait;
use hickory_resolver::config::{ResolverConfig, ResolverOpts};
use hickory_resolver::error::{ResolveError, ResolveErrorKind};
use hickory_resolver::proto::op::ResponseCode;
use hickory_resolver::TokioAsyncResolver;
use std::time::Duration;
use thiserror::Error;

/// Ways an MX lookup can come back without exchanges
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no MX records")]
    NoRecords,

    #[error("domain does not exist")]
    NxDomain,

    #[error("lookup timed out")]
    Timeout,

    #[error("lookup failed: {0}")]
    Failed(String),
}

/// Source of MX exchange hosts for a domain
#[async_trait]
pub trait MxResolver: Send + Sync {
    /// Returns the exchange host of every MX record of `domain`
    async fn mx_exchanges(&self, domain: &str) -> Result<Vec<String>, LookupError>;
}

/// MX resolver backed by hickory
pub struct HickoryMxResolver {
    resolver: TokioAsyncResolver,
}

impl HickoryMxResolver {
    /// Creates a resolver from the system configuration
    ///
    /// Falls back to Cloudflare's public resolvers when the system configuration
    /// cannot be read. Each query is attempted once and bounded by `timeout`.
    pub fn new(timeout: Duration) -> Self {
        let (config, mut opts) = match hickory_resolver::system_conf::read_system_conf() {
            Ok(system) => system,
            Err(e) => {
                tracing::warn!(
                    "Could not read system resolver configuration ({}), using Cloudflare",
                    e
                );
                (ResolverConfig::cloudflare(), ResolverOpts::default())
            }
        };

        opts.timeout = timeout;
        opts.attempts = 1;

        Self {
            resolver: TokioAsyncResolver::tokio(config, opts),
        }
    }
}

#[async_trait]
impl MxResolver for HickoryMxResolver {
    async fn mx_exchanges(&self, domain: &str) -> Result<Vec<String>, LookupError> {
        // Fully qualified so the search list is never appended
        let fqdn = format!("{}.", domain.trim_end_matches('.'));

        let lookup = self
            .resolver
            .mx_lookup(fqdn.as_str())
            .await
            .map_err(|e| lookup_error(&e))?;

        let exchanges: Vec<String> = lookup
            .iter()
            .map(|mx| mx.exchange().to_utf8())
            .collect();

        if exchanges.is_empty() {
            return Err(LookupError::NoRecords);
        }

        Ok(exchanges)
    }
}

fn lookup_error(error: &ResolveError) -> LookupError {
    match error.kind() {
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            if *response_code == ResponseCode::NXDomain {
                LookupError::NxDomain
            } else {
                LookupError::NoRecords
            }
        }
        ResolveErrorKind::Timeout => LookupError::Timeout,
        _ => LookupError::Failed(error.to_string()),
    }
}
