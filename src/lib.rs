//! MX-Harvest: a quota-driven directory harvester
//!
//! This crate walks paginated business directories through a rotating set of
//! network egress profiles, visits every company profile it finds, and keeps the
//! company websites whose mail is routed through a known provider family
//! (decided from MX records). Each directory target has a quota; missed pages are
//! retried selectively and every domain is classified at most once per history.

pub mod classify;
pub mod config;
pub mod crawler;
pub mod egress;
pub mod harvest;
pub mod output;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for MX-Harvest operations
#[derive(Debug, Error)]
pub enum HarvestError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("No targets configured: add [[target]] entries or a targets-file with at least one line")]
    NoTargets,

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid target line {line}: {reason}")]
    InvalidTargetLine { line: usize, reason: String },
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for MX-Harvest operations
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use classify::{ClassificationResult, Classifier};
pub use config::Config;
pub use crawler::{CrawlState, Target};
pub use harvest::{run_harvest, Harvester};
pub use output::RunReport;
pub use storage::DedupStore;
pub use url::{normalize_domain, CanonicalDomain};
