//! Configuration module for MX-Harvest
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, and resolving the directory targets they declare.
//!
//! # Example
//!
//! ```no_run
//! use mx_harvest::config::{load_config, resolve_targets};
//! use std::path::Path;
//!
//! let config = load_config(Path::new("harvest.toml")).unwrap();
//! let targets = resolve_targets(&config).unwrap();
//! println!("{} targets, page budget {}", targets.len(), config.crawler.max_pages);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ClassifierConfig, Config, CrawlerConfig, DedupBackend, EgressConfig, OutputConfig,
    ProviderKind, TargetEntry,
};

// Re-export parser functions
pub use parser::{
    compute_config_hash, load_config, load_config_with_hash, parse_target_line,
    parse_targets_list, resolve_targets, TARGET_LINE_SEPARATOR,
};
