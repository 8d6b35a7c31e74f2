//! Storage module for the dedup store
//!
//! This module holds the shared set of already-classified domains and the
//! durable logs that carry it across runs:
//! - a plain line-per-domain text file
//! - a SQLite table with recording timestamps

mod dedup;
mod line_log;
mod schema;
mod sqlite;
mod traits;

pub use dedup::DedupStore;
pub use line_log::LineDomainLog;
pub use sqlite::SqliteDomainLog;
pub use traits::{DomainLog, StorageError, StorageResult};

use crate::config::DedupBackend;
use std::path::Path;

/// Opens the durable domain log selected by the configuration
///
/// # Arguments
///
/// * `backend` - Which log format to use
/// * `path` - Path of the log file or database
///
/// # Returns
///
/// * `Ok(Box<dyn DomainLog>)` - The opened log
/// * `Err(StorageError)` - Failed to open or create the log
pub fn open_domain_log(backend: DedupBackend, path: &Path) -> StorageResult<Box<dyn DomainLog>> {
    match backend {
        DedupBackend::Lines => Ok(Box::new(LineDomainLog::open(path)?)),
        DedupBackend::Sqlite => Ok(Box::new(SqliteDomainLog::open(path)?)),
    }
}

/// Opens the dedup store on the configured log
pub fn open_dedup_store(backend: DedupBackend, path: &Path) -> StorageResult<DedupStore> {
    DedupStore::open(open_domain_log(backend, path)?)
}
