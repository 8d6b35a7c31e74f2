//! Storage traits and error types
//!
//! This module defines the trait interface for durable domain logs and the
//! associated error types.

use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for durable, append-only domain logs
///
/// A domain log remembers every canonical domain the dedup store has recorded,
/// so that a later run (or a run restarted after a crash) does not classify the
/// same domain again. Implementations only ever append; nothing is removed.
pub trait DomainLog: Send {
    /// Loads every domain previously appended to the log
    ///
    /// Order is not significant; duplicates are tolerated by the caller.
    fn load_domains(&self) -> StorageResult<Vec<String>>;

    /// Appends one canonical domain and makes it durable before returning
    fn append_domain(&mut self, domain: &str) -> StorageResult<()>;

    /// Short human-readable description, used in logs and statistics
    fn describe(&self) -> String;
}
