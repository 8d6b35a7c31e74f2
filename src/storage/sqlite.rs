//! SQLite domain log
//!
//! This module provides a SQLite-based implementation of the DomainLog trait.

use crate::storage::schema::initialize_schema;
use crate::storage::traits::{DomainLog, StorageResult};
use chrono::Utc;
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};

/// SQLite-backed domain log
pub struct SqliteDomainLog {
    conn: Connection,
    path: Option<PathBuf>,
}

impl SqliteDomainLog {
    /// Opens (or creates) the domain log database at `path`
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteDomainLog)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn open(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self {
            conn,
            path: Some(path.to_path_buf()),
        })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn open_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn, path: None })
    }

    /// Counts the recorded domains
    pub fn count_domains(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM seen_domains", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    /// Returns the most recently recorded domains, newest first
    pub fn recent_domains(&self, limit: usize) -> StorageResult<Vec<(String, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT domain, recorded_at FROM seen_domains ORDER BY recorded_at DESC, domain LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<Vec<(String, String)>, _>>()?;

        Ok(rows)
    }
}

impl DomainLog for SqliteDomainLog {
    fn load_domains(&self) -> StorageResult<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT domain FROM seen_domains")?;
        let domains = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(domains)
    }

    fn append_domain(&mut self, domain: &str) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR IGNORE INTO seen_domains (domain, recorded_at) VALUES (?1, ?2)",
            params![domain, now],
        )?;
        Ok(())
    }

    fn describe(&self) -> String {
        match &self.path {
            Some(path) => format!("sqlite:{}", path.display()),
            None => "sqlite:memory".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_and_load() {
        let mut log = SqliteDomainLog::open_in_memory().unwrap();
        log.append_domain("foo.com").unwrap();
        log.append_domain("bar.com").unwrap();

        let mut domains = log.load_domains().unwrap();
        domains.sort();
        assert_eq!(domains, vec!["bar.com".to_string(), "foo.com".to_string()]);
        assert_eq!(log.count_domains().unwrap(), 2);
    }

    #[test]
    fn test_append_is_idempotent() {
        let mut log = SqliteDomainLog::open_in_memory().unwrap();
        log.append_domain("foo.com").unwrap();
        log.append_domain("foo.com").unwrap();
        assert_eq!(log.count_domains().unwrap(), 1);
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seen.db");

        {
            let mut log = SqliteDomainLog::open(&path).unwrap();
            log.append_domain("foo.com").unwrap();
        }

        let log = SqliteDomainLog::open(&path).unwrap();
        assert_eq!(log.load_domains().unwrap(), vec!["foo.com".to_string()]);
        assert!(log.describe().starts_with("sqlite:"));
    }

    #[test]
    fn test_recent_domains() {
        let mut log = SqliteDomainLog::open_in_memory().unwrap();
        log.append_domain("a.com").unwrap();
        log.append_domain("b.com").unwrap();
        log.append_domain("c.com").unwrap();

        let recent = log.recent_domains(2).unwrap();
        assert_eq!(recent.len(), 2);
    }
}
