//! Plain-text domain log
//!
//! One canonical domain per line, appended and flushed as each domain is
//! recorded. This is the format the harvest history has always been kept in,
//! so an existing history file can be pointed at directly.

use crate::storage::traits::{DomainLog, StorageResult};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

/// Line-oriented, append-only domain log
pub struct LineDomainLog {
    path: PathBuf,
    file: File,
}

impl LineDomainLog {
    /// Opens the log at `path` in append mode, creating it (and its parent
    /// directory) when missing
    pub fn open(path: &Path) -> StorageResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;

        Ok(Self {
            path: path.to_path_buf(),
            file,
        })
    }
}

impl DomainLog for LineDomainLog {
    fn load_domains(&self) -> StorageResult<Vec<String>> {
        let reader = BufReader::new(File::open(&self.path)?);
        let mut domains = Vec::new();

        for line in reader.lines() {
            // A torn or non-UTF-8 line from an interrupted write is skipped
            let Ok(line) = line else { continue };
            let trimmed = line.trim();
            if !trimmed.is_empty() {
                domains.push(trimmed.to_string());
            }
        }

        Ok(domains)
    }

    fn append_domain(&mut self, domain: &str) -> StorageResult<()> {
        writeln!(self.file, "{}", domain)?;
        self.file.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("lines:{}", self.path.display())
    }
}
