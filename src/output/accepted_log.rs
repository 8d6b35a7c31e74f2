//! Append-only log of accepted domains
//!
//! One canonical domain per line, written the moment it is classified as
//! affiliated so that an interrupted run loses nothing.

use crate::output::traits::{OutputError, OutputResult};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;

/// Shared writer for accepted domains
pub struct AcceptedLog {
    label: String,
    writer: Mutex<Box<dyn Write + Send>>,
}

impl AcceptedLog {
    /// Opens `path` in append mode, creating it (and its parent directory)
    pub fn open(path: &Path) -> OutputResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::from_writer(Box::new(file), path.display().to_string()))
    }

    /// Wraps an arbitrary writer
    pub fn from_writer(writer: Box<dyn Write + Send>, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            writer: Mutex::new(writer),
        }
    }

    /// Appends one domain and flushes it
    pub fn append(&self, domain: &str) -> OutputResult<()> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| OutputError::Write(format!("{}: writer lock poisoned", self.label)))?;

        writeln!(writer, "{}", domain)?;
        writer.flush()?;
        Ok(())
    }
}

impl std::fmt::Debug for AcceptedLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AcceptedLog").field("label", &self.label).finish()
    }
}
