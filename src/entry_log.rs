//! The dated entry log.
//!
//! Entries are stored newest first:
//!
//! ```text
//! ## 2026-10-19
//! Intention: ...
//! Why: ...
//! Done when: ...
//!
//! ## 2026-10-18
//! ...
//! ```

use crate::config::write_atomically;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::info;

/// Formats one entry: header, trimmed text, blank-line separator.
pub fn format_entry(date: NaiveDate, refined: &str) -> String {
    format!("## {}\n{}\n\n", date, refined.trim())
}

pub struct EntryLog {
    path: PathBuf,
}

impl EntryLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Prepends a new entry, replacing the whole file.
    pub fn prepend(&self, date: NaiveDate, refined: &str) -> Result<()> {
        let existing = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", self.path.display()));
            }
        };

        let mut content = format_entry(date, refined);
        content.push_str(&existing);
        write_atomically(&self.path, &content)?;

        info!("Wrote entry for {} to {}", date, self.path.display());
        Ok(())
    }
}
