//! Source export discovery
//!
//! The upstream pipeline drops exports into a directory as
//! `<prefix> <RFC3339 timestamp>.csv`. Each run picks the newest one by
//! the timestamp embedded in the name, not by filesystem mtime.

use crate::error::{Result, SyncError};
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use walkdir::WalkDir;

/// A discovered export: the newest file plus any older siblings.
#[derive(Debug, Clone)]
pub struct ResolvedExport {
    pub latest: PathBuf,
    pub exported_at: DateTime<Utc>,
    pub older: Vec<PathBuf>,
}

/// Finds the latest timestamped export for one job.
#[derive(Debug)]
pub struct ExportResolver {
    dir: PathBuf,
    prefix: String,
}

impl ExportResolver {
    pub fn new(dir: impl Into<PathBuf>, prefix: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            prefix: prefix.into(),
        }
    }

    /// Scan the export directory. Returns `Ok(None)` when no file matches;
    /// that is a "nothing to sync" outcome, not an error. Files whose
    /// timestamp suffix does not parse are skipped with a warning.
    pub fn resolve_latest(&self) -> Result<Option<ResolvedExport>> {
        if !self.dir.is_dir() {
            return Err(SyncError::invalid_input(format!(
                "Export directory does not exist: {}",
                self.dir.display()
            )));
        }

        let mut matches: Vec<(DateTime<Utc>, PathBuf)> = Vec::new();
        for entry in WalkDir::new(&self.dir).max_depth(1) {
            let entry = entry?;
            if !entry.file_type().is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            match self.parse_export_name(&name) {
                Some(ts) => matches.push((ts, entry.path().to_path_buf())),
                None => {
                    if name.starts_with(&self.prefix) {
                        log::warn!(
                            "File '{}' matches prefix but its timestamp does not parse; skipping",
                            name
                        );
                    }
                }
            }
        }

        if matches.is_empty() {
            log::info!(
                "No export matching '{} <timestamp>.csv' under {}",
                self.prefix,
                self.dir.display()
            );
            return Ok(None);
        }

        matches.sort_by(|a, b| b.0.cmp(&a.0));
        let (exported_at, latest) = matches.remove(0);
        let older = matches.into_iter().map(|(_, path)| path).collect();
        log::info!(
            "Latest export: {} (exported {})",
            latest.display(),
            exported_at.to_rfc3339()
        );
        Ok(Some(ResolvedExport {
            latest,
            exported_at,
            older,
        }))
    }

    /// Extract the embedded timestamp from `<prefix> <RFC3339>.csv`.
    fn parse_export_name(&self, name: &str) -> Option<DateTime<Utc>> {
        let rest = name.strip_prefix(&self.prefix)?.strip_prefix(' ')?;
        let stamp = rest.strip_suffix(".csv")?;
        DateTime::parse_from_rfc3339(stamp)
            .ok()
            .map(|ts| ts.with_timezone(&Utc))
    }
}
