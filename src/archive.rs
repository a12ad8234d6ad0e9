//! Archive documents for removed entries
//!
//! When a key disappears from the source export, its last-known field
//! values and the change records of the run are written out as a Markdown
//! document before the destination snapshot is replaced. The archive is
//! the only durable trace of a removed entry.

use crate::change_detection::{ChangeKind, ChangeRecord};
use crate::error::Result;
use crate::snapshot::CellValue;
use chrono::Utc;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Writes removed-entry summaries into an archive directory.
#[derive(Debug)]
pub struct ArchiveWriter {
    dir: PathBuf,
}

impl ArchiveWriter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Write the archive document for one removed key and return its path.
    ///
    /// `header` and `row` are the destination snapshot's header and the
    /// key's last-known row; `history` is the run's change records for it.
    pub fn write_removed_entry(
        &self,
        key: &str,
        header: &[String],
        row: &[CellValue],
        history: &[ChangeRecord],
    ) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let now = Utc::now();
        let path = self.next_free_path(key, &now);

        let mut doc = String::new();
        let _ = writeln!(doc, "# Removed entry summary: {}", key);
        let _ = writeln!(doc);
        let _ = writeln!(doc, "Archived: {}", now.to_rfc3339());
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## Final field values");
        let _ = writeln!(doc);
        for (i, name) in header.iter().enumerate() {
            let value = row.get(i).unwrap_or(&CellValue::Empty);
            let _ = writeln!(doc, "- {}: {}", name, value);
        }
        let _ = writeln!(doc);
        let _ = writeln!(doc, "## Change history from this run");
        let _ = writeln!(doc);
        if history.is_empty() {
            let _ = writeln!(doc, "(none)");
        }
        for record in history {
            match &record.kind {
                ChangeKind::Field {
                    column,
                    before,
                    after,
                } => {
                    let _ = writeln!(
                        doc,
                        "- {}: {}: '{}' -> '{}'",
                        record.recorded_at.to_rfc3339(),
                        column,
                        before,
                        after
                    );
                }
                ChangeKind::Status { status } => {
                    let _ = writeln!(doc, "- {}: {}", record.recorded_at.to_rfc3339(), status);
                }
            }
        }

        std::fs::write(&path, doc)?;
        log::info!("Archived removed entry '{}' to {}", key, path.display());
        Ok(path)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Pick a filename that does not clobber an earlier archive of the
    /// same key. The timestamp is second-granular; a counter suffix
    /// disambiguates anything faster than that.
    fn next_free_path(&self, key: &str, now: &chrono::DateTime<Utc>) -> PathBuf {
        let stamp = now.format("%Y-%m-%dT%H-%M-%S");
        let base = format!("removed-{}-{}", sanitize(key), stamp);
        let mut path = self.dir.join(format!("{}.md", base));
        let mut n = 1;
        while path.exists() {
            n += 1;
            path = self.dir.join(format!("{}-{}.md", base, n));
        }
        path
    }
}

/// Keys come straight from CRM data and can contain path-hostile
/// characters ("Microsoft A/S").
fn sanitize(key: &str) -> String {
    key.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect()
}
