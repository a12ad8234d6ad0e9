//! Change detection between two keyed snapshots
//!
//! One reconciliation run compares an old destination snapshot against a
//! freshly imported source snapshot, keyed by a business ID column, and
//! produces per-key change records plus the set of removed keys. Indices
//! and the change-set are built fresh per run and consumed immediately;
//! nothing here owns long-lived state, so concurrent runs over different
//! destinations are safe. Runs against the same destination must be
//! serialized by the caller.

use crate::error::{Result, SyncError};
use crate::index::SnapshotIndex;
use crate::snapshot::{values_differ, CellValue, Snapshot};
use chrono::{DateTime, Utc};
use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Status attached to keys that appear in only one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryStatus {
    #[serde(rename = "New entry added")]
    Added,
    #[serde(rename = "Entry removed")]
    Removed,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Added => "New entry added",
            Self::Removed => "Entry removed",
        }
    }
}

impl std::fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What one change record describes: either a tracked column whose value
/// moved, or a structural status for the key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChangeKind {
    Field {
        column: String,
        before: CellValue,
        after: CellValue,
    },
    Status {
        status: EntryStatus,
    },
}

/// One detected difference for a key, stamped with the comparison time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeRecord {
    #[serde(flatten)]
    pub kind: ChangeKind,
    pub recorded_at: DateTime<Utc>,
}

impl ChangeRecord {
    pub fn field(column: impl Into<String>, before: CellValue, after: CellValue) -> Self {
        Self {
            kind: ChangeKind::Field {
                column: column.into(),
                before,
                after,
            },
            recorded_at: Utc::now(),
        }
    }

    pub fn status(status: EntryStatus) -> Self {
        Self {
            kind: ChangeKind::Status { status },
            recorded_at: Utc::now(),
        }
    }

    /// Deduplication discriminator: column name for field changes, the
    /// status value for status records.
    fn discriminator(&self) -> String {
        match &self.kind {
            ChangeKind::Field { column, .. } => format!("column:{}", column),
            ChangeKind::Status { status } => format!("status:{}", status.as_str()),
        }
    }
}

/// Per-key ordered change records produced by one run.
pub type ChangeSet = IndexMap<String, Vec<ChangeRecord>>;

/// Result of one reconciliation run.
#[derive(Debug)]
pub struct DetectionOutcome {
    pub changes: ChangeSet,
    pub removed_keys: IndexSet<String>,
    /// Last-known rows for every old key; removal consumers read the final
    /// field values of a removed entry from here.
    pub old_index: SnapshotIndex,
    pub new_index: SnapshotIndex,
}

impl DetectionOutcome {
    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub fn total_records(&self) -> usize {
        self.changes.values().map(|records| records.len()).sum()
    }
}

/// Detector walking a pair of snapshots.
pub struct ChangeDetector;

impl ChangeDetector {
    /// Compare `old` against `new`, keyed by `key_column`, diffing only
    /// `tracked_columns`.
    ///
    /// The key column must resolve against the new snapshot's header;
    /// nothing can be correlated without it and the run aborts with a
    /// configuration error before any side effect. A key column missing
    /// from the old header degrades to an empty old index (every source
    /// key classifies as new). A tracked column missing from either header
    /// is skipped for the whole run, with a log line.
    pub fn detect(
        old: &Snapshot,
        new: &Snapshot,
        key_column: &str,
        tracked_columns: &[String],
    ) -> Result<DetectionOutcome> {
        let new_key_index = new.column_index(key_column).ok_or_else(|| {
            SyncError::config(format!(
                "Key column '{}' not found in source snapshot header",
                key_column
            ))
        })?;

        let old_index = match old.column_index(key_column) {
            Some(old_key_index) => SnapshotIndex::build(old, old_key_index),
            None => {
                log::warn!(
                    "Key column '{}' not found in destination header; treating all entries as new",
                    key_column
                );
                SnapshotIndex::empty()
            }
        };
        let new_index = SnapshotIndex::build(new, new_key_index);

        // Column positions are resolved once per header; the two exports
        // are ordered independently, so the name is the only join key.
        let mut column_pairs = Vec::new();
        for column in tracked_columns {
            let old_idx = old.column_index(column);
            let new_idx = new.column_index(column);
            match (old_idx, new_idx) {
                (Some(o), Some(n)) => column_pairs.push((column.as_str(), o, n)),
                _ => log::warn!(
                    "Tracked column '{}' missing from a header (old: {:?}, new: {:?}); skipping",
                    column,
                    old_idx,
                    new_idx
                ),
            }
        }

        static EMPTY: CellValue = CellValue::Empty;
        let mut changes: ChangeSet = IndexMap::new();

        for (key, new_row) in new_index.iter() {
            match old_index.get(key) {
                Some(old_row) => {
                    for &(column, old_idx, new_idx) in &column_pairs {
                        // Cells past the end of a short row compare as empty.
                        let before = old_row.get(old_idx).unwrap_or(&EMPTY);
                        let after = new_row.get(new_idx).unwrap_or(&EMPTY);
                        if values_differ(before, after) {
                            log::debug!(
                                "Change for '{}': {} '{}' -> '{}'",
                                key,
                                column,
                                before,
                                after
                            );
                            changes
                                .entry(key.clone())
                                .or_default()
                                .push(ChangeRecord::field(column, before.clone(), after.clone()));
                        }
                    }
                }
                None => {
                    log::debug!("New entry '{}'", key);
                    changes
                        .entry(key.clone())
                        .or_default()
                        .push(ChangeRecord::status(EntryStatus::Added));
                }
            }
        }

        let mut removed_keys = IndexSet::new();
        for key in old_index.keys() {
            if !new_index.contains(key) {
                log::debug!("Removed entry '{}'", key);
                removed_keys.insert(key.clone());
                changes
                    .entry(key.clone())
                    .or_default()
                    .push(ChangeRecord::status(EntryStatus::Removed));
            }
        }

        dedupe_change_set(&mut changes);
        log::info!(
            "Detection finished: {} keys changed, {} removed",
            changes.len(),
            removed_keys.len()
        );

        Ok(DetectionOutcome {
            changes,
            removed_keys,
            old_index,
            new_index,
        })
    }
}

/// Collapse repeated records per key down to the latest entry per distinct
/// discriminator, restored to chronological order.
///
/// Upstream retries can append several records for the same column or
/// status in one raw list; only the most recent is meaningful.
pub fn dedupe_change_set(changes: &mut ChangeSet) {
    for records in changes.values_mut() {
        let mut seen = HashSet::new();
        let mut kept = Vec::with_capacity(records.len());
        for record in records.drain(..).rev() {
            if seen.insert(record.discriminator()) {
                kept.push(record);
            }
        }
        kept.reverse();
        *records = kept;
    }
}
