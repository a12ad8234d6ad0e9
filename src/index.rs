//! Key-based snapshot indexing
//!
//! Builds the key -> row lookup one reconciliation run works from. The
//! index is rebuilt fresh for every run and never persisted.

use crate::snapshot::{CellValue, Snapshot};
use indexmap::IndexMap;

/// Diagnostic counts from one index build. Not correctness-affecting;
/// surfaced for observability only.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct IndexStats {
    /// Rows too short to contain the key column.
    pub skipped_rows: usize,
    /// Rows whose key cell was null or empty.
    pub invalid_keys: usize,
    /// Keys seen more than once; the later row overwrote the earlier one.
    pub duplicate_keys: usize,
}

/// A key -> row lookup over one snapshot's data rows.
///
/// Only rows with a non-empty key participate. Duplicate keys are
/// last-wins, matching the upstream export pipeline's behavior.
#[derive(Debug, Clone)]
pub struct SnapshotIndex {
    entries: IndexMap<String, Vec<CellValue>>,
    stats: IndexStats,
}

impl SnapshotIndex {
    /// Build an index over `snapshot` using the given key column position.
    ///
    /// Never fails on malformed input: short rows and empty keys are
    /// counted and skipped, and a header-only snapshot yields an empty
    /// index.
    pub fn build(snapshot: &Snapshot, key_index: usize) -> Self {
        let mut entries: IndexMap<String, Vec<CellValue>> = IndexMap::new();
        let mut stats = IndexStats::default();

        for (row_number, row) in snapshot.rows.iter().enumerate() {
            if row.len() <= key_index {
                log::warn!(
                    "Row {} is too short for key column {}; skipping",
                    row_number + 2,
                    key_index
                );
                stats.skipped_rows += 1;
                continue;
            }
            let key_cell = &row[key_index];
            if key_cell.is_empty() {
                log::warn!("Row {} has an empty key; skipping", row_number + 2);
                stats.invalid_keys += 1;
                continue;
            }
            let key = key_cell.canonical_text();
            if entries.contains_key(&key) {
                log::warn!(
                    "Duplicate key '{}' at row {}; overwriting earlier row",
                    key,
                    row_number + 2
                );
                stats.duplicate_keys += 1;
            }
            entries.insert(key, row.clone());
        }

        log::debug!(
            "Indexed {} keys ({} short rows, {} invalid keys, {} duplicates)",
            entries.len(),
            stats.skipped_rows,
            stats.invalid_keys,
            stats.duplicate_keys
        );
        Self { entries, stats }
    }

    /// An index over nothing, used when the old snapshot has no usable
    /// header; every source key then classifies as new.
    pub fn empty() -> Self {
        Self {
            entries: IndexMap::new(),
            stats: IndexStats::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Vec<CellValue>> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<CellValue>)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> &IndexStats {
        &self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::CellValue;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    fn snapshot(rows: Vec<Vec<CellValue>>) -> Snapshot {
        Snapshot::new(vec!["id".to_string(), "stage".to_string()], rows)
    }

    #[test]
    fn test_header_only_snapshot_yields_empty_index() {
        let index = SnapshotIndex::build(&snapshot(Vec::new()), 0);
        assert!(index.is_empty());
        assert_eq!(index.stats(), &IndexStats::default());
    }

    #[test]
    fn test_duplicate_key_last_wins() {
        let index = SnapshotIndex::build(
            &snapshot(vec![
                vec![text("A"), text("Proposal")],
                vec![text("A"), text("Negotiation")],
            ]),
            0,
        );
        assert_eq!(index.len(), 1);
        assert_eq!(index.stats().duplicate_keys, 1);
        assert_eq!(index.get("A").unwrap()[1], text("Negotiation"));
    }

    #[test]
    fn test_short_row_is_skipped_not_fatal() {
        let index = SnapshotIndex::build(
            &snapshot(vec![vec![text("A"), text("Proposal")], Vec::new()]),
            1,
        );
        // The short row cannot contain the key column at index 1.
        assert_eq!(index.stats().skipped_rows, 1);
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_empty_key_is_skipped() {
        let index = SnapshotIndex::build(
            &snapshot(vec![
                vec![CellValue::Empty, text("Proposal")],
                vec![text(""), text("Negotiation")],
                vec![text("B"), text("Qualify")],
            ]),
            0,
        );
        assert_eq!(index.stats().invalid_keys, 2);
        assert_eq!(index.len(), 1);
        assert!(index.contains("B"));
    }

    #[test]
    fn test_numeric_keys_index_by_their_text() {
        let index = SnapshotIndex::build(
            &snapshot(vec![vec![CellValue::parse("42"), text("Proposal")]]),
            0,
        );
        assert!(index.contains("42"));
    }

    #[test]
    fn test_leading_zero_keys_stay_distinct() {
        let index = SnapshotIndex::build(
            &snapshot(vec![
                vec![CellValue::parse("075"), text("Proposal")],
                vec![CellValue::parse("75"), text("Negotiation")],
            ]),
            0,
        );
        assert_eq!(index.len(), 2);
        assert_eq!(index.stats().duplicate_keys, 0);
        assert!(index.contains("075"));
        assert!(index.contains("75"));
    }
}
