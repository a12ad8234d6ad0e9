//! Snapshot representation and CSV I/O
//!
//! A snapshot is one header row plus data rows captured at a point in time.
//! Cells keep the exact text they were loaded with; keys and CSV output
//! always use that raw lexeme, so identity is stable ("075" and "75" are
//! different keys) and a destination replace never rewrites cell contents.
//! The typed interpretation attached at parse time exists only for value
//! comparison: date-bearing columns compare by instant rather than by
//! string representation, because the same export pipeline emits a typed
//! timestamp in one run and its string serialization in the next.

use crate::error::Result;
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde::de::Deserializer;
use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// A single cell value: the raw field text plus its typed interpretation.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Bool { raw: String, value: bool },
    Number { raw: String, value: f64 },
    Timestamp { raw: String, instant: DateTime<Utc> },
    Text(String),
}

impl CellValue {
    /// Parse a raw CSV field into a typed cell. The original text is kept
    /// verbatim; only the interpretation is attached.
    pub fn parse(field: &str) -> Self {
        if field.is_empty() {
            return Self::Empty;
        }
        match field {
            "TRUE" | "true" => {
                return Self::Bool {
                    raw: field.to_string(),
                    value: true,
                }
            }
            "FALSE" | "false" => {
                return Self::Bool {
                    raw: field.to_string(),
                    value: false,
                }
            }
            _ => {}
        }
        if let Ok(n) = field.parse::<f64>() {
            if n.is_finite() {
                return Self::Number {
                    raw: field.to_string(),
                    value: n,
                };
            }
        }
        if let Some(ts) = parse_instant(field) {
            return Self::Timestamp {
                raw: field.to_string(),
                instant: ts,
            };
        }
        Self::Text(field.to_string())
    }

    /// The underlying time instant, if this cell is date-like.
    ///
    /// Text cells are coerced by parsing; a non-parseable text cell has no
    /// instant and compares unequal to any timestamp.
    pub fn as_instant(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Timestamp { instant, .. } => Some(*instant),
            Self::Text(s) => parse_instant(s),
            _ => None,
        }
    }

    /// Numeric interpretation, used for comparison only. Identity and
    /// output never go through this.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Number { value, .. } => Some(*value),
            Self::Text(s) => s.parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        }
    }

    /// The exact field text, used for keying and for CSV output.
    ///
    /// Empty is the canonical "" so that null and empty string are equal.
    pub fn canonical_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Bool { raw, .. } => raw.clone(),
            Self::Number { raw, .. } => raw.clone(),
            Self::Timestamp { raw, .. } => raw.clone(),
            Self::Text(s) => s.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty) || matches!(self, Self::Text(s) if s.is_empty())
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.canonical_text())
    }
}

// Cells cross the serialization boundary as their raw text (null for
// empty); the typed interpretation is re-derived on the way back in.
impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            Self::Empty => serializer.serialize_unit(),
            other => serializer.serialize_str(&other.canonical_text()),
        }
    }
}

impl<'de> Deserialize<'de> for CellValue {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw: Option<String> = Option::deserialize(deserializer)?;
        Ok(match raw {
            None => Self::Empty,
            Some(s) => Self::parse(&s),
        })
    }
}

/// Decide whether two cell values differ (the value comparator).
///
/// If either side is date-like, the comparison is by instant; a timestamp
/// against a non-parseable value is a difference. Numeric cells compare by
/// value, so a typed 75000 equals its "75000" serialization. Otherwise
/// both sides are compared by raw text, which folds null/empty together.
pub fn values_differ(before: &CellValue, after: &CellValue) -> bool {
    if matches!(before, CellValue::Timestamp { .. })
        || matches!(after, CellValue::Timestamp { .. })
    {
        return match (before.as_instant(), after.as_instant()) {
            (Some(a), Some(b)) => a != b,
            _ => true,
        };
    }
    if let (CellValue::Bool { value: a, .. }, CellValue::Bool { value: b, .. }) = (before, after) {
        return a != b;
    }
    if let (Some(a), Some(b)) = (before.as_number(), after.as_number()) {
        return a != b;
    }
    before.canonical_text() != after.canonical_text()
}

fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(s) {
        return Some(ts.with_timezone(&Utc));
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

/// A header + rows tabular dataset captured at one point in time.
///
/// Rows should all match the header length, but short rows are tolerated
/// everywhere downstream: the indexer skips them instead of failing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub header: Vec<String>,
    pub rows: Vec<Vec<CellValue>>,
}

impl Snapshot {
    pub fn new(header: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        Self { header, rows }
    }

    /// Resolve a column name to its positional index (the column resolver).
    ///
    /// Exact, case-sensitive match. The old and new snapshots are
    /// independently produced exports, so this must be called against each
    /// header separately; position is never a reliable join key.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.header.iter().position(|h| h == name)
    }

    /// True when the snapshot has no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Load a snapshot from a CSV file. An empty file yields an empty
    /// snapshot (no header, no rows).
    pub fn load_csv(path: &Path) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(path)?;

        let mut header = Vec::new();
        let mut rows = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record?;
            if i == 0 {
                header = record.iter().map(|s| s.to_string()).collect();
            } else {
                rows.push(record.iter().map(CellValue::parse).collect());
            }
        }

        log::debug!(
            "Loaded snapshot from {}: {} columns, {} rows",
            path.display(),
            header.len(),
            rows.len()
        );
        Ok(Self { header, rows })
    }

    /// Overwrite the destination file entirely with this snapshot
    /// (full replace semantics, not incremental). Cells are written back
    /// as their raw text; a load/write round trip changes nothing.
    pub fn write_csv(&self, path: &Path) -> Result<()> {
        let mut writer = csv::WriterBuilder::new()
            .flexible(true)
            .from_path(path)?;
        writer.write_record(&self.header)?;
        for row in &self.rows {
            writer.write_record(row.iter().map(|cell| cell.canonical_text()))?;
        }
        writer.flush()?;
        log::info!(
            "Replaced {} with {} rows",
            path.display(),
            self.rows.len()
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cell_parse() {
        assert_eq!(CellValue::parse(""), CellValue::Empty);
        assert_eq!(
            CellValue::parse("TRUE"),
            CellValue::Bool {
                raw: "TRUE".to_string(),
                value: true
            }
        );
        assert_eq!(
            CellValue::parse("75000"),
            CellValue::Number {
                raw: "75000".to_string(),
                value: 75000.0
            }
        );
        assert_eq!(
            CellValue::parse("Closed Won"),
            CellValue::Text("Closed Won".to_string())
        );
        assert!(matches!(
            CellValue::parse("2024-01-01T00:00:00Z"),
            CellValue::Timestamp { .. }
        ));
    }

    #[test]
    fn test_parse_keeps_raw_lexeme() {
        assert_eq!(CellValue::parse("075").canonical_text(), "075");
        assert_eq!(CellValue::parse("true").canonical_text(), "true");
        assert_eq!(
            CellValue::parse("2024-01-01T00:00:00Z").canonical_text(),
            "2024-01-01T00:00:00Z"
        );
    }

    #[test]
    fn test_date_equivalence_across_representations() {
        let typed = CellValue::parse("2024-01-01T00:00:00Z");
        let serialized = CellValue::Text("2024-01-01T00:00:00.000Z".to_string());
        assert!(!values_differ(&typed, &serialized));
    }

    #[test]
    fn test_date_against_unparseable_text_differs() {
        let typed = CellValue::parse("2024-01-01T00:00:00Z");
        let text = CellValue::Text("next quarter".to_string());
        assert!(values_differ(&typed, &text));
    }

    #[test]
    fn test_empty_null_equivalence() {
        let empty_forms = [CellValue::Empty, CellValue::Text(String::new())];
        for a in &empty_forms {
            for b in &empty_forms {
                assert!(!values_differ(a, b), "{:?} vs {:?}", a, b);
            }
        }
    }

    #[test]
    fn test_number_text_coercion() {
        assert!(!values_differ(
            &CellValue::parse("75000"),
            &CellValue::Text("75000".to_string())
        ));
        assert!(values_differ(
            &CellValue::parse("75000"),
            &CellValue::parse("80000")
        ));
    }

    #[test]
    fn test_bool_case_variants_compare_equal() {
        assert!(!values_differ(
            &CellValue::parse("TRUE"),
            &CellValue::parse("true")
        ));
        assert!(values_differ(
            &CellValue::parse("TRUE"),
            &CellValue::parse("FALSE")
        ));
    }

    #[test]
    fn test_cell_serializes_as_raw_text() {
        assert_eq!(
            serde_json::to_value(CellValue::parse("075")).unwrap(),
            serde_json::json!("075")
        );
        assert_eq!(
            serde_json::to_value(CellValue::Empty).unwrap(),
            serde_json::Value::Null
        );
    }

    #[test]
    fn test_column_index_is_exact_and_case_sensitive() {
        let snapshot = Snapshot::new(
            vec!["id".to_string(), "stage".to_string()],
            Vec::new(),
        );
        assert_eq!(snapshot.column_index("stage"), Some(1));
        assert_eq!(snapshot.column_index("Stage"), None);
        assert_eq!(snapshot.column_index("missing"), None);
    }

    #[test]
    fn test_csv_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        let snapshot = Snapshot::new(
            vec!["id".to_string(), "stage".to_string()],
            vec![
                vec![
                    CellValue::Text("A".to_string()),
                    CellValue::Text("Proposal".to_string()),
                ],
                vec![CellValue::Text("B".to_string()), CellValue::Empty],
            ],
        );
        snapshot.write_csv(&path).unwrap();
        let loaded = Snapshot::load_csv(&path).unwrap();
        assert_eq!(loaded.header, snapshot.header);
        assert_eq!(loaded.row_count(), 2);
        assert_eq!(loaded.rows[1][1], CellValue::Empty);
    }

    #[test]
    fn test_csv_round_trip_preserves_raw_lexemes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snap.csv");
        let original = "id,amount,close_date\n00123,075,2024-01-01T00:00:00Z\n";
        std::fs::write(&path, original).unwrap();

        let loaded = Snapshot::load_csv(&path).unwrap();
        let out = dir.path().join("out.csv");
        loaded.write_csv(&out).unwrap();

        assert_eq!(std::fs::read_to_string(&out).unwrap(), original);
    }
}
