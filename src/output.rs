//! Output formatting utilities

use crate::change_detection::{ChangeKind, DetectionOutcome};
use crate::error::Result;
use crate::publish::PublishReport;
use serde_json::json;

/// Pretty printer for oppsync output
pub struct PrettyPrinter;

impl PrettyPrinter {
    /// Print a detection outcome as a tree
    pub fn print_outcome(outcome: &DetectionOutcome) {
        println!("🔍 Reconciliation results");
        println!("├─ Keys with changes: {}", outcome.changes.len());
        println!("├─ Removed keys: {}", outcome.removed_keys.len());

        let key_count = outcome.changes.len();
        for (i, (key, records)) in outcome.changes.iter().enumerate() {
            let is_last_key = i == key_count - 1;
            let key_prefix = if is_last_key { "└─" } else { "├─" };
            println!("{} {}", key_prefix, key);

            for (j, record) in records.iter().enumerate() {
                let branch = if is_last_key { "   " } else { "│  " };
                let marker = if j == records.len() - 1 { "└─" } else { "├─" };
                match &record.kind {
                    ChangeKind::Field {
                        column,
                        before,
                        after,
                    } => println!("{}{} {}: '{}' → '{}'", branch, marker, column, before, after),
                    ChangeKind::Status { status } => println!("{}{} {}", branch, marker, status),
                }
            }
        }

        if outcome.changes.is_empty() {
            println!("└─ ✅ No changes detected");
        }
    }

    /// Print the end-of-run summary for a sync
    pub fn print_sync_summary(
        job: &str,
        outcome: &DetectionOutcome,
        report: &PublishReport,
        archived: usize,
    ) {
        println!("📊 Sync summary for '{}'", job);
        println!("├─ Keys with changes: {}", outcome.changes.len());
        println!("├─ Removed keys: {}", outcome.removed_keys.len());
        println!("├─ Feed entries published: {}", report.published);
        if report.failed > 0 {
            println!("├─ ❌ Feed entries failed: {}", report.failed);
        }
        println!("└─ Archives written: {}", archived);
    }
}

/// JSON formatter for machine-readable output
pub struct JsonFormatter;

impl JsonFormatter {
    /// Format any serializable data as JSON
    pub fn format<T: serde::Serialize + ?Sized>(data: &T) -> Result<String> {
        Ok(serde_json::to_string_pretty(data)?)
    }

    /// Format a detection outcome as JSON
    pub fn format_outcome(outcome: &DetectionOutcome) -> Result<String> {
        let value = json!({
            "changes": outcome.changes,
            "removed_keys": outcome.removed_keys,
            "old_index_stats": outcome.old_index.stats(),
            "new_index_stats": outcome.new_index.stats(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }
}
