//! Change publishing boundary
//!
//! Turns a deduplicated change-set into feed entries and hands them to a
//! sink, one key at a time. A failed publish is logged and the loop moves
//! on; one bad key never blocks the rest of the run.

use crate::change_detection::{ChangeKind, ChangeRecord, ChangeSet};
use crate::error::{Result, SyncError};
use crate::progress::ProgressReporter;
use chrono::{DateTime, SecondsFormat, Utc};
use indexmap::IndexSet;
use serde_json::json;
use std::path::{Path, PathBuf};

/// Feed value written to the "processed" column for fresh entries.
pub const UNPROCESSED_FLAG: &str = "FALSE";

/// One summarized feed entry, ready for a sink.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub id: String,
    pub change_log: String,
    pub recorded_at: DateTime<Utc>,
}

impl FeedEntry {
    pub fn new(id: impl Into<String>, change_log: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            change_log: change_log.into(),
            recorded_at: Utc::now(),
        }
    }
}

/// Opaque natural-language generation boundary.
///
/// `None` means the generator was unavailable or declined; callers fall
/// back to a literal rendering and never crash on it.
pub trait Summarizer {
    fn summarize(&self, prompt: &str) -> Option<String>;
}

/// Summarizer used when no text-generation service is wired up; every
/// change falls back to its literal rendering.
#[derive(Debug, Default)]
pub struct DisabledSummarizer;

impl Summarizer for DisabledSummarizer {
    fn summarize(&self, _prompt: &str) -> Option<String> {
        None
    }
}

/// Destination for feed entries.
pub trait ChangeSink: std::fmt::Debug {
    fn publish(&self, entry: &FeedEntry) -> Result<()>;
    fn describe(&self) -> String;
}

/// Row-append sink: appends `[id, update, date, shared]` rows to a CSV
/// feed file, creating it with a header on first use.
#[derive(Debug)]
pub struct FeedCsvSink {
    path: PathBuf,
}

impl FeedCsvSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl ChangeSink for FeedCsvSink {
    fn publish(&self, entry: &FeedEntry) -> Result<()> {
        let exists = self.path.exists();
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);
        if !exists {
            writer.write_record(["id", "update", "date", "shared"])?;
        }
        writer.write_record([
            entry.id.as_str(),
            entry.change_log.as_str(),
            &entry
                .recorded_at
                .to_rfc3339_opts(SecondsFormat::Secs, true),
            UNPROCESSED_FLAG,
        ])?;
        writer.flush()?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("feed CSV {}", self.path.display())
    }
}

/// Column mapping for the remote tabular-data feed table.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct AppSheetColumns {
    pub id: String,
    pub summary: String,
    pub timestamp: String,
    pub processed: String,
}

/// Remote tabular API sink: submits an "Add" action per feed entry.
///
/// HTTP 200 is success and 409 is idempotent success (the row already
/// exists from an earlier attempt); anything else fails that key.
#[derive(Debug)]
pub struct AppSheetSink {
    app_id: String,
    table: String,
    region: String,
    columns: AppSheetColumns,
    access_key: String,
    client: reqwest::blocking::Client,
}

impl AppSheetSink {
    pub fn new(
        app_id: impl Into<String>,
        table: impl Into<String>,
        region: impl Into<String>,
        columns: AppSheetColumns,
        access_key: impl Into<String>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            table: table.into(),
            region: region.into(),
            columns,
            access_key: access_key.into(),
            client: reqwest::blocking::Client::new(),
        }
    }

    fn action_url(&self) -> String {
        format!(
            "https://{}/api/v2/apps/{}/tables/{}/Action",
            self.region, self.app_id, self.table
        )
    }
}

impl ChangeSink for AppSheetSink {
    fn publish(&self, entry: &FeedEntry) -> Result<()> {
        let mut row = serde_json::Map::new();
        row.insert(self.columns.id.clone(), json!(entry.id));
        row.insert(self.columns.summary.clone(), json!(entry.change_log));
        row.insert(
            self.columns.timestamp.clone(),
            json!(entry.recorded_at.to_rfc3339()),
        );
        row.insert(self.columns.processed.clone(), json!(UNPROCESSED_FLAG));
        let payload = json!({
            "Action": "Add",
            "Properties": { "Locale": "en-US" },
            "Rows": [row]
        });

        let response = self
            .client
            .post(self.action_url())
            .header("ApplicationAccessKey", &self.access_key)
            .json(&payload)
            .send()?;

        match response.status().as_u16() {
            200 => Ok(()),
            409 => {
                log::info!("Feed row for '{}' already exists; treating as success", entry.id);
                Ok(())
            }
            code => {
                let body = response.text().unwrap_or_default();
                Err(SyncError::publish(format!(
                    "AppSheet Add for '{}' failed with HTTP {}: {}",
                    entry.id, code, body
                )))
            }
        }
    }

    fn describe(&self) -> String {
        format!("AppSheet table '{}' on {}", self.table, self.region)
    }
}

/// Render one key's deduplicated records into a single feed line.
///
/// Status records become `"<status> (ID: <key>)"`; field changes go
/// through the summarizer, falling back to a literal
/// `column: 'before' -> 'after'` line when it yields nothing.
pub fn build_change_summary(
    key: &str,
    records: &[ChangeRecord],
    summarizer: &dyn Summarizer,
) -> String {
    let parts: Vec<String> = records
        .iter()
        .map(|record| match &record.kind {
            ChangeKind::Status { status } => format!("{} (ID: {})", status, key),
            ChangeKind::Field {
                column,
                before,
                after,
            } => {
                let prompt = format!(
                    "An opportunity was updated. Describe the following change in \
                     simple, natural language, stating only the new value. Here is \
                     the change: {}",
                    json!({ "column": column, "from": before, "to": after })
                );
                summarizer
                    .summarize(&prompt)
                    .unwrap_or_else(|| format!("{}: '{}' -> '{}'", column, before, after))
            }
        })
        .collect();
    parts.join("; ")
}

/// Feed line published for a removed key after its archive was written.
pub fn removal_summary(archive_path: Option<&Path>) -> String {
    match archive_path {
        Some(path) => format!(
            "Entry removed: a final summary has been archived at {}",
            path.display()
        ),
        None => "Entry removed".to_string(),
    }
}

/// Outcome counts for one publish pass.
#[derive(Debug, Default, PartialEq)]
pub struct PublishReport {
    pub published: usize,
    pub failed: usize,
}

/// Publish every changed key except removed ones (those get their own
/// pass after archiving). Failures are per-key: logged, counted, and
/// skipped over.
pub fn publish_updates(
    changes: &ChangeSet,
    removed_keys: &IndexSet<String>,
    sink: &dyn ChangeSink,
    summarizer: &dyn Summarizer,
    progress: &mut ProgressReporter,
) -> PublishReport {
    let mut report = PublishReport::default();
    let pending = changes
        .iter()
        .filter(|(key, _)| !removed_keys.contains(key.as_str()));

    progress.begin_publish(changes.len() as u64);
    for (key, records) in pending {
        let summary = build_change_summary(key, records, summarizer);
        let entry = FeedEntry::new(key.clone(), summary);
        match sink.publish(&entry) {
            Ok(()) => {
                log::info!("Published feed entry for '{}'", key);
                report.published += 1;
            }
            Err(e) => {
                log::error!("Failed to publish '{}' to {}: {}", key, sink.describe(), e);
                report.failed += 1;
            }
        }
        progress.update_publish((report.published + report.failed) as u64);
    }
    report
}
