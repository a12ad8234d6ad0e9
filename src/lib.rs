//! # oppsync
//!
//! Keyed snapshot reconciliation for CRM opportunity exports: detects
//! field-level changes, additions, and removals between an old destination
//! snapshot and a freshly imported source snapshot, publishes per-key
//! change summaries to a feed, archives removed entries, and replaces the
//! destination with the new export.

pub mod cli;
pub mod error;
pub mod config;
pub mod snapshot;
pub mod index;
pub mod change_detection;
pub mod publish;
pub mod archive;
pub mod resolver;
pub mod commands;
pub mod output;
pub mod progress;

pub use change_detection::{ChangeDetector, ChangeSet, DetectionOutcome};
pub use error::{Result, SyncError};
pub use snapshot::{CellValue, Snapshot};
