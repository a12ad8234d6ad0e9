//! Command implementations for the oppsync CLI

use crate::archive::ArchiveWriter;
use crate::change_detection::ChangeDetector;
use crate::cli::{Commands, OutputFormat};
use crate::config::SyncConfig;
use crate::error::{Result, SyncError};
use crate::output::{JsonFormatter, PrettyPrinter};
use crate::progress::ProgressReporter;
use crate::publish::{publish_updates, removal_summary, DisabledSummarizer, FeedEntry};
use crate::resolver::ExportResolver;
use crate::snapshot::Snapshot;
use std::path::Path;

/// Execute a command
pub fn execute_command(command: Commands, config_path: &Path) -> Result<()> {
    match command {
        Commands::Sync { job, dry_run } => sync_command(config_path, &job, dry_run),
        Commands::Diff {
            old,
            new,
            key_column,
            tracked_columns,
            format,
            output,
        } => diff_command(&old, &new, &key_column, &tracked_columns, &format, output.as_deref()),
        Commands::Discover { job } => discover_command(config_path, &job),
        Commands::Jobs => jobs_command(config_path),
    }
}

/// Reconcile one job: discover the latest export, diff it against the
/// destination, publish the change feed, archive removals, and replace
/// the destination snapshot.
///
/// The net effect is all-or-nothing at the configuration level: a fatal
/// configuration error aborts before any side effect, while per-key
/// publish failures are logged and the run continues to completion.
fn sync_command(config_path: &Path, job_name: &str, dry_run: bool) -> Result<()> {
    let config = SyncConfig::load(config_path)?;
    let job = config.job(job_name)?;

    let resolver = ExportResolver::new(&job.source_dir, &job.source_prefix);
    let export = match resolver.resolve_latest()? {
        Some(export) => export,
        None => {
            println!("No new source export found for '{}'; nothing to sync.", job_name);
            return Ok(());
        }
    };
    let source = Snapshot::load_csv(&export.latest)?;

    let destination = if job.destination.exists() {
        Snapshot::load_csv(&job.destination)?
    } else {
        Snapshot::new(Vec::new(), Vec::new())
    };

    // Empty destination: nothing to compare against, replace directly.
    if destination.is_empty() {
        if dry_run {
            println!("Destination is empty; a real run would replace it with the export.");
            return Ok(());
        }
        source.write_csv(&job.destination)?;
        println!(
            "✅ Destination was empty; replaced directly with {}",
            export.latest.display()
        );
        return Ok(());
    }

    let mut progress = if dry_run {
        ProgressReporter::new_minimal()
    } else {
        ProgressReporter::new_for_sync()
    };
    let outcome =
        ChangeDetector::detect(&destination, &source, &job.key_column, &job.tracked_columns)?;
    progress.finish_detection(&format!(
        "Detected changes for {} keys ({} removed)",
        outcome.changes.len(),
        outcome.removed_keys.len()
    ));

    if dry_run {
        PrettyPrinter::print_outcome(&outcome);
        return Ok(());
    }

    let sink = job.feed.build_sink()?;
    let summarizer = DisabledSummarizer;
    let mut report = publish_updates(
        &outcome.changes,
        &outcome.removed_keys,
        sink.as_ref(),
        &summarizer,
        &mut progress,
    );

    // Removed keys get archived first, then one final feed entry each.
    let archiver = job.archive_dir.as_ref().map(|dir| ArchiveWriter::new(dir));
    let mut archived = 0;
    for key in &outcome.removed_keys {
        let archive_path = match (&archiver, outcome.old_index.get(key)) {
            (Some(writer), Some(row)) => {
                let history = outcome
                    .changes
                    .get(key)
                    .map(|records| records.as_slice())
                    .unwrap_or(&[]);
                match writer.write_removed_entry(key, &destination.header, row, history) {
                    Ok(path) => {
                        archived += 1;
                        Some(path)
                    }
                    Err(e) => {
                        log::error!("Failed to archive removed entry '{}': {}", key, e);
                        None
                    }
                }
            }
            _ => None,
        };

        let entry = FeedEntry::new(key.clone(), removal_summary(archive_path.as_deref()));
        match sink.publish(&entry) {
            Ok(()) => report.published += 1,
            Err(e) => {
                log::error!("Failed to publish removal of '{}': {}", key, e);
                report.failed += 1;
            }
        }
        progress.update_publish((report.published + report.failed) as u64);
    }
    progress.finish_publish(&format!(
        "Published {} feed entries ({} failed)",
        report.published, report.failed
    ));

    source.write_csv(&job.destination)?;
    if !export.older.is_empty() {
        // Older exports are left in place; cleanup is a manual step.
        log::info!("{} older export file(s) left in {}", export.older.len(), job.source_dir.display());
    }

    PrettyPrinter::print_sync_summary(job_name, &outcome, &report, archived);
    Ok(())
}

/// Compare two snapshot files without touching any sink or destination.
fn diff_command(
    old_path: &Path,
    new_path: &Path,
    key_column: &str,
    tracked_columns: &[String],
    format: &str,
    output: Option<&Path>,
) -> Result<()> {
    let format = OutputFormat::parse(format).map_err(SyncError::invalid_input)?;
    let old = Snapshot::load_csv(old_path)?;
    let new = Snapshot::load_csv(new_path)?;
    let outcome = ChangeDetector::detect(&old, &new, key_column, tracked_columns)?;

    match format {
        OutputFormat::Pretty => PrettyPrinter::print_outcome(&outcome),
        OutputFormat::Json => {
            let rendered = JsonFormatter::format_outcome(&outcome)?;
            match output {
                Some(path) => {
                    std::fs::write(path, rendered)?;
                    println!("Diff results written to {}", path.display());
                }
                None => println!("{}", rendered),
            }
        }
    }
    Ok(())
}

/// Show the latest export discovery result for a job.
fn discover_command(config_path: &Path, job_name: &str) -> Result<()> {
    let config = SyncConfig::load(config_path)?;
    let job = config.job(job_name)?;
    let resolver = ExportResolver::new(&job.source_dir, &job.source_prefix);

    match resolver.resolve_latest()? {
        Some(export) => {
            println!("📂 Latest export for '{}'", job_name);
            println!("├─ File: {}", export.latest.display());
            println!("├─ Exported: {}", export.exported_at.to_rfc3339());
            println!("└─ Older exports: {}", export.older.len());
        }
        None => println!("No export found for '{}'.", job_name),
    }
    Ok(())
}

/// List configured jobs.
fn jobs_command(config_path: &Path) -> Result<()> {
    let config = SyncConfig::load(config_path)?;
    println!("🗂  Configured jobs:");
    let count = config.jobs.len();
    for (i, (name, job)) in config.jobs.iter().enumerate() {
        let prefix = if i == count - 1 { "└─" } else { "├─" };
        println!(
            "{} {} (key: {}, tracked columns: {})",
            prefix,
            name,
            job.key_column,
            job.tracked_columns.len()
        );
    }
    Ok(())
}
