//! Job configuration
//!
//! All run parameters live in a TOML file of named jobs (opportunity sync,
//! activity sync, ...). The engine takes the resulting value object as a
//! parameter; there is no process-wide mutable configuration state. The
//! remote sink's access key is never stored in the file, only the name of
//! the environment variable holding it.

use crate::error::{Result, SyncError};
use crate::publish::{AppSheetColumns, AppSheetSink, ChangeSink, FeedCsvSink};
use indexmap::IndexMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level config file: a set of named sync jobs.
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    pub jobs: IndexMap<String, JobConfig>,
}

impl SyncConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            SyncError::config(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&raw)?;
        for (name, job) in &config.jobs {
            job.validate(name)?;
        }
        Ok(config)
    }

    pub fn job(&self, name: &str) -> Result<&JobConfig> {
        self.jobs.get(name).ok_or_else(|| SyncError::JobNotFound {
            name: name.to_string(),
        })
    }

    pub fn job_names(&self) -> impl Iterator<Item = &String> {
        self.jobs.keys()
    }
}

/// One reconciliation job: what to key on, what to diff, where the
/// snapshots and the feed live.
#[derive(Debug, Clone, Deserialize)]
pub struct JobConfig {
    pub key_column: String,
    pub tracked_columns: Vec<String>,
    /// Destination snapshot CSV, fully replaced at the end of each run.
    pub destination: PathBuf,
    /// Directory the upstream pipeline drops timestamped exports into.
    pub source_dir: PathBuf,
    /// Filename prefix of those exports.
    pub source_prefix: String,
    /// Where removed-entry archives go; omit to disable archiving.
    pub archive_dir: Option<PathBuf>,
    pub feed: FeedConfig,
}

impl JobConfig {
    fn validate(&self, name: &str) -> Result<()> {
        if self.key_column.is_empty() {
            return Err(SyncError::config(format!(
                "Job '{}' has an empty key_column",
                name
            )));
        }
        if self.tracked_columns.is_empty() {
            log::warn!(
                "Job '{}' tracks no columns; only additions and removals will be detected",
                name
            );
        }
        Ok(())
    }
}

/// Feed sink settings, one of the two interchangeable implementations.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum FeedConfig {
    /// Append rows to a local CSV feed file.
    Csv { path: PathBuf },
    /// Submit "Add" actions to a remote AppSheet table.
    Appsheet {
        app_id: String,
        table: String,
        #[serde(default = "default_region")]
        region: String,
        /// Name of the environment variable carrying the application
        /// access key.
        access_key_env: String,
        columns: AppSheetColumns,
    },
}

fn default_region() -> String {
    "www.appsheet.com".to_string()
}

impl FeedConfig {
    /// Construct the configured sink. Resolving the access key is the only
    /// fallible step; a missing variable is a configuration error.
    pub fn build_sink(&self) -> Result<Box<dyn ChangeSink>> {
        match self {
            Self::Csv { path } => Ok(Box::new(FeedCsvSink::new(path.clone()))),
            Self::Appsheet {
                app_id,
                table,
                region,
                access_key_env,
                columns,
            } => {
                let access_key = std::env::var(access_key_env).map_err(|_| {
                    SyncError::config(format!(
                        "Environment variable '{}' with the AppSheet access key is not set",
                        access_key_env
                    ))
                })?;
                Ok(Box::new(AppSheetSink::new(
                    app_id.clone(),
                    table.clone(),
                    region.clone(),
                    columns.clone(),
                    access_key,
                )))
            }
        }
    }
}
