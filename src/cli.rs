//! Command-line interface for oppsync

use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "oppsync")]
#[command(about = "Keyed snapshot reconciliation for CRM opportunity exports")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the jobs config file
    #[arg(long, global = true, default_value = "oppsync.toml")]
    pub config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Reconcile a job's destination snapshot against its latest source export
    Sync {
        /// Job name from the config file
        job: String,

        /// Detect and report changes without publishing, archiving, or
        /// replacing the destination
        #[arg(long)]
        dry_run: bool,
    },

    /// Compare two snapshot CSV files directly, without side effects
    Diff {
        /// Old snapshot CSV
        old: PathBuf,

        /// New snapshot CSV
        new: PathBuf,

        /// Key column name, present in the new snapshot's header
        #[arg(long)]
        key_column: String,

        /// Tracked column name (repeat for several)
        #[arg(long = "track", value_name = "COLUMN")]
        tracked_columns: Vec<String>,

        /// Output format: "pretty", "json"
        #[arg(long, default_value = "pretty")]
        format: String,

        /// Custom output file for JSON results
        #[arg(long)]
        output: Option<PathBuf>,
    },

    /// Show the latest source export discovered for a job
    Discover {
        /// Job name from the config file
        job: String,
    },

    /// List the jobs defined in the config file
    Jobs,
}

/// Parse output format string
#[derive(Debug, Clone)]
pub enum OutputFormat {
    Pretty,
    Json,
}

impl OutputFormat {
    pub fn parse(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            _ => Err(format!("Invalid output format: {}. Use 'pretty' or 'json'", s)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_format_parse() {
        assert!(matches!(OutputFormat::parse("pretty"), Ok(OutputFormat::Pretty)));
        assert!(matches!(OutputFormat::parse("JSON"), Ok(OutputFormat::Json)));
        assert!(OutputFormat::parse("yaml").is_err());
    }

    #[test]
    fn test_cli_parses_sync_command() {
        let cli = Cli::try_parse_from(["oppsync", "sync", "opportunities", "--dry-run"]).unwrap();
        assert!(matches!(
            cli.command,
            Commands::Sync { ref job, dry_run: true } if job == "opportunities"
        ));
    }

    #[test]
    fn test_cli_parses_diff_with_tracked_columns() {
        let cli = Cli::try_parse_from([
            "oppsync",
            "diff",
            "old.csv",
            "new.csv",
            "--key-column",
            "id",
            "--track",
            "stage",
            "--track",
            "amount",
        ])
        .unwrap();
        match cli.command {
            Commands::Diff {
                key_column,
                tracked_columns,
                ..
            } => {
                assert_eq!(key_column, "id");
                assert_eq!(tracked_columns, vec!["stage", "amount"]);
            }
            _ => panic!("expected diff command"),
        }
    }
}
