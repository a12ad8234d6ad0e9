//! End-to-end sync workflow tests over a temporary workspace

use oppsync::cli::Commands;
use oppsync::commands::execute_command;
use std::path::{Path, PathBuf};

struct SyncFixture {
    _dir: tempfile::TempDir,
    root: PathBuf,
    config_path: PathBuf,
    destination: PathBuf,
    feed: PathBuf,
    exports: PathBuf,
    archive: PathBuf,
}

impl SyncFixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();
        let destination = root.join("Opportunities.csv");
        let feed = root.join("Feed.csv");
        let exports = root.join("exports");
        let archive = root.join("archive");
        std::fs::create_dir_all(&exports).unwrap();

        let config_path = root.join("oppsync.toml");
        let config = format!(
            r#"
[jobs.opportunities]
key_column = "id"
tracked_columns = ["stage"]
destination = "{dest}"
source_dir = "{exports}"
source_prefix = "Opportunities"
archive_dir = "{archive}"

[jobs.opportunities.feed]
kind = "csv"
path = "{feed}"
"#,
            dest = destination.display(),
            exports = exports.display(),
            archive = archive.display(),
            feed = feed.display(),
        );
        std::fs::write(&config_path, config).unwrap();

        Self {
            _dir: dir,
            root,
            config_path,
            destination,
            feed,
            exports,
            archive,
        }
    }

    fn write_destination(&self, contents: &str) {
        std::fs::write(&self.destination, contents).unwrap();
    }

    fn write_export(&self, timestamp: &str, contents: &str) {
        let name = format!("Opportunities {}.csv", timestamp);
        std::fs::write(self.exports.join(name), contents).unwrap();
    }

    fn run_sync(&self) -> oppsync::Result<()> {
        execute_command(
            Commands::Sync {
                job: "opportunities".to_string(),
                dry_run: false,
            },
            &self.config_path,
        )
    }

    fn feed_lines(&self) -> Vec<String> {
        if !self.feed.exists() {
            return Vec::new();
        }
        std::fs::read_to_string(&self.feed)
            .unwrap()
            .lines()
            .map(|line| line.to_string())
            .collect()
    }
}

fn read(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap()
}

#[test]
fn full_sync_publishes_archives_and_replaces_destination() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\nB,Negotiation\n");
    fixture.write_export(
        "2025-07-03T10:00:00.000Z",
        "id,stage\nA,Closed Won\nC,New\n",
    );

    fixture.run_sync().unwrap();

    // Feed carries one update, one addition, and one removal entry.
    let lines = fixture.feed_lines();
    assert_eq!(lines[0], "id,update,date,shared");
    assert_eq!(lines.len(), 4);
    let body = lines.join("\n");
    assert!(body.contains("stage: 'Proposal' -> 'Closed Won'"));
    assert!(body.contains("New entry added (ID: C)"));
    assert!(body.contains("Entry removed"));

    // The removed entry was archived with its final field values.
    let archives: Vec<_> = std::fs::read_dir(&fixture.archive)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .collect();
    assert_eq!(archives.len(), 1);
    let doc = read(&archives[0]);
    assert!(doc.contains("# Removed entry summary: B"));
    assert!(doc.contains("- stage: Negotiation"));

    // The destination was fully replaced with the export contents.
    let dest = read(&fixture.destination);
    assert!(dest.contains("Closed Won"));
    assert!(dest.contains("C,New"));
    assert!(!dest.contains("B,Negotiation"));
}

#[test]
fn rerun_after_sync_publishes_nothing_new() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\n");
    fixture.write_export("2025-07-03T10:00:00.000Z", "id,stage\nA,Closed Won\n");

    fixture.run_sync().unwrap();
    let after_first = fixture.feed_lines().len();

    // The destination now matches the export; a re-run detects nothing.
    fixture.run_sync().unwrap();
    assert_eq!(fixture.feed_lines().len(), after_first);
}

#[test]
fn newest_export_by_embedded_timestamp_is_used() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\n");
    fixture.write_export("2025-07-01T10:00:00.000Z", "id,stage\nA,Qualify\n");
    fixture.write_export("2025-07-05T10:00:00.000Z", "id,stage\nA,Closed Won\n");

    fixture.run_sync().unwrap();

    let body = fixture.feed_lines().join("\n");
    assert!(body.contains("'Proposal' -> 'Closed Won'"));
    assert!(!body.contains("Qualify"));
}

#[test]
fn empty_destination_is_replaced_without_publishing() {
    let fixture = SyncFixture::new();
    fixture.write_export("2025-07-03T10:00:00.000Z", "id,stage\nA,Proposal\n");

    fixture.run_sync().unwrap();

    assert!(fixture.destination.exists());
    assert!(read(&fixture.destination).contains("A,Proposal"));
    assert!(fixture.feed_lines().is_empty());
    assert!(!fixture.archive.exists());
}

#[test]
fn missing_key_column_aborts_before_any_side_effect() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\n");
    fixture.write_export("2025-07-03T10:00:00.000Z", "name,stage\nA,Closed Won\n");

    let err = fixture.run_sync().unwrap_err();
    assert!(matches!(err, oppsync::SyncError::Config { .. }));

    // Nothing was published and the destination still has the old rows.
    assert!(fixture.feed_lines().is_empty());
    assert!(read(&fixture.destination).contains("A,Proposal"));
}

#[test]
fn no_export_present_is_a_clean_no_op() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\n");

    fixture.run_sync().unwrap();

    assert!(fixture.feed_lines().is_empty());
    assert!(read(&fixture.destination).contains("A,Proposal"));
}

#[test]
fn dry_run_touches_nothing() {
    let fixture = SyncFixture::new();
    fixture.write_destination("id,stage\nA,Proposal\n");
    fixture.write_export("2025-07-03T10:00:00.000Z", "id,stage\nA,Closed Won\n");

    execute_command(
        Commands::Sync {
            job: "opportunities".to_string(),
            dry_run: true,
        },
        &fixture.config_path,
    )
    .unwrap();

    assert!(fixture.feed_lines().is_empty());
    assert!(read(&fixture.destination).contains("A,Proposal"));
    assert!(!fixture.archive.exists());
}

#[test]
fn diff_command_writes_json_results() {
    let fixture = SyncFixture::new();
    let old = fixture.root.join("old.csv");
    let new = fixture.root.join("new.csv");
    let out = fixture.root.join("diff.json");
    std::fs::write(&old, "id,stage\nA,Proposal\n").unwrap();
    std::fs::write(&new, "id,stage\nA,Closed Won\n").unwrap();

    execute_command(
        Commands::Diff {
            old,
            new,
            key_column: "id".to_string(),
            tracked_columns: vec!["stage".to_string()],
            format: "json".to_string(),
            output: Some(out.clone()),
        },
        &fixture.config_path,
    )
    .unwrap();

    let value: serde_json::Value = serde_json::from_str(&read(&out)).unwrap();
    assert_eq!(value["changes"]["A"][0]["before"], "Proposal");
    assert_eq!(value["changes"]["A"][0]["after"], "Closed Won");
    assert_eq!(value["removed_keys"], serde_json::json!([]));
}
