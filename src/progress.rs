//! Progress reporting utilities

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Progress reporter for a reconciliation run.
#[derive(Debug)]
pub struct ProgressReporter {
    pub detect_pb: Option<ProgressBar>,
    pub publish_pb: Option<ProgressBar>,
    show_progress: bool,
}

impl ProgressReporter {
    /// Create progress reporter for a sync run.
    pub fn new_for_sync() -> Self {
        Self {
            detect_pb: Some(create_spinner("Detecting changes...")),
            publish_pb: None,
            show_progress: true,
        }
    }

    /// Create minimal progress reporter (no progress bars).
    pub fn new_minimal() -> Self {
        Self {
            detect_pb: None,
            publish_pb: None,
            show_progress: false,
        }
    }

    /// Finish change detection.
    pub fn finish_detection(&mut self, message: &str) {
        if let Some(pb) = self.detect_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }

    /// Start the publish bar once the number of changed keys is known.
    pub fn begin_publish(&mut self, total: u64) {
        if self.show_progress && self.publish_pb.is_none() {
            self.publish_pb = Some(create_progress_bar(total, "Publishing feed entries"));
        }
    }

    /// Update publish progress.
    pub fn update_publish(&mut self, processed: u64) {
        if let Some(pb) = &self.publish_pb {
            pb.set_position(processed);
            pb.tick();
        }
    }

    /// Finish publishing.
    pub fn finish_publish(&mut self, message: &str) {
        if let Some(pb) = self.publish_pb.take() {
            pb.finish_with_message(message.to_string());
        }
    }
}

impl Drop for ProgressReporter {
    fn drop(&mut self) {
        // Ensure all progress bars are cleaned up silently
        if let Some(pb) = self.detect_pb.take() {
            pb.finish_and_clear();
        }
        if let Some(pb) = self.publish_pb.take() {
            pb.finish_and_clear();
        }
    }
}

/// Create a spinner progress bar
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.green} {msg}")
            .expect("Invalid progress template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Create a progress bar with known total
fn create_progress_bar(total: u64, message: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>4}/{len:4} {msg}")
            .expect("Invalid progress template")
            .progress_chars("#>-"),
    );
    pb.set_message(message.to_string());
    pb
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_reporter_never_creates_bars() {
        let mut reporter = ProgressReporter::new_minimal();
        reporter.begin_publish(10);
        reporter.update_publish(5);
        assert!(reporter.detect_pb.is_none());
        assert!(reporter.publish_pb.is_none());
    }

    #[test]
    fn test_sync_reporter_creates_publish_bar_lazily() {
        let mut reporter = ProgressReporter::new_for_sync();
        assert!(reporter.detect_pb.is_some());
        assert!(reporter.publish_pb.is_none());
        reporter.begin_publish(3);
        assert!(reporter.publish_pb.is_some());
    }
}
