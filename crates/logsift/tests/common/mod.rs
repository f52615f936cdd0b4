//! Shared utilities for logsift integration tests.
//!
//! - `TestHarness`: temp object store, in-memory database, in-process queue
//! - `RecordingNotifier`: captures every pushed notification
//! - `FlakyStore`: object store whose downloads fail on demand

pub mod harness;
pub mod recording;

pub use harness::{FlakyStore, TestHarness};
pub use recording::RecordingNotifier;

/// Builds a log body of `lines` records, every third one flagged.
pub fn sample_log(lines: usize) -> String {
    (0..lines)
        .map(|i| {
            if i % 3 == 0 {
                format!("[2024-05-01 12:00:{:02}] ERROR request {} timeout from 10.1.0.{}\n", i % 60, i, i % 250)
            } else {
                format!("[2024-05-01T12:00:{:02}Z] info request {} ok\n", i % 60, i)
            }
        })
        .collect()
}
