//! Progress callbacks for the CLI spinner.

use crate::stats::RunStats;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter: Send + Sync {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called after each archive is resolved.
    fn file_acquired(&self, name: &str, current: usize, total: usize);
    /// Called when a document is opened.
    fn document(&self, name: &str, current: usize, total: usize);
    /// Called after each record reaches the sink.
    fn record(&self, case_number: &str, count: u64);
    /// Called when the operation completes.
    fn done(&self, stats: &RunStats);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn file_acquired(&self, _name: &str, _current: usize, _total: usize) {}
    fn document(&self, _name: &str, _current: usize, _total: usize) {}
    fn record(&self, _case_number: &str, _count: u64) {}
    fn done(&self, _stats: &RunStats) {}
}
