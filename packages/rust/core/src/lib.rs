//! Pipeline orchestration for ttabkit.
//!
//! This crate ties acquisition, classification, extraction, appeal matching
//! and the output sinks together into the `acquire`, `extract`, `enrich` and
//! `run` workflows.

pub mod pipeline;
pub mod progress;
pub mod sink;
pub mod stats;

pub use pipeline::{AcquirePlan, ExtractPlan, acquire, enrich, extract, run};
pub use progress::{ProgressReporter, SilentProgress};
pub use sink::{CaseSink, Tee};
pub use stats::RunStats;
