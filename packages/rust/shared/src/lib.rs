//! Shared types, error model, and configuration for ttabkit.
//!
//! This crate is the foundation depended on by all other ttabkit crates.
//! It provides:
//! - [`TtabError`]: the unified error type
//! - Domain types ([`CaseRecord`], [`Party`], [`AppealRecord`], [`FileDescriptor`])
//! - Configuration ([`AppConfig`], config loading, credential lookup)
//! - Call pacing and retry ([`RateLimiter`], [`RetryPolicy`])

pub mod config;
pub mod error;
pub mod rate_limit;
pub mod retry;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, ClassifierConfig, CourtListenerConfig, DefaultsConfig, MatchingConfig, UsptoConfig,
    config_dir, config_file_path, init_config, load_config, load_config_from, read_credential,
};
pub use error::{Result, TtabError};
pub use rate_limit::RateLimiter;
pub use retry::{RetryPolicy, with_retry};
pub use types::{
    AppealRecord, Attorney, CaseRecord, CaseRecordBuilder, Dataset, FileDescriptor, Judge,
    Outcome, Party, PartyRole, ProceedingType, archive_stem, parse_compact_date,
};
