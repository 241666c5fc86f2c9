//! Bulk archive acquisition: remote listing, deduplicating rate-limited
//! downloads, and background unpacking.
//!
//! This crate provides:
//! - [`listing`]: the dataset products endpoint client and date windows
//! - [`fetcher`]: [`Fetcher::ensure_local`], one archive at a time behind a shared limiter
//! - [`unpack`]: [`UnpackSet`], concurrent extraction with a wait-all barrier

pub mod fetcher;
pub mod listing;
pub mod unpack;

pub use fetcher::{FetchOutcome, Fetcher, LocalState};
pub use listing::{ListingClient, Window};
pub use unpack::{UnpackReport, UnpackResult, UnpackSet, unpack_archive};

/// User-Agent string for portal requests.
pub(crate) const USER_AGENT: &str = concat!("ttabkit/", env!("CARGO_PKG_VERSION"));

/// Header carrying the portal API key.
pub(crate) const API_KEY_HEADER: &str = "X-API-KEY";
