//! Appellate follow-up: correlate Board decisions with Federal Circuit cases.
//!
//! This crate provides:
//! - [`client`]: [`CourtListenerClient`], the rate-limited search API client
//! - [`matcher`]: [`AppealMatcher`], the tiered exact-then-fuzzy strategy

pub mod client;
pub mod matcher;

pub use client::{CourtListenerClient, SearchHit};
pub use matcher::{AppealMatcher, MatchOutcome, MatchTier, name_overlap, score_candidate};
