//! Proceeding-entry parsing, opinion classification, and case extraction.
//!
//! This crate provides:
//! - [`xml`]: a streaming reader that yields one [`Element`] tree per `proceeding-entry`
//! - [`entry`]: [`ProceedingEntry`], typed access to the fields of one entry
//! - [`classify`]: [`Classifier`], the code-range rule plus ordered heuristics
//! - [`extract`]: [`CaseExtractor`], entry to [`CaseRecord`](ttabkit_shared::CaseRecord)
//! - [`documents`]: [`DocumentSet`], a lazy and restartable walk over unpacked XML files
//!
//! Nothing here touches the network.

pub mod classify;
pub mod documents;
pub mod entry;
pub mod extract;
pub mod xml;

pub use classify::{
    Classification, Classifier, DecisionPhraseHeuristic, JudgeNameHeuristic, KeywordHeuristic,
    OpinionHeuristic, is_decision_code,
};
pub use documents::{Document, DocumentSet};
pub use entry::{HistoryItem, ProceedingEntry};
pub use extract::{CaseExtractor, DataIssue, Extraction};
pub use xml::{Element, EntryReader};
