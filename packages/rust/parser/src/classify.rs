//! Opinion classification.
//!
//! The primary rule is a range check over history-event codes. Only when an
//! entry carries no code at all does the ordered heuristic list get a say.

use regex::Regex;
use tracing::warn;

use ttabkit_shared::ClassifierConfig;

use crate::entry::ProceedingEntry;

/// Qualifying decision codes. 850 through 854 are excluded on purpose.
pub fn is_decision_code(code: u32) -> bool {
    matches!(code, 802..=849 | 855..=894)
}

// ---------------------------------------------------------------------------
// Classification
// ---------------------------------------------------------------------------

/// How an entry was classified, and on which signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// A history code fell inside a qualifying range.
    DecisionCode(u32),
    /// Codes were present but none qualified. Heuristics are not consulted.
    NonDecisionCodes,
    /// No codes; the named heuristic accepted the entry.
    Heuristic(&'static str),
    /// No codes and no heuristic accepted.
    NoSignal,
}

impl Classification {
    pub fn is_opinion(&self) -> bool {
        matches!(self, Self::DecisionCode(_) | Self::Heuristic(_))
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

/// One fallback predicate. Implementations must be pure.
pub trait OpinionHeuristic: Send + Sync {
    fn name(&self) -> &'static str;

    fn matches(&self, entry: &ProceedingEntry) -> bool;
}

/// Whole-word, case-insensitive keyword match on descriptive text.
pub struct KeywordHeuristic {
    pattern: Option<Regex>,
}

impl KeywordHeuristic {
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Self {
        let alternatives: Vec<String> = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(regex::escape)
            .collect();
        if alternatives.is_empty() {
            return Self { pattern: None };
        }
        let source = format!(r"(?i)\b(?:{})\b", alternatives.join("|"));
        let pattern = match Regex::new(&source) {
            Ok(re) => Some(re),
            Err(e) => {
                warn!(error = %e, "keyword list did not compile, keyword heuristic disabled");
                None
            }
        };
        Self { pattern }
    }
}

impl OpinionHeuristic for KeywordHeuristic {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn matches(&self, entry: &ProceedingEntry) -> bool {
        self.pattern
            .as_ref()
            .is_some_and(|re| re.is_match(&entry.descriptive_text()))
    }
}

/// At least one judge name can be extracted.
pub struct JudgeNameHeuristic;

impl OpinionHeuristic for JudgeNameHeuristic {
    fn name(&self) -> &'static str {
        "judge-name"
    }

    fn matches(&self, entry: &ProceedingEntry) -> bool {
        !entry.judge_names().is_empty()
    }
}

/// Case-insensitive decision language anywhere in the entry text.
pub struct DecisionPhraseHeuristic {
    phrases: Vec<String>,
}

impl DecisionPhraseHeuristic {
    pub fn new<S: AsRef<str>>(phrases: &[S]) -> Self {
        Self {
            phrases: phrases
                .iter()
                .map(|p| p.as_ref().trim().to_lowercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }
}

impl OpinionHeuristic for DecisionPhraseHeuristic {
    fn name(&self) -> &'static str {
        "decision-phrase"
    }

    fn matches(&self, entry: &ProceedingEntry) -> bool {
        if self.phrases.is_empty() {
            return false;
        }
        let text = entry.free_text().to_lowercase();
        self.phrases.iter().any(|p| text.contains(p.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Classifier
// ---------------------------------------------------------------------------

/// Holds the heuristics in evaluation order.
pub struct Classifier {
    heuristics: Vec<Box<dyn OpinionHeuristic>>,
}

impl Classifier {
    /// Keyword, judge-name, then decision-phrase, built from config.
    pub fn new(config: &ClassifierConfig) -> Self {
        Self {
            heuristics: vec![
                Box::new(KeywordHeuristic::new(&config.keywords)),
                Box::new(JudgeNameHeuristic),
                Box::new(DecisionPhraseHeuristic::new(&config.decision_phrases)),
            ],
        }
    }

    /// No heuristics at all: code-less entries are never opinions.
    pub fn codes_only() -> Self {
        Self {
            heuristics: Vec::new(),
        }
    }

    /// Append a heuristic after the existing ones.
    pub fn with_heuristic(mut self, heuristic: Box<dyn OpinionHeuristic>) -> Self {
        self.heuristics.push(heuristic);
        self
    }

    pub fn heuristic_names(&self) -> Vec<&'static str> {
        self.heuristics.iter().map(|h| h.name()).collect()
    }

    pub fn classify(&self, entry: &ProceedingEntry) -> Classification {
        let mut saw_code = false;
        for code in entry.history_codes() {
            if is_decision_code(code) {
                return Classification::DecisionCode(code);
            }
            saw_code = true;
        }
        if saw_code {
            return Classification::NonDecisionCodes;
        }

        self.heuristics
            .iter()
            .find(|h| h.matches(entry))
            .map(|h| Classification::Heuristic(h.name()))
            .unwrap_or(Classification::NoSignal)
    }

    pub fn is_opinion(&self, entry: &ProceedingEntry) -> bool {
        self.classify(entry).is_opinion()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(&ClassifierConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{entry, fixture};
    use crate::xml::EntryReader;

    fn with_code(code: u32, text: &str) -> ProceedingEntry {
        entry(&format!(
            "<proceeding-entry><number>91123456</number><prosecution-history><prosecution-entry>\
             <code>{code}</code><history-text>{text}</history-text></prosecution-entry>\
             </prosecution-history></proceeding-entry>"
        ))
    }

    #[test]
    fn every_qualifying_code_is_an_opinion() {
        let classifier = Classifier::default();
        for code in (802..=849).chain(855..=894) {
            assert_eq!(
                classifier.classify(&with_code(code, "")),
                Classification::DecisionCode(code)
            );
        }
    }

    #[test]
    fn gap_codes_are_not_opinions() {
        let classifier = Classifier::default();
        for code in 850..=854 {
            assert!(!classifier.is_opinion(&with_code(code, "")), "code {code}");
        }
        assert!(!classifier.is_opinion(&with_code(801, "")));
        assert!(!classifier.is_opinion(&with_code(895, "")));
    }

    #[test]
    fn codes_present_suppress_heuristics() {
        let classifier = Classifier::default();
        let e = with_code(852, "OPINION: it is ordered that the opposition is sustained");
        assert_eq!(classifier.classify(&e), Classification::NonDecisionCodes);
    }

    #[test]
    fn any_qualifying_code_among_many() {
        let e = entry(
            "<proceeding-entry><prosecution-history>\
             <prosecution-entry><code>101</code></prosecution-entry>\
             <prosecution-entry><code>851</code></prosecution-entry>\
             <prosecution-entry><code>870</code></prosecution-entry>\
             </prosecution-history></proceeding-entry>",
        );
        assert_eq!(Classifier::default().classify(&e), Classification::DecisionCode(870));
    }

    #[test]
    fn empty_entry_without_codes_is_not_opinion() {
        let e = entry("<proceeding-entry></proceeding-entry>");
        assert_eq!(Classifier::default().classify(&e), Classification::NoSignal);
    }

    #[test]
    fn heuristics_run_in_order() {
        let classifier = Classifier::default();
        assert_eq!(
            classifier.heuristic_names(),
            vec!["keyword", "judge-name", "decision-phrase"]
        );

        let keyword = entry("<proceeding-entry><document-type>Final Decision</document-type></proceeding-entry>");
        assert_eq!(classifier.classify(&keyword), Classification::Heuristic("keyword"));

        let judge = entry("<proceeding-entry><judges><judge>Wellington</judge></judges></proceeding-entry>");
        assert_eq!(classifier.classify(&judge), Classification::Heuristic("judge-name"));

        let phrase = entry("<proceeding-entry><free-text>Accordingly, IT IS ORDERED that</free-text></proceeding-entry>");
        assert_eq!(classifier.classify(&phrase), Classification::Heuristic("decision-phrase"));
    }

    #[test]
    fn keywords_match_whole_words_only() {
        let classifier = Classifier::default();
        let e = entry("<proceeding-entry><document-type>decisional memo</document-type></proceeding-entry>");
        assert_eq!(classifier.classify(&e), Classification::NoSignal);
    }

    #[test]
    fn custom_heuristic_extends_the_chain() {
        struct StatusTerminated;
        impl OpinionHeuristic for StatusTerminated {
            fn name(&self) -> &'static str {
                "status-terminated"
            }
            fn matches(&self, entry: &ProceedingEntry) -> bool {
                entry.element().child_text("status") == Some("TERMINATED")
            }
        }

        let classifier = Classifier::codes_only().with_heuristic(Box::new(StatusTerminated));
        let e = entry("<proceeding-entry><status>TERMINATED</status></proceeding-entry>");
        assert_eq!(classifier.classify(&e), Classification::Heuristic("status-terminated"));
    }

    #[test]
    fn fixture_document_classification() {
        let xml = fixture("daily_sample.xml");
        let classifier = Classifier::default();
        let verdicts: Vec<bool> = EntryReader::new(xml.as_bytes())
            .map(|e| classifier.is_opinion(&ProceedingEntry::new(e.expect("entry"))))
            .collect();
        assert_eq!(verdicts, vec![true, false, true, true, false]);
    }
}
