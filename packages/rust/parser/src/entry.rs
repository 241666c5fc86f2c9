//! Typed view over one `proceeding-entry` element.

use std::sync::LazyLock;

use regex::Regex;

use crate::xml::Element;

/// Case-number fields, most authoritative first.
const CASE_NUMBER_FIELDS: &[&str] = &["number", "case-number", "proceeding-number"];

/// Fields whose text describes what kind of document the entry is.
const DESCRIPTIVE_FIELDS: &[&str] = &["document-type", "description", "title", "status"];

static CASE_NUMBER_IN_TEXT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{8})\b").expect("valid regex"));

static JUDGE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        r"Administrative Trademark Judges?\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)",
        r"\bJudge\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)",
        r"\bBefore\s+([A-Z][a-z]+(?:\s+[A-Z][a-z]+)*(?:\s*(?:,|\band\b)\s*[A-Z][a-z]+(?:\s+[A-Z][a-z]+)*)*)",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("valid regex"))
    .collect()
});

/// Separators inside a panel list: "Wellington, Cataldo and Lykos".
static PANEL_SEPARATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*(?:,|\band\b)\s*").expect("valid regex"));

/// Leading words that make a "name" match a phrase instead.
const NOT_A_NAME: &[&str] = &[
    "The",
    "This",
    "That",
    "Board",
    "Administrative",
    "Trademark",
    "Interlocutory",
];

/// One item of the prosecution history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryItem {
    /// Numeric event code, when it parses.
    pub code: Option<u32>,
    /// Raw date token, validated later.
    pub date: Option<String>,
    pub text: String,
}

/// A proceeding entry with accessors for the fields the pipeline reads.
#[derive(Debug, Clone)]
pub struct ProceedingEntry {
    element: Element,
    history: Vec<HistoryItem>,
}

impl ProceedingEntry {
    pub fn new(element: Element) -> Self {
        let history = element
            .select("prosecution-history/prosecution-entry")
            .into_iter()
            .map(|item| HistoryItem {
                code: item
                    .child_text("code")
                    .and_then(|c| c.trim().parse::<u32>().ok()),
                date: item.child_text("date").map(str::to_string),
                text: item
                    .child_text("history-text")
                    .unwrap_or_default()
                    .to_string(),
            })
            .collect();
        Self { element, history }
    }

    pub fn element(&self) -> &Element {
        &self.element
    }

    /// Case number from the structured fields, else the first 8-digit token
    /// anywhere in the entry.
    pub fn case_number(&self) -> Option<String> {
        CASE_NUMBER_FIELDS
            .iter()
            .find_map(|f| self.element.child_text(f))
            .map(str::to_string)
            .or_else(|| {
                CASE_NUMBER_IN_TEXT
                    .captures(&self.element.text_content())
                    .map(|c| c[1].to_string())
            })
    }

    pub fn history(&self) -> &[HistoryItem] {
        &self.history
    }

    /// Every numeric history-event code, in document order.
    pub fn history_codes(&self) -> impl Iterator<Item = u32> + '_ {
        self.history.iter().filter_map(|h| h.code)
    }

    /// Descriptive fields plus history text.
    pub fn descriptive_text(&self) -> String {
        let mut parts: Vec<&str> = DESCRIPTIVE_FIELDS
            .iter()
            .filter_map(|f| self.element.child_text(f))
            .collect();
        parts.extend(
            self.history
                .iter()
                .map(|h| h.text.as_str())
                .filter(|t| !t.is_empty()),
        );
        parts.join(" ")
    }

    /// All text in the entry.
    pub fn free_text(&self) -> String {
        self.element.text_content()
    }

    /// Judges from structured `judges`/`panel`/`judge` elements, otherwise
    /// names following a judicial title in the entry text. Deduplicated,
    /// first appearance first.
    pub fn judge_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::new();

        let containers: Vec<&Element> = ["judges", "panel"]
            .iter()
            .flat_map(|c| self.element.descendants_named(c))
            .collect();
        let judge_elements: Vec<&Element> = if containers.is_empty() {
            self.element.descendants_named("judge")
        } else {
            containers
                .iter()
                .flat_map(|c| c.descendants_named("judge"))
                .collect()
        };
        for judge in judge_elements {
            match judge.child_text("name") {
                Some(name) => push_name(&mut names, name),
                None => push_name(&mut names, &judge.text),
            }
        }
        if !names.is_empty() {
            return names;
        }

        let text = self.free_text();
        for pattern in JUDGE_PATTERNS.iter() {
            for caps in pattern.captures_iter(&text) {
                for candidate in PANEL_SEPARATOR.split(&caps[1]) {
                    let first = candidate.split_whitespace().next().unwrap_or_default();
                    if !NOT_A_NAME.contains(&first) {
                        push_name(&mut names, candidate);
                    }
                }
            }
        }
        names
    }
}

fn push_name(names: &mut Vec<String>, name: &str) {
    let name = name.trim();
    if !name.is_empty() && !names.iter().any(|n| n == name) {
        names.push(name.to_string());
    }
}
