//! Per-run counters.

use std::collections::BTreeMap;

use serde::Serialize;

/// Everything a run counts. Serialized into the run history table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunStats {
    pub listed: u64,
    pub fetched: u64,
    pub skipped_duplicate: u64,
    pub fetch_failed: u64,
    pub unpacked: u64,
    pub unpack_failed: u64,

    pub documents: u64,
    pub document_errors: u64,
    pub entries: u64,
    pub malformed: u64,
    pub opinions_extracted: u64,
    pub non_opinions: u64,
    pub unkeyable: u64,

    pub matched: u64,
    pub unmatched: u64,
    pub already_matched: u64,
    pub match_errors: u64,

    /// Data-quality findings by kind.
    pub data_issues: BTreeMap<String, u64>,
    /// Whether the record cap ended the run early.
    pub limit_reached: bool,
}

impl RunStats {
    pub fn record_issue(&mut self, kind: &str) {
        *self.data_issues.entry(kind.to_string()).or_default() += 1;
    }

    /// Fold another stage's counters into this one.
    pub fn merge(&mut self, other: RunStats) {
        self.listed += other.listed;
        self.fetched += other.fetched;
        self.skipped_duplicate += other.skipped_duplicate;
        self.fetch_failed += other.fetch_failed;
        self.unpacked += other.unpacked;
        self.unpack_failed += other.unpack_failed;
        self.documents += other.documents;
        self.document_errors += other.document_errors;
        self.entries += other.entries;
        self.malformed += other.malformed;
        self.opinions_extracted += other.opinions_extracted;
        self.non_opinions += other.non_opinions;
        self.unkeyable += other.unkeyable;
        self.matched += other.matched;
        self.unmatched += other.unmatched;
        self.already_matched += other.already_matched;
        self.match_errors += other.match_errors;
        for (kind, n) in other.data_issues {
            *self.data_issues.entry(kind).or_default() += n;
        }
        self.limit_reached |= other.limit_reached;
    }

    /// One-line account of the run for logs and the terminal.
    pub fn summary(&self) -> String {
        let mut line = format!(
            "fetched={} skipped_duplicate={} failed={} unpack_failed={} documents={} entries={} \
             opinions_extracted={} non_opinions={} malformed={} matched={} unmatched={} match_errors={}",
            self.fetched,
            self.skipped_duplicate,
            self.fetch_failed,
            self.unpack_failed,
            self.documents,
            self.entries,
            self.opinions_extracted,
            self.non_opinions,
            self.malformed,
            self.matched,
            self.unmatched,
            self.match_errors,
        );
        if !self.data_issues.is_empty() {
            let issues: Vec<String> = self
                .data_issues
                .iter()
                .map(|(kind, n)| format!("{kind}={n}"))
                .collect();
            line.push_str(&format!(" issues[{}]", issues.join(" ")));
        }
        if self.limit_reached {
            line.push_str(" (limit reached)");
        }
        line
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_adds_counters_and_issues() {
        let mut a = RunStats {
            fetched: 2,
            ..Default::default()
        };
        a.record_issue("invalid_date");
        let mut b = RunStats {
            fetched: 1,
            opinions_extracted: 4,
            limit_reached: true,
            ..Default::default()
        };
        b.record_issue("invalid_date");
        b.record_issue("missing_judges");

        a.merge(b);
        assert_eq!(a.fetched, 3);
        assert_eq!(a.opinions_extracted, 4);
        assert_eq!(a.data_issues["invalid_date"], 2);
        assert_eq!(a.data_issues["missing_judges"], 1);
        assert!(a.limit_reached);
    }

    #[test]
    fn summary_names_the_headline_counts() {
        let mut stats = RunStats {
            fetched: 1,
            skipped_duplicate: 2,
            opinions_extracted: 3,
            ..Default::default()
        };
        stats.record_issue("empty_party_list");
        let line = stats.summary();
        assert!(line.contains("fetched=1"));
        assert!(line.contains("skipped_duplicate=2"));
        assert!(line.contains("opinions_extracted=3"));
        assert!(line.contains("issues[empty_party_list=1]"));
        assert!(stats.to_json().contains("\"opinions_extracted\":3"));
    }
}
