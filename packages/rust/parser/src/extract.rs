//! Case extraction: one classified proceeding entry in, one [`CaseRecord`] out.
//!
//! Extraction is total. Missing or malformed optional fields become absent
//! values plus a [`DataIssue`]; nothing here returns an error.

use chrono::NaiveDate;
use tracing::debug;

use ttabkit_shared::{
    Attorney, CaseRecord, Outcome, Party, PartyRole, ProceedingType, parse_compact_date,
};

use crate::classify::is_decision_code;
use crate::entry::ProceedingEntry;
use crate::xml::Element;

/// Direct-child fields that may carry a party's display name.
const PARTY_NAME_FIELDS: &[&str] = &["name", "party-name", "entity-name"];

/// Phrases signalling that review by an appellate court was sought.
const APPEAL_INDICATORS: &[&str] = &[
    "federal circuit",
    "court of appeals",
    "appeal to the federal circuit",
    "notice of appeal",
    "appeal filed",
    "appealed to",
];

/// Outcome phrases, most specific first. The first hit wins.
const OUTCOME_RULES: &[(&[&str], Outcome)] = &[
    (
        &["opposition is sustained", "sustain the opposition", "opposition sustained"],
        Outcome::Sustained,
    ),
    (&["opposition is dismissed", "opposition dismissed"], Outcome::Dismissed),
    (&["opposition is denied", "opposition denied"], Outcome::Denied),
    (
        &[
            "petition to cancel is granted",
            "petition for cancellation is granted",
            "cancellation is granted",
            "grant the petition",
            "petition is granted",
        ],
        Outcome::Granted,
    ),
    (
        &["petition to cancel is denied", "cancellation is denied", "petition is denied"],
        Outcome::Denied,
    ),
    (
        &[
            "petition to cancel is dismissed",
            "cancellation is dismissed",
            "petition is dismissed",
        ],
        Outcome::Dismissed,
    ),
    (&["reversed"], Outcome::Reversed),
    (&["affirmed"], Outcome::Affirmed),
    (&["remanded"], Outcome::Remanded),
    (&["settled", "settlement"], Outcome::Settled),
    (&["withdrawn", "withdrawal"], Outcome::Withdrawn),
    (&["sustained"], Outcome::Sustained),
    (&["granted"], Outcome::Granted),
    (&["denied"], Outcome::Denied),
    (&["dismissed"], Outcome::Dismissed),
];

// ---------------------------------------------------------------------------
// DataIssue
// ---------------------------------------------------------------------------

/// A data-quality finding. Counted per run, never fatal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DataIssue {
    MissingCaseNumber,
    UnknownProceedingPrefix { case_number: String },
    UnknownRoleCode { party: String, code: String },
    InvalidDate { field: &'static str, raw: String },
    MissingJudges,
    EmptyPartyList,
}

impl DataIssue {
    /// Stable key for statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingCaseNumber => "missing_case_number",
            Self::UnknownProceedingPrefix { .. } => "unknown_proceeding_prefix",
            Self::UnknownRoleCode { .. } => "unknown_role_code",
            Self::InvalidDate { .. } => "invalid_date",
            Self::MissingJudges => "missing_judges",
            Self::EmptyPartyList => "empty_party_list",
        }
    }
}

/// Extracted record plus whatever was wrong with the source.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub record: CaseRecord,
    pub issues: Vec<DataIssue>,
}

impl Extraction {
    /// A record without a case number cannot be keyed and must not be stored.
    pub fn is_keyable(&self) -> bool {
        !self.record.case_number().is_empty()
    }
}

// ---------------------------------------------------------------------------
// CaseExtractor
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default)]
pub struct CaseExtractor;

impl CaseExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, entry: &ProceedingEntry, source_file: Option<&str>) -> Extraction {
        let mut issues = Vec::new();
        let element = entry.element();

        let case_number = entry.case_number().unwrap_or_default();
        if case_number.is_empty() {
            issues.push(DataIssue::MissingCaseNumber);
        }
        let mut builder = CaseRecord::builder(case_number.clone());
        let proceeding_type = ProceedingType::from_case_number(&case_number);
        if proceeding_type == ProceedingType::Unknown && !case_number.is_empty() {
            issues.push(DataIssue::UnknownProceedingPrefix {
                case_number: case_number.clone(),
            });
        }

        let filing_date = strict_date(element.child_text("filing-date"), "filing_date", &mut issues);
        builder = builder
            .filing_date(filing_date)
            .decision_date(decision_date(entry, &mut issues));

        // Parties, their counsel, and their marks.
        let parties = element.select("party-information/party");
        let mut extracted = 0;
        for party_element in parties {
            let Some(party) = read_party(party_element, &mut issues) else {
                continue;
            };
            for property in party_element.select("property-information/property") {
                if let Some(mark) = property.child_text("mark-text") {
                    builder = match party.role {
                        PartyRole::Defendant => builder.challenged_mark(mark),
                        PartyRole::Plaintiff => builder.asserted_mark(mark),
                        PartyRole::Unknown => builder,
                    };
                }
            }
            builder = builder.party(party);
            extracted += 1;
        }
        if extracted == 0 {
            issues.push(DataIssue::EmptyPartyList);
        }

        let judges = entry.judge_names();
        if judges.is_empty() {
            issues.push(DataIssue::MissingJudges);
        }
        for judge in judges {
            builder = builder.judge(judge);
        }

        let full_text = entry.free_text().to_lowercase();
        let decision_text = entry
            .history()
            .iter()
            .filter(|h| h.code.is_some_and(is_decision_code))
            .map(|h| h.text.to_lowercase())
            .collect::<Vec<_>>()
            .join(" ");
        let outcome = match detect_outcome(&decision_text) {
            Outcome::Unknown => detect_outcome(&full_text),
            found => found,
        };

        builder = builder
            .outcome(outcome)
            .prevailing_party(prevailing_party(proceeding_type, outcome))
            .appeal_indicated(APPEAL_INDICATORS.iter().any(|p| full_text.contains(p)));
        if let Some(source) = source_file {
            builder = builder.source_file(source);
        }

        Extraction {
            record: builder.build(),
            issues,
        }
    }
}

/// Outcome from lower-cased text, first matching rule wins.
pub fn detect_outcome(lowercase_text: &str) -> Outcome {
    if lowercase_text.trim().is_empty() {
        return Outcome::Unknown;
    }
    OUTCOME_RULES
        .iter()
        .find(|(phrases, _)| phrases.iter().any(|p| lowercase_text.contains(p)))
        .map(|(_, outcome)| *outcome)
        .unwrap_or(Outcome::Unknown)
}

/// Which side won, for inter partes proceedings only.
pub fn prevailing_party(kind: ProceedingType, outcome: Outcome) -> Option<PartyRole> {
    match kind {
        ProceedingType::Opposition | ProceedingType::Cancellation => match outcome {
            Outcome::Sustained | Outcome::Granted => Some(PartyRole::Plaintiff),
            Outcome::Denied | Outcome::Dismissed => Some(PartyRole::Defendant),
            _ => None,
        },
        ProceedingType::ExParteAppeal | ProceedingType::Unknown => None,
    }
}

fn strict_date(
    raw: Option<&str>,
    field: &'static str,
    issues: &mut Vec<DataIssue>,
) -> Option<NaiveDate> {
    let raw = raw?;
    let parsed = parse_compact_date(raw);
    if parsed.is_none() {
        debug!(field, raw, "date failed strict validation, stored as absent");
        issues.push(DataIssue::InvalidDate {
            field,
            raw: raw.to_string(),
        });
    }
    parsed
}

/// Latest dated decision history item, else the `decision-date` field.
fn decision_date(entry: &ProceedingEntry, issues: &mut Vec<DataIssue>) -> Option<NaiveDate> {
    let from_history = entry
        .history()
        .iter()
        .filter(|h| h.code.is_some_and(is_decision_code))
        .filter_map(|h| strict_date(h.date.as_deref(), "decision_date", issues))
        .max();
    from_history.or_else(|| {
        strict_date(
            entry.element().child_text("decision-date"),
            "decision_date",
            issues,
        )
    })
}

/// Read one `party` block. The display name comes from direct children only:
/// attorney address blocks nest a same-named `name` field deeper down.
fn read_party(element: &Element, issues: &mut Vec<DataIssue>) -> Option<Party> {
    let organization = element.child_text("orgname").map(str::to_string);
    let name = PARTY_NAME_FIELDS
        .iter()
        .find_map(|f| element.child_text(f))
        .map(str::to_string)
        .or_else(|| organization.clone())?;

    let code = element.child_text("role-code").unwrap_or_default();
    let role = PartyRole::from_code(code);
    if role == PartyRole::Unknown {
        debug!(party = %name, code, "unrecognized role code");
        issues.push(DataIssue::UnknownRoleCode {
            party: name.clone(),
            code: code.to_string(),
        });
    }

    let mut party = Party::new(role, name);
    party.organization = organization.filter(|org| *org != party.name);
    party.attorneys = read_attorneys(element);
    Some(party)
}

fn read_attorneys(party: &Element) -> Vec<Attorney> {
    let mut attorneys: Vec<Attorney> = Vec::new();
    let direct = party.children_named("attorney").map(|a| {
        (
            a.child_text("name").or(Some(a.text.trim())),
            a.child_text("firm").or_else(|| a.child_text("firm-name")),
        )
    });
    let addressed = party
        .select("address-information/proceeding-address")
        .into_iter()
        .map(|a| (a.child_text("name"), a.child_text("orgname")));

    for (name, firm) in direct.chain(addressed) {
        let Some(name) = name.map(str::trim).filter(|n| !n.is_empty()) else {
            continue;
        };
        if attorneys.iter().any(|a| a.name == name) {
            continue;
        }
        attorneys.push(Attorney {
            name: name.to_string(),
            firm: firm.map(str::to_string),
        });
    }
    attorneys
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::Classifier;
    use crate::test_support::{entry, fixture};
    use crate::xml::EntryReader;

    fn fixture_extractions() -> Vec<Extraction> {
        let xml = fixture("daily_sample.xml");
        let classifier = Classifier::default();
        EntryReader::new(xml.as_bytes())
            .map(|e| ProceedingEntry::new(e.expect("entry")))
            .filter(|e| classifier.is_opinion(e))
            .map(|e| CaseExtractor::new().extract(&e, Some("daily_sample.xml")))
            .collect()
    }

    #[test]
    fn opposition_scenario() {
        let e = entry(
            r#"<proceeding-entry>
                <number>91123456</number>
                <party-information>
                  <party><role-code>P</role-code><name>Acme Inc.</name></party>
                  <party><role-code>D</role-code><name>Globex Corp.</name></party>
                </party-information>
                <prosecution-history>
                  <prosecution-entry><code>870</code><date>20250301</date></prosecution-entry>
                </prosecution-history>
              </proceeding-entry>"#,
        );
        let extraction = CaseExtractor::new().extract(&e, None);
        let record = extraction.record;

        assert_eq!(record.case_number(), "91123456");
        assert_eq!(record.proceeding_type(), ProceedingType::Opposition);
        let plaintiffs: Vec<_> = record.plaintiffs().map(|p| p.name.as_str()).collect();
        let defendants: Vec<_> = record.defendants().map(|p| p.name.as_str()).collect();
        assert_eq!(plaintiffs, ["Acme Inc."]);
        assert_eq!(defendants, ["Globex Corp."]);
        assert_eq!(record.decision_date(), NaiveDate::from_ymd_opt(2025, 3, 1));
        assert!(extraction.issues.contains(&DataIssue::MissingJudges));
    }

    #[test]
    fn party_name_ignores_nested_attorney_name() {
        let records = fixture_extractions();
        let acme = &records[0].record;
        let plaintiff = acme.plaintiffs().next().expect("plaintiff");
        assert_eq!(plaintiff.name, "Acme Inc.");
        assert_eq!(plaintiff.attorneys[0].name, "Jane Roe");
        assert_eq!(plaintiff.attorneys[0].firm.as_deref(), Some("Roe & Partners LLP"));
    }

    #[test]
    fn fixture_opposition_fields() {
        let records = fixture_extractions();
        assert_eq!(records.len(), 3);

        let acme = &records[0].record;
        assert_eq!(acme.outcome(), Outcome::Sustained);
        assert_eq!(acme.prevailing_party(), Some(PartyRole::Plaintiff));
        assert_eq!(acme.filing_date(), NaiveDate::from_ymd_opt(2023, 1, 15));
        assert_eq!(acme.challenged_marks(), ["GLOBEX", "GLOBEX GO"]);
        assert_eq!(acme.asserted_marks(), ["ACME"]);
        let judges: Vec<&str> = acme.judges().iter().map(|j| j.name.as_str()).collect();
        assert_eq!(judges, ["Wellington", "Cataldo", "Lykos"]);
        assert!(!acme.appeal_indicated());
        assert_eq!(acme.source_file(), Some("daily_sample.xml"));
        assert!(records[0].issues.is_empty(), "{:?}", records[0].issues);
    }

    #[test]
    fn fixture_cancellation_data_quality() {
        let records = fixture_extractions();
        let cancel = &records[1];
        let record = &cancel.record;

        assert_eq!(record.proceeding_type(), ProceedingType::Cancellation);
        assert_eq!(record.outcome(), Outcome::Granted);
        assert_eq!(record.prevailing_party(), Some(PartyRole::Plaintiff));
        assert_eq!(record.filing_date(), None);
        assert!(record.appeal_indicated());
        assert_eq!(record.parties().len(), 3);
        assert_eq!(record.parties()[2].role, PartyRole::Unknown);

        let kinds: Vec<_> = cancel.issues.iter().map(DataIssue::kind).collect();
        assert!(kinds.contains(&"invalid_date"));
        assert!(kinds.contains(&"unknown_role_code"));
    }

    #[test]
    fn fixture_legacy_ex_parte() {
        let records = fixture_extractions();
        let record = &records[2].record;
        assert_eq!(record.proceeding_type(), ProceedingType::ExParteAppeal);
        assert_eq!(record.outcome(), Outcome::Affirmed);
        assert_eq!(record.prevailing_party(), None);
        assert_eq!(record.decision_date(), NaiveDate::from_ymd_opt(2019, 7, 22));
        assert_eq!(record.judges()[0].name, "Taylor");
    }

    #[test]
    fn unknown_prefix_and_missing_parties_are_issues() {
        let e = entry("<proceeding-entry><number>85000001</number><document-type>Opinion</document-type></proceeding-entry>");
        let extraction = CaseExtractor::new().extract(&e, None);
        assert_eq!(extraction.record.proceeding_type(), ProceedingType::Unknown);
        let kinds: Vec<_> = extraction.issues.iter().map(DataIssue::kind).collect();
        assert!(kinds.contains(&"unknown_proceeding_prefix"));
        assert!(kinds.contains(&"empty_party_list"));
        assert!(extraction.is_keyable());
    }

    #[test]
    fn missing_case_number_is_not_keyable() {
        let e = entry("<proceeding-entry><document-type>Opinion</document-type></proceeding-entry>");
        let extraction = CaseExtractor::new().extract(&e, None);
        assert!(!extraction.is_keyable());
        assert!(extraction.issues.contains(&DataIssue::MissingCaseNumber));
    }

    #[test]
    fn outcome_rules_prefer_specific_phrases() {
        assert_eq!(detect_outcome("the opposition is sustained"), Outcome::Sustained);
        assert_eq!(
            detect_outcome("motion denied; the opposition is dismissed"),
            Outcome::Dismissed
        );
        assert_eq!(detect_outcome("we grant the petition"), Outcome::Granted);
        assert_eq!(detect_outcome("refusal to register is affirmed"), Outcome::Affirmed);
        assert_eq!(detect_outcome("board's decision: dismissed"), Outcome::Dismissed);
        assert_eq!(detect_outcome(""), Outcome::Unknown);
        assert_eq!(detect_outcome("filed and fee"), Outcome::Unknown);
    }

    #[test]
    fn prevailing_party_table() {
        use Outcome::*;
        use ProceedingType::*;
        assert_eq!(prevailing_party(Opposition, Sustained), Some(PartyRole::Plaintiff));
        assert_eq!(prevailing_party(Opposition, Dismissed), Some(PartyRole::Defendant));
        assert_eq!(prevailing_party(Cancellation, Granted), Some(PartyRole::Plaintiff));
        assert_eq!(prevailing_party(Cancellation, Denied), Some(PartyRole::Defendant));
        assert_eq!(prevailing_party(ExParteAppeal, Affirmed), None);
        assert_eq!(prevailing_party(Opposition, Settled), None);
    }
}
