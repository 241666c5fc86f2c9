//! Core domain types for TTAB proceedings and their appellate follow-ups.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Dates
// ---------------------------------------------------------------------------

/// Parse an 8-digit `YYYYMMDD` token. Anything else (partial dates,
/// separators, impossible calendar days) yields `None`.
pub fn parse_compact_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.len() != 8 || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y%m%d").ok()
}

// ---------------------------------------------------------------------------
// ProceedingType
// ---------------------------------------------------------------------------

/// Kind of Board proceeding, derived from the case-number prefix alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProceedingType {
    Opposition,
    Cancellation,
    ExParteAppeal,
    Unknown,
}

impl ProceedingType {
    /// Map the leading two digits of a case number: 91 opposition,
    /// 92 cancellation, 70 through 74 ex parte appeal. Everything else is unknown.
    pub fn from_case_number(case_number: &str) -> Self {
        let prefix = case_number.trim().as_bytes();
        if prefix.len() < 2 || !prefix[..2].iter().all(u8::is_ascii_digit) {
            return Self::Unknown;
        }
        match &prefix[..2] {
            b"91" => Self::Opposition,
            b"92" => Self::Cancellation,
            b"70" | b"71" | b"72" | b"73" | b"74" => Self::ExParteAppeal,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Opposition => "opposition",
            Self::Cancellation => "cancellation",
            Self::ExParteAppeal => "ex_parte_appeal",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ProceedingType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Disposition of a proceeding or an appeal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Granted,
    Denied,
    Dismissed,
    Sustained,
    Reversed,
    Affirmed,
    Remanded,
    Settled,
    Withdrawn,
    #[default]
    Unknown,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Granted => "granted",
            Self::Denied => "denied",
            Self::Dismissed => "dismissed",
            Self::Sustained => "sustained",
            Self::Reversed => "reversed",
            Self::Affirmed => "affirmed",
            Self::Remanded => "remanded",
            Self::Settled => "settled",
            Self::Withdrawn => "withdrawn",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for Outcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Outcome {
    type Err = std::convert::Infallible;

    /// Unrecognized text reads back as [`Outcome::Unknown`].
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "granted" => Self::Granted,
            "denied" => Self::Denied,
            "dismissed" => Self::Dismissed,
            "sustained" => Self::Sustained,
            "reversed" => Self::Reversed,
            "affirmed" => Self::Affirmed,
            "remanded" => Self::Remanded,
            "settled" => Self::Settled,
            "withdrawn" => Self::Withdrawn,
            _ => Self::Unknown,
        })
    }
}

// ---------------------------------------------------------------------------
// Parties
// ---------------------------------------------------------------------------

/// Side of the proceeding a party is on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartyRole {
    Plaintiff,
    Defendant,
    /// Source carried a role code other than `P` or `D`.
    Unknown,
}

impl PartyRole {
    /// `P` is plaintiff and `D` is defendant. No other code is ever reinterpreted.
    pub fn from_code(code: &str) -> Self {
        match code.trim() {
            "P" | "p" => Self::Plaintiff,
            "D" | "d" => Self::Defendant,
            _ => Self::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Plaintiff => "plaintiff",
            Self::Defendant => "defendant",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PartyRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counsel of record for a party.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attorney {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub firm: Option<String>,
}

/// A named participant in the proceeding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Party {
    pub role: PartyRole,
    /// Display name as it appears in the party block.
    pub name: String,
    /// Organization name, when the source gives one separately.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub organization: Option<String>,
    #[serde(default)]
    pub attorneys: Vec<Attorney>,
}

impl Party {
    pub fn new(role: PartyRole, name: impl Into<String>) -> Self {
        Self {
            role,
            name: name.into(),
            organization: None,
            attorneys: Vec::new(),
        }
    }
}

/// An adjudicator on the panel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Judge {
    pub name: String,
}

// ---------------------------------------------------------------------------
// AppealRecord
// ---------------------------------------------------------------------------

/// An appellate case correlated with a Board proceeding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppealRecord {
    /// Appellate case number; the upsert key of the appeals table.
    pub case_number: String,
    pub case_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docket_number: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filing_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision_date: Option<NaiveDate>,
    #[serde(default)]
    pub outcome: Outcome,
    /// Stable identifier in the external index.
    pub source_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

// ---------------------------------------------------------------------------
// CaseRecord
// ---------------------------------------------------------------------------

/// A normalized Board decision. Built once through [`CaseRecordBuilder`];
/// the only later mutation is [`CaseRecord::attach_appeal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaseRecord {
    case_number: String,
    proceeding_type: ProceedingType,
    filing_date: Option<NaiveDate>,
    decision_date: Option<NaiveDate>,
    outcome: Outcome,
    prevailing_party: Option<PartyRole>,
    parties: Vec<Party>,
    judges: Vec<Judge>,
    challenged_marks: Vec<String>,
    asserted_marks: Vec<String>,
    appeal_indicated: bool,
    source_file: Option<String>,
    appeal: Option<AppealRecord>,
}

impl CaseRecord {
    pub fn builder(case_number: impl Into<String>) -> CaseRecordBuilder {
        CaseRecordBuilder::new(case_number)
    }

    pub fn case_number(&self) -> &str {
        &self.case_number
    }

    pub fn proceeding_type(&self) -> ProceedingType {
        self.proceeding_type
    }

    pub fn filing_date(&self) -> Option<NaiveDate> {
        self.filing_date
    }

    pub fn decision_date(&self) -> Option<NaiveDate> {
        self.decision_date
    }

    pub fn outcome(&self) -> Outcome {
        self.outcome
    }

    pub fn prevailing_party(&self) -> Option<PartyRole> {
        self.prevailing_party
    }

    pub fn parties(&self) -> &[Party] {
        &self.parties
    }

    pub fn plaintiffs(&self) -> impl Iterator<Item = &Party> {
        self.parties
            .iter()
            .filter(|p| p.role == PartyRole::Plaintiff)
    }

    pub fn defendants(&self) -> impl Iterator<Item = &Party> {
        self.parties
            .iter()
            .filter(|p| p.role == PartyRole::Defendant)
    }

    pub fn judges(&self) -> &[Judge] {
        &self.judges
    }

    pub fn challenged_marks(&self) -> &[String] {
        &self.challenged_marks
    }

    pub fn asserted_marks(&self) -> &[String] {
        &self.asserted_marks
    }

    pub fn appeal_indicated(&self) -> bool {
        self.appeal_indicated
    }

    pub fn source_file(&self) -> Option<&str> {
        self.source_file.as_deref()
    }

    pub fn appeal(&self) -> Option<&AppealRecord> {
        self.appeal.as_ref()
    }

    /// True unless an appeal with a recorded source identifier is already attached.
    pub fn needs_appeal_lookup(&self) -> bool {
        self.appeal
            .as_ref()
            .is_none_or(|a| a.source_id.trim().is_empty())
    }

    /// Attach an appellate match. A record that already carries an
    /// identified appeal is left untouched and `false` is returned.
    pub fn attach_appeal(&mut self, appeal: AppealRecord) -> bool {
        if !self.needs_appeal_lookup() {
            return false;
        }
        self.appeal = Some(appeal);
        true
    }
}

/// Accumulates extracted fields, then freezes them into a [`CaseRecord`].
#[derive(Debug, Clone)]
pub struct CaseRecordBuilder {
    record: CaseRecord,
}

impl CaseRecordBuilder {
    pub fn new(case_number: impl Into<String>) -> Self {
        let case_number = case_number.into().trim().to_string();
        Self {
            record: CaseRecord {
                proceeding_type: ProceedingType::from_case_number(&case_number),
                case_number,
                filing_date: None,
                decision_date: None,
                outcome: Outcome::Unknown,
                prevailing_party: None,
                parties: Vec::new(),
                judges: Vec::new(),
                challenged_marks: Vec::new(),
                asserted_marks: Vec::new(),
                appeal_indicated: false,
                source_file: None,
                appeal: None,
            },
        }
    }

    pub fn filing_date(mut self, date: Option<NaiveDate>) -> Self {
        self.record.filing_date = date;
        self
    }

    pub fn decision_date(mut self, date: Option<NaiveDate>) -> Self {
        self.record.decision_date = date;
        self
    }

    pub fn outcome(mut self, outcome: Outcome) -> Self {
        self.record.outcome = outcome;
        self
    }

    pub fn prevailing_party(mut self, role: Option<PartyRole>) -> Self {
        self.record.prevailing_party = role;
        self
    }

    pub fn party(mut self, party: Party) -> Self {
        self.record.parties.push(party);
        self
    }

    pub fn judge(mut self, name: impl Into<String>) -> Self {
        let name = name.into();
        if !self.record.judges.iter().any(|j| j.name == name) {
            self.record.judges.push(Judge { name });
        }
        self
    }

    /// Marks keep first-appearance order; repeated text is dropped.
    pub fn challenged_mark(mut self, text: impl Into<String>) -> Self {
        push_unique(&mut self.record.challenged_marks, text.into());
        self
    }

    pub fn asserted_mark(mut self, text: impl Into<String>) -> Self {
        push_unique(&mut self.record.asserted_marks, text.into());
        self
    }

    pub fn appeal_indicated(mut self, indicated: bool) -> Self {
        self.record.appeal_indicated = indicated;
        self
    }

    pub fn source_file(mut self, name: impl Into<String>) -> Self {
        self.record.source_file = Some(name.into());
        self
    }

    /// Used when rehydrating a record that was persisted with its appeal.
    pub fn appeal(mut self, appeal: Option<AppealRecord>) -> Self {
        self.record.appeal = appeal;
        self
    }

    pub fn build(self) -> CaseRecord {
        self.record
    }
}

fn push_unique(list: &mut Vec<String>, text: String) {
    let text = text.trim();
    if !text.is_empty() && !list.iter().any(|m| m == text) {
        list.push(text.to_string());
    }
}

// ---------------------------------------------------------------------------
// Remote files
// ---------------------------------------------------------------------------

/// Which bulk product a listing refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dataset {
    /// Daily files for the current year.
    Daily,
    /// Annual historical backfile.
    Annual,
}

impl Dataset {
    pub fn product_id(&self) -> &'static str {
        match self {
            Self::Daily => "TTABTDXF",
            Self::Annual => "TTABYR",
        }
    }
}

/// One remotely available archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    pub name: String,
    pub size: u64,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    #[serde(default)]
    pub download_uri: Option<String>,
}

impl FileDescriptor {
    /// Name with any `.zip` suffix removed; the unpacked directory uses it.
    pub fn stem(&self) -> &str {
        archive_stem(&self.name)
    }
}

/// Archive file name with a trailing `.zip` removed, in any letter case.
/// A name that would become empty is returned unchanged.
pub fn archive_stem(file_name: &str) -> &str {
    let cut = file_name.len().saturating_sub(4);
    match file_name.get(cut..) {
        Some(ext) if cut > 0 && ext.eq_ignore_ascii_case(".zip") => &file_name[..cut],
        _ => file_name,
    }
}
