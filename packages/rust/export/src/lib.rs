//! Tabular export of case records.
//!
//! [`CsvExporter`] writes one row per decision into `<output>.partial` and
//! renames it into place on [`CsvExporter::finish`], so an interrupted run
//! never leaves a truncated file under the final name. [`read_rows`] loads
//! an export back for inspection and round-trip checks.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use ttabkit_shared::{AppealRecord, CaseRecord, Party, PartyRole, Result, TtabError};

/// Separator for multi-valued cells.
pub const LIST_SEPARATOR: &str = "; ";

const DATE_FORMAT: &str = "%Y-%m-%d";

// ---------------------------------------------------------------------------
// Row
// ---------------------------------------------------------------------------

/// One exported line. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CsvRow {
    pub case_number: String,
    pub proceeding_type: String,
    pub filing_date: String,
    pub decision_date: String,
    pub plaintiffs: String,
    pub defendants: String,
    pub attorneys: String,
    pub law_firms: String,
    pub outcome: String,
    pub prevailing_party: String,
    pub judges: String,
    pub challenged_marks: String,
    pub asserted_marks: String,
    pub appeal_indicated: bool,
    pub appellate_case_number: String,
    pub appellate_case_name: String,
    pub appellate_outcome: String,
    pub source_file: String,
}

impl CsvRow {
    pub fn from_record(record: &CaseRecord) -> Self {
        let mut attorneys = Vec::new();
        let mut firms: Vec<&str> = Vec::new();
        for attorney in record.parties().iter().flat_map(|p| &p.attorneys) {
            match attorney.firm.as_deref() {
                Some(firm) => {
                    attorneys.push(format!("{} ({firm})", attorney.name));
                    if !firms.contains(&firm) {
                        firms.push(firm);
                    }
                }
                None => attorneys.push(attorney.name.clone()),
            }
        }

        let appeal = record.appeal();
        Self {
            case_number: record.case_number().to_string(),
            proceeding_type: record.proceeding_type().as_str().to_string(),
            filing_date: fmt_date(record.filing_date()),
            decision_date: fmt_date(record.decision_date()),
            plaintiffs: join(record.plaintiffs().map(|p| p.name.as_str())),
            defendants: join(record.defendants().map(|p| p.name.as_str())),
            attorneys: join(&attorneys),
            law_firms: join(&firms),
            outcome: record.outcome().as_str().to_string(),
            prevailing_party: record
                .prevailing_party()
                .map(|r| r.as_str().to_string())
                .unwrap_or_default(),
            judges: join(record.judges().iter().map(|j| j.name.as_str())),
            challenged_marks: join(record.challenged_marks().iter().map(String::as_str)),
            asserted_marks: join(record.asserted_marks().iter().map(String::as_str)),
            appeal_indicated: record.appeal_indicated(),
            appellate_case_number: appeal.map(|a| a.case_number.clone()).unwrap_or_default(),
            appellate_case_name: appeal.map(|a| a.case_name.clone()).unwrap_or_default(),
            appellate_outcome: appeal
                .map(|a| a.outcome.as_str().to_string())
                .unwrap_or_default(),
            source_file: record.source_file().unwrap_or_default().to_string(),
        }
    }

    /// Rebuild the record fields a row carries. Attorney-to-party links and
    /// appellate details beyond number, name and outcome are not recoverable.
    pub fn to_record(&self) -> CaseRecord {
        let mut builder = CaseRecord::builder(self.case_number.as_str())
            .filing_date(parse_date(&self.filing_date))
            .decision_date(parse_date(&self.decision_date))
            .outcome(self.outcome.parse().unwrap_or_default())
            .prevailing_party(match self.prevailing_party.as_str() {
                "plaintiff" => Some(PartyRole::Plaintiff),
                "defendant" => Some(PartyRole::Defendant),
                _ => None,
            })
            .appeal_indicated(self.appeal_indicated);

        for name in split(&self.plaintiffs) {
            builder = builder.party(Party::new(PartyRole::Plaintiff, name));
        }
        for name in split(&self.defendants) {
            builder = builder.party(Party::new(PartyRole::Defendant, name));
        }
        for judge in split(&self.judges) {
            builder = builder.judge(judge);
        }
        for mark in split(&self.challenged_marks) {
            builder = builder.challenged_mark(mark);
        }
        for mark in split(&self.asserted_marks) {
            builder = builder.asserted_mark(mark);
        }
        if !self.source_file.is_empty() {
            builder = builder.source_file(self.source_file.as_str());
        }
        if !self.appellate_case_number.is_empty() {
            builder = builder.appeal(Some(AppealRecord {
                case_number: self.appellate_case_number.clone(),
                case_name: self.appellate_case_name.clone(),
                citation: None,
                docket_number: None,
                filing_date: None,
                decision_date: None,
                outcome: self.appellate_outcome.parse().unwrap_or_default(),
                source_id: String::new(),
                url: None,
            }));
        }
        builder.build()
    }
}

/// Join list items with [`LIST_SEPARATOR`]. A `;` or backslash inside an item
/// is backslash-escaped so [`split`] recovers the item intact.
fn join<I, S>(items: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    items
        .into_iter()
        .map(|item| item.as_ref().replace('\\', "\\\\").replace(';', "\\;"))
        .collect::<Vec<_>>()
        .join(LIST_SEPARATOR)
}

fn split(cell: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut chars = cell.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => current.extend(chars.next()),
            ';' => items.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    items.push(current);
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

fn fmt_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format(DATE_FORMAT).to_string())
        .unwrap_or_default()
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT).ok()
}

// ---------------------------------------------------------------------------
// Writer
// ---------------------------------------------------------------------------

pub struct CsvExporter {
    writer: csv::Writer<BufWriter<File>>,
    partial: PathBuf,
    output: PathBuf,
    rows: usize,
}

impl CsvExporter {
    /// Start an export to `output`. Parent directories are created.
    pub fn create(output: &Path) -> Result<Self> {
        if let Some(parent) = output.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| TtabError::io(parent, e))?;
            }
        }
        let mut name = output.as_os_str().to_owned();
        name.push(".partial");
        let partial = PathBuf::from(name);

        let file = File::create(&partial).map_err(|e| TtabError::io(&partial, e))?;
        debug!(path = %partial.display(), "csv export started");
        Ok(Self {
            writer: csv::Writer::from_writer(BufWriter::new(file)),
            partial,
            output: output.to_path_buf(),
            rows: 0,
        })
    }

    pub fn write(&mut self, record: &CaseRecord) -> Result<()> {
        self.writer
            .serialize(CsvRow::from_record(record))
            .map_err(|e| TtabError::Export(format!("{}: {e}", self.partial.display())))?;
        self.rows += 1;
        Ok(())
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn output(&self) -> &Path {
        &self.output
    }

    /// Flush and move the file into place. Returns the number of rows written.
    pub fn finish(mut self) -> Result<usize> {
        if self.rows == 0 {
            // Header only comes with the first serialized row.
            self.writer
                .write_record(COLUMNS)
                .map_err(|e| TtabError::Export(e.to_string()))?;
        }
        self.writer
            .flush()
            .map_err(|e| TtabError::io(&self.partial, e))?;
        drop(self.writer);
        std::fs::rename(&self.partial, &self.output)
            .map_err(|e| TtabError::io(&self.output, e))?;
        info!(path = %self.output.display(), rows = self.rows, "csv export written");
        Ok(self.rows)
    }
}

/// Column names, matching [`CsvRow`] field order.
pub const COLUMNS: [&str; 18] = [
    "case_number",
    "proceeding_type",
    "filing_date",
    "decision_date",
    "plaintiffs",
    "defendants",
    "attorneys",
    "law_firms",
    "outcome",
    "prevailing_party",
    "judges",
    "challenged_marks",
    "asserted_marks",
    "appeal_indicated",
    "appellate_case_number",
    "appellate_case_name",
    "appellate_outcome",
    "source_file",
];

/// Load an export written by [`CsvExporter`].
pub fn read_rows(path: &Path) -> Result<Vec<CsvRow>> {
    let mut reader = csv::Reader::from_path(path)
        .map_err(|e| TtabError::Export(format!("{}: {e}", path.display())))?;
    reader
        .deserialize()
        .map(|row| row.map_err(|e| TtabError::Export(format!("{}: {e}", path.display()))))
        .collect()
}
