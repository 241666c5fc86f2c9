//! SQL migration definitions for the ttabkit database.
//!
//! Migrations are applied in order on database open; each carries its own
//! version bookkeeping row.

/// A database migration with a version and SQL statements.
pub(crate) struct Migration {
    pub version: u32,
    pub description: &'static str,
    pub sql: &'static str,
}

/// All migrations, in ascending version order.
pub(crate) fn all_migrations() -> Vec<Migration> {
    vec![Migration {
        version: 1,
        description: "Initial schema: appeals, cases, ingest_runs",
        sql: r#"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version    INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Federal Circuit cases, keyed by appellate case number
CREATE TABLE IF NOT EXISTS appeals (
    id                    INTEGER PRIMARY KEY AUTOINCREMENT,
    appellate_case_number TEXT NOT NULL UNIQUE,
    case_name             TEXT NOT NULL,
    citation              TEXT,
    docket_number         TEXT,
    filing_date           TEXT,
    decision_date         TEXT,
    outcome               TEXT NOT NULL,
    source_id             TEXT NOT NULL,
    url                   TEXT,
    updated_at            TEXT NOT NULL
);

-- Board decisions, keyed by Board case number
CREATE TABLE IF NOT EXISTS cases (
    case_number      TEXT PRIMARY KEY,
    proceeding_type  TEXT NOT NULL,
    filing_date      TEXT,
    decision_date    TEXT,
    outcome          TEXT NOT NULL,
    prevailing_party TEXT,
    source_file      TEXT,
    record_json      TEXT NOT NULL,
    appeal_id        INTEGER REFERENCES appeals(id),
    updated_at       TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cases_appeal_id ON cases(appeal_id);
CREATE INDEX IF NOT EXISTS idx_cases_decision_date ON cases(decision_date);

-- Pipeline run history
CREATE TABLE IF NOT EXISTS ingest_runs (
    id          TEXT PRIMARY KEY,
    command     TEXT NOT NULL,
    started_at  TEXT NOT NULL,
    finished_at TEXT,
    stats_json  TEXT
);

INSERT INTO schema_migrations (version) VALUES (1);
"#,
    }]
}
