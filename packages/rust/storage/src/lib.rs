//! libSQL storage for extracted case records and their appellate matches.
//!
//! Cases are keyed by Board case number and appeals by appellate case
//! number, so re-running any stage upserts instead of duplicating. A case
//! row references its appeal by id; re-extracting a case never clears an
//! appeal link that was already recorded.

mod migrations;

use std::path::Path;

use chrono::{NaiveDate, Utc};
use libsql::{Connection, Database, Row, Transaction, params};
use tracing::warn;
use uuid::Uuid;

use ttabkit_shared::{AppealRecord, CaseRecord, Outcome, Result, TtabError};

const DATE_FORMAT: &str = "%Y-%m-%d";

const APPEAL_COLUMNS: &str = "a.appellate_case_number, a.case_name, a.citation, a.docket_number, \
     a.filing_date, a.decision_date, a.outcome, a.source_id, a.url";

/// Primary storage handle wrapping a libSQL database.
pub struct Storage {
    #[allow(dead_code)]
    db: Database,
    conn: Connection,
}

fn db_err(e: libsql::Error) -> TtabError {
    TtabError::Storage(e.to_string())
}

impl Storage {
    /// Open or create a database at `path` in read-write mode.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TtabError::io(parent, e))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(db_err)?;
        let conn = db.connect().map_err(db_err)?;

        let storage = Self { db, conn };
        storage.run_migrations().await?;
        Ok(storage)
    }

    async fn run_migrations(&self) -> Result<()> {
        let current_version = self.schema_version().await;

        for migration in migrations::all_migrations() {
            if migration.version > current_version {
                tracing::info!(
                    version = migration.version,
                    description = migration.description,
                    "applying migration"
                );
                self.conn
                    .execute_batch(migration.sql)
                    .await
                    .map_err(|e| {
                        TtabError::Storage(format!("migration v{} failed: {e}", migration.version))
                    })?;
            }
        }
        Ok(())
    }

    /// Current schema version, or 0 before the first migration.
    pub async fn schema_version(&self) -> u32 {
        let result = self
            .conn
            .query("SELECT MAX(version) FROM schema_migrations", params![])
            .await;

        match result {
            Ok(mut rows) => {
                if let Ok(Some(row)) = rows.next().await {
                    row.get::<u32>(0).unwrap_or(0)
                } else {
                    0
                }
            }
            Err(_) => 0,
        }
    }

    // -----------------------------------------------------------------------
    // Appeals
    // -----------------------------------------------------------------------

    /// Insert or update an appeal by appellate case number. Returns its row id.
    pub async fn upsert_appeal(&self, appeal: &AppealRecord) -> Result<i64> {
        write_appeal(&self.conn, appeal).await
    }

    pub async fn count_appeals(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM appeals").await
    }

    // -----------------------------------------------------------------------
    // Cases
    // -----------------------------------------------------------------------

    /// Insert or update a case by case number. An attached appeal is upserted
    /// and linked in the same transaction; a record without one keeps any
    /// existing link.
    pub async fn upsert_case(&self, record: &CaseRecord) -> Result<()> {
        if record.case_number().trim().is_empty() {
            return Err(TtabError::validation("case record has no case number"));
        }
        let record_json = serde_json::to_string(record)
            .map_err(|e| TtabError::Storage(format!("serialize case record: {e}")))?;

        let tx = self.conn.transaction().await.map_err(db_err)?;
        let written = write_case(&tx, record, &record_json).await;
        settle(tx, written).await
    }

    /// Link an appeal to a stored case. Returns `false` if the case is unknown.
    pub async fn attach_appeal(&self, case_number: &str, appeal: &AppealRecord) -> Result<bool> {
        let tx = self.conn.transaction().await.map_err(db_err)?;
        let linked = link_appeal(&tx, case_number, appeal).await;
        settle(tx, linked).await
    }

    /// Fetch a case with its linked appeal, if any.
    pub async fn get_case(&self, case_number: &str) -> Result<Option<CaseRecord>> {
        let sql = format!(
            "SELECT c.record_json, {APPEAL_COLUMNS}
             FROM cases c LEFT JOIN appeals a ON a.id = c.appeal_id
             WHERE c.case_number = ?1"
        );
        let mut rows = self
            .conn
            .query(&sql, params![case_number])
            .await
            .map_err(db_err)?;

        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(Some(row_to_case(&row)?)),
            None => Ok(None),
        }
    }

    /// Cases with no linked appeal, in case-number order.
    pub async fn list_cases_without_appeal(&self, limit: Option<u32>) -> Result<Vec<CaseRecord>> {
        let sql = format!(
            "SELECT c.record_json, {APPEAL_COLUMNS}
             FROM cases c LEFT JOIN appeals a ON a.id = c.appeal_id
             WHERE c.appeal_id IS NULL
             ORDER BY c.case_number
             LIMIT ?1"
        );
        let limit = limit.map(i64::from).unwrap_or(-1);
        let mut rows = self
            .conn
            .query(&sql, params![limit])
            .await
            .map_err(db_err)?;

        let mut results = Vec::new();
        while let Some(row) = rows.next().await.map_err(db_err)? {
            results.push(row_to_case(&row)?);
        }
        Ok(results)
    }

    pub async fn count_cases(&self) -> Result<u64> {
        self.count("SELECT COUNT(*) FROM cases").await
    }

    async fn count(&self, sql: &str) -> Result<u64> {
        let mut rows = self.conn.query(sql, params![]).await.map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<i64>(0).map_err(db_err)?.max(0) as u64),
            None => Ok(0),
        }
    }

    // -----------------------------------------------------------------------
    // Run history
    // -----------------------------------------------------------------------

    /// Record the start of a pipeline run. Returns the generated run id.
    pub async fn insert_run(&self, command: &str) -> Result<String> {
        let id = Uuid::now_v7().to_string();
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "INSERT INTO ingest_runs (id, command, started_at) VALUES (?1, ?2, ?3)",
                params![id.as_str(), command, now.as_str()],
            )
            .await
            .map_err(db_err)?;
        Ok(id)
    }

    pub async fn finish_run(&self, run_id: &str, stats_json: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn
            .execute(
                "UPDATE ingest_runs SET finished_at = ?1, stats_json = ?2 WHERE id = ?3",
                params![now.as_str(), stats_json, run_id],
            )
            .await
            .map_err(db_err)?;
        Ok(())
    }

    /// Stats JSON of a finished run.
    pub async fn run_stats(&self, run_id: &str) -> Result<Option<String>> {
        let mut rows = self
            .conn
            .query(
                "SELECT stats_json FROM ingest_runs WHERE id = ?1",
                params![run_id],
            )
            .await
            .map_err(db_err)?;
        match rows.next().await.map_err(db_err)? {
            Some(row) => Ok(row.get::<String>(0).ok()),
            None => Ok(None),
        }
    }
}

// ---------------------------------------------------------------------------
// Statements
// ---------------------------------------------------------------------------

/// Commit on success, roll back on failure.
async fn settle<T>(tx: Transaction, result: Result<T>) -> Result<T> {
    match result {
        Ok(value) => {
            tx.commit().await.map_err(db_err)?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = tx.rollback().await {
                warn!(error = %rollback, "rollback failed");
            }
            Err(e)
        }
    }
}

async fn write_appeal(conn: &Connection, appeal: &AppealRecord) -> Result<i64> {
    let now = Utc::now().to_rfc3339();
    let mut rows = conn
        .query(
            "INSERT INTO appeals (appellate_case_number, case_name, citation, docket_number,
                                  filing_date, decision_date, outcome, source_id, url, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
             ON CONFLICT(appellate_case_number) DO UPDATE SET
               case_name = excluded.case_name,
               citation = excluded.citation,
               docket_number = excluded.docket_number,
               filing_date = excluded.filing_date,
               decision_date = excluded.decision_date,
               outcome = excluded.outcome,
               source_id = excluded.source_id,
               url = excluded.url,
               updated_at = excluded.updated_at
             RETURNING id",
            params![
                appeal.case_number.as_str(),
                appeal.case_name.as_str(),
                appeal.citation.as_deref(),
                appeal.docket_number.as_deref(),
                fmt_date(appeal.filing_date),
                fmt_date(appeal.decision_date),
                appeal.outcome.as_str(),
                appeal.source_id.as_str(),
                appeal.url.as_deref(),
                now.as_str(),
            ],
        )
        .await
        .map_err(db_err)?;

    match rows.next().await.map_err(db_err)? {
        Some(row) => row.get::<i64>(0).map_err(db_err),
        None => Err(TtabError::Storage(format!(
            "appeal upsert returned no id for {}",
            appeal.case_number
        ))),
    }
}

async fn write_case(conn: &Connection, record: &CaseRecord, record_json: &str) -> Result<()> {
    let appeal_id = match record.appeal() {
        Some(appeal) => Some(write_appeal(conn, appeal).await?),
        None => None,
    };
    let now = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO cases (case_number, proceeding_type, filing_date, decision_date, outcome,
                            prevailing_party, source_file, record_json, appeal_id, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(case_number) DO UPDATE SET
           proceeding_type = excluded.proceeding_type,
           filing_date = excluded.filing_date,
           decision_date = excluded.decision_date,
           outcome = excluded.outcome,
           prevailing_party = excluded.prevailing_party,
           source_file = excluded.source_file,
           record_json = excluded.record_json,
           appeal_id = COALESCE(excluded.appeal_id, cases.appeal_id),
           updated_at = excluded.updated_at",
        params![
            record.case_number(),
            record.proceeding_type().as_str(),
            fmt_date(record.filing_date()),
            fmt_date(record.decision_date()),
            record.outcome().as_str(),
            record.prevailing_party().map(|r| r.as_str()),
            record.source_file(),
            record_json,
            appeal_id,
            now.as_str(),
        ],
    )
    .await
    .map_err(db_err)?;
    Ok(())
}

async fn link_appeal(conn: &Connection, case_number: &str, appeal: &AppealRecord) -> Result<bool> {
    let appeal_id = write_appeal(conn, appeal).await?;
    let changed = conn
        .execute(
            "UPDATE cases SET appeal_id = ?1, updated_at = ?2 WHERE case_number = ?3",
            params![appeal_id, Utc::now().to_rfc3339(), case_number],
        )
        .await
        .map_err(db_err)?;
    Ok(changed > 0)
}

fn fmt_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(DATE_FORMAT).to_string())
}

fn parse_date(raw: Option<String>) -> Option<NaiveDate> {
    raw.and_then(|s| NaiveDate::parse_from_str(&s, DATE_FORMAT).ok())
}

/// Rebuild a case from `record_json` plus the joined appeal columns.
fn row_to_case(row: &Row) -> Result<CaseRecord> {
    let json: String = row.get(0).map_err(db_err)?;
    let mut record: CaseRecord = serde_json::from_str(&json)
        .map_err(|e| TtabError::Storage(format!("corrupt case record: {e}")))?;

    if let Ok(case_number) = row.get::<String>(1) {
        let outcome: Outcome = row
            .get::<String>(7)
            .map(|s| s.parse().unwrap_or_default())
            .unwrap_or_default();
        let appeal = AppealRecord {
            case_number,
            case_name: row.get::<String>(2).unwrap_or_default(),
            citation: row.get::<String>(3).ok(),
            docket_number: row.get::<String>(4).ok(),
            filing_date: parse_date(row.get::<String>(5).ok()),
            decision_date: parse_date(row.get::<String>(6).ok()),
            outcome,
            source_id: row.get::<String>(8).unwrap_or_default(),
            url: row.get::<String>(9).ok(),
        };
        record.attach_appeal(appeal);
    }
    Ok(record)
}
