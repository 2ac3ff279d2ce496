//! SQLite adapter for the pipeline's data seams.
//!
//! One shared connection behind a mutex. Every trait method takes the lock
//! for the duration of a few statements and never holds it across an await.
//! Batch-report idempotency is enforced by the `(session_id, batch_number)`
//! unique key and by each screenshot being covered at most once, not by
//! the lock.

use std::str::FromStr;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use uuid::Uuid;

use super::traits::{NewBatchReport, ReportPersister, ScreenshotSource, SessionDirectory};
use super::types::*;
use crate::db::repository::{
    fetch_uncovered_screenshots, format_timestamp, get_work_session, latest_screenshot_at,
    parse_timestamp,
};
use crate::db::DatabaseError;
use crate::models::{Screenshot, WorkSession};

pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    pub fn new(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, DatabaseError>,
    ) -> Result<T, DatabaseError> {
        let guard = self.conn.lock().map_err(|_| DatabaseError::LockPoisoned)?;
        f(&guard)
    }
}

#[async_trait]
impl ScreenshotSource for SqliteStore {
    async fn fetch(
        &self,
        session_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Screenshot>, DatabaseError> {
        self.with_conn(|conn| fetch_uncovered_screenshots(conn, session_id, user_id, limit))
    }
}

#[async_trait]
impl SessionDirectory for SqliteStore {
    async fn find_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkSession>, DatabaseError> {
        self.with_conn(|conn| get_work_session(conn, session_id, user_id))
    }

    async fn last_activity_at(
        &self,
        session_id: &str,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError> {
        self.with_conn(|conn| latest_screenshot_at(conn, session_id))
    }
}

#[async_trait]
impl ReportPersister for SqliteStore {
    async fn next_batch_number(&self, session_id: &str) -> Result<u32, DatabaseError> {
        self.with_conn(|conn| {
            let max: Option<u32> = conn.query_row(
                "SELECT MAX(batch_number) FROM batch_reports WHERE session_id = ?1",
                params![session_id],
                |row| row.get(0),
            )?;
            Ok(max.unwrap_or(0) + 1)
        })
    }

    async fn create_batch_report(
        &self,
        report: &NewBatchReport,
    ) -> Result<BatchReport, DatabaseError> {
        self.with_conn(|conn| insert_batch_report(conn, report))
    }

    async fn list_batch_reports(&self, session_id: &str) -> Result<Vec<BatchReport>, DatabaseError> {
        self.with_conn(|conn| load_batch_reports(conn, session_id))
    }

    async fn upsert_session_report(
        &self,
        session_id: &str,
        user_id: &str,
        summary: &SessionSummaryResponse,
    ) -> Result<SessionReport, DatabaseError> {
        self.with_conn(|conn| upsert_report(conn, session_id, user_id, summary))
    }
}

// ──────────────────────────────────────────────
// Batch reports
// ──────────────────────────────────────────────

fn insert_batch_report(
    conn: &Connection,
    report: &NewBatchReport,
) -> Result<BatchReport, DatabaseError> {
    let id = Uuid::new_v4().to_string();
    let screenshot_ids_json = serde_json::to_string(&report.screenshot_ids)?;
    let analysis_json = serde_json::to_string(&report.analysis)?;

    let tx = conn.unchecked_transaction()?;
    let inserted = tx.execute(
        "INSERT INTO batch_reports
         (id, session_id, user_id, batch_number, screenshot_ids, analysis, source,
          processing_status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
         ON CONFLICT(session_id, batch_number) DO NOTHING",
        params![
            id,
            report.session_id,
            report.user_id,
            report.batch_number,
            screenshot_ids_json,
            analysis_json,
            report.analysis.source().as_str(),
            ProcessingStatus::Completed.as_str(),
            format_timestamp(&Utc::now()),
        ],
    )?;

    if inserted == 0 {
        tracing::debug!(
            session_id = %report.session_id,
            batch_number = report.batch_number,
            "Batch report already exists, returning stored row"
        );
        tx.commit()?;
        return batch_report_by_number(conn, &report.session_id, report.batch_number);
    }

    // A screenshot belongs to at most one batch. Losing that race rolls
    // the new row back and hands out the batch that won.
    if let Some(covering_id) = covering_report_id(&tx, &report.screenshot_ids)? {
        drop(tx);
        tracing::debug!(
            session_id = %report.session_id,
            batch_number = report.batch_number,
            covering_report_id = %covering_id,
            "Screenshots already covered, returning covering report"
        );
        return batch_report_by_id(conn, &covering_id);
    }

    for screenshot_id in &report.screenshot_ids {
        tx.execute(
            "INSERT INTO batch_report_screenshots (batch_report_id, screenshot_id)
             VALUES (?1, ?2)",
            params![id, screenshot_id],
        )?;
    }
    tx.commit()?;

    batch_report_by_id(conn, &id)
}

fn covering_report_id(
    conn: &Connection,
    screenshot_ids: &[String],
) -> Result<Option<String>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT batch_report_id FROM batch_report_screenshots WHERE screenshot_id = ?1",
    )?;
    for screenshot_id in screenshot_ids {
        let found: Option<String> = stmt
            .query_row(params![screenshot_id], |row| row.get(0))
            .optional()?;
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn batch_report_by_number(
    conn: &Connection,
    session_id: &str,
    batch_number: u32,
) -> Result<BatchReport, DatabaseError> {
    let row = conn
        .query_row(
            &format!("{BATCH_REPORT_COLUMNS} WHERE session_id = ?1 AND batch_number = ?2"),
            params![session_id, batch_number],
            batch_row,
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "BatchReport".into(),
            id: format!("{session_id}#{batch_number}"),
        })?;
    batch_report_from_row(row)
}

fn batch_report_by_id(conn: &Connection, id: &str) -> Result<BatchReport, DatabaseError> {
    let row = conn
        .query_row(
            &format!("{BATCH_REPORT_COLUMNS} WHERE id = ?1"),
            params![id],
            batch_row,
        )
        .optional()?
        .ok_or_else(|| DatabaseError::NotFound {
            entity_type: "BatchReport".into(),
            id: id.to_string(),
        })?;
    batch_report_from_row(row)
}

fn load_batch_reports(conn: &Connection, session_id: &str) -> Result<Vec<BatchReport>, DatabaseError> {
    let mut stmt = conn.prepare(&format!(
        "{BATCH_REPORT_COLUMNS} WHERE session_id = ?1 ORDER BY batch_number ASC"
    ))?;
    let rows = stmt.query_map(params![session_id], batch_row)?;

    let mut reports = Vec::new();
    for row in rows {
        let row = row?;
        let (id, batch_number) = (row.id.clone(), row.batch_number);
        match batch_report_from_row(row) {
            Ok(report) => reports.push(report),
            Err(e) => tracing::warn!(
                session_id = %session_id,
                batch_number,
                report_id = %id,
                error = %e,
                "Skipping undecodable batch report"
            ),
        }
    }
    Ok(reports)
}

const BATCH_REPORT_COLUMNS: &str = "SELECT id, session_id, user_id, batch_number, screenshot_ids,
        analysis, processing_status, created_at
 FROM batch_reports";

struct BatchReportRow {
    id: String,
    session_id: String,
    user_id: String,
    batch_number: u32,
    screenshot_ids: String,
    analysis: String,
    processing_status: String,
    created_at: String,
}

fn batch_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<BatchReportRow> {
    Ok(BatchReportRow {
        id: row.get(0)?,
        session_id: row.get(1)?,
        user_id: row.get(2)?,
        batch_number: row.get(3)?,
        screenshot_ids: row.get(4)?,
        analysis: row.get(5)?,
        processing_status: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn batch_report_from_row(row: BatchReportRow) -> Result<BatchReport, DatabaseError> {
    Ok(BatchReport {
        screenshot_ids: serde_json::from_str(&row.screenshot_ids)?,
        analysis: serde_json::from_str(&row.analysis)?,
        processing_status: ProcessingStatus::from_str(&row.processing_status)?,
        created_at: parse_timestamp("created_at", &row.created_at)?,
        id: row.id,
        session_id: row.session_id,
        user_id: row.user_id,
        batch_number: row.batch_number,
    })
}

// ──────────────────────────────────────────────
// Session reports
// ──────────────────────────────────────────────

fn upsert_report(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
    summary: &SessionSummaryResponse,
) -> Result<SessionReport, DatabaseError> {
    let summary_json = serde_json::to_string(summary)?;
    let now = format_timestamp(&Utc::now());

    conn.execute(
        "INSERT INTO session_reports (id, session_id, user_id, summary, generated_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)
         ON CONFLICT(session_id, user_id) DO UPDATE SET
             summary = excluded.summary,
             generated_at = excluded.generated_at,
             updated_at = excluded.updated_at",
        params![
            Uuid::new_v4().to_string(),
            session_id,
            user_id,
            summary_json,
            format_timestamp(&summary.generated_at),
            now,
        ],
    )?;

    let (id, summary_json, generated_at, updated_at): (String, String, String, String) = conn
        .query_row(
            "SELECT id, summary, generated_at, updated_at
             FROM session_reports WHERE session_id = ?1 AND user_id = ?2",
            params![session_id, user_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
        )?;

    Ok(SessionReport {
        id,
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        summary: serde_json::from_str(&summary_json)?,
        generated_at: parse_timestamp("generated_at", &generated_at)?,
        updated_at: parse_timestamp("updated_at", &updated_at)?,
    })
}
