use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::{CaptureTrigger, Screenshot};

pub fn insert_screenshot(conn: &Connection, shot: &Screenshot) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO screenshots
         (id, session_id, user_id, created_at, capture_trigger, active_app, image_ref, prior_analysis)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            shot.id,
            shot.session_id,
            shot.user_id,
            format_timestamp(&shot.created_at),
            shot.capture_trigger.as_str(),
            shot.active_app,
            shot.image_ref,
            shot.prior_analysis,
        ],
    )?;
    Ok(())
}

/// Screenshots of a session that no batch report covers yet, oldest first.
pub fn fetch_uncovered_screenshots(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
    limit: u32,
) -> Result<Vec<Screenshot>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.session_id, s.user_id, s.created_at, s.capture_trigger,
                s.active_app, s.image_ref, s.prior_analysis
         FROM screenshots s
         WHERE s.session_id = ?1 AND s.user_id = ?2
           AND NOT EXISTS (
               SELECT 1 FROM batch_report_screenshots b WHERE b.screenshot_id = s.id
           )
         ORDER BY s.created_at ASC, s.id ASC
         LIMIT ?3",
    )?;

    let rows = stmt.query_map(params![session_id, user_id, limit], |row| {
        Ok(ScreenshotRow {
            id: row.get(0)?,
            session_id: row.get(1)?,
            user_id: row.get(2)?,
            created_at: row.get(3)?,
            capture_trigger: row.get(4)?,
            active_app: row.get(5)?,
            image_ref: row.get(6)?,
            prior_analysis: row.get(7)?,
        })
    })?;

    let mut shots = Vec::new();
    for row in rows {
        shots.push(screenshot_from_row(row?)?);
    }
    Ok(shots)
}

/// Capture time of the newest screenshot in a session, if any.
pub fn latest_screenshot_at(
    conn: &Connection,
    session_id: &str,
) -> Result<Option<DateTime<Utc>>, DatabaseError> {
    let latest: Option<String> = conn.query_row(
        "SELECT MAX(created_at) FROM screenshots WHERE session_id = ?1",
        params![session_id],
        |row| row.get(0),
    )?;
    latest
        .as_deref()
        .map(|v| parse_timestamp("created_at", v))
        .transpose()
}

struct ScreenshotRow {
    id: String,
    session_id: String,
    user_id: String,
    created_at: String,
    capture_trigger: String,
    active_app: Option<String>,
    image_ref: String,
    prior_analysis: Option<String>,
}

fn screenshot_from_row(row: ScreenshotRow) -> Result<Screenshot, DatabaseError> {
    let capture_trigger = CaptureTrigger::from_stored(&row.capture_trigger);
    if capture_trigger == CaptureTrigger::Other && row.capture_trigger != "other" {
        tracing::debug!(
            screenshot_id = %row.id,
            capture_trigger = %row.capture_trigger,
            "Unrecognised capture trigger, treating as other"
        );
    }
    Ok(Screenshot {
        created_at: parse_timestamp("created_at", &row.created_at)?,
        capture_trigger,
        id: row.id,
        session_id: row.session_id,
        user_id: row.user_id,
        active_app: row.active_app,
        image_ref: row.image_ref,
        prior_analysis: row.prior_analysis,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::insert_work_session;
    use crate::db::sqlite::open_memory_database;
    use crate::models::WorkSession;
    use chrono::{Duration, TimeZone};

    fn setup() -> Connection {
        let conn = open_memory_database().unwrap();
        insert_work_session(
            &conn,
            &WorkSession {
                id: "sess-1".into(),
                user_id: "user-1".into(),
                title: None,
                started_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
                ended_at: None,
            },
        )
        .unwrap();
        conn
    }

    fn shot(id: &str, minute: i64) -> Screenshot {
        Screenshot {
            id: id.into(),
            session_id: "sess-1".into(),
            user_id: "user-1".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
                + Duration::minutes(minute),
            capture_trigger: CaptureTrigger::Interval,
            active_app: Some("VS Code".into()),
            image_ref: format!("{id}.png"),
            prior_analysis: None,
        }
    }

    #[test]
    fn uncovered_screenshots_come_back_oldest_first() {
        let conn = setup();
        insert_screenshot(&conn, &shot("c", 20)).unwrap();
        insert_screenshot(&conn, &shot("a", 0)).unwrap();
        insert_screenshot(&conn, &shot("b", 10)).unwrap();

        let shots = fetch_uncovered_screenshots(&conn, "sess-1", "user-1", 10).unwrap();
        let ids: Vec<&str> = shots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn limit_is_respected() {
        let conn = setup();
        for i in 0..5 {
            insert_screenshot(&conn, &shot(&format!("s{i}"), i)).unwrap();
        }
        let shots = fetch_uncovered_screenshots(&conn, "sess-1", "user-1", 3).unwrap();
        assert_eq!(shots.len(), 3);
        assert_eq!(shots[0].id, "s0");
    }

    #[test]
    fn covered_screenshots_are_skipped() {
        let conn = setup();
        insert_screenshot(&conn, &shot("a", 0)).unwrap();
        insert_screenshot(&conn, &shot("b", 1)).unwrap();
        conn.execute(
            "INSERT INTO batch_reports
             (id, session_id, user_id, batch_number, screenshot_ids, analysis, source, processing_status, created_at)
             VALUES ('r1', 'sess-1', 'user-1', 1, '[\"a\"]', '{}', 'ai', 'completed', '2026-03-02T10:00:00.000Z')",
            [],
        )
        .unwrap();
        conn.execute(
            "INSERT INTO batch_report_screenshots (batch_report_id, screenshot_id) VALUES ('r1', 'a')",
            [],
        )
        .unwrap();

        let shots = fetch_uncovered_screenshots(&conn, "sess-1", "user-1", 10).unwrap();
        assert_eq!(shots.len(), 1);
        assert_eq!(shots[0].id, "b");
    }

    #[test]
    fn unrecognised_trigger_does_not_block_the_session() {
        let conn = setup();
        insert_screenshot(&conn, &shot("a", 0)).unwrap();
        conn.execute(
            "INSERT INTO screenshots (id, session_id, user_id, created_at, capture_trigger, image_ref)
             VALUES ('b', 'sess-1', 'user-1', '2026-03-02T09:01:00.000Z', 'window_focus', 'b.png')",
            [],
        )
        .unwrap();

        let shots = fetch_uncovered_screenshots(&conn, "sess-1", "user-1", 10).unwrap();
        assert_eq!(shots.len(), 2);
        assert_eq!(shots[1].capture_trigger, CaptureTrigger::Other);
    }

    #[test]
    fn other_users_screenshots_are_invisible() {
        let conn = setup();
        insert_screenshot(&conn, &shot("a", 0)).unwrap();
        let shots = fetch_uncovered_screenshots(&conn, "sess-1", "user-2", 10).unwrap();
        assert!(shots.is_empty());
    }

    #[test]
    fn latest_screenshot_time() {
        let conn = setup();
        assert!(latest_screenshot_at(&conn, "sess-1").unwrap().is_none());
        insert_screenshot(&conn, &shot("a", 0)).unwrap();
        insert_screenshot(&conn, &shot("b", 42)).unwrap();
        let latest = latest_screenshot_at(&conn, "sess-1").unwrap().unwrap();
        assert_eq!(latest, shot("b", 42).created_at);
    }

    #[test]
    fn corrupt_timestamp_in_storage_is_an_error() {
        let conn = setup();
        conn.execute(
            "INSERT INTO screenshots (id, session_id, user_id, created_at, capture_trigger, image_ref)
             VALUES ('x', 'sess-1', 'user-1', 'yesterday', 'interval', 'x.png')",
            [],
        )
        .unwrap();
        assert!(fetch_uncovered_screenshots(&conn, "sess-1", "user-1", 10).is_err());
    }
}
