use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use super::{format_timestamp, parse_timestamp};
use crate::db::DatabaseError;
use crate::models::WorkSession;

pub fn insert_work_session(conn: &Connection, session: &WorkSession) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO work_sessions (id, user_id, title, started_at, ended_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            session.id,
            session.user_id,
            session.title,
            format_timestamp(&session.started_at),
            session.ended_at.as_ref().map(format_timestamp),
        ],
    )?;
    Ok(())
}

/// Fetch a session owned by `user_id`. A session owned by someone else is
/// reported as absent.
pub fn get_work_session(
    conn: &Connection,
    session_id: &str,
    user_id: &str,
) -> Result<Option<WorkSession>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, user_id, title, started_at, ended_at
             FROM work_sessions WHERE id = ?1 AND user_id = ?2",
            params![session_id, user_id],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, Option<String>>(4)?,
                ))
            },
        )
        .optional()?;

    let Some((id, user_id, title, started_at, ended_at)) = row else {
        return Ok(None);
    };

    Ok(Some(WorkSession {
        id,
        user_id,
        title,
        started_at: parse_timestamp("started_at", &started_at)?,
        ended_at: ended_at
            .as_deref()
            .map(|v| parse_timestamp("ended_at", v))
            .transpose()?,
    }))
}

pub fn end_work_session(
    conn: &Connection,
    session_id: &str,
    ended_at: &DateTime<Utc>,
) -> Result<(), DatabaseError> {
    let changed = conn.execute(
        "UPDATE work_sessions SET ended_at = ?1 WHERE id = ?2",
        params![format_timestamp(ended_at), session_id],
    )?;
    if changed == 0 {
        return Err(DatabaseError::NotFound {
            entity_type: "work_session".into(),
            id: session_id.into(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::sqlite::open_memory_database;
    use chrono::TimeZone;

    fn sample_session() -> WorkSession {
        WorkSession {
            id: "sess-1".into(),
            user_id: "user-1".into(),
            title: Some("Deep work".into()),
            started_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap(),
            ended_at: None,
        }
    }

    #[test]
    fn insert_and_get_session() {
        let conn = open_memory_database().unwrap();
        insert_work_session(&conn, &sample_session()).unwrap();

        let loaded = get_work_session(&conn, "sess-1", "user-1").unwrap().unwrap();
        assert_eq!(loaded, sample_session());
    }

    #[test]
    fn session_of_other_user_is_absent() {
        let conn = open_memory_database().unwrap();
        insert_work_session(&conn, &sample_session()).unwrap();

        assert!(get_work_session(&conn, "sess-1", "user-2").unwrap().is_none());
        assert!(get_work_session(&conn, "missing", "user-1").unwrap().is_none());
    }

    #[test]
    fn end_session_sets_end_time() {
        let conn = open_memory_database().unwrap();
        insert_work_session(&conn, &sample_session()).unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();

        end_work_session(&conn, "sess-1", &end).unwrap();

        let loaded = get_work_session(&conn, "sess-1", "user-1").unwrap().unwrap();
        assert_eq!(loaded.ended_at, Some(end));
    }

    #[test]
    fn end_missing_session_is_not_found() {
        let conn = open_memory_database().unwrap();
        let end = Utc.with_ymd_and_hms(2026, 3, 2, 11, 0, 0).unwrap();
        assert!(matches!(
            end_work_session(&conn, "nope", &end),
            Err(DatabaseError::NotFound { .. })
        ));
    }
}
