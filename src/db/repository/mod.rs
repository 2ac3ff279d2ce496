//! Repository layer: raw CRUD for the data the batch pipeline reads.
//!
//! Sessions and screenshots are written by the capture side; these
//! functions give the pipeline (and tests) a narrow way in.

mod screenshot;
mod session;

use chrono::{DateTime, SecondsFormat, Utc};

use super::DatabaseError;

pub use screenshot::*;
pub use session::*;

/// Canonical timestamp text. Fixed precision keeps lexical order equal to
/// chronological order, which the ORDER BY clauses rely on.
pub fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse a stored timestamp written by `format_timestamp`.
pub fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::ConstraintViolation(format!("bad {field} timestamp '{value}': {e}")))
}
