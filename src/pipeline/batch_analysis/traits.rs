//! Trait definitions for the batch analysis pipeline.
//!
//! Four seams separate the pipeline from the systems around it:
//! - ScreenshotSource: unprocessed screenshots of a session
//! - SessionDirectory: session ownership and timing
//! - ImageStore: image bytes behind a screenshot's image reference
//! - ReportPersister: durable batch and session reports

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use super::images::ImageError;
use super::types::*;
use crate::db::DatabaseError;
use crate::models::{Screenshot, WorkSession};

/// Screenshots not yet covered by any batch report.
#[async_trait]
pub trait ScreenshotSource: Send + Sync {
    /// Up to `limit` uncovered screenshots, oldest first.
    async fn fetch(
        &self,
        session_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<Screenshot>, DatabaseError>;
}

#[async_trait]
pub trait SessionDirectory: Send + Sync {
    /// The session if it exists and belongs to `user_id`.
    async fn find_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<WorkSession>, DatabaseError>;

    /// Newest capture time in the session, if any screenshot exists.
    async fn last_activity_at(
        &self,
        session_id: &str,
    ) -> Result<Option<DateTime<Utc>>, DatabaseError>;
}

#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn fetch(&self, image_ref: &str) -> Result<Vec<u8>, ImageError>;
}

/// A batch report before it has an id or a timestamp.
#[derive(Debug, Clone)]
pub struct NewBatchReport {
    pub session_id: String,
    pub user_id: String,
    pub batch_number: u32,
    pub screenshot_ids: Vec<String>,
    pub analysis: AnalysisResult,
}

/// Durable storage of batch and session reports.
#[async_trait]
pub trait ReportPersister: Send + Sync {
    /// One past the highest batch number stored for the session.
    async fn next_batch_number(&self, session_id: &str) -> Result<u32, DatabaseError>;

    /// Store a batch report. Idempotent on `(session_id, batch_number)`:
    /// a repeat returns the row that already exists.
    async fn create_batch_report(&self, report: &NewBatchReport) -> Result<BatchReport, DatabaseError>;

    /// All batch reports of a session, ordered by batch number.
    async fn list_batch_reports(&self, session_id: &str) -> Result<Vec<BatchReport>, DatabaseError>;

    /// Insert or replace the session report. Idempotent on
    /// `(session_id, user_id)`.
    async fn upsert_session_report(
        &self,
        session_id: &str,
        user_id: &str,
        summary: &SessionSummaryResponse,
    ) -> Result<SessionReport, DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    // Verify traits are object-safe (can be used as `dyn Trait`)
    #[test]
    fn traits_are_object_safe() {
        fn _assert_source(_: &dyn ScreenshotSource) {}
        fn _assert_directory(_: &dyn SessionDirectory) {}
        fn _assert_images(_: &dyn ImageStore) {}
        fn _assert_persister(_: &dyn ReportPersister) {}
    }
}
