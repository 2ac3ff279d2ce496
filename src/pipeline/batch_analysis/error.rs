//! Failures that reach the caller of the batch pipeline.
//!
//! Inference, parsing, image and persistence problems are absorbed inside
//! the pipeline and show up only as a lower-quality result; they never
//! appear here.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("No unprocessed screenshots available for session {session_id}")]
    NoScreenshotsAvailable { session_id: String },

    #[error("Session not found: {0}")]
    SessionNotFound(String),

    #[error("Screenshot source unavailable: {0}")]
    SourceUnavailable(String),

    #[error("Batch processing cancelled")]
    Cancelled,
}

impl PipelineError {
    /// Whether the failure describes the user's request rather than the
    /// service's health.
    pub fn is_user_facing(&self) -> bool {
        matches!(
            self,
            Self::NoScreenshotsAvailable { .. } | Self::SessionNotFound(_)
        )
    }
}
