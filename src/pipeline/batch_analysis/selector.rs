//! BatchSelector: picks the screenshots one invocation analyses.

use std::sync::Arc;

use super::error::PipelineError;
use super::traits::ScreenshotSource;
use crate::config::clamp_batch_size;
use crate::models::Screenshot;

pub struct BatchSelector {
    source: Arc<dyn ScreenshotSource>,
}

impl BatchSelector {
    pub fn new(source: Arc<dyn ScreenshotSource>) -> Self {
        Self { source }
    }

    /// Up to `batch_size` uncovered screenshots, oldest first.
    ///
    /// Timeline narration downstream depends on the ordering, so it is
    /// enforced here rather than trusted from the source.
    pub async fn select(
        &self,
        session_id: &str,
        user_id: &str,
        batch_size: u32,
    ) -> Result<Vec<Screenshot>, PipelineError> {
        let limit = clamp_batch_size(batch_size);

        let mut shots = self
            .source
            .fetch(session_id, user_id, limit)
            .await
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;

        if shots.is_empty() {
            return Err(PipelineError::NoScreenshotsAvailable {
                session_id: session_id.to_string(),
            });
        }

        shots.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        shots.truncate(limit as usize);

        tracing::debug!(
            session_id,
            selected = shots.len(),
            requested = batch_size,
            "Selected batch screenshots"
        );

        Ok(shots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::DatabaseError;
    use crate::models::CaptureTrigger;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone, Utc};

    struct FixedSource(Vec<Screenshot>);

    #[async_trait]
    impl ScreenshotSource for FixedSource {
        async fn fetch(&self, _: &str, _: &str, _limit: u32) -> Result<Vec<Screenshot>, DatabaseError> {
            Ok(self.0.clone())
        }
    }

    struct BrokenSource;

    #[async_trait]
    impl ScreenshotSource for BrokenSource {
        async fn fetch(&self, _: &str, _: &str, _: u32) -> Result<Vec<Screenshot>, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
    }

    fn shot(id: &str, minute: i64) -> Screenshot {
        Screenshot {
            id: id.into(),
            session_id: "s".into(),
            user_id: "u".into(),
            created_at: Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap() + Duration::minutes(minute),
            capture_trigger: CaptureTrigger::Interval,
            active_app: None,
            image_ref: format!("{id}.png"),
            prior_analysis: None,
        }
    }

    #[tokio::test]
    async fn empty_source_is_no_screenshots_available() {
        let selector = BatchSelector::new(Arc::new(FixedSource(vec![])));
        let err = selector.select("s", "u", 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::NoScreenshotsAvailable { .. }));
    }

    #[tokio::test]
    async fn result_is_sorted_and_bounded() {
        let selector = BatchSelector::new(Arc::new(FixedSource(vec![
            shot("late", 30),
            shot("early", 0),
            shot("mid", 15),
        ])));
        let shots = selector.select("s", "u", 2).await.unwrap();
        let ids: Vec<&str> = shots.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["early", "mid"]);
    }

    #[tokio::test]
    async fn broken_source_is_source_unavailable() {
        let selector = BatchSelector::new(Arc::new(BrokenSource));
        let err = selector.select("s", "u", 10).await.unwrap_err();
        assert!(matches!(err, PipelineError::SourceUnavailable(_)));
    }
}
