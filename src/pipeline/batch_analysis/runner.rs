//! BatchPipeline: the two public operations.
//!
//! Per invocation of `trigger_batch_processing`:
//! SELECTING → ANALYZING → PARSING → PERSISTING → DONE.
//! A failed analysis detours through FALLBACK_ANALYZING; a failed write
//! ends in DEGRADED_PERSISTING → DONE_WITH_WARNING. No retries: one
//! fallback hop per stage, the caller decides whether to try again.
//!
//! Concurrent invocations for the same session are not serialized here.
//! They converge because the batch number is taken before the screenshots
//! are selected, the persister is idempotent on `(session_id, batch_number)`,
//! and it never lets two batches cover the same screenshot.

use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::aggregator::aggregate;
use super::error::PipelineError;
use super::selector::BatchSelector;
use super::strategy::{finish_analysis, resolve_analysis_type, AnalysisStrategy, Inference};
use super::traits::{NewBatchReport, ReportPersister, ScreenshotSource, SessionDirectory};
use super::types::*;
use crate::config::{clamp_batch_size, DEFAULT_BATCH_SIZE};
use crate::models::{Screenshot, WorkSession};

/// Stages of one batch invocation, for logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Selecting,
    Analyzing,
    FallbackAnalyzing,
    Parsing,
    Persisting,
    DegradedPersisting,
    Done,
    DoneWithWarning,
}

impl PipelineState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Selecting => "SELECTING",
            Self::Analyzing => "ANALYZING",
            Self::FallbackAnalyzing => "FALLBACK_ANALYZING",
            Self::Parsing => "PARSING",
            Self::Persisting => "PERSISTING",
            Self::DegradedPersisting => "DEGRADED_PERSISTING",
            Self::Done => "DONE",
            Self::DoneWithWarning => "DONE_WITH_WARNING",
        }
    }
}

fn enter(state: PipelineState) {
    tracing::debug!(state = state.as_str(), "Pipeline state");
}

pub struct BatchPipeline {
    selector: BatchSelector,
    strategy: AnalysisStrategy,
    sessions: Arc<dyn SessionDirectory>,
    reports: Arc<dyn ReportPersister>,
    default_batch_size: u32,
    default_analysis_type: AnalysisType,
}

impl BatchPipeline {
    pub fn new(
        screenshots: Arc<dyn ScreenshotSource>,
        sessions: Arc<dyn SessionDirectory>,
        reports: Arc<dyn ReportPersister>,
        strategy: AnalysisStrategy,
    ) -> Self {
        Self {
            selector: BatchSelector::new(screenshots),
            strategy,
            sessions,
            reports,
            default_batch_size: DEFAULT_BATCH_SIZE,
            default_analysis_type: AnalysisType::Auto,
        }
    }

    /// Values used when a request leaves a field out.
    pub fn with_defaults(mut self, batch_size: u32, analysis_type: AnalysisType) -> Self {
        self.default_batch_size = clamp_batch_size(batch_size);
        self.default_analysis_type = analysis_type;
        self
    }

    /// Analyse the next batch of a session and store the report.
    ///
    /// Only a missing session, an empty selection, an unreadable screenshot
    /// source or cancellation fail the call. Everything else lowers the
    /// quality of the result (`source`, `processing_status`) instead.
    pub async fn trigger_batch_processing(
        &self,
        user_id: &str,
        session_id: &str,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchProcessingResult, PipelineError> {
        let span = tracing::info_span!("batch_pipeline", session_id, user_id);
        self.process_batch(user_id, session_id, request, cancel)
            .instrument(span)
            .await
    }

    async fn process_batch(
        &self,
        user_id: &str,
        session_id: &str,
        request: &BatchRequest,
        cancel: &CancellationToken,
    ) -> Result<BatchProcessingResult, PipelineError> {
        let start = Instant::now();
        self.require_session(session_id, user_id).await?;

        // ── SELECTING ──
        enter(PipelineState::Selecting);
        // Numbering first: a batch committed between these two reads makes
        // this invocation collide on the key instead of minting a new one.
        let batch_number = match self.reports.next_batch_number(session_id).await {
            Ok(n) => Some(n),
            Err(e) => {
                tracing::warn!(error = %e, "Batch number lookup failed, result will not be stored");
                None
            }
        };

        let batch_size = request.batch_size.unwrap_or(self.default_batch_size);
        let shots = self.selector.select(session_id, user_id, batch_size).await?;

        let requested = request.analysis_type.unwrap_or(self.default_analysis_type);
        let analysis_type = resolve_analysis_type(requested, &shots);

        tracing::info!(
            batch_number = batch_number.unwrap_or(0),
            screenshots = shots.len(),
            analysis_type = analysis_type.as_str(),
            inference_configured = self.strategy.is_configured(),
            "Batch processing started"
        );

        // ── ANALYZING ──
        enter(PipelineState::Analyzing);
        let inference = match self.strategy.infer(&shots, analysis_type, cancel).await {
            Ok(inference) => inference,
            Err(e) => {
                tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Batch processing cancelled");
                return Err(e);
            }
        };
        match &inference {
            Inference::Unavailable(reason) => {
                tracing::warn!(
                    reason = reason.as_str(),
                    detail = ?reason,
                    "Inference unavailable, using heuristic analysis"
                );
                enter(PipelineState::FallbackAnalyzing);
            }
            Inference::Response { raw, elapsed_ms } => {
                tracing::debug!(response_len = raw.len(), inference_ms = elapsed_ms, "Inference answered");
            }
        }

        // ── PARSING ──
        enter(PipelineState::Parsing);
        let analysis = finish_analysis(&inference, &shots);

        // ── PERSISTING ──
        enter(PipelineState::Persisting);
        let report = self
            .persist(session_id, user_id, batch_number, &shots, analysis)
            .await;

        let done = match report.processing_status {
            ProcessingStatus::Completed => PipelineState::Done,
            ProcessingStatus::Degraded => PipelineState::DoneWithWarning,
        };
        enter(done);

        tracing::info!(
            batch_number = report.batch_number,
            batch_report_id = %report.id,
            source = report.analysis.source().as_str(),
            processing_status = report.processing_status.as_str(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Batch processing finished"
        );

        Ok(BatchProcessingResult {
            batch_report_id: report.id.clone(),
            batch_number: report.batch_number,
            screenshot_count: report.screenshot_count(),
            analysis_type,
            source: report.analysis.source(),
            processing_status: report.processing_status,
            summary: report.analysis.summary().to_string(),
            focus_score: report.analysis.metrics().focus_score(),
            focus_score_estimated: report.analysis.focus_score_is_estimate(),
            created_at: report.created_at,
        })
    }

    /// Store the report; on failure hand back an unsaved copy marked
    /// degraded.
    async fn persist(
        &self,
        session_id: &str,
        user_id: &str,
        batch_number: Option<u32>,
        shots: &[Screenshot],
        analysis: AnalysisResult,
    ) -> BatchReport {
        let screenshot_ids: Vec<String> = shots.iter().map(|s| s.id.clone()).collect();

        if let Some(batch_number) = batch_number {
            let new_report = NewBatchReport {
                session_id: session_id.to_string(),
                user_id: user_id.to_string(),
                batch_number,
                screenshot_ids,
                analysis,
            };
            match self.reports.create_batch_report(&new_report).await {
                Ok(report) => return report,
                Err(e) => {
                    tracing::warn!(batch_number, error = %e, "Persisting batch report failed, returning degraded result");
                    enter(PipelineState::DegradedPersisting);
                    return degraded_report(new_report);
                }
            }
        }

        enter(PipelineState::DegradedPersisting);
        degraded_report(NewBatchReport {
            session_id: session_id.to_string(),
            user_id: user_id.to_string(),
            batch_number: 0,
            screenshot_ids,
            analysis,
        })
    }

    /// Recompute the session's summary from its stored batch reports and
    /// upsert it. Repeated calls with no new batches give identical output.
    pub async fn generate_session_summary(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SessionSummaryResponse, PipelineError> {
        let span = tracing::info_span!("session_summary", session_id, user_id);
        self.summarize(user_id, session_id).instrument(span).await
    }

    async fn summarize(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<SessionSummaryResponse, PipelineError> {
        let session = self.require_session(session_id, user_id).await?;

        let reports = self
            .reports
            .list_batch_reports(session_id)
            .await
            .map_err(|e| PipelineError::SourceUnavailable(e.to_string()))?;

        let last_activity = match self.sessions.last_activity_at(session_id).await {
            Ok(at) => at,
            Err(e) => {
                tracing::warn!(error = %e, "Last activity lookup failed, using batch times");
                None
            }
        };

        let summary = aggregate(session_id, &reports);
        let newest_batch = reports.iter().map(|r| r.created_at).max();
        let response = SessionSummaryResponse {
            session_id: session_id.to_string(),
            duration: session_duration(&session, last_activity, newest_batch),
            overview: summary.overview,
            batch_analysis: BatchAnalysisOverview {
                total_batches: summary.total_batches,
                total_screenshots: summary.total_screenshots,
                average_productivity: summary.average_productivity,
                focus_percentage: summary.focus_percentage,
                top_applications: summary.top_applications,
                batches: summary.batches,
            },
            insights: summary.insights,
            recommendations: summary.recommendations,
            generated_at: newest_batch.unwrap_or(session.started_at),
        };

        match self
            .reports
            .upsert_session_report(session_id, user_id, &response)
            .await
        {
            Ok(report) => tracing::info!(
                session_report_id = %report.id,
                batches = response.batch_analysis.total_batches,
                focus_percentage = response.batch_analysis.focus_percentage,
                "Session summary stored"
            ),
            Err(e) => tracing::warn!(error = %e, "Storing session summary failed, returning it unsaved"),
        }

        Ok(response)
    }

    async fn require_session(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<WorkSession, PipelineError> {
        match self.sessions.find_session(session_id, user_id).await {
            Ok(Some(session)) => Ok(session),
            Ok(None) => Err(PipelineError::SessionNotFound(session_id.to_string())),
            Err(e) => Err(PipelineError::SourceUnavailable(e.to_string())),
        }
    }
}

fn degraded_report(report: NewBatchReport) -> BatchReport {
    BatchReport {
        id: Uuid::new_v4().to_string(),
        session_id: report.session_id,
        user_id: report.user_id,
        batch_number: report.batch_number,
        screenshot_ids: report.screenshot_ids,
        analysis: report.analysis,
        processing_status: ProcessingStatus::Degraded,
        created_at: Utc::now(),
    }
}

/// Seconds from session start to its end, or to the latest known activity
/// while the session is open.
fn session_duration(
    session: &WorkSession,
    last_activity: Option<DateTime<Utc>>,
    newest_batch: Option<DateTime<Utc>>,
) -> i64 {
    let end = session
        .ended_at
        .or_else(|| last_activity.into_iter().chain(newest_batch).max())
        .unwrap_or(session.started_at);
    (end - session.started_at).num_seconds().max(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repository::{insert_screenshot, insert_work_session};
    use crate::db::sqlite::open_memory_database;
    use crate::db::DatabaseError;
    use crate::models::CaptureTrigger;
    use crate::pipeline::batch_analysis::heuristic::heuristic_analysis;
    use crate::pipeline::batch_analysis::images::ImageError;
    use crate::pipeline::batch_analysis::store::SqliteStore;
    use crate::pipeline::batch_analysis::traits::ImageStore;
    use crate::pipeline::inference::{InferenceClient, InferenceError, InferenceRequest, MockInferenceClient};
    use async_trait::async_trait;
    use chrono::{Duration as ChronoDuration, TimeZone};
    use std::time::Duration;
    use tokio::sync::Barrier;

    const STRUCTURED: &str = r#"The user worked through review comments.
{"summary": "Addressed review comments", "productivityMetrics": {"focusScore": 0.72, "distractionEvents": 2, "taskSwitching": 1}, "insights": ["Steady review pace"], "recommendations": ["Batch notifications"], "applications": ["GitHub"]}"#;

    struct NoImages;

    #[async_trait]
    impl ImageStore for NoImages {
        async fn fetch(&self, image_ref: &str) -> Result<Vec<u8>, ImageError> {
            Err(ImageError::NotFound(image_ref.to_string()))
        }
    }

    /// Answers only once two requests are in flight at the same time.
    struct BarrierClient {
        barrier: Barrier,
    }

    #[async_trait]
    impl InferenceClient for BarrierClient {
        fn model(&self) -> &str {
            "barrier"
        }

        async fn generate(&self, _request: &InferenceRequest) -> Result<String, InferenceError> {
            self.barrier.wait().await;
            Ok(STRUCTURED.to_string())
        }
    }

    /// Reads succeed through the SQLite store; every write fails.
    struct ReadOnlyPersister(Arc<SqliteStore>);

    #[async_trait]
    impl ReportPersister for ReadOnlyPersister {
        async fn next_batch_number(&self, session_id: &str) -> Result<u32, DatabaseError> {
            self.0.next_batch_number(session_id).await
        }

        async fn create_batch_report(&self, _report: &NewBatchReport) -> Result<BatchReport, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }

        async fn list_batch_reports(&self, session_id: &str) -> Result<Vec<BatchReport>, DatabaseError> {
            self.0.list_batch_reports(session_id).await
        }

        async fn upsert_session_report(
            &self,
            _session_id: &str,
            _user_id: &str,
            _summary: &SessionSummaryResponse,
        ) -> Result<SessionReport, DatabaseError> {
            Err(DatabaseError::LockPoisoned)
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
    }

    /// Session "sess-1" of "user-1" with `n` screenshots one minute apart;
    /// every fourth is click-triggered.
    fn seeded_store(n: i64, with_priors: bool) -> Arc<SqliteStore> {
        let conn = open_memory_database().unwrap();
        insert_work_session(
            &conn,
            &WorkSession {
                id: "sess-1".into(),
                user_id: "user-1".into(),
                title: None,
                started_at: start(),
                ended_at: None,
            },
        )
        .unwrap();
        for i in 0..n {
            insert_screenshot(
                &conn,
                &Screenshot {
                    id: format!("shot-{i:02}"),
                    session_id: "sess-1".into(),
                    user_id: "user-1".into(),
                    created_at: start() + ChronoDuration::minutes(i),
                    capture_trigger: if i % 4 == 3 { CaptureTrigger::Click } else { CaptureTrigger::Interval },
                    active_app: Some(if i % 3 == 0 { "Slack" } else { "VS Code" }.into()),
                    image_ref: format!("shot-{i:02}.png"),
                    prior_analysis: with_priors.then(|| format!("Editing module {i}")),
                },
            )
            .unwrap();
        }
        Arc::new(SqliteStore::new(conn))
    }

    fn pipeline_with(
        store: Arc<SqliteStore>,
        client: Option<Arc<dyn InferenceClient>>,
        timeout: Duration,
    ) -> BatchPipeline {
        BatchPipeline::new(
            store.clone(),
            store.clone(),
            store,
            AnalysisStrategy::new(client, Arc::new(NoImages), timeout),
        )
    }

    fn unconfigured(store: Arc<SqliteStore>) -> BatchPipeline {
        pipeline_with(store, None, Duration::from_secs(5))
    }

    fn request(batch_size: u32) -> BatchRequest {
        BatchRequest {
            batch_size: Some(batch_size),
            analysis_type: None,
        }
    }

    #[tokio::test]
    async fn unconfigured_inference_still_produces_stored_report() {
        let store = seeded_store(30, false);
        let pipeline = unconfigured(store.clone());

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &BatchRequest::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, AnalysisSource::HeuristicFallback);
        assert!(!result.batch_report_id.is_empty());
        assert_eq!(result.batch_number, 1);
        assert_eq!(result.screenshot_count, 30);
        assert_eq!(result.processing_status, ProcessingStatus::Completed);
        assert_eq!(result.analysis_type, AnalysisType::Vision);
        assert!(result.focus_score_estimated);
        // 23 interval vs 7 click captures
        assert!((result.focus_score - 23.0 / 30.0).abs() < 1e-9);

        let stored = store.list_batch_reports("sess-1").await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].id, result.batch_report_id);
    }

    #[tokio::test]
    async fn consecutive_batches_advance_through_the_timeline() {
        let store = seeded_store(25, false);
        let pipeline = unconfigured(store.clone());
        let cancel = CancellationToken::new();

        let first = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(10), &cancel)
            .await
            .unwrap();
        let second = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(10), &cancel)
            .await
            .unwrap();
        let third = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(10), &cancel)
            .await
            .unwrap();

        assert_eq!((first.batch_number, second.batch_number, third.batch_number), (1, 2, 3));
        assert_eq!(third.screenshot_count, 5);

        let reports = store.list_batch_reports("sess-1").await.unwrap();
        assert_eq!(reports[1].screenshot_ids.first().map(String::as_str), Some("shot-10"));

        let err = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(10), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoScreenshotsAvailable { .. }));
    }

    #[tokio::test]
    async fn unknown_or_foreign_session_is_not_found() {
        let pipeline = unconfigured(seeded_store(5, false));
        let cancel = CancellationToken::new();

        let err = pipeline
            .trigger_batch_processing("user-1", "nope", &request(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound(_)));

        let err = pipeline
            .trigger_batch_processing("user-2", "sess-1", &request(5), &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound(_)));

        let err = pipeline.generate_session_summary("user-2", "sess-1").await.unwrap_err();
        assert!(matches!(err, PipelineError::SessionNotFound(_)));
    }

    #[tokio::test]
    async fn empty_session_reports_no_screenshots() {
        let pipeline = unconfigured(seeded_store(0, false));
        let err = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(5), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::NoScreenshotsAvailable { .. }));
        assert!(err.is_user_facing());
    }

    #[tokio::test]
    async fn auto_with_described_screenshots_uses_aggregate_mode() {
        let store = seeded_store(6, true);
        let client = Arc::new(MockInferenceClient::new(STRUCTURED));
        let pipeline = pipeline_with(
            store,
            Some(client.clone() as Arc<dyn InferenceClient>),
            Duration::from_secs(5),
        );

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(6), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.analysis_type, AnalysisType::Aggregate);
        assert_eq!(result.source, AnalysisSource::Ai);
        assert_eq!(result.summary, "Addressed review comments");
        assert!(!result.focus_score_estimated);
        assert!(client.last_request().unwrap().images.is_empty());
    }

    #[tokio::test]
    async fn concurrent_triggers_share_one_report() {
        let store = seeded_store(10, true);
        let client: Arc<dyn InferenceClient> = Arc::new(BarrierClient {
            barrier: Barrier::new(2),
        });
        let pipeline = pipeline_with(store.clone(), Some(client), Duration::from_secs(5));
        let cancel = CancellationToken::new();
        let req = request(10);

        let (a, b) = tokio::join!(
            pipeline.trigger_batch_processing("user-1", "sess-1", &req, &cancel),
            pipeline.trigger_batch_processing("user-1", "sess-1", &req, &cancel),
        );
        let (a, b) = (a.unwrap(), b.unwrap());

        assert_eq!(a.batch_number, 1);
        assert_eq!(b.batch_number, 1);
        assert_eq!(a.batch_report_id, b.batch_report_id);
        assert_eq!(store.list_batch_reports("sess-1").await.unwrap().len(), 1);
    }

    /// Commits a rival batch 1 over whatever it hands out, right after
    /// the fetch.
    struct RivalCommitsAfterFetch {
        store: Arc<SqliteStore>,
    }

    #[async_trait]
    impl ScreenshotSource for RivalCommitsAfterFetch {
        async fn fetch(
            &self,
            session_id: &str,
            user_id: &str,
            limit: u32,
        ) -> Result<Vec<Screenshot>, DatabaseError> {
            let shots = self.store.fetch(session_id, user_id, limit).await?;
            self.store
                .create_batch_report(&NewBatchReport {
                    session_id: session_id.to_string(),
                    user_id: user_id.to_string(),
                    batch_number: 1,
                    screenshot_ids: shots.iter().map(|s| s.id.clone()).collect(),
                    analysis: heuristic_analysis(&shots),
                })
                .await?;
            Ok(shots)
        }
    }

    #[tokio::test]
    async fn batch_committed_mid_selection_is_shared_not_duplicated() {
        let store = seeded_store(5, false);
        let pipeline = BatchPipeline::new(
            Arc::new(RivalCommitsAfterFetch { store: store.clone() }),
            store.clone(),
            store.clone(),
            AnalysisStrategy::new(None, Arc::new(NoImages), Duration::from_secs(5)),
        );

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(5), &CancellationToken::new())
            .await
            .unwrap();

        let reports = store.list_batch_reports("sess-1").await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(result.batch_number, 1);
        assert_eq!(result.batch_report_id, reports[0].id);

        let summary = pipeline.generate_session_summary("user-1", "sess-1").await.unwrap();
        assert_eq!(summary.batch_analysis.total_screenshots, 5);
    }

    #[tokio::test]
    async fn failed_write_returns_degraded_result() {
        let store = seeded_store(8, false);
        let pipeline = BatchPipeline::new(
            store.clone(),
            store.clone(),
            Arc::new(ReadOnlyPersister(store.clone())),
            AnalysisStrategy::new(None, Arc::new(NoImages), Duration::from_secs(5)),
        );

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(8), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.processing_status, ProcessingStatus::Degraded);
        assert!(!result.batch_report_id.is_empty());
        assert_eq!(result.screenshot_count, 8);
        assert!(store.list_batch_reports("sess-1").await.unwrap().is_empty());

        // summary still comes back even though it cannot be stored
        let summary = pipeline.generate_session_summary("user-1", "sess-1").await.unwrap();
        assert_eq!(summary.batch_analysis.total_batches, 0);
    }

    #[tokio::test]
    async fn slow_inference_falls_back_to_heuristic() {
        let store = seeded_store(5, true);
        let client = MockInferenceClient::new(STRUCTURED).with_delay(Duration::from_secs(30));
        let pipeline = pipeline_with(
            store,
            Some(Arc::new(client) as Arc<dyn InferenceClient>),
            Duration::from_millis(50),
        );

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(5), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.source, AnalysisSource::HeuristicFallback);
        assert_eq!(result.processing_status, ProcessingStatus::Completed);
    }

    #[tokio::test]
    async fn failing_inference_falls_back_to_heuristic() {
        let store = seeded_store(5, true);
        let pipeline = pipeline_with(
            store,
            Some(Arc::new(MockInferenceClient::failing("model not loaded")) as Arc<dyn InferenceClient>),
            Duration::from_secs(5),
        );

        let result = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(5), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(result.source, AnalysisSource::HeuristicFallback);
    }

    #[tokio::test]
    async fn cancelled_request_stores_nothing() {
        let store = seeded_store(5, true);
        let client = MockInferenceClient::new(STRUCTURED).with_delay(Duration::from_secs(30));
        let pipeline = pipeline_with(
            store.clone(),
            Some(Arc::new(client) as Arc<dyn InferenceClient>),
            Duration::from_secs(60),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = pipeline
            .trigger_batch_processing("user-1", "sess-1", &request(5), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Cancelled));
        assert!(store.list_batch_reports("sess-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_summary_is_identical() {
        let store = seeded_store(20, false);
        let pipeline = unconfigured(store.clone());
        let cancel = CancellationToken::new();
        for _ in 0..2 {
            pipeline
                .trigger_batch_processing("user-1", "sess-1", &request(10), &cancel)
                .await
                .unwrap();
        }

        let first = pipeline.generate_session_summary("user-1", "sess-1").await.unwrap();
        let second = pipeline.generate_session_summary("user-1", "sess-1").await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.batch_analysis.total_batches, 2);
        assert_eq!(first.batch_analysis.total_screenshots, 20);
        // open session: start to newest batch report (written just now)
        assert!(first.duration >= 19 * 60);
        assert!(first.overview.contains("fallback analysis"));
    }

    #[tokio::test]
    async fn summary_of_session_without_batches() {
        let pipeline = unconfigured(seeded_store(3, false));
        let summary = pipeline.generate_session_summary("user-1", "sess-1").await.unwrap();

        assert_eq!(summary.batch_analysis.total_batches, 0);
        assert_eq!(summary.batch_analysis.focus_percentage, 0);
        assert_eq!(summary.generated_at, start());
        assert_eq!(summary.duration, 120);
    }

    #[test]
    fn duration_prefers_session_end() {
        let mut session = WorkSession {
            id: "s".into(),
            user_id: "u".into(),
            title: None,
            started_at: start(),
            ended_at: Some(start() + ChronoDuration::hours(2)),
        };
        let activity = Some(start() + ChronoDuration::minutes(30));
        assert_eq!(session_duration(&session, activity, None), 7200);

        session.ended_at = None;
        assert_eq!(session_duration(&session, activity, None), 1800);
        assert_eq!(session_duration(&session, None, None), 0);
    }

    #[test]
    fn state_names() {
        assert_eq!(PipelineState::FallbackAnalyzing.as_str(), "FALLBACK_ANALYZING");
        assert_eq!(PipelineState::DoneWithWarning.as_str(), "DONE_WITH_WARNING");
    }
}
