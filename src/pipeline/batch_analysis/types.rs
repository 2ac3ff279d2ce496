//! Core types for the batch analysis pipeline.
//!
//! Lifecycle:
//! Screenshots → Batch → AnalysisResult → BatchReport → SessionSummary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

pub use crate::models::{AnalysisSource, AnalysisType, ProcessingStatus};

// ═══════════════════════════════════════════
// Analysis result
// ═══════════════════════════════════════════

/// Clamp a focus score into [0, 1]. Non-finite input counts as no focus.
pub fn clamp_unit(value: f64) -> f64 {
    if value.is_finite() {
        value.clamp(0.0, 1.0)
    } else {
        0.0
    }
}

fn deserialize_unit<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    f64::deserialize(deserializer).map(clamp_unit)
}

/// Per-batch productivity numbers. `focus_score` is always in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductivityMetrics {
    #[serde(deserialize_with = "deserialize_unit")]
    focus_score: f64,
    pub distraction_events: u32,
    pub task_switching: u32,
}

impl ProductivityMetrics {
    pub fn new(focus_score: f64, distraction_events: u32, task_switching: u32) -> Self {
        Self {
            focus_score: clamp_unit(focus_score),
            distraction_events,
            task_switching,
        }
    }

    pub fn focus_score(&self) -> f64 {
        self.focus_score
    }
}

/// Content shared by every analysis source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisBody {
    pub summary: String,
    pub productivity_metrics: ProductivityMetrics,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub applications: Vec<String>,
}

/// The assessment of one batch, tagged by where it came from.
///
/// Created once per batch invocation and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum AnalysisResult {
    /// Structured JSON decoded from the model's answer.
    Ai(AnalysisBody),
    /// The model answered in prose only. The focus score is a text-derived
    /// estimate; `raw_text` is kept for audit.
    AiFallbackText {
        #[serde(flatten)]
        body: AnalysisBody,
        #[serde(rename = "rawText")]
        raw_text: String,
    },
    /// Computed locally from capture metadata, no inference involved.
    HeuristicFallback(AnalysisBody),
}

impl AnalysisResult {
    pub fn source(&self) -> AnalysisSource {
        match self {
            Self::Ai(_) => AnalysisSource::Ai,
            Self::AiFallbackText { .. } => AnalysisSource::AiFallbackText,
            Self::HeuristicFallback(_) => AnalysisSource::HeuristicFallback,
        }
    }

    pub fn body(&self) -> &AnalysisBody {
        match self {
            Self::Ai(body) | Self::HeuristicFallback(body) => body,
            Self::AiFallbackText { body, .. } => body,
        }
    }

    pub fn summary(&self) -> &str {
        &self.body().summary
    }

    pub fn metrics(&self) -> &ProductivityMetrics {
        &self.body().productivity_metrics
    }

    /// Only structured model output carries an authoritative score.
    pub fn focus_score_is_estimate(&self) -> bool {
        !matches!(self, Self::Ai(_))
    }

    /// Raw model text, present only for the prose fallback.
    pub fn raw_text(&self) -> Option<&str> {
        match self {
            Self::AiFallbackText { raw_text, .. } => Some(raw_text),
            _ => None,
        }
    }
}

// ═══════════════════════════════════════════
// Batch report
// ═══════════════════════════════════════════

/// One analysed batch. Append-only; `(session_id, batch_number)` identifies it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub batch_number: u32,
    pub screenshot_ids: Vec<String>,
    pub analysis: AnalysisResult,
    pub processing_status: ProcessingStatus,
    pub created_at: DateTime<Utc>,
}

impl BatchReport {
    pub fn screenshot_count(&self) -> usize {
        self.screenshot_ids.len()
    }
}

// ═══════════════════════════════════════════
// Requests / responses of the public operations
// ═══════════════════════════════════════════

/// Options for `trigger_batch_processing`. Missing fields use settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchRequest {
    #[serde(default)]
    pub batch_size: Option<u32>,
    #[serde(default)]
    pub analysis_type: Option<AnalysisType>,
}

/// What `trigger_batch_processing` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessingResult {
    pub batch_report_id: String,
    pub batch_number: u32,
    pub screenshot_count: usize,
    /// The analysis type actually used (never `auto`).
    pub analysis_type: AnalysisType,
    pub source: AnalysisSource,
    pub processing_status: ProcessingStatus,
    pub summary: String,
    pub focus_score: f64,
    /// True unless the score came from structured model output.
    pub focus_score_estimated: bool,
    pub created_at: DateTime<Utc>,
}

// ═══════════════════════════════════════════
// Session aggregation
// ═══════════════════════════════════════════

/// One line of the per-batch breakdown in a session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysisEntry {
    pub batch_number: u32,
    pub screenshot_count: usize,
    pub focus_score: f64,
    pub focus_score_estimated: bool,
    pub source: AnalysisSource,
    pub processing_status: ProcessingStatus,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

/// Aggregate over all batch reports of a session. Derived, never a source
/// of truth.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub session_id: String,
    pub total_batches: usize,
    pub total_screenshots: usize,
    pub average_productivity: f64,
    pub focus_percentage: u32,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub top_applications: Vec<String>,
    pub fallback_batches: usize,
    pub batches: Vec<BatchAnalysisEntry>,
    pub overview: String,
}

/// Numeric part of the session report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchAnalysisOverview {
    pub total_batches: usize,
    pub total_screenshots: usize,
    pub average_productivity: f64,
    pub focus_percentage: u32,
    pub top_applications: Vec<String>,
    pub batches: Vec<BatchAnalysisEntry>,
}

/// What `generate_session_summary` hands back to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummaryResponse {
    pub session_id: String,
    /// Seconds from session start to session end (or last activity).
    pub duration: i64,
    pub overview: String,
    pub batch_analysis: BatchAnalysisOverview,
    pub insights: Vec<String>,
    pub recommendations: Vec<String>,
    pub generated_at: DateTime<Utc>,
}

/// Stored session report row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionReport {
    pub id: String,
    pub session_id: String,
    pub user_id: String,
    pub summary: SessionSummaryResponse,
    pub generated_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
