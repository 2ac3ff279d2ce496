//! BatchAggregator: a session's batch reports folded into one summary.
//!
//! Pure: no I/O and no hidden state. Numeric fields do not depend on the
//! order of the input; insight and recommendation lists keep first
//! occurrences in input order, so they do.

use super::types::{BatchAnalysisEntry, BatchReport, SessionSummary};
use crate::models::AnalysisSource;

pub const MAX_SESSION_INSIGHTS: usize = 10;
pub const MAX_SESSION_RECOMMENDATIONS: usize = 8;
pub const MAX_TOP_APPLICATIONS: usize = 5;

/// Aggregate `reports` (expected in batch-number order).
pub fn aggregate(session_id: &str, reports: &[BatchReport]) -> SessionSummary {
    let total_screenshots = reports.iter().map(BatchReport::screenshot_count).sum();

    let scores: Vec<f64> = reports
        .iter()
        .map(|r| r.analysis.metrics().focus_score())
        .filter(|s| s.is_finite())
        .collect();
    let average_productivity = if scores.is_empty() {
        0.0
    } else {
        scores.iter().sum::<f64>() / scores.len() as f64
    };
    let focus_percentage = (average_productivity * 100.0).round().clamp(0.0, 100.0) as u32;

    let insights = dedupe_first(
        reports.iter().flat_map(|r| r.analysis.body().insights.iter()),
        MAX_SESSION_INSIGHTS,
    );
    let recommendations = dedupe_first(
        reports.iter().flat_map(|r| r.analysis.body().recommendations.iter()),
        MAX_SESSION_RECOMMENDATIONS,
    );

    let top_applications = top_applications(reports);
    let fallback_batches = reports
        .iter()
        .filter(|r| r.analysis.source() != AnalysisSource::Ai)
        .count();

    let batches = reports.iter().map(entry).collect();

    let overview = overview_text(
        reports.len(),
        total_screenshots,
        focus_percentage,
        &top_applications,
        fallback_batches,
    );

    SessionSummary {
        session_id: session_id.to_string(),
        total_batches: reports.len(),
        total_screenshots,
        average_productivity,
        focus_percentage,
        insights,
        recommendations,
        top_applications,
        fallback_batches,
        batches,
        overview,
    }
}

fn entry(report: &BatchReport) -> BatchAnalysisEntry {
    BatchAnalysisEntry {
        batch_number: report.batch_number,
        screenshot_count: report.screenshot_count(),
        focus_score: report.analysis.metrics().focus_score(),
        focus_score_estimated: report.analysis.focus_score_is_estimate(),
        source: report.analysis.source(),
        processing_status: report.processing_status,
        summary: report.analysis.summary().to_string(),
        created_at: report.created_at,
    }
}

/// First occurrence wins; comparison ignores case and surrounding space.
fn dedupe_first<'a>(items: impl Iterator<Item = &'a String>, limit: usize) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out = Vec::new();
    for item in items {
        let key = item.trim().to_lowercase();
        if key.is_empty() || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(item.trim().to_string());
        if out.len() == limit {
            break;
        }
    }
    out
}

/// Applications weighted by how many batches mention them. Ties break
/// alphabetically so the ranking is independent of report order.
fn top_applications(reports: &[BatchReport]) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for report in reports {
        let mut in_batch: Vec<&str> = Vec::new();
        for app in &report.analysis.body().applications {
            let app = app.trim();
            if app.is_empty() || in_batch.contains(&app) {
                continue;
            }
            in_batch.push(app);
            match counts.iter_mut().find(|(name, _)| name == app) {
                Some((_, n)) => *n += 1,
                None => counts.push((app.to_string(), 1)),
            }
        }
    }
    counts.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    counts
        .into_iter()
        .take(MAX_TOP_APPLICATIONS)
        .map(|(name, _)| name)
        .collect()
}

fn overview_text(
    batches: usize,
    screenshots: usize,
    focus_percentage: u32,
    top_apps: &[String],
    estimated: usize,
) -> String {
    if batches == 0 {
        return "No batches have been analysed for this session yet.".to_string();
    }

    let mut text = format!(
        "{batches} batch{} covering {screenshots} screenshot{} with an average focus of {focus_percentage}%.",
        if batches == 1 { "" } else { "es" },
        if screenshots == 1 { "" } else { "s" },
    );
    if !top_apps.is_empty() {
        let shown: Vec<&str> = top_apps.iter().take(3).map(String::as_str).collect();
        text.push_str(&format!(" Most used: {}.", shown.join(", ")));
    }
    if estimated > 0 {
        text.push_str(&format!(
            " {estimated} batch{} used fallback analysis, so the focus figure is partly estimated.",
            if estimated == 1 { "" } else { "es" }
        ));
    }
    text
}
