//! Heuristic fallback: analysis from capture metadata alone.
//!
//! Always available. Timer-triggered captures stand for undisturbed work,
//! click-triggered captures for interaction bursts, and the number of
//! distinct applications for context switching.

use super::types::{AnalysisBody, AnalysisResult, ProductivityMetrics};
use crate::models::{CaptureTrigger, Screenshot};

/// Score used when a batch has neither timer nor click captures.
const NEUTRAL_FOCUS: f64 = 0.5;

/// Click share above which the batch is flagged as interrupt-driven.
const HIGH_CLICK_PERCENT: u32 = 30;

/// Distinct application count above which switching is called out.
const MANY_APPS: usize = 4;

/// Capture-trigger counts for one batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TriggerStats {
    pub timer: usize,
    pub click: usize,
    pub total: usize,
}

impl TriggerStats {
    pub fn from_screenshots(shots: &[Screenshot]) -> Self {
        let mut stats = Self {
            total: shots.len(),
            ..Self::default()
        };
        for shot in shots {
            match shot.capture_trigger {
                CaptureTrigger::Interval => stats.timer += 1,
                CaptureTrigger::Click => stats.click += 1,
                _ => {}
            }
        }
        stats
    }

    /// timer / (timer + click), or 0.5 when neither occurred.
    pub fn focus_score(&self) -> f64 {
        let considered = self.timer + self.click;
        if considered == 0 {
            NEUTRAL_FOCUS
        } else {
            (self.timer as f64 / considered as f64).clamp(0.0, 1.0)
        }
    }

    /// Share of all captures that were click-triggered, in whole percent.
    pub fn click_percent(&self) -> u32 {
        if self.total == 0 {
            0
        } else {
            ((self.click as f64 / self.total as f64) * 100.0).round() as u32
        }
    }
}

/// Applications by number of captures, most used first. Ties keep the
/// order in which the application first appeared.
pub fn rank_applications(shots: &[Screenshot]) -> Vec<(String, usize)> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for shot in shots {
        let app = shot.app_name();
        match counts.iter_mut().find(|(name, _)| name == app) {
            Some((_, n)) => *n += 1,
            None => counts.push((app.to_string(), 1)),
        }
    }
    // sort_by is stable, so first-seen order survives among equal counts
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
}

/// Distinct applications in first-seen order.
pub fn distinct_applications(shots: &[Screenshot]) -> Vec<String> {
    let mut apps: Vec<String> = Vec::new();
    for shot in shots {
        let app = shot.app_name();
        if !apps.iter().any(|a| a == app) {
            apps.push(app.to_string());
        }
    }
    apps
}

/// Build the heuristic analysis of a batch.
pub fn heuristic_analysis(shots: &[Screenshot]) -> AnalysisResult {
    let stats = TriggerStats::from_screenshots(shots);
    let ranked = rank_applications(shots);
    let applications = distinct_applications(shots);
    let focus = stats.focus_score();
    let click_percent = stats.click_percent();

    let metrics = ProductivityMetrics::new(
        focus,
        stats.click as u32,
        (applications.len() / 2) as u32,
    );

    let mut insights = Vec::new();
    match ranked.as_slice() {
        [] => {}
        [(top, n)] => insights.push(format!("All {n} captures were spent in {top}")),
        [(top, n1), (second, n2), ..] => insights.push(format!(
            "Most captures were in {top} ({n1}), followed by {second} ({n2})"
        )),
    }
    insights.push(format!(
        "{click_percent}% of captures were triggered by clicks"
    ));
    if applications.len() > 1 {
        insights.push(format!(
            "{} different applications were used in this batch",
            applications.len()
        ));
    }

    let mut recommendations = Vec::new();
    if click_percent > HIGH_CLICK_PERCENT {
        recommendations.push(
            "Frequent click activity suggests interruptions; try batching messages and notifications"
                .to_string(),
        );
    }
    if applications.len() > MANY_APPS {
        recommendations.push(
            "Many applications were in use; grouping related work can reduce context switching"
                .to_string(),
        );
    }
    if recommendations.is_empty() {
        recommendations.push("Keep protecting uninterrupted work blocks".to_string());
    }

    let summary = match (shots.first(), shots.last()) {
        (Some(first), Some(last)) => format!(
            "Activity-based estimate for {} screenshots between {} and {}, mostly in {}. \
             Focus is estimated from capture triggers because AI analysis was not available.",
            shots.len(),
            first.created_at.format("%H:%M"),
            last.created_at.format("%H:%M"),
            ranked.first().map(|(a, _)| a.as_str()).unwrap_or("Unknown"),
        ),
        _ => "No screenshots were available for an activity-based estimate.".to_string(),
    };

    AnalysisResult::HeuristicFallback(AnalysisBody {
        summary,
        productivity_metrics: metrics,
        insights,
        recommendations,
        applications,
    })
}
