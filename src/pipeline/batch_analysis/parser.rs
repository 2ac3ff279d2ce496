//! ResponseParser: model text to `AnalysisResult`.
//!
//! An ordered chain of total functions:
//! `try_structured` (embedded JSON, `source = ai`) →
//! `try_text_summary` (prose, `source = ai_fallback_text`).
//! Each returns `Option`; `parse_response` never fails. The heuristic
//! scorer is not part of this chain: callers route empty responses there
//! before parsing.

use std::sync::LazyLock;

use regex::Regex;
use serde::Deserialize;

use super::score::extract_score;
use super::types::{clamp_unit, AnalysisBody, AnalysisResult, ProductivityMetrics};

/// Prose fallback keeps at most this many characters as the summary.
const SUMMARY_CHAR_LIMIT: usize = 200;

const NO_TEXT_SUMMARY: &str = "The analysis service returned no usable text for this batch.";

/// Reasoning models sometimes wrap a scratchpad in `<think>` tags; braces
/// inside it must not be mistaken for the answer.
static REASONING_BLOCK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<think>.*?</think>").unwrap());

/// Parse a model response. Total: always returns a result.
///
/// `batch_apps` fills `applications` when the model leaves it out.
pub fn parse_response(raw: &str, batch_apps: &[String]) -> AnalysisResult {
    let cleaned = strip_reasoning(raw);

    try_structured(&cleaned, batch_apps)
        .or_else(|| {
            tracing::warn!(
                response_len = raw.len(),
                "Malformed inference response, using text fallback"
            );
            try_text_summary(&cleaned, batch_apps)
        })
        .unwrap_or_else(|| empty_text_result(raw, batch_apps))
}

fn strip_reasoning(raw: &str) -> String {
    REASONING_BLOCK_RE.replace_all(raw, "").trim().to_string()
}

// ──────────────────────────────────────────────
// Tier 1: embedded JSON
// ──────────────────────────────────────────────

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAssessment {
    #[serde(alias = "overview")]
    summary: Option<String>,
    productivity_metrics: Option<RawMetrics>,
    #[serde(default)]
    insights: serde_json::Value,
    #[serde(default)]
    recommendations: serde_json::Value,
    #[serde(default)]
    applications: serde_json::Value,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMetrics {
    focus_score: Option<f64>,
    distraction_events: Option<f64>,
    task_switching: Option<f64>,
}

/// Decode the first balanced `{...}` object against the assessment schema.
pub fn try_structured(raw: &str, batch_apps: &[String]) -> Option<AnalysisResult> {
    let json = first_balanced_object(raw)?;
    let parsed: RawAssessment = match serde_json::from_str(json) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!(error = %e, "Embedded JSON did not decode");
            return None;
        }
    };

    let summary = parsed.summary.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())?;
    let metrics = parsed.productivity_metrics?;
    let focus = normalize_focus(metrics.focus_score?);

    let mut applications = string_items(&parsed.applications);
    if applications.is_empty() {
        applications = batch_apps.to_vec();
    }

    Some(AnalysisResult::Ai(AnalysisBody {
        summary,
        productivity_metrics: ProductivityMetrics::new(
            focus,
            non_negative_count(metrics.distraction_events),
            non_negative_count(metrics.task_switching),
        ),
        insights: string_items(&parsed.insights),
        recommendations: string_items(&parsed.recommendations),
        applications,
    }))
}

/// Models sometimes answer on a 0–100 scale despite the instructions.
fn normalize_focus(score: f64) -> f64 {
    if score > 1.0 {
        clamp_unit(score / 100.0)
    } else {
        clamp_unit(score)
    }
}

fn non_negative_count(value: Option<f64>) -> u32 {
    match value {
        Some(v) if v.is_finite() && v > 0.0 => v.round().min(u32::MAX as f64) as u32,
        _ => 0,
    }
}

/// Keep non-empty string entries; skip anything else. A bare string counts
/// as a one-item list.
fn string_items(value: &serde_json::Value) -> Vec<String> {
    let values: &[serde_json::Value] = match value {
        serde_json::Value::Array(items) => items.as_slice(),
        single @ serde_json::Value::String(_) => std::slice::from_ref(single),
        _ => &[],
    };
    values
        .iter()
        .filter_map(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// The first `{` that has a matching `}`, honouring JSON string literals.
fn first_balanced_object(text: &str) -> Option<&str> {
    text.match_indices('{')
        .find_map(|(start, _)| balanced_end(&text[start..]).map(|end| &text[start..start + end]))
}

/// Byte length of the balanced object at the start of `text`.
fn balanced_end(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match c {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.checked_sub(1)?;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
    }
    None
}

// ──────────────────────────────────────────────
// Tier 2: prose
// ──────────────────────────────────────────────

/// Best-effort result from unstructured text. `None` only for blank input.
pub fn try_text_summary(raw: &str, batch_apps: &[String]) -> Option<AnalysisResult> {
    let text = raw.trim();
    if text.is_empty() {
        return None;
    }

    let summary = summary_line(text).unwrap_or_else(|| text.chars().take(SUMMARY_CHAR_LIMIT).collect());
    let focus = extract_score(text) / 100.0;

    Some(AnalysisResult::AiFallbackText {
        body: AnalysisBody {
            summary,
            productivity_metrics: ProductivityMetrics::new(focus, 0, 0),
            insights: Vec::new(),
            recommendations: Vec::new(),
            applications: batch_apps.to_vec(),
        },
        raw_text: raw.to_string(),
    })
}

/// First line mentioning "summary" or "overview". A bare heading such as
/// `## Summary` yields the next non-empty line instead.
fn summary_line(text: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let idx = lines.iter().position(|line| {
        let lower = line.to_lowercase();
        lower.contains("summary") || lower.contains("overview")
    })?;

    let line = clean_line(lines[idx]);
    let without_label = line
        .trim_start_matches(|c: char| c.is_alphabetic() || c == ' ')
        .trim_start_matches(':')
        .trim();
    let is_bare_heading = without_label.is_empty() && line.split_whitespace().count() <= 2;

    if !is_bare_heading {
        return Some(line);
    }

    lines[idx + 1..]
        .iter()
        .map(|l| clean_line(l))
        .find(|l| !l.is_empty())
        .or(Some(line))
}

/// Strip Markdown heading, bullet and emphasis markers.
fn clean_line(line: &str) -> String {
    line.trim()
        .trim_start_matches(['#', '*', '-', '>', ' '])
        .trim_end_matches('*')
        .replace("**", "")
        .trim()
        .to_string()
}

fn empty_text_result(raw: &str, batch_apps: &[String]) -> AnalysisResult {
    AnalysisResult::AiFallbackText {
        body: AnalysisBody {
            summary: NO_TEXT_SUMMARY.to_string(),
            productivity_metrics: ProductivityMetrics::new(extract_score("") / 100.0, 0, 0),
            insights: Vec::new(),
            recommendations: Vec::new(),
            applications: batch_apps.to_vec(),
        },
        raw_text: raw.to_string(),
    }
}
