//! Prompts for batch analysis.
//!
//! Both prompts ask for a short narrative followed by one JSON object in a
//! fixed shape; `parser::try_structured` reads that object back.

use chrono::{DateTime, Utc};

use crate::models::Screenshot;

pub const BATCH_ANALYSIS_SYSTEM_PROMPT: &str = r#"
You are a work-session analyst. You look at what a person did during a
stretch of computer work and describe it plainly.

RULES:
1. Describe only activity that is visible or stated in the input.
2. Do not guess at private content (messages, passwords, personal data).
3. focusScore is a number between 0 and 1, where 1 is fully focused work.
4. Keep the summary to two or three sentences.
"#;

/// The JSON shape every analysis prompt asks for.
const RESPONSE_SCHEMA: &str = r#"```json
{
  "summary": "Two or three sentences describing the work",
  "productivityMetrics": {
    "focusScore": 0.0,
    "distractionEvents": 0,
    "taskSwitching": 0
  },
  "insights": ["Observation about how the time was spent"],
  "recommendations": ["Concrete suggestion for the next work block"],
  "applications": ["Application name"]
}
```"#;

/// Longest prior description carried into the aggregate digest, in chars.
const DIGEST_LINE_LIMIT: usize = 160;

/// Prompt accompanying the images of a vision batch. Image `i` in the
/// request corresponds to line `i + 1` of the capture list.
pub fn build_vision_prompt(shots: &[&Screenshot]) -> String {
    let mut lines = Vec::with_capacity(shots.len());
    let mut previous: Option<DateTime<Utc>> = None;

    for (i, shot) in shots.iter().enumerate() {
        let elapsed = match previous {
            None => "start of batch".to_string(),
            Some(prev) => format!("+{} since previous", format_elapsed(shot.created_at - prev)),
        };
        lines.push(format!(
            "{}. {} ({}) app: {}",
            i + 1,
            shot.created_at.format("%H:%M:%S"),
            elapsed,
            shot.app_name()
        ));
        previous = Some(shot.created_at);
    }

    format!(
        r#"{BATCH_ANALYSIS_SYSTEM_PROMPT}
The {count} attached screenshots were captured in this order:
{captures}

First write a short narrative of the work shown across the screenshots.
Then output a single JSON object wrapped in ```json``` fences with this exact structure:

{RESPONSE_SCHEMA}"#,
        count = shots.len(),
        captures = lines.join("\n"),
    )
}

/// Text-only prompt built from descriptions already attached to the
/// screenshots.
pub fn build_aggregate_prompt(shots: &[Screenshot]) -> String {
    let digest = shots
        .iter()
        .map(|shot| {
            let description = shot
                .prior_analysis
                .as_deref()
                .map(one_line)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| "(no description)".to_string());
            format!(
                "- {} | {} | {}",
                shot.created_at.format("%H:%M:%S"),
                shot.app_name(),
                description
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"{BATCH_ANALYSIS_SYSTEM_PROMPT}
Below are descriptions of {count} screenshots from one work session, oldest first
(time | application | description):

<captures>
{digest}
</captures>

First write a short narrative of the work described.
Then output a single JSON object wrapped in ```json``` fences with this exact structure:

{RESPONSE_SCHEMA}"#,
        count = shots.len(),
    )
}

fn format_elapsed(delta: chrono::Duration) -> String {
    let secs = delta.num_seconds().max(0);
    if secs < 60 {
        format!("{secs}s")
    } else if secs < 3600 {
        format!("{}m{:02}s", secs / 60, secs % 60)
    } else {
        format!("{}h{:02}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// Collapse whitespace and cut to `DIGEST_LINE_LIMIT` chars.
fn one_line(text: &str) -> String {
    let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if collapsed.chars().count() <= DIGEST_LINE_LIMIT {
        collapsed
    } else {
        let mut cut: String = collapsed.chars().take(DIGEST_LINE_LIMIT).collect();
        cut.push('…');
        cut
    }
}
