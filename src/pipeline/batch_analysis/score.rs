//! ScoreExtractor: last-resort productivity score from free text.
//!
//! The result is an approximation read out of prose, not a measurement.
//! Anything that displays it must label it as an estimate
//! (`focus_score_estimated` on the public results).

use std::sync::LazyLock;

use regex::Regex;

/// Ordered patterns; the first one that matches wins.
static SCORE_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    vec![
        // "Productivity: 73", "productivity score of 81.5"
        Regex::new(r"(?i)productivity\D{0,40}?(\d+(?:\.\d+)?)").unwrap(),
        // "score: 64", "Score was 7"
        Regex::new(r"(?i)score\D{0,40}?(\d+(?:\.\d+)?)").unwrap(),
        // "about 70%"; whole numbers only, never the tail of a longer one
        Regex::new(r"\b(\d+(?:\.\d+)?)\s*%").unwrap(),
    ]
});

/// Keyword buckets, checked in order against lowercased text.
const SENTIMENT_BUCKETS: &[(&[&str], f64)] = &[
    (&["highly productive", "excellent"], 85.0),
    (&["productive", "focused"], 75.0),
    (&["moderately", "some progress"], 65.0),
];

/// Score when neither a number nor a keyword is found.
const NEUTRAL_SCORE: f64 = 50.0;

/// Recover an approximate 0–100 productivity score from text.
pub fn extract_score(text: &str) -> f64 {
    if let Some(score) = numeric_score(text) {
        return score;
    }
    sentiment_score(text)
}

fn numeric_score(text: &str) -> Option<f64> {
    SCORE_PATTERNS.iter().find_map(|pattern| {
        pattern
            .captures(text)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse::<f64>().ok())
            .map(|n| n.clamp(0.0, 100.0))
    })
}

fn sentiment_score(text: &str) -> f64 {
    let lower = text.to_lowercase();
    SENTIMENT_BUCKETS
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(_, score)| *score)
        .unwrap_or(NEUTRAL_SCORE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn productivity_percentage() {
        assert_eq!(extract_score("Productivity: 73%"), 73.0);
    }

    #[test]
    fn highly_productive_keyword() {
        assert_eq!(extract_score("Great job, highly productive session"), 85.0);
    }

    #[test]
    fn oversized_percentage_clamps_instead_of_truncating() {
        assert_eq!(extract_score("Output rose 1000% this week"), 100.0);
        assert_eq!(extract_score("Productivity rating 1250"), 100.0);
    }

    #[test]
    fn empty_text_is_neutral() {
        assert_eq!(extract_score(""), 50.0);
    }

    #[test]
    fn productivity_pattern_beats_later_percentages() {
        assert_eq!(
            extract_score("About 20% of time in chat. Overall productivity was 68 out of 100."),
            68.0
        );
    }

    #[test]
    fn score_pattern_used_when_no_productivity_number() {
        assert_eq!(extract_score("Focus score: 91 for this block"), 91.0);
    }

    #[test]
    fn bare_percentage_is_last_numeric_resort() {
        assert_eq!(extract_score("Roughly 42.5 % of the window was coding"), 42.5);
    }

    #[test]
    fn numbers_are_clamped() {
        assert_eq!(extract_score("Productivity: 250"), 100.0);
    }

    #[test]
    fn keyword_buckets_in_order() {
        assert_eq!(extract_score("An EXCELLENT stretch of work"), 85.0);
        assert_eq!(extract_score("The user stayed focused on the editor"), 75.0);
        assert_eq!(extract_score("Made some progress on the docs"), 65.0);
        assert_eq!(extract_score("Browsed a few pages"), 50.0);
    }
}
