// =============================================================================
// Signal extraction — numeric sentiment from argument text
// =============================================================================
//
// Two-stage extraction, applied in order:
//
//   1. Explicit markers: `Score: 0.8`, `Confidence: 75%`, `Rating: 4`,
//      `8/10`. The first match wins and is normalized into [-1, 1].
//   2. Lexicon vote: each sentence is scored against small positive and
//      negative phrase lists (strong phrases checked before moderate
//      ones), with word-level negation flipping the sign. The sum is
//      normalized by sentence count and clamped.
//
// Phrase matching is substring-based, mirroring the production scorer the
// lexicons were lifted from.
// =============================================================================

use regex::Regex;

const STRONG_POSITIVE: &[&str] = &[
    "strongly bullish",
    "very strong",
    "excellent",
    "outstanding",
    "compelling",
];
const MODERATE_POSITIVE: &[&str] = &[
    "bullish", "positive", "good", "favorable", "uptrend", "support", "buy", "growth",
];
const STRONG_NEGATIVE: &[&str] = &[
    "strongly bearish",
    "very weak",
    "terrible",
    "avoid at all costs",
    "high risk",
];
const MODERATE_NEGATIVE: &[&str] = &[
    "bearish",
    "negative",
    "weak",
    "unfavorable",
    "downtrend",
    "resistance",
    "sell",
    "decline",
];
const NEGATIONS: &[&str] = &[
    "not", "no", "hardly", "barely", "neither", "isn't", "aren't", "won't",
];

/// Extracts numeric signals from free-form argument text.
pub struct SignalExtractor {
    explicit_patterns: Vec<Regex>,
}

impl SignalExtractor {
    pub fn new() -> Self {
        let patterns = [
            r"score[:\s]+([0-9.]+)",
            r"confidence[:\s]+([0-9.]+)%?",
            r"rating[:\s]+([0-9.]+)",
            r"\b([0-9]\.?[0-9]?)/10\b",
        ];
        Self {
            explicit_patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("hard-coded signal pattern compiles"))
                .collect(),
        }
    }

    /// Score `text` into [-1, 1]. Empty input is neutral.
    pub fn extract(&self, text: &str) -> f64 {
        if text.is_empty() {
            return 0.0;
        }

        let lower = text.to_lowercase();

        // Stage 1: explicit numeric markers.
        for pattern in &self.explicit_patterns {
            if let Some(value) = pattern
                .captures(&lower)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse::<f64>().ok())
            {
                return normalize(value).clamp(-1.0, 1.0);
            }
        }

        // Stage 2: sentence-level lexicon vote with negation awareness.
        let sentences: Vec<&str> = lower.split('.').collect();
        let mut score = 0.0;

        for sentence in &sentences {
            let words: Vec<&str> = sentence.split_whitespace().collect();
            let negated = NEGATIONS.iter().any(|n| words.contains(n));

            if STRONG_POSITIVE.iter().any(|p| sentence.contains(p)) {
                score += if negated { -0.6 } else { 0.6 };
            } else if MODERATE_POSITIVE.iter().any(|p| sentence.contains(p)) {
                score += if negated { -0.3 } else { 0.3 };
            } else if STRONG_NEGATIVE.iter().any(|p| sentence.contains(p)) {
                score += if negated { 0.6 } else { -0.6 };
            } else if MODERATE_NEGATIVE.iter().any(|p| sentence.contains(p)) {
                score += if negated { 0.3 } else { -0.3 };
            }
        }

        if !sentences.is_empty() {
            score /= sentences.len() as f64;
        }

        score.clamp(-1.0, 1.0)
    }
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Scale explicit values into [-1, 1]: percentages divide by 100, ratings
/// above 100 divide by 10.
fn normalize(value: f64) -> f64 {
    if value > 1.0 {
        if value <= 100.0 {
            value / 100.0
        } else {
            value / 10.0
        }
    } else {
        value
    }
}
