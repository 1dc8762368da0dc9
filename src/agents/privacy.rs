// =============================================================================
// Privacy Agent — PII, collusion, and insider-signal screening
// =============================================================================
//
// Scans the full agent transcript of a tick before the optimizer runs.
// The PII table is compiled regex patterns; the collusion and insider
// tables are literal keyword lists. All three are data — extending policy
// means extending the tables, not the code.
// =============================================================================

use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::types::Message;

/// `(label, pattern)` pairs compiled at construction.
const PII_PATTERNS: &[(&str, &str)] = &[
    ("email", r"\b[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}\b"),
    ("phone", r"\b\d{3}[-.]?\d{3}[-.]?\d{4}\b"),
    ("ssn", r"\b\d{3}-\d{2}-\d{4}\b"),
    ("credit_card", r"\b\d{4}[-\s]?\d{4}[-\s]?\d{4}[-\s]?\d{4}\b"),
    ("api_key", r"\b[A-Za-z0-9]{32,}\b"),
    ("private_key", r"\b0x[a-fA-F0-9]{64}\b"),
];

const COLLUSION_KEYWORDS: &[&str] = &[
    "coordinate",
    "pump together",
    "dump together",
    "insider",
    "confidential",
    "secret signal",
];

const INSIDER_KEYWORDS: &[&str] = &[
    "insider information",
    "confidential news",
    "unreleased",
    "before announcement",
    "early access",
];

/// Privacy verdict for one tick's transcript.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivacyCheck {
    pub approved: bool,
    pub reason: String,
    pub pii_found: bool,
    pub collusion: bool,
    pub insider: bool,
    pub summary: String,
}

/// Scans agent transcripts for policy violations.
pub struct PrivacyAgent {
    pii: Vec<(&'static str, Regex)>,
}

impl PrivacyAgent {
    pub fn new() -> Self {
        let pii = PII_PATTERNS
            .iter()
            .map(|(label, pattern)| {
                (
                    *label,
                    Regex::new(pattern).expect("hard-coded PII pattern compiles"),
                )
            })
            .collect();
        Self { pii }
    }

    /// Check the transcript of one tick.
    pub fn check(&self, messages: &[Message], symbol: &str) -> PrivacyCheck {
        let pii_found = self.detect_pii(messages);
        let collusion = detect_keywords(messages, COLLUSION_KEYWORDS, "collusion");
        let insider = detect_keywords(messages, INSIDER_KEYWORDS, "insider");

        let approved = !(pii_found || collusion || insider);

        let mut issues = Vec::new();
        if pii_found {
            issues.push("PII detected");
        }
        if collusion {
            issues.push("collusion pattern detected");
        }
        if insider {
            issues.push("insider trading signals");
        }

        let reason = if approved {
            "Privacy check passed".to_string()
        } else {
            format!("Issues: {}", issues.join(", "))
        };

        debug!(symbol, approved, ?issues, "privacy check complete");

        let summary = if issues.is_empty() {
            "Privacy check: APPROVED. No privacy or compliance issues detected.".to_string()
        } else {
            format!("Privacy check: REJECTED. Issues found: {}.", issues.join("; "))
        };

        PrivacyCheck {
            approved,
            reason,
            pii_found,
            collusion,
            insider,
            summary,
        }
    }

    fn detect_pii(&self, messages: &[Message]) -> bool {
        for message in messages {
            for (label, pattern) in &self.pii {
                if pattern.is_match(&message.content) {
                    warn!(pii_type = *label, role = %message.role, "PII detected in transcript");
                    return true;
                }
            }
        }
        false
    }
}

impl Default for PrivacyAgent {
    fn default() -> Self {
        Self::new()
    }
}

fn detect_keywords(messages: &[Message], keywords: &[&str], what: &str) -> bool {
    for message in messages {
        let content = message.content.to_lowercase();
        if let Some(hit) = keywords.iter().find(|kw| content.contains(**kw)) {
            warn!(keyword = *hit, role = %message.role, "{what} pattern detected in transcript");
            return true;
        }
    }
    false
}
