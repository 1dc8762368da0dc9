// =============================================================================
// Research Validator — quality gate on the research artifact
// =============================================================================
//
// Scores research coverage and freshness before the debate starts. The
// score is the fraction of passed checks: one presence check per required
// data source, a freshness check on the artifact timestamp, and a
// summary-present check. `passed` means score >= validation_threshold;
// `gaps` names the required sources that are missing, which the
// orchestrator uses to decide whether a re-research pass is worth it.
//
// Never mutates research artifacts.
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::ValidationConfig;

/// Validator output for one research pass.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ValidationOutcome {
    /// Fraction of passed checks in [0, 1].
    pub score: f64,
    pub passed: bool,
    /// Required sources that are absent from the artifact.
    pub gaps: Vec<String>,
    /// Per-check results.
    pub checks: HashMap<String, bool>,
    pub summary: String,
}

/// Validates research artifacts against coverage and freshness rules.
pub struct ResearchValidator {
    threshold: f64,
    freshness: Duration,
    required_sources: Vec<String>,
}

impl ResearchValidator {
    pub fn new(config: &ValidationConfig) -> Self {
        Self {
            threshold: config.validation_threshold,
            freshness: Duration::seconds(config.data_freshness_seconds as i64),
            required_sources: config.required_data_sources.clone(),
        }
    }

    /// Current validator configuration, for status surfaces.
    pub fn config(&self) -> ValidationConfig {
        ValidationConfig {
            validation_threshold: self.threshold,
            data_freshness_seconds: self.freshness.num_seconds().max(0) as u64,
            required_data_sources: self.required_sources.clone(),
        }
    }

    /// Validate one research artifact at wall-clock time `now`.
    pub fn validate(
        &self,
        research_data: &Value,
        research_summary: Option<&str>,
        now: DateTime<Utc>,
    ) -> ValidationOutcome {
        let mut checks = HashMap::new();
        let mut gaps = Vec::new();

        for source in &self.required_sources {
            let present = source_present(research_data, source);
            checks.insert(format!("has_{source}"), present);
            if !present {
                gaps.push(source.clone());
            }
        }

        checks.insert("fresh".to_string(), self.is_fresh(research_data, now));
        checks.insert(
            "summary_present".to_string(),
            research_summary.map_or(false, |s| !s.trim().is_empty()),
        );

        let passed_count = checks.values().filter(|&&ok| ok).count();
        let score = passed_count as f64 / checks.len() as f64;
        let passed = score >= self.threshold;

        debug!(
            score,
            passed,
            gaps = gaps.len(),
            "research validation complete"
        );

        let summary = format!(
            "Research validation: score {score:.2} (threshold {:.2}) — {}; gaps: {}",
            self.threshold,
            if passed { "passed" } else { "failed" },
            if gaps.is_empty() {
                "none".to_string()
            } else {
                gaps.join(", ")
            }
        );

        ValidationOutcome {
            score,
            passed,
            gaps,
            checks,
            summary,
        }
    }

    fn is_fresh(&self, research_data: &Value, now: DateTime<Utc>) -> bool {
        let Some(ts) = research_data
            .get("timestamp")
            .and_then(Value::as_str)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        else {
            return false;
        };
        now - ts.with_timezone(&Utc) <= self.freshness
    }
}

/// A source counts as present when its key exists and holds something
/// other than null or an empty container.
fn source_present(research_data: &Value, source: &str) -> bool {
    match research_data.get(source) {
        None | Some(Value::Null) => false,
        Some(Value::Object(map)) => !map.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn validator() -> ResearchValidator {
        ResearchValidator::new(&ValidationConfig::default())
    }

    fn full_artifact(now: DateTime<Utc>) -> Value {
        json!({
            "news": { "score": 0.4 },
            "social": { "score": 0.1 },
            "onchain": { "whale_activity": "neutral" },
            "technical": { "summary": "rsi neutral" },
            "timestamp": now.to_rfc3339(),
        })
    }

    #[test]
    fn complete_fresh_artifact_passes() {
        let now = Utc::now();
        let outcome = validator().validate(&full_artifact(now), Some("all good"), now);
        assert_eq!(outcome.score, 1.0);
        assert!(outcome.passed);
        assert!(outcome.gaps.is_empty());
        assert!(outcome.checks["has_news"]);
        assert!(outcome.checks["fresh"]);
    }

    #[test]
    fn missing_sources_become_gaps() {
        let now = Utc::now();
        let artifact = json!({
            "onchain": { "whale_activity": "neutral" },
            "technical": { "summary": "x" },
            "timestamp": now.to_rfc3339(),
        });
        let outcome = validator().validate(&artifact, Some("summary"), now);

        assert_eq!(outcome.gaps, vec!["news".to_string(), "social".to_string()]);
        // 4 of 6 checks pass: 0.67 < 0.7.
        assert!(!outcome.passed);
        assert!((outcome.score - 4.0 / 6.0).abs() < 1e-10);
    }

    #[test]
    fn empty_containers_do_not_count_as_present() {
        let now = Utc::now();
        let artifact = json!({
            "news": {},
            "social": [],
            "onchain": { "whale_activity": "neutral" },
            "technical": { "summary": "x" },
            "timestamp": now.to_rfc3339(),
        });
        let outcome = validator().validate(&artifact, Some("summary"), now);
        assert!(outcome.gaps.contains(&"news".to_string()));
        assert!(outcome.gaps.contains(&"social".to_string()));
    }

    #[test]
    fn stale_artifact_fails_freshness() {
        let now = Utc::now();
        let old = now - Duration::seconds(600);
        let mut artifact = full_artifact(old);
        artifact["timestamp"] = json!(old.to_rfc3339());

        let outcome = validator().validate(&artifact, Some("summary"), now);
        assert!(!outcome.checks["fresh"]);
        // 5 of 6 checks pass: still above the 0.7 threshold.
        assert!(outcome.passed);
    }

    #[test]
    fn missing_timestamp_fails_freshness() {
        let now = Utc::now();
        let artifact = json!({
            "news": { "score": 0.0 },
            "social": { "score": 0.0 },
            "onchain": {},
            "technical": {},
        });
        let outcome = validator().validate(&artifact, None, now);
        assert!(!outcome.checks["fresh"]);
        assert!(!outcome.checks["summary_present"]);
        assert!(!outcome.passed);
    }

    #[test]
    fn score_is_always_in_unit_interval() {
        let now = Utc::now();
        for artifact in [json!({}), json!(null), full_artifact(now)] {
            let outcome = validator().validate(&artifact, None, now);
            assert!((0.0..=1.0).contains(&outcome.score));
        }
    }

    #[test]
    fn summary_names_the_gaps() {
        let now = Utc::now();
        let outcome = validator().validate(&json!({}), None, now);
        assert!(outcome.summary.contains("failed"));
        assert!(outcome.summary.contains("news"));
        assert!(outcome.summary.contains("technical"));
    }
}
