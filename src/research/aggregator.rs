// =============================================================================
// Research Aggregator — reduces partial task results to one artifact
// =============================================================================
//
// Sentiment reduction is a weighted sum over the fixed source order
// (news 0.4, social 0.3, on-chain 0.3), clamped to [-1, 1]. A missing
// source contributes nothing and its weight is redistributed uniformly to
// the sources that are present, so three healthy sources and one healthy
// source both produce full-scale sentiment. The on-chain signal maps whale
// activity: bullish +0.5, neutral 0, bearish -0.5.
//
// The summary consults the language model adapter when one is attached and
// falls back to a deterministic template otherwise.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::adapters::LanguageModelAdapter;

/// The single research artifact a decision tick consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchArtifact {
    pub summary: String,
    /// Aggregate sentiment in [-1, 1].
    pub sentiment: f64,
    pub news: Value,
    pub social: Value,
    pub onchain: Value,
    pub macro_factors: Value,
    pub timestamp: DateTime<Utc>,
}

/// Reduces executed-plan results into a `ResearchArtifact`.
pub struct ResearchAggregator {
    llm: Option<Arc<dyn LanguageModelAdapter>>,
}

impl ResearchAggregator {
    pub fn new(llm: Option<Arc<dyn LanguageModelAdapter>>) -> Self {
        Self { llm }
    }

    /// Reduce completed task results (keyed by task id) into one artifact.
    pub async fn reduce(&self, symbol: &str, results: &HashMap<String, Value>) -> ResearchArtifact {
        let news = results
            .get("task_sentiment")
            .and_then(|v| v.get("news"))
            .cloned()
            .unwrap_or(Value::Null);
        let social = results
            .get("task_sentiment")
            .and_then(|v| v.get("social"))
            .cloned()
            .unwrap_or(Value::Null);
        let onchain = results.get("task_onchain").cloned().unwrap_or(Value::Null);
        let macro_factors = results.get("task_macro").cloned().unwrap_or(Value::Null);

        let news_score = news.get("score").and_then(Value::as_f64);
        let social_score = social.get("score").and_then(Value::as_f64);
        let onchain_score = onchain_signal(&onchain);

        let sentiment = weighted_sentiment(news_score, social_score, onchain_score);

        debug!(
            symbol,
            sentiment,
            news = ?news_score,
            social = ?social_score,
            onchain = ?onchain_score,
            "research results reduced"
        );

        let summary = self
            .narrate(symbol, &news, &social, &onchain, &macro_factors, sentiment)
            .await;

        ResearchArtifact {
            summary,
            sentiment,
            news,
            social,
            onchain,
            macro_factors,
            timestamp: Utc::now(),
        }
    }

    async fn narrate(
        &self,
        symbol: &str,
        news: &Value,
        social: &Value,
        onchain: &Value,
        macro_factors: &Value,
        sentiment: f64,
    ) -> String {
        let whale = onchain
            .get("whale_activity")
            .and_then(Value::as_str)
            .unwrap_or("neutral");
        let fed = macro_factors
            .get("fed_policy")
            .and_then(Value::as_str)
            .unwrap_or("neutral");
        let news_score = news.get("score").and_then(Value::as_f64).unwrap_or(0.0);
        let social_score = social.get("score").and_then(Value::as_f64).unwrap_or(0.0);

        if let Some(llm) = &self.llm {
            let prompt = format!(
                "Summarize the market intelligence for {symbol}:\n\
                 News sentiment: {news_score:.2}\n\
                 Social sentiment: {social_score:.2}\n\
                 On-chain activity: {whale}\n\
                 Macro environment: {fed}\n\
                 Aggregate sentiment: {sentiment:.2}\n\n\
                 Provide a 2-3 sentence summary of the key findings."
            );
            match llm.generate("You are a market research analyst", &prompt).await {
                Ok(text) => return text,
                Err(e) => warn!(error = %e, "language model summary failed, using template"),
            }
        }

        let trending = social
            .get("trending")
            .and_then(Value::as_bool)
            .unwrap_or(false);

        format!(
            "{symbol} market research: overall sentiment {} ({sentiment:.2}). \
             News sentiment {news_score:.2}, social buzz {}, on-chain activity {whale}, \
             macro environment {fed}.",
            sentiment_label(sentiment),
            if trending { "high" } else { "normal" },
        )
    }
}

/// Weighted sentiment with uniform redistribution of missing-source weight.
pub(crate) fn weighted_sentiment(
    news: Option<f64>,
    social: Option<f64>,
    onchain: Option<f64>,
) -> f64 {
    // Fixed source order keeps the reduction deterministic regardless of
    // task completion order.
    let sources: [(Option<f64>, f64); 3] = [(news, 0.4), (social, 0.3), (onchain, 0.3)];

    let present: Vec<(f64, f64)> = sources
        .iter()
        .filter_map(|(score, weight)| score.map(|s| (s, *weight)))
        .collect();

    if present.is_empty() {
        return 0.0;
    }

    let missing_weight: f64 = 1.0 - present.iter().map(|(_, w)| w).sum::<f64>();
    let bonus = missing_weight / present.len() as f64;

    let sentiment: f64 = present.iter().map(|(s, w)| s * (w + bonus)).sum();
    sentiment.clamp(-1.0, 1.0)
}

/// Map whale activity to a sentiment contribution. Absent or unknown
/// activity means the on-chain source is missing.
fn onchain_signal(onchain: &Value) -> Option<f64> {
    match onchain.get("whale_activity").and_then(Value::as_str) {
        Some("bullish") => Some(0.5),
        Some("bearish") => Some(-0.5),
        Some(_) => Some(0.0),
        None => None,
    }
}

fn sentiment_label(sentiment: f64) -> &'static str {
    if sentiment > 0.2 {
        "BULLISH"
    } else if sentiment < -0.2 {
        "BEARISH"
    } else {
        "NEUTRAL"
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn full_weights_when_all_sources_present() {
        let s = weighted_sentiment(Some(1.0), Some(1.0), Some(0.5));
        // 1.0*0.4 + 1.0*0.3 + 0.5*0.3
        assert!((s - 0.85).abs() < 1e-10);
    }

    #[test]
    fn missing_weight_redistributes_uniformly() {
        // Only news present: it carries the full weight.
        let s = weighted_sentiment(Some(0.8), None, None);
        assert!((s - 0.8).abs() < 1e-10);

        // News + on-chain present: each gains half of social's 0.3.
        let s = weighted_sentiment(Some(1.0), None, Some(0.0));
        assert!((s - (1.0 * 0.55)).abs() < 1e-10);
    }

    #[test]
    fn no_sources_is_neutral() {
        assert_eq!(weighted_sentiment(None, None, None), 0.0);
    }

    #[test]
    fn result_is_clamped() {
        let s = weighted_sentiment(Some(5.0), Some(5.0), Some(5.0));
        assert_eq!(s, 1.0);
        let s = weighted_sentiment(Some(-5.0), None, None);
        assert_eq!(s, -1.0);
    }

    #[test]
    fn whale_activity_mapping() {
        assert_eq!(onchain_signal(&json!({ "whale_activity": "bullish" })), Some(0.5));
        assert_eq!(onchain_signal(&json!({ "whale_activity": "bearish" })), Some(-0.5));
        assert_eq!(onchain_signal(&json!({ "whale_activity": "neutral" })), Some(0.0));
        assert_eq!(onchain_signal(&json!({})), None);
    }

    #[tokio::test]
    async fn reduce_composes_artifact_from_results() {
        let mut results = HashMap::new();
        results.insert(
            "task_sentiment".to_string(),
            json!({
                "news": { "score": 0.6, "articles": 4 },
                "social": { "score": 0.3, "trending": true, "volume": 1200 },
            }),
        );
        results.insert(
            "task_onchain".to_string(),
            json!({ "whale_activity": "bullish" }),
        );
        results.insert("task_macro".to_string(), json!({ "fed_policy": "dovish" }));

        let aggregator = ResearchAggregator::new(None);
        let artifact = aggregator.reduce("BTC/USDT", &results).await;

        // 0.6*0.4 + 0.3*0.3 + 0.5*0.3 = 0.48
        assert!((artifact.sentiment - 0.48).abs() < 1e-10);
        assert!(artifact.summary.contains("BULLISH"));
        assert!(artifact.summary.contains("bullish"));
        assert!(artifact.summary.contains("dovish"));
        assert_eq!(artifact.news["articles"], 4);
    }

    #[tokio::test]
    async fn reduce_with_no_results_is_neutral() {
        let aggregator = ResearchAggregator::new(None);
        let artifact = aggregator.reduce("BTC/USDT", &HashMap::new()).await;
        assert_eq!(artifact.sentiment, 0.0);
        assert!(artifact.summary.contains("NEUTRAL"));
        assert!(artifact.news.is_null());
    }

    #[tokio::test]
    async fn sentiment_always_in_bounds() {
        // Property-style sweep over extreme inputs.
        for news in [-10.0, -1.0, 0.0, 1.0, 10.0] {
            for social in [-10.0, 0.0, 10.0] {
                let s = weighted_sentiment(Some(news), Some(social), Some(0.5));
                assert!((-1.0..=1.0).contains(&s), "sentiment {s} out of range");
            }
        }
    }
}
