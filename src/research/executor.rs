// =============================================================================
// Research Executor — concurrent batch execution against gated sources
// =============================================================================
//
// Batches run sequentially; tasks within a batch run concurrently, each
// under its own timeout (capped by whatever remains of the tick's research
// budget). Failure semantics:
//
//   - adapter error / timeout      => task FAILED, partial result discarded
//   - failed or skipped dependency => dependents SKIPPED, naming the dep
//   - research budget exhausted    => everything still pending SKIPPED
//
// A task failure never fails the batch, and nothing here ever escapes to
// the caller — the worst case is a plan full of terminal tasks and an
// empty result map.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use serde_json::{json, Value};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::adapters::{MacroAdapter, OnChainAdapter, SocialAdapter};
use crate::agents::analyzer::{compute_indicators, technical_sentiment};
use crate::config::PlannerConfig;
use crate::patterns::detect_patterns;
use crate::research::planner::ResearchPlan;
use crate::research::task::{TaskKind, TaskStatus};
use crate::temporal::gateway::TemporalGateway;

/// Words ignored by the keyword extraction probe.
const KEYWORD_STOPWORDS: &[&str] = &[
    "this", "that", "with", "from", "have", "will", "been", "were", "their", "about", "after",
    "more", "than", "says", "over", "into", "amid", "could", "would",
];

/// Outcome of executing a plan.
#[derive(Debug, Clone, Default)]
pub struct ExecutionSummary {
    /// Ids of tasks that completed, in plan order.
    pub completed_task_ids: Vec<String>,
    /// Results of completed tasks, keyed by task id.
    pub results: HashMap<String, Value>,
    pub failed: usize,
    pub skipped: usize,
}

/// Executes research plans through the temporal gateway and the auxiliary
/// source adapters.
pub struct ResearchExecutor {
    gateway: Arc<TemporalGateway>,
    social: Option<Arc<dyn SocialAdapter>>,
    onchain: Option<Arc<dyn OnChainAdapter>>,
    macro_adapter: Option<Arc<dyn MacroAdapter>>,
    config: PlannerConfig,
}

impl ResearchExecutor {
    pub fn new(gateway: Arc<TemporalGateway>, config: PlannerConfig) -> Self {
        Self {
            gateway,
            social: None,
            onchain: None,
            macro_adapter: None,
            config,
        }
    }

    pub fn with_social_adapter(mut self, adapter: Arc<dyn SocialAdapter>) -> Self {
        self.social = Some(adapter);
        self
    }

    pub fn with_onchain_adapter(mut self, adapter: Arc<dyn OnChainAdapter>) -> Self {
        self.onchain = Some(adapter);
        self
    }

    pub fn with_macro_adapter(mut self, adapter: Arc<dyn MacroAdapter>) -> Self {
        self.macro_adapter = Some(adapter);
        self
    }

    /// Execute every batch of `plan`, mutating task states in place.
    pub async fn execute(&self, plan: &mut ResearchPlan) -> ExecutionSummary {
        let symbol = plan.symbol.clone();
        let started = Instant::now();
        let budget = Duration::from_secs(self.config.max_research_time_seconds);
        let batches = plan.batches.clone();

        for batch in &batches {
            if started.elapsed() >= budget {
                break;
            }

            // Decide what actually runs: dependents of failed/skipped tasks
            // are skipped up front.
            let mut runnable: Vec<(String, TaskKind, u64)> = Vec::new();
            for task_id in batch {
                let dep_blocked = plan.task(task_id).and_then(|task| {
                    task.dependencies
                        .iter()
                        .find(|dep| {
                            plan.task(dep.as_str()).map_or(true, |d| {
                                matches!(d.status, TaskStatus::Failed | TaskStatus::Skipped)
                            })
                        })
                        .cloned()
                });

                let Some(task) = plan.task_mut(task_id) else {
                    continue;
                };

                if let Some(dep) = dep_blocked {
                    task.mark_skipped(format!("dependency {dep} did not complete"));
                    continue;
                }

                task.mark_started();
                runnable.push((task_id.clone(), task.kind, task.timeout_seconds));
            }

            if runnable.is_empty() {
                continue;
            }

            // Run the batch concurrently; each task's timeout is capped by
            // the remaining research budget.
            let remaining = budget.saturating_sub(started.elapsed());
            let futures = runnable.iter().map(|(_, kind, timeout_secs)| {
                let effective = Duration::from_secs(*timeout_secs).min(remaining);
                timeout(effective, self.probe(*kind, &symbol))
            });
            let outcomes = join_all(futures).await;

            for ((task_id, _, timeout_secs), outcome) in runnable.iter().zip(outcomes) {
                let budget_exhausted = started.elapsed() >= budget;
                let Some(task) = plan.task_mut(task_id) else {
                    continue;
                };

                match outcome {
                    Ok(Ok(value)) => {
                        debug!(task = %task_id, "research task completed");
                        task.mark_completed(value);
                    }
                    Ok(Err(e)) => {
                        warn!(task = %task_id, error = %e, "research task failed");
                        task.mark_failed(format!("{e}"));
                    }
                    Err(_) if budget_exhausted => {
                        task.mark_skipped("cancelled: research time budget exceeded");
                    }
                    Err(_) => {
                        warn!(task = %task_id, timeout_secs = *timeout_secs, "research task timed out");
                        task.mark_failed(format!("timed out after {timeout_secs}s"));
                    }
                }
            }
        }

        // Anything still pending ran out of budget.
        for task in plan.tasks.iter_mut() {
            if !task.status.is_terminal() {
                task.mark_skipped("research time budget exceeded");
            }
        }

        let mut summary = ExecutionSummary::default();
        for task in &plan.tasks {
            match task.status {
                TaskStatus::Completed => {
                    summary.completed_task_ids.push(task.task_id.clone());
                    if let Some(result) = &task.result {
                        summary.results.insert(task.task_id.clone(), result.clone());
                    }
                }
                TaskStatus::Failed => summary.failed += 1,
                TaskStatus::Skipped => summary.skipped += 1,
                _ => {}
            }
        }

        info!(
            symbol = %symbol,
            completed = summary.completed_task_ids.len(),
            failed = summary.failed,
            skipped = summary.skipped,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "research plan executed"
        );

        summary
    }

    // -------------------------------------------------------------------------
    // Probes
    // -------------------------------------------------------------------------

    async fn probe(&self, kind: TaskKind, symbol: &str) -> anyhow::Result<Value> {
        match kind {
            TaskKind::Sentiment => self.probe_sentiment(symbol).await,
            TaskKind::OnChain => self.probe_onchain(symbol).await,
            TaskKind::Technical => self.probe_technical(symbol).await,
            TaskKind::Macro => self.probe_macro().await,
            TaskKind::Liquidity => self.probe_liquidity(symbol).await,
            TaskKind::Correlation => self.probe_correlation(symbol).await,
            TaskKind::Momentum => self.probe_momentum(symbol).await,
            TaskKind::Patterns => self.probe_patterns(symbol).await,
            TaskKind::Keywords => self.probe_keywords(symbol).await,
        }
    }

    /// News sentiment via the gateway plus social sentiment via its
    /// adapter. Missing sources degrade to neutral scores.
    async fn probe_sentiment(&self, symbol: &str) -> anyhow::Result<Value> {
        let query = symbol.split('/').next().unwrap_or(symbol);
        let items = self
            .gateway
            .search_news(query, &[symbol.to_string()], 20)
            .await?;

        let scored: Vec<f64> = items.iter().filter_map(|n| n.sentiment).collect();
        let news_score = if scored.is_empty() {
            0.0
        } else {
            scored.iter().sum::<f64>() / scored.len() as f64
        };

        let social = match &self.social {
            Some(adapter) => {
                adapter
                    .get_social_sentiment(symbol, self.gateway.simulation_time())
                    .await?
            }
            None => json!({ "score": 0.0, "trending": false, "volume": 0 }),
        };

        Ok(json!({
            "news": { "score": news_score, "articles": items.len() },
            "social": social,
        }))
    }

    async fn probe_onchain(&self, symbol: &str) -> anyhow::Result<Value> {
        match &self.onchain {
            Some(adapter) => {
                adapter
                    .get_onchain_metrics(symbol, self.gateway.simulation_time())
                    .await
            }
            None => Ok(json!({
                "active_addresses": 0,
                "transaction_volume": 0.0,
                "whale_activity": "neutral",
                "exchange_flows": { "inflow": 0.0, "outflow": 0.0 },
            })),
        }
    }

    async fn probe_technical(&self, symbol: &str) -> anyhow::Result<Value> {
        let bars = self.gateway.get_ohlcv(symbol, "1h", 100, None).await?;
        if bars.is_empty() {
            anyhow::bail!("no price history available for {symbol}");
        }

        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let volumes: Vec<f64> = bars.iter().map(|b| b.volume).collect();
        let current = closes[closes.len() - 1];

        let indicators = compute_indicators(&closes, &volumes, current);
        let sentiment = technical_sentiment(&indicators);
        let patterns: Vec<String> = detect_patterns(&closes)
            .iter()
            .map(|p| p.to_string())
            .collect();

        Ok(json!({
            "summary": format!(
                "RSI {:.1}, MACD {:+.4}, {} pattern(s) detected",
                indicators.rsi, indicators.macd, patterns.len()
            ),
            "indicators": serde_json::to_value(&indicators)?,
            "patterns": patterns,
            "sentiment": sentiment,
        }))
    }

    async fn probe_macro(&self) -> anyhow::Result<Value> {
        match &self.macro_adapter {
            Some(adapter) => adapter.get_macro_factors(self.gateway.simulation_time()).await,
            None => Ok(json!({
                "fed_policy": "neutral",
                "dxy": 0.0,
                "vix": 0.0,
                "risk_on": true,
            })),
        }
    }

    /// Volume-tier liquidity score, from the same banding the risk agent
    /// applies to average traded volume.
    async fn probe_liquidity(&self, symbol: &str) -> anyhow::Result<Value> {
        let bars = self.gateway.get_ohlcv(symbol, "1h", 100, None).await?;
        let avg_volume = if bars.is_empty() {
            0.0
        } else {
            bars.iter().map(|b| b.volume).sum::<f64>() / bars.len() as f64
        };

        let (level, score) = liquidity_tier(avg_volume);
        Ok(json!({ "avg_volume": avg_volume, "level": level, "score": score }))
    }

    async fn probe_correlation(&self, symbol: &str) -> anyhow::Result<Value> {
        const REFERENCE: &str = "BTC/USDT";

        if symbol == REFERENCE {
            return Ok(json!({ "reference": REFERENCE, "correlation": 1.0 }));
        }

        let own = self.gateway.get_ohlcv(symbol, "1h", 100, None).await?;
        let reference = self.gateway.get_ohlcv(REFERENCE, "1h", 100, None).await?;

        let own_closes: Vec<f64> = own.iter().map(|b| b.close).collect();
        let ref_closes: Vec<f64> = reference.iter().map(|b| b.close).collect();
        let correlation = pearson(&own_closes, &ref_closes).unwrap_or(0.0);

        Ok(json!({ "reference": REFERENCE, "correlation": correlation }))
    }

    async fn probe_momentum(&self, symbol: &str) -> anyhow::Result<Value> {
        let bars = self.gateway.get_ohlcv(symbol, "1h", 100, None).await?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

        let roc_14 = if closes.len() >= 15 {
            let past = closes[closes.len() - 15];
            if past != 0.0 {
                (closes[closes.len() - 1] - past) / past * 100.0
            } else {
                0.0
            }
        } else {
            0.0
        };

        let direction = if roc_14 > 0.0 {
            "up"
        } else if roc_14 < 0.0 {
            "down"
        } else {
            "flat"
        };

        let breakout = detect_patterns(&closes).iter().any(|p| {
            matches!(
                p,
                crate::patterns::ChartPattern::BreakoutAboveResistance
                    | crate::patterns::ChartPattern::BreakdownBelowSupport
            )
        });

        Ok(json!({ "roc_14": roc_14, "direction": direction, "breakout": breakout }))
    }

    async fn probe_patterns(&self, symbol: &str) -> anyhow::Result<Value> {
        let bars = self.gateway.get_ohlcv(symbol, "1h", 100, None).await?;
        let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();
        let patterns: Vec<String> = detect_patterns(&closes)
            .iter()
            .map(|p| p.to_string())
            .collect();

        Ok(json!({ "count": patterns.len(), "patterns": patterns }))
    }

    async fn probe_keywords(&self, symbol: &str) -> anyhow::Result<Value> {
        let query = symbol.split('/').next().unwrap_or(symbol);
        let items = self
            .gateway
            .search_news(query, &[symbol.to_string()], 20)
            .await?;

        let mut counts: HashMap<String, usize> = HashMap::new();
        for item in &items {
            for word in item.title.split_whitespace() {
                let word: String = word
                    .chars()
                    .filter(|c| c.is_alphanumeric())
                    .collect::<String>()
                    .to_lowercase();
                if word.len() > 3 && !KEYWORD_STOPWORDS.contains(&word.as_str()) {
                    *counts.entry(word).or_insert(0) += 1;
                }
            }
        }

        let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        let keywords: Vec<String> = ranked.into_iter().take(5).map(|(w, _)| w).collect();

        Ok(json!({ "keywords": keywords }))
    }
}

// -----------------------------------------------------------------------------
// Helpers
// -----------------------------------------------------------------------------

fn liquidity_tier(avg_volume: f64) -> (&'static str, f64) {
    if avg_volume > 1_000_000_000.0 {
        ("very_high", 95.0)
    } else if avg_volume > 100_000_000.0 {
        ("high", 80.0)
    } else if avg_volume > 10_000_000.0 {
        ("medium", 60.0)
    } else if avg_volume > 1_000_000.0 {
        ("low", 35.0)
    } else {
        ("very_low", 15.0)
    }
}

/// Pearson correlation of the trailing overlap of two series.
fn pearson(a: &[f64], b: &[f64]) -> Option<f64> {
    let n = a.len().min(b.len());
    if n < 2 {
        return None;
    }
    let a = &a[a.len() - n..];
    let b = &b[b.len() - n..];

    let mean_a = a.iter().sum::<f64>() / n as f64;
    let mean_b = b.iter().sum::<f64>() / n as f64;

    let mut cov = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;
    for i in 0..n {
        let da = a[i] - mean_a;
        let db = b[i] - mean_b;
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return None;
    }
    Some(cov / (var_a.sqrt() * var_b.sqrt()))
}
