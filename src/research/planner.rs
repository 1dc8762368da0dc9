// =============================================================================
// Research Planner — decomposes a decision into a prioritized task DAG
// =============================================================================
//
// Base task set (always planned):
//   sentiment, onchain, technical  — CRITICAL probes
//   macro                          — HIGH
//
// Profile-specific additions:
//   conservative — liquidity (HIGH), correlation (MEDIUM, after technical)
//   aggressive   — momentum (HIGH, after technical)
//
// Optional additions (when enabled):
//   patterns (MEDIUM, after technical), keywords (LOW, after sentiment)
//
// Batch ordering is a topological level-set walk: repeatedly take the
// pending tasks whose dependencies have all been scheduled, keep the
// highest-priority tier of that ready set, and cap it at
// `max_parallel_tasks` (or emit singletons when parallel execution is
// off). A cycle — no progress with tasks remaining — dumps the remainder
// into one final batch so the plan always covers every task.
// =============================================================================

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::PlannerConfig;
use crate::research::task::{ResearchTask, TaskKind, TaskPriority};
use crate::types::RiskProfile;

/// An ordered research plan: the task set plus its execution batches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPlan {
    pub symbol: String,
    pub risk_profile: RiskProfile,
    pub tasks: Vec<ResearchTask>,
    /// Execution batches of task ids; tasks within a batch may run
    /// concurrently.
    pub batches: Vec<Vec<String>>,
    pub estimated_cost: f64,
    pub estimated_time_sequential: u64,
    pub estimated_time_parallel: u64,
    pub speedup: f64,
    pub summary: String,
    pub created_at: DateTime<Utc>,
}

impl ResearchPlan {
    pub fn task(&self, task_id: &str) -> Option<&ResearchTask> {
        self.tasks.iter().find(|t| t.task_id == task_id)
    }

    pub fn task_mut(&mut self, task_id: &str) -> Option<&mut ResearchTask> {
        self.tasks.iter_mut().find(|t| t.task_id == task_id)
    }

    pub fn critical_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.priority == TaskPriority::Critical)
            .count()
    }
}

/// Builds research plans from a symbol and risk profile.
pub struct ResearchPlanner {
    config: PlannerConfig,
}

impl ResearchPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    /// Create a plan for one decision tick.
    pub fn create_plan(&self, symbol: &str, risk_profile: RiskProfile) -> ResearchPlan {
        let tasks = self.build_tasks(symbol, risk_profile);
        let batches = compute_batches(
            &tasks,
            self.config.enable_parallel_tasks,
            self.config.max_parallel_tasks,
        );

        let estimated_cost = tasks.iter().map(|t| t.estimated_cost).sum();
        let sequential: u64 = tasks.iter().map(|t| t.timeout_seconds).sum();
        let parallel = estimate_parallel_time(&tasks, &batches);
        let speedup = if parallel > 0 {
            sequential as f64 / parallel as f64
        } else {
            1.0
        };

        let summary = plan_summary(symbol, risk_profile, &tasks, &batches, sequential, parallel);

        info!(
            symbol,
            profile = %risk_profile,
            tasks = tasks.len(),
            batches = batches.len(),
            est_cost = estimated_cost,
            est_parallel_secs = parallel,
            "research plan created"
        );

        ResearchPlan {
            symbol: symbol.to_string(),
            risk_profile,
            tasks,
            batches,
            estimated_cost,
            estimated_time_sequential: sequential,
            estimated_time_parallel: parallel,
            speedup,
            summary,
            created_at: Utc::now(),
        }
    }

    fn build_tasks(&self, symbol: &str, risk_profile: RiskProfile) -> Vec<ResearchTask> {
        let base = symbol.split('/').next().unwrap_or(symbol);
        let mut tasks = Vec::new();

        tasks.push(ResearchTask::new(
            TaskKind::Sentiment,
            "Market Sentiment Analysis",
            format!("Gather sentiment from news and social media for {symbol}"),
            TaskPriority::Critical,
            &["news", "social"],
            &[],
            0.05,
            30,
        ));

        tasks.push(ResearchTask::new(
            TaskKind::OnChain,
            "On-Chain Metrics",
            format!("Fetch whale activity, exchange flows, and active addresses for {base}"),
            TaskPriority::Critical,
            &["onchain"],
            &[],
            0.03,
            20,
        ));

        tasks.push(ResearchTask::new(
            TaskKind::Technical,
            "Technical Analysis",
            format!("Compute RSI, MACD, Bollinger Bands, and chart patterns for {symbol}"),
            TaskPriority::Critical,
            &["price_data", "volume_data"],
            &[],
            0.02,
            15,
        ));

        tasks.push(ResearchTask::new(
            TaskKind::Macro,
            "Macroeconomic Factors",
            "Assess Fed policy, DXY, and overall risk appetite".to_string(),
            TaskPriority::High,
            &["macro_data"],
            &[],
            0.03,
            20,
        ));

        match risk_profile {
            RiskProfile::Conservative => {
                tasks.push(ResearchTask::new(
                    TaskKind::Liquidity,
                    "Liquidity Analysis",
                    format!("Assess market depth and traded volume for {symbol}"),
                    TaskPriority::High,
                    &["orderbook", "volume_data"],
                    &[],
                    0.02,
                    15,
                ));
                tasks.push(ResearchTask::new(
                    TaskKind::Correlation,
                    "Correlation Analysis",
                    format!("Measure correlation with BTC for {symbol}"),
                    TaskPriority::Medium,
                    &["price_data"],
                    &[TaskKind::Technical],
                    0.02,
                    15,
                ));
            }
            RiskProfile::Aggressive => {
                tasks.push(ResearchTask::new(
                    TaskKind::Momentum,
                    "Momentum Signals",
                    format!("Identify short-term momentum and breakouts for {symbol}"),
                    TaskPriority::High,
                    &["price_data", "volume_data"],
                    &[TaskKind::Technical],
                    0.02,
                    10,
                ));
            }
            RiskProfile::Balanced => {}
        }

        if self.config.include_optional_tasks {
            tasks.push(ResearchTask::new(
                TaskKind::Patterns,
                "Historical Pattern Matching",
                format!("Find recurring chart patterns for {symbol}"),
                TaskPriority::Medium,
                &["historical_data"],
                &[TaskKind::Technical],
                0.04,
                25,
            ));
            tasks.push(ResearchTask::new(
                TaskKind::Keywords,
                "News Keyword Extraction",
                format!("Extract trending keywords from recent {base} news"),
                TaskPriority::Low,
                &["news"],
                &[TaskKind::Sentiment],
                0.02,
                15,
            ));
        }

        tasks
    }
}

// -----------------------------------------------------------------------------
// Batch ordering
// -----------------------------------------------------------------------------

/// Topological level-set ordering with priority tiers.
///
/// Invariant: for every dependency edge `u -> v`, `batch(u) < batch(v)`;
/// every task lands in exactly one batch.
pub(crate) fn compute_batches(
    tasks: &[ResearchTask],
    enable_parallel: bool,
    max_parallel: usize,
) -> Vec<Vec<String>> {
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut scheduled: HashSet<&str> = HashSet::new();

    while scheduled.len() < tasks.len() {
        // Tasks whose dependencies have all been scheduled in earlier
        // batches.
        let mut ready: Vec<&ResearchTask> = tasks
            .iter()
            .filter(|t| !scheduled.contains(t.task_id.as_str()))
            .filter(|t| {
                t.dependencies
                    .iter()
                    .all(|dep| scheduled.contains(dep.as_str()))
            })
            .collect();

        if ready.is_empty() {
            // Dependency cycle: no progress possible. Dump the remainder
            // into one final batch and stop.
            let remaining: Vec<String> = tasks
                .iter()
                .filter(|t| !scheduled.contains(t.task_id.as_str()))
                .map(|t| t.task_id.clone())
                .collect();
            warn!(
                remaining = remaining.len(),
                "dependency cycle detected — emitting remaining tasks as one batch"
            );
            batches.push(remaining);
            break;
        }

        // Highest-priority tier first; stable within a tier.
        ready.sort_by_key(|t| t.priority);
        let top_priority = ready[0].priority;
        ready.retain(|t| t.priority == top_priority);

        let batch_size = if enable_parallel {
            ready.len().min(max_parallel.max(1))
        } else {
            1
        };

        let batch: Vec<String> = ready
            .iter()
            .take(batch_size)
            .map(|t| t.task_id.clone())
            .collect();

        for id in &batch {
            if let Some(task) = tasks.iter().find(|t| &t.task_id == id) {
                scheduled.insert(task.task_id.as_str());
            }
        }
        batches.push(batch);
    }

    batches
}

fn estimate_parallel_time(tasks: &[ResearchTask], batches: &[Vec<String>]) -> u64 {
    batches
        .iter()
        .map(|batch| {
            batch
                .iter()
                .filter_map(|id| tasks.iter().find(|t| &t.task_id == id))
                .map(|t| t.timeout_seconds)
                .max()
                .unwrap_or(0)
        })
        .sum()
}

fn plan_summary(
    symbol: &str,
    risk_profile: RiskProfile,
    tasks: &[ResearchTask],
    batches: &[Vec<String>],
    sequential: u64,
    parallel: u64,
) -> String {
    let count_by = |p: TaskPriority| tasks.iter().filter(|t| t.priority == p).count();
    let speedup = if parallel > 0 {
        sequential as f64 / parallel as f64
    } else {
        1.0
    };

    let mut out = format!(
        "Research plan for {symbol} ({risk_profile} profile)\n\
         Tasks: {} total ({} critical, {} high, {} medium, {} low)\n\
         Batches: {} | sequential {sequential}s | parallel {parallel}s | speedup {speedup:.1}x\n\
         Execution order:\n",
        tasks.len(),
        count_by(TaskPriority::Critical),
        count_by(TaskPriority::High),
        count_by(TaskPriority::Medium),
        count_by(TaskPriority::Low),
        batches.len(),
    );

    for (i, batch) in batches.iter().enumerate() {
        let names: Vec<&str> = batch
            .iter()
            .filter_map(|id| tasks.iter().find(|t| &t.task_id == id))
            .map(|t| t.name.as_str())
            .collect();
        if names.len() == 1 {
            out.push_str(&format!("  {}. {}\n", i + 1, names[0]));
        } else {
            out.push_str(&format!("  {}. parallel: {}\n", i + 1, names.join(", ")));
        }
    }

    out
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn planner(parallel: bool, max_parallel: usize, optional: bool) -> ResearchPlanner {
        ResearchPlanner::new(PlannerConfig {
            enable_parallel_tasks: parallel,
            max_parallel_tasks: max_parallel,
            include_optional_tasks: optional,
            max_research_time_seconds: 120,
        })
    }

    fn batch_index(batches: &[Vec<String>]) -> HashMap<String, usize> {
        let mut map = HashMap::new();
        for (i, batch) in batches.iter().enumerate() {
            for id in batch {
                map.insert(id.clone(), i);
            }
        }
        map
    }

    #[test]
    fn conservative_plan_topology() {
        // Base {sentiment, onchain, technical, macro} + liquidity +
        // correlation(->technical) + patterns(->technical) +
        // keywords(->sentiment).
        let plan = planner(true, 3, true).create_plan("ETH/USDT", RiskProfile::Conservative);
        assert_eq!(plan.tasks.len(), 8);
        assert_eq!(plan.critical_count(), 3);

        // Batch 1 is the critical tier, capped at 3.
        assert_eq!(
            plan.batches[0],
            vec!["task_sentiment", "task_onchain", "task_technical"]
        );

        let index = batch_index(&plan.batches);
        // Every dependency edge points forward.
        for task in &plan.tasks {
            for dep in &task.dependencies {
                assert!(
                    index[dep] < index[&task.task_id],
                    "{dep} must be scheduled before {}",
                    task.task_id
                );
            }
        }
    }

    #[test]
    fn documented_six_task_topology() {
        // The canonical example: base critical trio, then macro alone, then
        // the two technical-dependent medium tasks together.
        let tasks = vec![
            ResearchTask::new(TaskKind::Sentiment, "s", "", TaskPriority::Critical, &[], &[], 0.0, 30),
            ResearchTask::new(TaskKind::OnChain, "o", "", TaskPriority::Critical, &[], &[], 0.0, 20),
            ResearchTask::new(TaskKind::Technical, "t", "", TaskPriority::Critical, &[], &[], 0.0, 15),
            ResearchTask::new(TaskKind::Macro, "m", "", TaskPriority::High, &[], &[], 0.0, 20),
            ResearchTask::new(
                TaskKind::Patterns,
                "p",
                "",
                TaskPriority::Medium,
                &[],
                &[TaskKind::Technical],
                0.0,
                25,
            ),
            ResearchTask::new(
                TaskKind::Correlation,
                "c",
                "",
                TaskPriority::Medium,
                &[],
                &[TaskKind::Technical],
                0.0,
                15,
            ),
        ];

        let batches = compute_batches(&tasks, true, 3);
        assert_eq!(
            batches,
            vec![
                vec![
                    "task_sentiment".to_string(),
                    "task_onchain".to_string(),
                    "task_technical".to_string()
                ],
                vec!["task_macro".to_string()],
                vec!["task_patterns".to_string(), "task_correlation".to_string()],
            ]
        );
    }

    #[test]
    fn every_task_in_exactly_one_batch() {
        let plan = planner(true, 3, true).create_plan("BTC/USDT", RiskProfile::Aggressive);
        let mut seen = HashMap::new();
        for batch in &plan.batches {
            for id in batch {
                *seen.entry(id.clone()).or_insert(0usize) += 1;
            }
        }
        assert_eq!(seen.len(), plan.tasks.len());
        assert!(seen.values().all(|&c| c == 1));
    }

    #[test]
    fn parallelism_cap_is_respected() {
        let plan = planner(true, 2, true).create_plan("BTC/USDT", RiskProfile::Conservative);
        for batch in &plan.batches {
            assert!(batch.len() <= 2, "batch too wide: {batch:?}");
        }
    }

    #[test]
    fn sequential_mode_emits_singletons() {
        let plan = planner(false, 3, true).create_plan("BTC/USDT", RiskProfile::Balanced);
        for batch in &plan.batches {
            assert_eq!(batch.len(), 1);
        }
    }

    #[test]
    fn aggressive_profile_adds_momentum() {
        let plan = planner(true, 3, false).create_plan("SOL/USDT", RiskProfile::Aggressive);
        let ids: Vec<&str> = plan.tasks.iter().map(|t| t.task_id.as_str()).collect();
        assert!(ids.contains(&"task_momentum"));
        assert!(!ids.contains(&"task_liquidity"));
        assert!(!ids.contains(&"task_patterns"));
    }

    #[test]
    fn balanced_profile_is_base_only() {
        let plan = planner(true, 3, false).create_plan("BTC/USDT", RiskProfile::Balanced);
        assert_eq!(plan.tasks.len(), 4);
    }

    #[test]
    fn cycle_falls_back_to_one_final_batch() {
        // Two tasks depending on each other: no progress is possible.
        let a = ResearchTask::new(
            TaskKind::Patterns,
            "a",
            "",
            TaskPriority::Medium,
            &[],
            &[TaskKind::Correlation],
            0.0,
            10,
        );
        let b = ResearchTask::new(
            TaskKind::Correlation,
            "b",
            "",
            TaskPriority::Medium,
            &[],
            &[TaskKind::Patterns],
            0.0,
            10,
        );

        let batches = compute_batches(&[a, b], true, 3);
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].len(), 2);
    }

    #[test]
    fn estimates_and_summary_are_populated() {
        let plan = planner(true, 3, true).create_plan("BTC/USDT", RiskProfile::Conservative);
        assert!(plan.estimated_cost > 0.0);
        assert!(plan.estimated_time_sequential >= plan.estimated_time_parallel);
        assert!(plan.speedup >= 1.0);
        assert!(plan.summary.contains("BTC/USDT"));
        assert!(plan.summary.contains("conservative"));
    }
}
