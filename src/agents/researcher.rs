// =============================================================================
// Researcher Agent — plans, executes, and reduces a research pass
// =============================================================================
//
// The researcher node body: build a plan for the symbol and risk profile,
// execute it through the temporal gateway, reduce the partial results into
// one artifact, and hand back everything the validator and the debate
// need. Task failures stay inside the executor; the worst case here is a
// neutral artifact with empty sources.
// =============================================================================

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::info;

use crate::adapters::{LanguageModelAdapter, MacroAdapter, OnChainAdapter, SocialAdapter};
use crate::config::PlannerConfig;
use crate::research::aggregator::ResearchAggregator;
use crate::research::executor::ResearchExecutor;
use crate::research::planner::{ResearchPlan, ResearchPlanner};
use crate::temporal::gateway::TemporalGateway;
use crate::types::RiskProfile;

/// Everything one research pass produces.
#[derive(Debug, Clone)]
pub struct ResearchOutput {
    pub summary: String,
    /// Aggregate sentiment in [-1, 1].
    pub sentiment: f64,
    /// Per-source artifact consumed by the validator:
    /// `{news, social, onchain, macro, technical?, sentiment, timestamp}`.
    pub research_data: Value,
    pub plan: ResearchPlan,
    pub completed_task_ids: Vec<String>,
    pub task_results: HashMap<String, Value>,
}

/// Drives the planner, executor, and aggregator for one tick.
pub struct ResearcherAgent {
    planner: ResearchPlanner,
    executor: ResearchExecutor,
    aggregator: ResearchAggregator,
}

impl ResearcherAgent {
    pub fn new(
        gateway: Arc<TemporalGateway>,
        config: PlannerConfig,
        social: Option<Arc<dyn SocialAdapter>>,
        onchain: Option<Arc<dyn OnChainAdapter>>,
        macro_adapter: Option<Arc<dyn MacroAdapter>>,
        llm: Option<Arc<dyn LanguageModelAdapter>>,
    ) -> Self {
        let mut executor = ResearchExecutor::new(gateway, config.clone());
        if let Some(adapter) = social {
            executor = executor.with_social_adapter(adapter);
        }
        if let Some(adapter) = onchain {
            executor = executor.with_onchain_adapter(adapter);
        }
        if let Some(adapter) = macro_adapter {
            executor = executor.with_macro_adapter(adapter);
        }

        Self {
            planner: ResearchPlanner::new(config),
            executor,
            aggregator: ResearchAggregator::new(llm),
        }
    }

    /// Run one full research pass for `symbol`.
    pub async fn research(&self, symbol: &str, risk_profile: RiskProfile) -> ResearchOutput {
        let mut plan = self.planner.create_plan(symbol, risk_profile);
        let summary = self.executor.execute(&mut plan).await;
        let artifact = self.aggregator.reduce(symbol, &summary.results).await;

        // Assemble the validator-facing artifact. Sources that produced
        // nothing stay null so coverage gaps are visible downstream.
        let mut research_data = json!({
            "news": artifact.news,
            "social": artifact.social,
            "onchain": artifact.onchain,
            "macro": artifact.macro_factors,
            "sentiment": artifact.sentiment,
            "timestamp": artifact.timestamp.to_rfc3339(),
        });
        if let Some(technical) = summary.results.get("task_technical") {
            research_data["technical"] = technical.clone();
        }

        info!(
            symbol,
            sentiment = artifact.sentiment,
            completed = summary.completed_task_ids.len(),
            failed = summary.failed,
            skipped = summary.skipped,
            "research pass complete"
        );

        ResearchOutput {
            summary: artifact.summary,
            sentiment: artifact.sentiment,
            research_data,
            plan,
            completed_task_ids: summary.completed_task_ids,
            task_results: summary.results,
        }
    }
}
