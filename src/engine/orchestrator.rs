// =============================================================================
// Orchestrator — drives one decision tick through the agent graph
// =============================================================================
//
// Wires the agents into the decision graph and runs ticks end to end:
//
//   1. Fetch (or accept) a market snapshot.
//   2. Walk the graph from the researcher, folding each node's patch into
//      the shared `DecisionState`.
//   3. Let the routers loop the tick through bounded refinement.
//   4. Record the final decision in the per-symbol history ring.
//
// Node failures never escape: a failing node contributes an error message
// and defaults, and the pipeline continues. A paused safety enforcer
// dominates everything — the decide node overrides the result to a
// zero-confidence hold without rewinding the in-flight tick.
// =============================================================================

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, warn};

use crate::adapters::{
    ComplianceAdapter, DataAdapter, ExecutionAdapter, FundamentalsAdapter, LanguageModelAdapter,
    MacroAdapter, NewsAdapter, OnChainAdapter, OptimizerAdapter, Portfolio, SentimentAdapter,
    SocialAdapter,
};
use crate::agents::analyzer::AnalyzerAgent;
use crate::agents::debate::DebateAgent;
use crate::agents::optimizer::OptimizerAgent;
use crate::agents::privacy::PrivacyAgent;
use crate::agents::researcher::ResearcherAgent;
use crate::agents::risk::{RiskAgent, RiskBounds};
use crate::agents::validator::ResearchValidator;
use crate::config::{EngineConfig, ValidationConfig};
use crate::engine::graph::{
    self, continuation_router, validation_router, Node, RouteLabel, Router, Step,
};
use crate::engine::signal::SignalExtractor;
use crate::engine::state::{Decision, DecisionReasoning, DecisionState, StatePatch};
use crate::error::{EngineError, Result};
use crate::history::{AgentDebate, DecisionHistory, DecisionRecord};
use crate::safety::{SafetyEnforcer, SafetyStatus};
use crate::temporal::gateway::{GatewayStats, TemporalGateway};
use crate::types::{Action, MarketSnapshot, RiskProfile};

/// External capabilities handed to the orchestrator. The first three are
/// required; everything else degrades gracefully when absent.
pub struct AdapterSet {
    pub data: Arc<dyn DataAdapter>,
    pub execution: Arc<dyn ExecutionAdapter>,
    pub compliance: Arc<dyn ComplianceAdapter>,
    pub news: Option<Arc<dyn NewsAdapter>>,
    pub social: Option<Arc<dyn SocialAdapter>>,
    pub onchain: Option<Arc<dyn OnChainAdapter>>,
    pub macro_data: Option<Arc<dyn MacroAdapter>>,
    pub sentiment: Option<Arc<dyn SentimentAdapter>>,
    pub fundamentals: Option<Arc<dyn FundamentalsAdapter>>,
    pub optimizer: Option<Arc<dyn OptimizerAdapter>>,
    pub language_model: Option<Arc<dyn LanguageModelAdapter>>,
}

/// Snapshot of the engine for status surfaces.
#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub running: bool,
    pub paused: bool,
    pub risk_profile: RiskProfile,
    pub agent_health: HashMap<String, String>,
    pub validation: ValidationConfig,
    pub safety: SafetyStatus,
    pub gateway: GatewayStats,
}

/// The multi-agent decision orchestrator.
pub struct Orchestrator {
    config: EngineConfig,
    gateway: Arc<TemporalGateway>,
    safety: Arc<SafetyEnforcer>,
    history: Arc<DecisionHistory>,
    data: Arc<dyn DataAdapter>,
    execution: Arc<dyn ExecutionAdapter>,

    researcher: ResearcherAgent,
    research_validator: ResearchValidator,
    debate: DebateAgent,
    analyzer: AnalyzerAgent,
    risk_agent: RiskAgent,
    privacy: PrivacyAgent,
    optimizer: OptimizerAgent,
    signal: SignalExtractor,

    running: AtomicBool,
    engine_paused: AtomicBool,
}

impl Orchestrator {
    /// Build an orchestrator whose gateway tracks the wall clock (paper or
    /// live operation).
    pub fn new(config: EngineConfig, adapters: AdapterSet) -> Self {
        Self::build(config, adapters, None)
    }

    /// Build an orchestrator pinned to a historical simulation time, for
    /// replay and backtesting. The same agent code runs either way.
    pub fn new_at(
        config: EngineConfig,
        adapters: AdapterSet,
        simulation_time: DateTime<Utc>,
    ) -> Self {
        Self::build(config, adapters, Some(simulation_time))
    }

    fn build(
        config: EngineConfig,
        adapters: AdapterSet,
        simulation_time: Option<DateTime<Utc>>,
    ) -> Self {
        let mut gateway = TemporalGateway::new(simulation_time, &config.gateway)
            .with_data_adapter(adapters.data.clone());
        if let Some(news) = &adapters.news {
            gateway = gateway.with_news_adapter(news.clone());
        }
        if let Some(fundamentals) = &adapters.fundamentals {
            gateway = gateway.with_fundamentals_adapter(fundamentals.clone());
        }
        if let Some(sentiment) = &adapters.sentiment {
            gateway = gateway.with_sentiment_adapter(sentiment.clone());
        }
        let gateway = Arc::new(gateway);

        let researcher = ResearcherAgent::new(
            gateway.clone(),
            config.planner.clone(),
            adapters.social.clone(),
            adapters.onchain.clone(),
            adapters.macro_data.clone(),
            adapters.language_model.clone(),
        );

        info!(
            risk_profile = %config.risk_profile,
            mode = %config.mode,
            max_iterations = config.max_iterations,
            "orchestrator created"
        );

        Self {
            researcher,
            research_validator: ResearchValidator::new(&config.validation),
            debate: DebateAgent::new(adapters.language_model.clone()),
            analyzer: AnalyzerAgent::new(),
            risk_agent: RiskAgent::new(adapters.compliance.clone(), RiskBounds::default()),
            privacy: PrivacyAgent::new(),
            optimizer: OptimizerAgent::new(adapters.optimizer.clone()),
            signal: SignalExtractor::new(),
            safety: Arc::new(SafetyEnforcer::new(&config.safety)),
            history: Arc::new(DecisionHistory::new(config.history_depth)),
            data: adapters.data,
            execution: adapters.execution,
            gateway,
            config,
            running: AtomicBool::new(false),
            engine_paused: AtomicBool::new(false),
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle
    // -------------------------------------------------------------------------

    pub fn start(&self) {
        self.running.store(true, Ordering::SeqCst);
        self.engine_paused.store(false, Ordering::SeqCst);
        info!("orchestrator started");
    }

    pub fn pause(&self) {
        self.engine_paused.store(true, Ordering::SeqCst);
        info!("orchestrator paused");
    }

    pub fn resume(&self) {
        self.engine_paused.store(false, Ordering::SeqCst);
        info!("orchestrator resumed");
    }

    pub fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        info!("orchestrator stopped");
    }

    /// The safety enforcer, for event recording and resume control.
    pub fn safety(&self) -> &Arc<SafetyEnforcer> {
        &self.safety
    }

    /// The temporal gateway this orchestrator reads through.
    pub fn gateway(&self) -> &Arc<TemporalGateway> {
        &self.gateway
    }

    /// The decision history ring.
    pub fn history(&self) -> &Arc<DecisionHistory> {
        &self.history
    }

    /// Move the simulation clock (replay mode only; a live gateway tracks
    /// the wall clock).
    pub fn set_simulation_time(&self, t: DateTime<Utc>) -> Result<()> {
        self.gateway.set_simulation_time(t)
    }

    /// Flatten every open position through the execution venue. Used by
    /// emergency-pause flows after a critical safety violation.
    pub async fn flatten_all(&self) -> Result<()> {
        self.execution
            .close_all_positions()
            .await
            .map_err(|e| EngineError::Adapter(format!("close_all_positions: {e}")))
    }

    /// Engine status snapshot.
    pub fn status(&self) -> EngineStatus {
        let agent_health: HashMap<String, String> = [
            "researcher",
            "validator",
            "bull",
            "bear",
            "analyzer",
            "risk",
            "privacy",
            "optimizer",
        ]
        .iter()
        .map(|name| (name.to_string(), "active".to_string()))
        .collect();

        EngineStatus {
            running: self.running.load(Ordering::SeqCst),
            paused: self.engine_paused.load(Ordering::SeqCst) || self.safety.is_paused(),
            risk_profile: self.config.risk_profile,
            agent_health,
            validation: self.research_validator.config(),
            safety: self.safety.status(),
            gateway: self.gateway.statistics(),
        }
    }

    /// Newest-first decision history for a symbol.
    pub fn get_decisions(
        &self,
        symbol: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<DecisionRecord> {
        self.history.get_decisions(symbol, limit, since)
    }

    /// Render one decision record as human-readable text.
    pub fn format_explanation(record: &DecisionRecord) -> String {
        DecisionHistory::format_explanation(record)
    }

    // -------------------------------------------------------------------------
    // Decision tick
    // -------------------------------------------------------------------------

    /// Run one full decision tick for `symbol`. Never fails: any
    /// unrecoverable condition produces a conservative `hold` record with
    /// an `error` field.
    pub async fn analyze_symbol(
        &self,
        symbol: &str,
        market_data: Option<MarketSnapshot>,
    ) -> DecisionRecord {
        let snapshot = match market_data {
            Some(snapshot) => snapshot,
            None => match self.data.get_market_data(symbol, "1h", 100).await {
                Ok(snapshot) => snapshot,
                Err(e) => {
                    error!(symbol, error = %e, "market data unavailable — holding");
                    return self.record_failure(symbol, format!("market data unavailable: {e}"));
                }
            },
        };

        let mut state = DecisionState::new(symbol, snapshot, self.config.max_iterations);
        self.run_graph(&mut state).await
    }

    /// Walk the graph until a router terminates the tick. Returns the last
    /// recorded decision.
    async fn run_graph(&self, state: &mut DecisionState) -> DecisionRecord {
        // Generous step valve: a full pass is nine nodes, and both routers
        // together can re-enter at most `max_iterations` times each.
        let max_steps = 9 * (2 * state.max_iterations as usize + 2);

        let mut node = graph::ENTRY;
        let mut last_record: Option<DecisionRecord> = None;
        let mut steps = 0usize;

        loop {
            steps += 1;
            if steps > max_steps {
                warn!(
                    symbol = %state.symbol,
                    steps,
                    "graph step budget exceeded — forcing hold"
                );
                return self.record_failure(
                    &state.symbol,
                    format!("invariant breach: graph exceeded {max_steps} steps"),
                );
            }

            let patch = match node {
                Node::Researcher => self.researcher_node(state).await,
                Node::Validator => self.validator_node(state),
                Node::Bull => self.bull_node(state).await,
                Node::Bear => self.bear_node(state).await,
                Node::Analyzer => self.analyzer_node(state),
                Node::Risk => self.risk_node(state).await,
                Node::Privacy => self.privacy_node(state),
                Node::Optimizer => self.optimizer_node(state).await,
                Node::Decide => {
                    let (patch, record) = self.decide_node(state);
                    last_record = Some(record);
                    patch
                }
            };
            state.apply(patch);

            match graph::next_step(node) {
                Step::Fixed(next) => node = next,
                Step::Routed(router) => {
                    let label = match router {
                        Router::Validation => validation_router(state),
                        Router::Continuation => continuation_router(state),
                    };

                    match graph::resolve(router, label) {
                        Some(next) => {
                            // A validation loop is a refinement pass too:
                            // count it against the iteration budget so the
                            // tick stays bounded.
                            if router == Router::Validation && label == RouteLabel::ReResearch {
                                state.iteration += 1;
                            }
                            // Re-entry after a decision opens a new round.
                            if router == Router::Continuation {
                                state.reopen();
                            }
                            info!(
                                symbol = %state.symbol,
                                from = %node,
                                to = %next,
                                iteration = state.iteration,
                                "graph re-entry"
                            );
                            node = next;
                        }
                        None => break,
                    }
                }
            }
        }

        match last_record {
            Some(record) => record,
            None => self.record_failure(&state.symbol, "tick terminated without a decision"),
        }
    }

    // -------------------------------------------------------------------------
    // Node bodies
    // -------------------------------------------------------------------------

    async fn researcher_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, iteration = state.iteration, "researcher analyzing");

        let output = self
            .researcher
            .research(&state.symbol, self.config.risk_profile)
            .await;

        StatePatch {
            messages: vec![crate::types::Message::new("researcher", &output.summary)],
            research_summary: Some(Some(output.summary)),
            sentiment_score: Some(output.sentiment),
            research_data: Some(Some(output.research_data)),
            planned_tasks: Some(output.plan.tasks),
            completed_task_ids: Some(output.completed_task_ids),
            task_execution_results: Some(output.task_results),
            ..Default::default()
        }
    }

    fn validator_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "validating research");

        let mut research_data = match &state.research_data {
            Some(Value::Object(map)) => Value::Object(map.clone()),
            _ => json!({}),
        };
        // Later iterations fold the technical analysis into the artifact so
        // its coverage counts.
        if research_data.get("technical").is_none() {
            if let Some(technical) = &state.technical_analysis {
                research_data["technical"] = json!({ "summary": technical });
            }
        }

        let outcome = self.research_validator.validate(
            &research_data,
            state.research_summary.as_deref(),
            Utc::now(),
        );

        StatePatch {
            messages: vec![crate::types::Message::new("validator", &outcome.summary)],
            validation_score: Some(outcome.score),
            validation_passed: Some(outcome.passed),
            data_gaps: Some(outcome.gaps),
            validation_checks: Some(outcome.checks),
            ..Default::default()
        }
    }

    async fn bull_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "bull agent arguing");

        let argument = self
            .debate
            .bull_case(
                &state.symbol,
                state.current_price,
                state.research_summary.as_deref(),
                state.sentiment_score,
            )
            .await;

        StatePatch {
            messages: vec![crate::types::Message::new("bull", &argument)],
            bull_argument: Some(Some(argument)),
            ..Default::default()
        }
    }

    async fn bear_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "bear agent arguing");

        let argument = self
            .debate
            .bear_case(
                &state.symbol,
                state.current_price,
                state.research_summary.as_deref(),
                state.bull_argument.as_deref(),
                state.sentiment_score,
            )
            .await;

        StatePatch {
            messages: vec![crate::types::Message::new("bear", &argument)],
            bear_argument: Some(Some(argument)),
            ..Default::default()
        }
    }

    fn analyzer_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "analyzer processing");

        let outcome = self.analyzer.analyze(&state.symbol, &state.market_data);

        StatePatch {
            messages: vec![crate::types::Message::new("analyzer", &outcome.summary)],
            technical_analysis: Some(Some(outcome.summary)),
            sentiment_score: Some(outcome.sentiment),
            ..Default::default()
        }
    }

    async fn risk_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "risk agent validating");

        let assessment = self
            .risk_agent
            .assess(
                &state.symbol,
                state.bull_argument.as_deref(),
                state.bear_argument.as_deref(),
                state.technical_analysis.as_deref(),
                self.config.risk_profile,
                Some(&state.market_data),
            )
            .await;

        StatePatch {
            messages: vec![crate::types::Message::new("risk", &assessment.summary)],
            risk_assessment: Some(Some(assessment)),
            ..Default::default()
        }
    }

    fn privacy_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "privacy agent checking");

        let check = self.privacy.check(&state.messages, &state.symbol);

        StatePatch {
            messages: vec![crate::types::Message::new("privacy", &check.summary)],
            compliance_check: Some(Some(check)),
            ..Default::default()
        }
    }

    async fn optimizer_node(&self, state: &DecisionState) -> StatePatch {
        info!(symbol = %state.symbol, "optimizer calculating");

        let portfolio = match self.execution.get_portfolio().await {
            Ok(portfolio) => portfolio,
            Err(e) => {
                warn!(symbol = %state.symbol, error = %e, "portfolio unavailable — assuming empty");
                Portfolio::default()
            }
        };

        let bull_score = self.signal.extract(state.bull_argument.as_deref().unwrap_or(""));
        let bear_score = self.signal.extract(state.bear_argument.as_deref().unwrap_or(""));

        let result = self
            .optimizer
            .optimize(
                &state.symbol,
                bull_score,
                bear_score,
                state.risk_assessment.as_ref(),
                &portfolio,
            )
            .await;

        StatePatch {
            messages: vec![crate::types::Message::new("optimizer", &result.summary)],
            confidence: Some(result.confidence),
            position_size: Some(result.size),
            ..Default::default()
        }
    }

    /// Synthesize the final decision, record it, and close the round.
    fn decide_node(&self, state: &DecisionState) -> (StatePatch, DecisionRecord) {
        let symbol = state.symbol.clone();

        let decision = if self.safety.is_paused() {
            // Pause dominance: a paused enforcer forces a hold no matter
            // what the agents concluded.
            let reason = self
                .safety
                .pause_reason()
                .unwrap_or_else(|| "safety enforcer paused".to_string());
            Decision::hold(&symbol, format!("Safety enforcer paused: {reason}"))
        } else {
            let risk_approved = state
                .risk_assessment
                .as_ref()
                .map_or(false, |r| r.approved);
            let compliance_approved = state
                .compliance_check
                .as_ref()
                .map_or(true, |c| c.approved);

            if !risk_approved || !compliance_approved {
                Decision::hold(&symbol, "Failed risk or compliance check")
            } else {
                let sentiment = state.sentiment_score;
                let confidence = state.confidence;

                let action = if sentiment > 0.3 && confidence > 0.6 {
                    Action::Buy
                } else if sentiment < -0.3 && confidence > 0.6 {
                    Action::Sell
                } else {
                    Action::Hold
                };

                let truncate =
                    |s: &Option<String>| s.as_deref().unwrap_or("").chars().take(200).collect();

                Decision {
                    action,
                    symbol: symbol.clone(),
                    confidence,
                    sentiment,
                    size: if action == Action::Hold {
                        0.0
                    } else {
                        state.position_size
                    },
                    timestamp: Utc::now(),
                    reason: None,
                    reasoning: Some(DecisionReasoning {
                        bull: truncate(&state.bull_argument),
                        bear: truncate(&state.bear_argument),
                        technical: truncate(&state.technical_analysis),
                    }),
                    error: None,
                }
            }
        };

        info!(
            symbol = %symbol,
            action = %decision.action,
            confidence = decision.confidence,
            sentiment = decision.sentiment,
            iteration = state.iteration,
            "decision made"
        );

        let record = DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.clone(),
            timestamp: decision.timestamp,
            action: decision.action,
            confidence: decision.confidence,
            sentiment: decision.sentiment,
            decision: serde_json::to_value(&decision).unwrap_or(Value::Null),
            agent_debate: AgentDebate {
                bull_argument: state.bull_argument.clone().unwrap_or_default(),
                bear_argument: state.bear_argument.clone().unwrap_or_default(),
                research_summary: state.research_summary.clone().unwrap_or_default(),
                technical_analysis: state.technical_analysis.clone().unwrap_or_default(),
            },
        };
        self.history.add(record.clone());

        let content =
            serde_json::to_string(&decision).unwrap_or_else(|_| "{}".to_string());

        let patch = StatePatch {
            messages: vec![crate::types::Message::new("decision", content)],
            final_decision: Some(decision),
            iteration: Some(state.iteration + 1),
            ..Default::default()
        };

        (patch, record)
    }

    /// Build, record, and return a conservative hold carrying an error.
    fn record_failure(&self, symbol: &str, error: impl Into<String>) -> DecisionRecord {
        let error = error.into();
        let mut decision = Decision::hold(symbol, error.clone());
        decision.error = Some(error);

        let record = DecisionRecord {
            id: uuid::Uuid::new_v4().to_string(),
            symbol: symbol.to_string(),
            timestamp: decision.timestamp,
            action: Action::Hold,
            confidence: 0.0,
            sentiment: 0.0,
            decision: serde_json::to_value(&decision).unwrap_or(Value::Null),
            agent_debate: AgentDebate::default(),
        };
        self.history.add(record.clone());
        record
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ComplianceVerdict, TradeIntent};
    use crate::types::{OhlcvBar, PriceData};
    use async_trait::async_trait;

    // ---- mock adapters -----------------------------------------------------

    struct MockData;

    #[async_trait]
    impl DataAdapter for MockData {
        async fn get_market_data(
            &self,
            _symbol: &str,
            _timeframe: &str,
            limit: usize,
        ) -> anyhow::Result<MarketSnapshot> {
            let prices: Vec<f64> = (0..limit).map(|i| 100.0 + i as f64 * 0.1).collect();
            Ok(MarketSnapshot {
                price: prices[prices.len() - 1],
                prices,
                volumes: vec![150_000_000.0; limit],
                ..Default::default()
            })
        }

        async fn get_price(
            &self,
            symbol: &str,
            as_of: DateTime<Utc>,
        ) -> anyhow::Result<Option<PriceData>> {
            Ok(Some(PriceData {
                symbol: symbol.to_string(),
                price: 100.0,
                timestamp: as_of,
                bid: None,
                ask: None,
                volume_24h: None,
                change_24h: None,
            }))
        }

        async fn get_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            limit: usize,
            as_of: DateTime<Utc>,
        ) -> anyhow::Result<Vec<OhlcvBar>> {
            Ok((0..limit)
                .map(|i| {
                    let close = 100.0 + i as f64 * 0.1;
                    OhlcvBar {
                        timestamp: as_of - chrono::Duration::hours((limit - i) as i64),
                        open: close,
                        high: close + 0.5,
                        low: close - 0.5,
                        close,
                        volume: 150_000_000.0,
                    }
                })
                .collect())
        }
    }

    struct BrokenData;

    #[async_trait]
    impl DataAdapter for BrokenData {
        async fn get_market_data(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: usize,
        ) -> anyhow::Result<MarketSnapshot> {
            anyhow::bail!("feed offline")
        }

        async fn get_price(
            &self,
            _symbol: &str,
            _as_of: DateTime<Utc>,
        ) -> anyhow::Result<Option<PriceData>> {
            anyhow::bail!("feed offline")
        }

        async fn get_ohlcv(
            &self,
            _symbol: &str,
            _timeframe: &str,
            _limit: usize,
            _as_of: DateTime<Utc>,
        ) -> anyhow::Result<Vec<OhlcvBar>> {
            anyhow::bail!("feed offline")
        }
    }

    struct MockExecution;

    #[async_trait]
    impl ExecutionAdapter for MockExecution {
        async fn get_portfolio(&self) -> anyhow::Result<Portfolio> {
            Ok(Portfolio {
                positions: HashMap::new(),
                balance: 10_000.0,
            })
        }

        async fn execute_trade(
            &self,
            _symbol: &str,
            _action: Action,
            _size: f64,
            _price: Option<f64>,
        ) -> anyhow::Result<Value> {
            Ok(json!({ "status": "simulated" }))
        }

        async fn close_all_positions(&self) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct MockCompliance {
        approve: bool,
    }

    #[async_trait]
    impl ComplianceAdapter for MockCompliance {
        async fn check_compliance(
            &self,
            _trade: &TradeIntent,
            _risk_profile: RiskProfile,
        ) -> anyhow::Result<ComplianceVerdict> {
            Ok(ComplianceVerdict {
                compliant: self.approve,
                reason: if self.approve { "ok" } else { "denied" }.to_string(),
                violations: Vec::new(),
            })
        }
    }

    fn adapters(approve: bool) -> AdapterSet {
        AdapterSet {
            data: Arc::new(MockData),
            execution: Arc::new(MockExecution),
            compliance: Arc::new(MockCompliance { approve }),
            news: None,
            social: None,
            onchain: None,
            macro_data: None,
            sentiment: None,
            fundamentals: None,
            optimizer: None,
            language_model: None,
        }
    }

    fn config() -> EngineConfig {
        let mut cfg = EngineConfig::default();
        cfg.history_depth = 5;
        cfg
    }

    // ---- tests -------------------------------------------------------------

    #[tokio::test]
    async fn tick_produces_a_bounded_decision() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        let record = orchestrator.analyze_symbol("BTC/USDT", None).await;

        assert!(matches!(
            record.action,
            Action::Buy | Action::Sell | Action::Hold
        ));
        assert!((0.0..=1.0).contains(&record.confidence));
        assert!((-1.0..=1.0).contains(&record.sentiment));
        assert_eq!(record.symbol, "BTC/USDT");
        assert!(!record.agent_debate.bull_argument.is_empty());
        assert!(!record.agent_debate.bear_argument.is_empty());
    }

    #[tokio::test]
    async fn paused_safety_forces_hold() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        orchestrator.safety().check_sentiment_drop(-0.9);
        assert!(orchestrator.safety().is_paused());

        let record = orchestrator.analyze_symbol("BTC/USDT", None).await;
        assert_eq!(record.action, Action::Hold);
        assert_eq!(record.confidence, 0.0);
        let reason = record.decision["reason"].as_str().unwrap();
        assert!(reason.contains("paused"));
    }

    #[tokio::test]
    async fn risk_denial_forces_hold_with_reason() {
        let orchestrator = Orchestrator::new(config(), adapters(false));
        let record = orchestrator.analyze_symbol("BTC/USDT", None).await;

        assert_eq!(record.action, Action::Hold);
        assert_eq!(record.confidence, 0.0);
        assert_eq!(
            record.decision["reason"].as_str().unwrap(),
            "Failed risk or compliance check"
        );
    }

    #[tokio::test]
    async fn missing_market_data_yields_error_hold() {
        let mut set = adapters(true);
        set.data = Arc::new(BrokenData);
        let orchestrator = Orchestrator::new(config(), set);

        let record = orchestrator.analyze_symbol("BTC/USDT", None).await;
        assert_eq!(record.action, Action::Hold);
        assert!(record.decision["error"]
            .as_str()
            .unwrap()
            .contains("market data unavailable"));
    }

    #[tokio::test]
    async fn history_ring_stays_bounded_and_ordered() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        for _ in 0..4 {
            orchestrator.analyze_symbol("BTC/USDT", None).await;
        }

        let records = orchestrator.get_decisions("BTC/USDT", 100, None);
        assert!(records.len() <= 5, "ring overflow: {}", records.len());

        // Newest-first ordering from the query implies ascending storage.
        for pair in records.windows(2) {
            assert!(pair[0].timestamp >= pair[1].timestamp);
        }
    }

    #[tokio::test]
    async fn transcript_covers_every_stage() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        let record = orchestrator.analyze_symbol("ETH/USDT", None).await;

        // The record's decision payload is serialisable structured data.
        assert!(record.decision.get("action").is_some());

        let status = orchestrator.status();
        assert_eq!(status.agent_health.len(), 8);
        assert_eq!(status.agent_health["researcher"], "active");
    }

    #[tokio::test]
    async fn status_reflects_lifecycle_and_safety() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        assert!(!orchestrator.status().running);

        orchestrator.start();
        assert!(orchestrator.status().running);
        assert!(!orchestrator.status().paused);

        orchestrator.pause();
        assert!(orchestrator.status().paused);
        orchestrator.resume();
        assert!(!orchestrator.status().paused);

        orchestrator.safety().check_daily_loss_limit(-100.0);
        assert!(orchestrator.status().paused, "safety pause shows in status");
    }

    #[tokio::test]
    async fn iteration_stays_within_budget() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        let record = orchestrator.analyze_symbol("BTC/USDT", None).await;

        let decide_rounds = orchestrator.get_decisions("BTC/USDT", 100, None).len() as u32;
        assert!(decide_rounds <= config().max_iterations);
        assert_eq!(record.action, Action::Hold);
    }

    #[tokio::test]
    async fn flatten_all_reaches_the_execution_adapter() {
        let orchestrator = Orchestrator::new(config(), adapters(true));
        orchestrator.flatten_all().await.unwrap();
    }
}
