// =============================================================================
// Quorum — autonomous multi-agent trading decision engine
// =============================================================================
//
// For each symbol and decision tick the engine produces a bounded,
// explainable `{action, size, confidence}` recommendation by running a
// pipeline of specialized agents (research, validation, bull/bear debate,
// technical analysis, risk, privacy, optimization) under strict temporal
// and safety controls.
//
// Core subsystems:
//   - `temporal`  — the simulation-clock gateway, batch-mode boundary
//                   validator, and historical replay stepper
//   - `research`  — the dependency-aware task planner, concurrent
//                   executor, and multi-source aggregator
//   - `safety`    — the auto-pause enforcer watching trades, errors,
//                   sentiment, slippage, daily PnL, and privacy signals
//   - `engine`    — the orchestration state machine driving a decision
//                   from raw market data to a recorded recommendation
//
// Everything external (exchanges, news, policy servers, optimizers,
// language models) enters through the capability traits in `adapters`.
// =============================================================================

pub mod adapters;
pub mod agents;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod indicators;
pub mod patterns;
pub mod research;
pub mod safety;
pub mod temporal;
pub mod types;

pub use adapters::{
    ComplianceAdapter, ComplianceVerdict, DataAdapter, ExecutionAdapter, FundamentalsAdapter,
    LanguageModelAdapter, MacroAdapter, NewsAdapter, OnChainAdapter, OptimizationOutcome,
    OptimizerAdapter, SentimentAdapter, SocialAdapter, TradeIntent,
};
pub use config::{EngineConfig, GatewayConfig, PlannerConfig, SafetyConfig, ValidationConfig};
pub use engine::{AdapterSet, Decision, DecisionState, EngineStatus, Orchestrator};
pub use error::{EngineError, Result};
pub use history::{AgentDebate, DecisionHistory, DecisionRecord};
pub use research::{ResearchPlan, ResearchPlanner, ResearchTask, TaskPriority, TaskStatus};
pub use safety::{SafetyEnforcer, SafetyStatus, SafetyTrigger, SafetyViolation};
pub use temporal::{
    AccessRecord, DataKind, DataBoundaryValidator, HistoricalReplay, ReplayFrequency,
    TemporalGateway, ValidationReport,
};
pub use types::{
    Action, MarketSnapshot, Message, NewsItem, OhlcvBar, Portfolio, PriceData, RiskProfile,
    Severity, TradeOutcome, TradingMode,
};
