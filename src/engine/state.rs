// =============================================================================
// Decision state — the shared record one tick accumulates
// =============================================================================
//
// Fixed struct instead of an ad-hoc map: every field a stage can read or
// write is enumerated here. Nodes return `StatePatch` values; `apply`
// folds a patch in with the merge discipline:
//
//   - `messages` always appends (the transcript is append-only)
//   - scalar and structured fields overwrite when the patch carries them
//   - `final_decision` is only written while it is still unset; the graph
//     runner explicitly reopens the round before a refinement pass, so no
//     stage ever mutates a committed decision
// =============================================================================

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::agents::privacy::PrivacyCheck;
use crate::agents::risk::RiskAssessment;
use crate::research::task::ResearchTask;
use crate::types::{Action, MarketSnapshot, Message};

/// Debate excerpts attached to a decision, truncated for storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecisionReasoning {
    pub bull: String,
    pub bear: String,
    pub technical: String,
}

/// The final recommendation of one tick.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub symbol: String,
    /// Belief in the recommendation, in [0, 1].
    pub confidence: f64,
    pub sentiment: f64,
    /// Portfolio fraction to allocate; zero for holds.
    pub size: f64,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<DecisionReasoning>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Decision {
    /// A conservative zero-confidence hold.
    pub fn hold(symbol: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            action: Action::Hold,
            symbol: symbol.into(),
            confidence: 0.0,
            sentiment: 0.0,
            size: 0.0,
            timestamp: Utc::now(),
            reason: Some(reason.into()),
            reasoning: None,
            error: None,
        }
    }
}

/// Shared mutable state of one decision tick. Owned exclusively by the
/// orchestrator for the tick's duration.
#[derive(Debug, Clone)]
pub struct DecisionState {
    pub symbol: String,
    pub current_price: f64,
    pub market_data: MarketSnapshot,

    pub research_summary: Option<String>,
    pub research_data: Option<Value>,
    pub sentiment_score: f64,

    pub bull_argument: Option<String>,
    pub bear_argument: Option<String>,
    pub technical_analysis: Option<String>,

    pub risk_assessment: Option<RiskAssessment>,
    pub compliance_check: Option<PrivacyCheck>,

    pub validation_score: f64,
    pub validation_passed: bool,
    pub data_gaps: Vec<String>,
    pub validation_checks: HashMap<String, bool>,

    pub confidence: f64,
    /// Optimizer's recommended portfolio fraction for this tick.
    pub position_size: f64,
    pub final_decision: Option<Decision>,

    pub iteration: u32,
    pub max_iterations: u32,

    pub planned_tasks: Vec<ResearchTask>,
    pub completed_task_ids: Vec<String>,
    pub task_execution_results: HashMap<String, Value>,

    /// Append-only transcript; every stage adds exactly one entry.
    pub messages: Vec<Message>,
}

impl DecisionState {
    pub fn new(symbol: impl Into<String>, market_data: MarketSnapshot, max_iterations: u32) -> Self {
        let current_price = market_data.price;
        Self {
            symbol: symbol.into(),
            current_price,
            market_data,
            research_summary: None,
            research_data: None,
            sentiment_score: 0.0,
            bull_argument: None,
            bear_argument: None,
            technical_analysis: None,
            risk_assessment: None,
            compliance_check: None,
            validation_score: 0.0,
            validation_passed: false,
            data_gaps: Vec::new(),
            validation_checks: HashMap::new(),
            confidence: 0.0,
            position_size: 0.0,
            final_decision: None,
            iteration: 0,
            max_iterations,
            planned_tasks: Vec::new(),
            completed_task_ids: Vec::new(),
            task_execution_results: HashMap::new(),
            messages: Vec::new(),
        }
    }

    /// Fold a node's patch into the state.
    pub fn apply(&mut self, patch: StatePatch) {
        self.messages.extend(patch.messages);

        macro_rules! overwrite {
            ($($field:ident),+ $(,)?) => {
                $(if let Some(value) = patch.$field {
                    self.$field = value;
                })+
            };
        }

        overwrite!(
            research_summary,
            research_data,
            sentiment_score,
            bull_argument,
            bear_argument,
            technical_analysis,
            risk_assessment,
            compliance_check,
            validation_score,
            validation_passed,
            data_gaps,
            validation_checks,
            confidence,
            position_size,
            iteration,
            planned_tasks,
            completed_task_ids,
            task_execution_results,
        );

        // A committed decision is immutable for the rest of the round.
        if self.final_decision.is_none() {
            if let Some(decision) = patch.final_decision {
                self.final_decision = Some(decision);
            }
        }
    }

    /// Reopen the round for another refinement pass. Only the graph runner
    /// calls this, on an `iterate` / `refine_research` route.
    pub(crate) fn reopen(&mut self) {
        self.final_decision = None;
    }
}

/// A node's partial state update. Unset fields leave the state untouched.
#[derive(Debug, Clone, Default)]
pub struct StatePatch {
    pub messages: Vec<Message>,
    pub research_summary: Option<Option<String>>,
    pub research_data: Option<Option<Value>>,
    pub sentiment_score: Option<f64>,
    pub bull_argument: Option<Option<String>>,
    pub bear_argument: Option<Option<String>>,
    pub technical_analysis: Option<Option<String>>,
    pub risk_assessment: Option<Option<RiskAssessment>>,
    pub compliance_check: Option<Option<PrivacyCheck>>,
    pub validation_score: Option<f64>,
    pub validation_passed: Option<bool>,
    pub data_gaps: Option<Vec<String>>,
    pub validation_checks: Option<HashMap<String, bool>>,
    pub confidence: Option<f64>,
    pub position_size: Option<f64>,
    pub final_decision: Option<Decision>,
    pub iteration: Option<u32>,
    pub planned_tasks: Option<Vec<ResearchTask>>,
    pub completed_task_ids: Option<Vec<String>>,
    pub task_execution_results: Option<HashMap<String, Value>>,
}

impl StatePatch {
    /// A patch carrying only a transcript entry.
    pub fn message(role: &str, content: impl Into<String>) -> Self {
        Self {
            messages: vec![Message::new(role, content)],
            ..Default::default()
        }
    }
}
