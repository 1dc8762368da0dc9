// =============================================================================
// Research tasks — the unit of work in a research plan
// =============================================================================
//
// Lifecycle: PENDING -> IN_PROGRESS -> {COMPLETED | FAILED | SKIPPED}.
// No back-transitions; a task may be skipped straight from PENDING (failed
// dependency, exhausted time budget).
// =============================================================================

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What a task actually probes. Doubles as the dispatch key for the
/// executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Sentiment,
    OnChain,
    Technical,
    Macro,
    Liquidity,
    Correlation,
    Momentum,
    Patterns,
    Keywords,
}

impl TaskKind {
    /// Stable task id used in dependency declarations and result maps.
    pub fn id(self) -> &'static str {
        match self {
            Self::Sentiment => "task_sentiment",
            Self::OnChain => "task_onchain",
            Self::Technical => "task_technical",
            Self::Macro => "task_macro",
            Self::Liquidity => "task_liquidity",
            Self::Correlation => "task_correlation",
            Self::Momentum => "task_momentum",
            Self::Patterns => "task_patterns",
            Self::Keywords => "task_keywords",
        }
    }
}

/// Priority levels; lower value executes earlier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Critical,
    High,
    Medium,
    Low,
}

impl TaskPriority {
    pub fn value(self) -> u8 {
        match self {
            Self::Critical => 1,
            Self::High => 2,
            Self::Medium => 3,
            Self::Low => 4,
        }
    }
}

/// Task execution status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl TaskStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Skipped)
    }
}

/// A single research task in the plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchTask {
    pub task_id: String,
    pub kind: TaskKind,
    pub name: String,
    pub description: String,
    pub priority: TaskPriority,
    pub data_sources: Vec<String>,
    pub dependencies: Vec<String>,
    pub estimated_cost: f64,
    pub timeout_seconds: u64,
    pub status: TaskStatus,
    pub result: Option<Value>,
    pub error: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
}

impl ResearchTask {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        kind: TaskKind,
        name: impl Into<String>,
        description: impl Into<String>,
        priority: TaskPriority,
        data_sources: &[&str],
        dependencies: &[TaskKind],
        estimated_cost: f64,
        timeout_seconds: u64,
    ) -> Self {
        Self {
            task_id: kind.id().to_string(),
            kind,
            name: name.into(),
            description: description.into(),
            priority,
            data_sources: data_sources.iter().map(|s| s.to_string()).collect(),
            dependencies: dependencies.iter().map(|k| k.id().to_string()).collect(),
            estimated_cost,
            timeout_seconds,
            status: TaskStatus::Pending,
            result: None,
            error: None,
            start_time: None,
            end_time: None,
        }
    }

    /// PENDING -> IN_PROGRESS. Ignored from any other state.
    pub fn mark_started(&mut self) {
        if self.status == TaskStatus::Pending {
            self.status = TaskStatus::InProgress;
            self.start_time = Some(Utc::now());
        }
    }

    /// -> COMPLETED with a result. Ignored once terminal.
    pub fn mark_completed(&mut self, result: Value) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Completed;
            self.result = Some(result);
            self.end_time = Some(Utc::now());
        }
    }

    /// -> FAILED with an error. Any partial result is discarded.
    pub fn mark_failed(&mut self, error: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Failed;
            self.result = None;
            self.error = Some(error.into());
            self.end_time = Some(Utc::now());
        }
    }

    /// -> SKIPPED with a reason (failed dependency, budget exhausted).
    pub fn mark_skipped(&mut self, reason: impl Into<String>) {
        if !self.status.is_terminal() {
            self.status = TaskStatus::Skipped;
            self.error = Some(reason.into());
            self.end_time = Some(Utc::now());
        }
    }
}
