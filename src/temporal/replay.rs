// =============================================================================
// Historical replay — time-stepped backtesting with per-step gateways
// =============================================================================
//
// Walks a [start, end] range at a fixed frequency. Each step yields a
// simulation time; `gateway_for` builds a strict gateway pinned to that
// time, so the exact agent code that runs live also runs in replay, with
// the temporal boundary doing the work of historical faithfulness.
// =============================================================================

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::adapters::{DataAdapter, NewsAdapter};
use crate::config::GatewayConfig;
use crate::temporal::gateway::TemporalGateway;

/// Step frequency for a replay run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplayFrequency {
    Daily,
    Hourly,
    FourHour,
    FifteenMin,
}

impl ReplayFrequency {
    fn step(self) -> Duration {
        match self {
            Self::Daily => Duration::days(1),
            Self::Hourly => Duration::hours(1),
            Self::FourHour => Duration::hours(4),
            Self::FifteenMin => Duration::minutes(15),
        }
    }
}

impl std::fmt::Display for ReplayFrequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::Daily => "daily",
            Self::Hourly => "hourly",
            Self::FourHour => "4h",
            Self::FifteenMin => "15m",
        };
        write!(f, "{label}")
    }
}

/// One step of a replay run.
#[derive(Debug, Clone, Copy)]
pub struct ReplayStep {
    pub index: usize,
    pub simulation_time: DateTime<Utc>,
}

/// A recorded decision, tagged with its step.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayDecision {
    pub step: usize,
    pub simulation_time: DateTime<Utc>,
    pub decision: Value,
}

/// Summary returned after a replay finishes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplayResults {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub frequency: ReplayFrequency,
    pub total_steps: usize,
    pub decisions: Vec<ReplayDecision>,
}

/// Historical replay runner.
pub struct HistoricalReplay {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    frequency: ReplayFrequency,
    gateway_config: GatewayConfig,
    data_adapter: Option<Arc<dyn DataAdapter>>,
    news_adapter: Option<Arc<dyn NewsAdapter>>,
    decisions: Vec<ReplayDecision>,
}

impl HistoricalReplay {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>, frequency: ReplayFrequency) -> Self {
        Self {
            start,
            end,
            frequency,
            gateway_config: GatewayConfig::default(),
            data_adapter: None,
            news_adapter: None,
            decisions: Vec::new(),
        }
    }

    pub fn with_data_adapter(mut self, adapter: Arc<dyn DataAdapter>) -> Self {
        self.data_adapter = Some(adapter);
        self
    }

    pub fn with_news_adapter(mut self, adapter: Arc<dyn NewsAdapter>) -> Self {
        self.news_adapter = Some(adapter);
        self
    }

    /// All steps of the run, in chronological order. Both endpoints are
    /// included when the step size lands on them.
    pub fn steps(&self) -> Vec<ReplayStep> {
        let step_size = self.frequency.step();
        let mut steps = Vec::new();
        let mut current = self.start;
        let mut index = 0;

        while current <= self.end {
            steps.push(ReplayStep {
                index,
                simulation_time: current,
            });
            current += step_size;
            index += 1;
        }

        steps
    }

    /// Build a strict gateway pinned to the step's simulation time.
    pub fn gateway_for(&self, step: &ReplayStep) -> TemporalGateway {
        let mut gateway = TemporalGateway::new(Some(step.simulation_time), &self.gateway_config);
        if let Some(adapter) = &self.data_adapter {
            gateway = gateway.with_data_adapter(adapter.clone());
        }
        if let Some(adapter) = &self.news_adapter {
            gateway = gateway.with_news_adapter(adapter.clone());
        }
        gateway
    }

    /// Record the decision made at a step.
    pub fn record_decision(&mut self, step: &ReplayStep, decision: Value) {
        self.decisions.push(ReplayDecision {
            step: step.index,
            simulation_time: step.simulation_time,
            decision,
        });
    }

    /// Summary of the run so far.
    pub fn results(&self) -> ReplayResults {
        ReplayResults {
            start: self.start,
            end: self.end,
            frequency: self.frequency,
            total_steps: self.decisions.len(),
            decisions: self.decisions.clone(),
        }
    }
}
