// =============================================================================
// Decision History — per-symbol record ring for explainability
// =============================================================================
//
// Stores the last N decisions per symbol in a bounded ring. Single writer
// (the orchestrator's decide node), concurrent readers. Records are
// serde-round-trippable so they can be mirrored into any external store.
// =============================================================================

use std::collections::{HashMap, VecDeque};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::types::Action;

/// The debate context a decision was made in.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentDebate {
    #[serde(default)]
    pub bull_argument: String,
    #[serde(default)]
    pub bear_argument: String,
    #[serde(default)]
    pub research_summary: String,
    #[serde(default)]
    pub technical_analysis: String,
}

/// One stored decision with its full context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionRecord {
    pub id: String,
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub action: Action,
    pub confidence: f64,
    pub sentiment: f64,
    /// Full structured decision payload from the decide node.
    pub decision: Value,
    pub agent_debate: AgentDebate,
}

/// In-memory decision history: last N records per symbol.
pub struct DecisionHistory {
    records: RwLock<HashMap<String, VecDeque<DecisionRecord>>>,
    max_per_symbol: usize,
}

impl DecisionHistory {
    pub fn new(max_per_symbol: usize) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            max_per_symbol: max_per_symbol.max(1),
        }
    }

    /// Append a record to the symbol's ring, evicting the oldest entry when
    /// the ring is full.
    pub fn add(&self, record: DecisionRecord) {
        let mut map = self.records.write();
        let ring = map
            .entry(record.symbol.clone())
            .or_insert_with(|| VecDeque::with_capacity(self.max_per_symbol));

        debug!(symbol = %record.symbol, action = %record.action, "decision recorded");

        ring.push_back(record);
        while ring.len() > self.max_per_symbol {
            ring.pop_front();
        }
    }

    /// Most recent decision for a symbol.
    pub fn last(&self, symbol: &str) -> Option<DecisionRecord> {
        self.records
            .read()
            .get(symbol)
            .and_then(|ring| ring.back().cloned())
    }

    /// Newest-first history for a symbol, optionally bounded to records at
    /// or after `since`.
    pub fn get_decisions(
        &self,
        symbol: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> Vec<DecisionRecord> {
        let map = self.records.read();
        let Some(ring) = map.get(symbol) else {
            return Vec::new();
        };

        ring.iter()
            .rev()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .take(limit)
            .cloned()
            .collect()
    }

    /// All symbols with at least one stored decision.
    pub fn symbols(&self) -> Vec<String> {
        self.records.read().keys().cloned().collect()
    }

    /// Render one record as a human-readable explanation.
    pub fn format_explanation(record: &DecisionRecord) -> String {
        let truncate = |s: &str| -> String { s.chars().take(200).collect() };

        let mut out = String::new();
        out.push_str(&format!("Decision Explanation for {}\n", record.symbol));
        out.push_str(&format!("Time: {}\n\n", record.timestamp.to_rfc3339()));
        out.push_str(&format!(
            "Decision: {}\nConfidence: {:.1}%\nSentiment: {:+.2}\n\n",
            record.action.to_string().to_uppercase(),
            record.confidence * 100.0,
            record.sentiment
        ));
        out.push_str(&format!(
            "Bull Argument:\n{}\n\n",
            truncate(&record.agent_debate.bull_argument)
        ));
        out.push_str(&format!(
            "Bear Argument:\n{}\n\n",
            truncate(&record.agent_debate.bear_argument)
        ));
        out.push_str(&format!(
            "Research Summary:\n{}\n",
            truncate(&record.agent_debate.research_summary)
        ));

        if let Some(technical) = record
            .decision
            .get("reasoning")
            .and_then(|r| r.get("technical"))
            .and_then(|t| t.as_str())
        {
            out.push_str(&format!("\nKey Technical Factor:\n{}\n", truncate(technical)));
        }

        out
    }

    /// Clear one symbol's history, or everything.
    pub fn clear(&self, symbol: Option<&str>) {
        let mut map = self.records.write();
        match symbol {
            Some(s) => {
                map.remove(s);
            }
            None => map.clear(),
        }
    }
}
